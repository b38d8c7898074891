use clap::Parser;
use commission_engine::application::engine::{CommissionEngine, DEFAULT_BULK_CONCURRENCY, EngineConfig};
use commission_engine::domain::ports::{RecordStoreRef, RuleStoreRef};
use commission_engine::domain::record::CommissionRecord;
use commission_engine::infrastructure::in_memory::{InMemoryRecordStore, InMemoryRuleStore};
#[cfg(feature = "storage-rocksdb")]
use commission_engine::infrastructure::rocksdb::RocksDBStore;
use commission_engine::interfaces::csv::event_reader::EventReader;
use commission_engine::interfaces::csv::record_writer::RecordWriter;
use commission_engine::interfaces::csv::rule_reader::RuleReader;
use miette::{IntoDiagnostic, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Commission rules CSV file
    rules: PathBuf,

    /// Trigger events (closed deals, received payments) CSV file
    events: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "COMMISSION_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Mark every commission computed in this run as paid.
    #[arg(long)]
    mark_paid: bool,

    /// How many records a bulk mark-paid transitions at once.
    #[arg(long, env = "COMMISSION_BULK_CONCURRENCY", default_value_t = DEFAULT_BULK_CONCURRENCY)]
    bulk_concurrency: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("commission_engine=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn open_stores(db_path: Option<PathBuf>) -> Result<(RuleStoreRef, RecordStoreRef)> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok((
                Arc::new(InMemoryRuleStore::new()),
                Arc::new(InMemoryRecordStore::new()),
            ))
        }
        None => Ok((
            Arc::new(InMemoryRuleStore::new()),
            Arc::new(InMemoryRecordStore::new()),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let (rules, records) = open_stores(cli.db_path)?;
    let engine = CommissionEngine::new(
        rules,
        records,
        EngineConfig {
            bulk_concurrency: cli.bulk_concurrency,
        },
    );

    // Load rule definitions
    let catalog = engine.catalog();
    let file = File::open(cli.rules).into_diagnostic()?;
    for rule in RuleReader::new(file).rules() {
        match rule {
            Ok(new) => {
                if let Err(e) = catalog.sync(new).await {
                    warn!("Error loading rule: {}", e);
                }
            }
            Err(e) => warn!("Error reading rule: {}", e),
        }
    }

    // Process trigger events
    let mut computed: Vec<CommissionRecord> = Vec::new();
    let mut seen = HashSet::new();
    let file = File::open(cli.events).into_diagnostic()?;
    for event in EventReader::new(file).events() {
        match event {
            Ok(event) => match engine.resolve_and_compute(event).await {
                Ok(record) => {
                    if seen.insert(record.id()) {
                        computed.push(record);
                    }
                }
                Err(e) => warn!("Skipping event: {}", e),
            },
            Err(e) => warn!("Error reading event: {}", e),
        }
    }

    if cli.mark_paid {
        let ids: Vec<_> = computed.iter().map(|r| r.id()).collect();
        let outcome = engine.bulk_mark_paid(&ids).await;
        for failure in &outcome.failed {
            warn!("Could not mark {} as paid: {}", failure.id, failure.error);
        }
        let mut refreshed = Vec::with_capacity(computed.len());
        for record in &computed {
            refreshed.push(engine.get_record(record.id()).await.into_diagnostic()?);
        }
        computed = refreshed;
    }

    let totals = engine.totals(None).await.into_diagnostic()?;
    info!(
        records = totals.records,
        outstanding = %totals.outstanding(),
        paid = %totals.paid,
        "commission totals"
    );

    // Output records touched in this run
    let stdout = io::stdout();
    let mut writer = RecordWriter::new(stdout.lock());
    writer.write_records(&computed).into_diagnostic()?;

    Ok(())
}
