use super::bulk::{BulkOutcome, BulkPaymentProcessor};
use super::catalog::RuleCatalog;
use super::lifecycle::RecordLifecycle;
use super::reporting::{self, CommissionTotals, RecordFilter};
use super::resolver;
use crate::domain::context::TriggerEvent;
use crate::domain::ports::{InsertOutcome, RecordStoreRef, RuleStoreRef};
use crate::domain::record::{CommissionRecord, RecordId};
use crate::domain::rule::RuleFilter;
use crate::error::{CommissionError, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Default number of records a bulk mark-paid transitions at once.
pub const DEFAULT_BULK_CONCURRENCY: usize = 8;

/// Tunables for [`CommissionEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub bulk_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
        }
    }
}

/// The main entry point for commission processing.
///
/// `CommissionEngine` turns trigger events into commission records and moves
/// those records through their lifecycle. It holds no state of its own beyond
/// the store handles, so any number of events can be processed concurrently
/// against one engine.
pub struct CommissionEngine {
    rules: RuleStoreRef,
    records: RecordStoreRef,
    lifecycle: RecordLifecycle,
    bulk: BulkPaymentProcessor,
}

impl CommissionEngine {
    /// Creates a new `CommissionEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `rules` - The store for commission rules.
    /// * `records` - The store for computed commission records.
    /// * `config` - Engine tunables.
    pub fn new(rules: RuleStoreRef, records: RecordStoreRef, config: EngineConfig) -> Self {
        let lifecycle = RecordLifecycle::new(records.clone());
        let bulk = BulkPaymentProcessor::new(lifecycle.clone(), config.bulk_concurrency);
        Self {
            rules,
            records,
            lifecycle,
            bulk,
        }
    }

    /// Rule management over the same stores this engine uses.
    pub fn catalog(&self) -> RuleCatalog {
        RuleCatalog::new(self.rules.clone(), self.records.clone())
    }

    /// Resolves the rule for a trigger event and records the commission.
    ///
    /// Re-delivering an event that already produced a record under the same
    /// rule returns that record instead of creating another one. When no
    /// active rule applies, fails with `NoMatchingRule` and records nothing.
    pub async fn resolve_and_compute(&self, event: TriggerEvent) -> Result<CommissionRecord> {
        if event.source_event_id.trim().is_empty() {
            return Err(CommissionError::ValidationError(
                "Event source_event_id must not be empty".to_string(),
            ));
        }
        let active = self
            .rules
            .get_all()
            .await?
            .into_iter()
            .filter(|r| RuleFilter::active().matches(r))
            .collect::<Vec<_>>();

        let rule = match resolver::resolve(&event.context, &active) {
            Ok(rule) => rule,
            Err(err) => {
                warn!(source_event_id = %event.source_event_id, "no commission rule configured for {}", event.context);
                return Err(err);
            }
        };
        debug!(source_event_id = %event.source_event_id, rule_id = %rule.id, rule = %rule.name, "commission rule resolved");

        let record = CommissionRecord::computed(&event, rule, Utc::now());

        match self.records.insert(record).await? {
            InsertOutcome::Inserted(record) => {
                info!(
                    record_id = %record.id(),
                    source_event_id = %record.source_event_id(),
                    rule_id = %record.rule_id(),
                    amount = %record.calculated_amount(),
                    "commission computed"
                );
                Ok(record)
            }
            InsertOutcome::Duplicate(existing) => {
                info!(
                    record_id = %existing.id(),
                    source_event_id = %existing.source_event_id(),
                    "duplicate trigger event, returning existing commission"
                );
                Ok(existing)
            }
        }
    }

    pub async fn get_record(&self, id: RecordId) -> Result<CommissionRecord> {
        self.lifecycle.load(id).await
    }

    /// Lists records matching `filter`, oldest first.
    pub async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<CommissionRecord>> {
        let mut records: Vec<CommissionRecord> = match filter.status {
            Some(status) => self.records.get_by_status(status).await?,
            None => self.records.get_all().await?,
        };
        records.retain(|r| filter.matches(r));
        records.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(records)
    }

    /// Commission sums per status, optionally for a single alliance.
    pub async fn totals(&self, alliance_id: Option<&str>) -> Result<CommissionTotals> {
        let filter = RecordFilter {
            alliance_id: alliance_id.map(str::to_string),
            ..RecordFilter::default()
        };
        let records = self.list_records(&filter).await?;
        Ok(reporting::summarize(&records))
    }

    /// Moves a computed record into review.
    pub async fn mark_pending(&self, id: RecordId) -> Result<CommissionRecord> {
        self.lifecycle.mark_pending(id).await
    }

    /// Marks a record paid. Idempotent: an already paid record comes back unchanged.
    pub async fn mark_paid(&self, id: RecordId) -> Result<CommissionRecord> {
        self.lifecycle.mark_paid(id).await
    }

    /// Marks every listed record paid, reporting each id's outcome.
    pub async fn bulk_mark_paid(&self, ids: &[RecordId]) -> BulkOutcome {
        self.bulk.mark_paid(ids).await
    }

    /// Cancels a record that has not been paid yet.
    pub async fn cancel(&self, id: RecordId, reason: &str) -> Result<CommissionRecord> {
        self.lifecycle.cancel(id, reason).await
    }
}
