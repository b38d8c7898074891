use crate::domain::ports::{InsertOutcome, RecordStore, RuleStore};
use crate::domain::record::{CommissionRecord, RecordId};
use crate::domain::rule::{CommissionRule, RuleId};
use crate::error::{CommissionError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing rule definitions.
pub const CF_RULES: &str = "rules";
/// Column Family for storing commission records.
pub const CF_RECORDS: &str = "records";
/// Column Family mapping `(source_event_id, rule_id)` to a record id.
pub const CF_EVENT_INDEX: &str = "event_index";

/// A persistent store implementation using RocksDB.
///
/// Rules, records and the event uniqueness index live in separate Column
/// Families. Record writes that check-then-write (insert and versioned update)
/// are serialized through `write_lock`, so the index and version checks hold
/// across concurrent callers sharing a clone of this store.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_RULES, CF_RECORDS, CF_EVENT_INDEX]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            CommissionError::StorageError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }
}

fn event_key(source_event_id: &str, rule_id: RuleId) -> Vec<u8> {
    let mut key = rule_id.0.as_bytes().to_vec();
    key.extend_from_slice(source_event_id.as_bytes());
    key
}

#[async_trait]
impl RuleStore for RocksDBStore {
    async fn store(&self, rule: CommissionRule) -> Result<()> {
        self.put_json(CF_RULES, rule.id.0.as_bytes(), &rule)
    }

    async fn get(&self, rule_id: RuleId) -> Result<Option<CommissionRule>> {
        self.get_json(CF_RULES, rule_id.0.as_bytes())
    }

    async fn get_all(&self) -> Result<Vec<CommissionRule>> {
        self.scan(CF_RULES)
    }

    async fn remove(&self, rule_id: RuleId) -> Result<bool> {
        let cf = self.cf(CF_RULES)?;
        let key = rule_id.0.as_bytes();
        // Just check if the key exists without retrieving the value
        let existed = self.db.get_pinned_cf(cf, key)?.is_some();
        if existed {
            self.db.delete_cf(cf, key)?;
        }
        Ok(existed)
    }
}

#[async_trait]
impl RecordStore for RocksDBStore {
    async fn insert(&self, record: CommissionRecord) -> Result<InsertOutcome> {
        let _guard = self.write_lock.lock().await;

        let index_key = event_key(record.source_event_id(), record.rule_id());
        if let Some(existing_id) = self.db.get_cf(self.cf(CF_EVENT_INDEX)?, &index_key)?
            && let Some(existing) = self.get_json::<CommissionRecord>(CF_RECORDS, &existing_id)?
        {
            return Ok(InsertOutcome::Duplicate(existing));
        }

        let record_key = record.id().0.as_bytes().to_vec();
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_RECORDS)?, &record_key, serde_json::to_vec(&record)?);
        batch.put_cf(self.cf(CF_EVENT_INDEX)?, &index_key, &record_key);
        self.db.write(batch)?;

        Ok(InsertOutcome::Inserted(record))
    }

    async fn update(&self, record: CommissionRecord, expected_version: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let key = record.id().0.as_bytes().to_vec();
        let current: CommissionRecord = self
            .get_json(CF_RECORDS, &key)?
            .ok_or_else(|| CommissionError::NotFound(format!("commission record {}", record.id())))?;
        if current.version() != expected_version {
            return Err(CommissionError::ConcurrentModification {
                id: record.id(),
                expected: expected_version,
                found: current.version(),
            });
        }
        self.put_json(CF_RECORDS, &key, &record)
    }

    async fn get(&self, record_id: RecordId) -> Result<Option<CommissionRecord>> {
        self.get_json(CF_RECORDS, record_id.0.as_bytes())
    }

    async fn get_all(&self) -> Result<Vec<CommissionRecord>> {
        self.scan(CF_RECORDS)
    }

    async fn references_rule(&self, rule_id: RuleId) -> Result<bool> {
        let prefix = rule_id.0.as_bytes();
        let cf = self.cf(CF_EVENT_INDEX)?;
        let mode = rocksdb::IteratorMode::From(prefix, rocksdb::Direction::Forward);
        match self.db.iterator_cf(cf, mode).next() {
            Some(item) => {
                let (key, _value) = item?;
                Ok(key.starts_with(prefix))
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{CalculationContext, TriggerEvent, TriggerType};
    use crate::domain::money::Amount;
    use crate::domain::rule::NewRule;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn rule() -> CommissionRule {
        CommissionRule::create(
            RuleId::new(),
            NewRule::new("base", dec!(3), TriggerType::OnClose),
            Utc::now(),
        )
        .unwrap()
    }

    fn record(event: &str, rule: &CommissionRule) -> CommissionRecord {
        let event = TriggerEvent {
            source_event_id: event.to_string(),
            context: CalculationContext::new(TriggerType::OnClose),
            base_amount: Amount::new(dec!(100)).unwrap(),
        };
        CommissionRecord::computed(&event, rule, Utc::now())
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_RULES).is_some());
        assert!(store.db.cf_handle(CF_RECORDS).is_some());
        assert!(store.db.cf_handle(CF_EVENT_INDEX).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_rule_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let rule = rule();

        RuleStore::store(&store, rule.clone()).await.unwrap();
        assert_eq!(RuleStore::get(&store, rule.id).await.unwrap().unwrap(), rule);
        assert_eq!(RuleStore::get_all(&store).await.unwrap().len(), 1);

        assert!(RuleStore::remove(&store, rule.id).await.unwrap());
        assert!(RuleStore::get(&store, rule.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_record_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let rule = rule();
        let rec = record("deal-1", &rule);

        assert!(matches!(
            store.insert(rec.clone()).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
        assert_eq!(
            store.insert(record("deal-1", &rule)).await.unwrap(),
            InsertOutcome::Duplicate(rec.clone())
        );
        assert!(store.references_rule(rule.id).await.unwrap());
        assert!(!store.references_rule(RuleId::new()).await.unwrap());

        let mut paid = rec.clone();
        paid.mark_paid(Utc::now()).unwrap();
        store.update(paid.clone(), 1).await.unwrap();
        assert!(matches!(
            store.update(paid.clone(), 1).await,
            Err(CommissionError::ConcurrentModification { .. })
        ));
        assert_eq!(RecordStore::get(&store, rec.id()).await.unwrap().unwrap(), paid);
    }
}
