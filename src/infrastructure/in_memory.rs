use crate::domain::ports::{InsertOutcome, RecordStore, RuleStore};
use crate::domain::record::{CommissionRecord, RecordId};
use crate::domain::rule::{CommissionRule, RuleId};
use crate::error::{CommissionError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for commission rules.
///
/// Uses `Arc<RwLock<HashMap<RuleId, CommissionRule>>>` to allow shared concurrent access.
#[derive(Default, Clone)]
pub struct InMemoryRuleStore {
    rules: Arc<RwLock<HashMap<RuleId, CommissionRule>>>,
}

impl InMemoryRuleStore {
    /// Creates a new, empty in-memory rule store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn store(&self, rule: CommissionRule) -> Result<()> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id, rule);
        Ok(())
    }

    async fn get(&self, rule_id: RuleId) -> Result<Option<CommissionRule>> {
        let rules = self.rules.read().await;
        Ok(rules.get(&rule_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<CommissionRule>> {
        let rules = self.rules.read().await;
        Ok(rules.values().cloned().collect())
    }

    async fn remove(&self, rule_id: RuleId) -> Result<bool> {
        let mut rules = self.rules.write().await;
        Ok(rules.remove(&rule_id).is_some())
    }
}

#[derive(Default)]
struct RecordTable {
    rows: HashMap<RecordId, CommissionRecord>,
    by_event: HashMap<(String, RuleId), RecordId>,
}

/// A thread-safe in-memory store for commission records.
///
/// Keeps a secondary index on `(source_event_id, rule_id)` under the same lock
/// as the rows, which is what makes `insert` an atomic uniqueness check.
#[derive(Default, Clone)]
pub struct InMemoryRecordStore {
    table: Arc<RwLock<RecordTable>>,
}

impl InMemoryRecordStore {
    /// Creates a new, empty in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: CommissionRecord) -> Result<InsertOutcome> {
        let mut table = self.table.write().await;
        let key = (record.source_event_id().to_string(), record.rule_id());
        if let Some(existing_id) = table.by_event.get(&key)
            && let Some(existing) = table.rows.get(existing_id)
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        table.by_event.insert(key, record.id());
        table.rows.insert(record.id(), record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn update(&self, record: CommissionRecord, expected_version: u64) -> Result<()> {
        let mut table = self.table.write().await;
        let current = table
            .rows
            .get_mut(&record.id())
            .ok_or_else(|| CommissionError::NotFound(format!("commission record {}", record.id())))?;
        if current.version() != expected_version {
            return Err(CommissionError::ConcurrentModification {
                id: record.id(),
                expected: expected_version,
                found: current.version(),
            });
        }
        *current = record;
        Ok(())
    }

    async fn get(&self, record_id: RecordId) -> Result<Option<CommissionRecord>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&record_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<CommissionRecord>> {
        let table = self.table.read().await;
        Ok(table.rows.values().cloned().collect())
    }

    async fn references_rule(&self, rule_id: RuleId) -> Result<bool> {
        let table = self.table.read().await;
        Ok(table.by_event.keys().any(|(_, id)| *id == rule_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{CalculationContext, TriggerEvent, TriggerType};
    use crate::domain::money::Amount;
    use crate::domain::record::RecordStatus;
    use crate::domain::rule::NewRule;
    use chrono::Utc;
    use rust_decimal_macros::dec;

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
    async fn test_in_memory_rule_store() {
        let store = InMemoryRuleStore::new();
        let rule = rule();

        store.store(rule.clone()).await.unwrap();
        assert_eq!(store.get(rule.id).await.unwrap().unwrap(), rule);
        assert_eq!(store.get_all().await.unwrap().len(), 1);

        assert!(store.remove(rule.id).await.unwrap());
        assert!(!store.remove(rule.id).await.unwrap());
        assert!(store.get(rule.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_enforces_event_rule_uniqueness() {
        let store = InMemoryRecordStore::new();
        let rule = rule();
        let first = record("deal-1", &rule);

        let outcome = store.insert(first.clone()).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted(first.clone()));

        let outcome = store.insert(record("deal-1", &rule)).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate(first));

        assert!(matches!(
            store.insert(record("deal-2", &rule)).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
        assert_eq!(store.get_all().await.unwrap().len(), 2);
        assert!(store.references_rule(rule.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_compares_version() {
        let store = InMemoryRecordStore::new();
        let mut rec = record("deal-1", &rule());
        store.insert(rec.clone()).await.unwrap();

        let expected = rec.version();
        rec.mark_pending(Utc::now()).unwrap();
        store.update(rec.clone(), expected).await.unwrap();

        let mut stale = rec.clone();
        stale.mark_paid(Utc::now()).unwrap();
        let err = store.update(stale, expected).await.unwrap_err();
        assert!(matches!(
            err,
            CommissionError::ConcurrentModification {
                expected: 1,
                found: 2,
                ..
            }
        ));

        let stored = store.get(rec.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), RecordStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = InMemoryRecordStore::new();
        let rec = record("deal-1", &rule());
        assert!(matches!(
            store.update(rec, 1).await,
            Err(CommissionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_one_record() {
        let store = InMemoryRecordStore::new();
        let rule = rule();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let rec = record("deal-race", &rule);
            handles.push(tokio::spawn(async move { store.insert(rec).await.unwrap() }));
        }

        let mut inserted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), InsertOutcome::Inserted(_)) {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }
}
