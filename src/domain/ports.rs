use super::record::{CommissionRecord, RecordId, RecordStatus};
use super::rule::{CommissionRule, RuleId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Inserts or replaces a rule.
    async fn store(&self, rule: CommissionRule) -> Result<()>;
    async fn get(&self, rule_id: RuleId) -> Result<Option<CommissionRule>>;
    async fn get_all(&self) -> Result<Vec<CommissionRule>>;
    /// Physically removes a rule. Returns whether it existed.
    async fn remove(&self, rule_id: RuleId) -> Result<bool>;
}

/// Result of inserting a record under the `(source_event_id, rule_id)` uniqueness constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(CommissionRecord),
    /// Another record already holds the key; it is returned untouched.
    Duplicate(CommissionRecord),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a new record unless one already exists for the same
    /// `(source_event_id, rule_id)`. The check and the write are atomic.
    async fn insert(&self, record: CommissionRecord) -> Result<InsertOutcome>;

    /// Replaces a record if the stored version still equals `expected_version`,
    /// failing with `ConcurrentModification` otherwise.
    async fn update(&self, record: CommissionRecord, expected_version: u64) -> Result<()>;

    async fn get(&self, record_id: RecordId) -> Result<Option<CommissionRecord>>;
    async fn get_all(&self) -> Result<Vec<CommissionRecord>>;
    async fn references_rule(&self, rule_id: RuleId) -> Result<bool>;

    async fn get_by_status(&self, status: RecordStatus) -> Result<Vec<CommissionRecord>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.status() == status)
            .collect())
    }
}

/// Shared handles; the catalog and the engine look at the same stores.
pub type RuleStoreRef = Arc<dyn RuleStore>;
pub type RecordStoreRef = Arc<dyn RecordStore>;
