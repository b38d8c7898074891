use crate::domain::ports::{RecordStoreRef, RuleStoreRef};
use crate::domain::rule::{CommissionRule, NewRule, RuleFilter, RuleId, RulePatch};
use crate::error::{CommissionError, Result};
use chrono::Utc;
use tracing::{info, warn};

/// Operator-facing management of commission rules.
///
/// Validation lives on [`CommissionRule`]; the catalog adds persistence and the
/// rule that referenced rules can only be deactivated, never deleted.
#[derive(Clone)]
pub struct RuleCatalog {
    rules: RuleStoreRef,
    records: RecordStoreRef,
}

impl RuleCatalog {
    pub fn new(rules: RuleStoreRef, records: RecordStoreRef) -> Self {
        Self { rules, records }
    }

    pub async fn create(&self, new: NewRule) -> Result<CommissionRule> {
        let rule = CommissionRule::create(RuleId::new(), new, Utc::now())?;
        self.rules.store(rule.clone()).await?;
        info!(rule_id = %rule.id, name = %rule.name, scope = %rule.scope, percent = %rule.percent, "commission rule created");
        Ok(rule)
    }

    pub async fn get(&self, id: RuleId) -> Result<CommissionRule> {
        self.rules
            .get(id)
            .await?
            .ok_or_else(|| CommissionError::NotFound(format!("commission rule {id}")))
    }

    /// Edits a rule. Records already computed from it keep their snapshots.
    pub async fn update(&self, id: RuleId, patch: RulePatch) -> Result<CommissionRule> {
        let current = self.get(id).await?;
        let updated = current.patched(patch, Utc::now())?;
        self.rules.store(updated.clone()).await?;
        info!(rule_id = %id, percent = %updated.percent, active = updated.active, "commission rule updated");
        Ok(updated)
    }

    pub async fn deactivate(&self, id: RuleId) -> Result<CommissionRule> {
        self.update(
            id,
            RulePatch {
                active: Some(false),
                ..RulePatch::default()
            },
        )
        .await
    }

    /// Lists rules matching `filter`, oldest first.
    pub async fn list(&self, filter: &RuleFilter) -> Result<Vec<CommissionRule>> {
        let mut rules: Vec<CommissionRule> = self
            .rules
            .get_all()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    /// Creates the rule, or overwrites the definition of the existing rule with
    /// the same name while keeping its id. Batch loaders use this so that
    /// reloading a rules file never forks a rule into two.
    pub async fn sync(&self, new: NewRule) -> Result<CommissionRule> {
        let name = new.name.trim();
        let existing = self
            .rules
            .get_all()
            .await?
            .into_iter()
            .find(|r| r.name == name);
        match existing {
            Some(rule) => {
                let patch = RulePatch {
                    name: None,
                    scope: Some(new.scope),
                    project_type: Some(new.project_type),
                    product: Some(new.product),
                    percent: Some(new.percent),
                    applies_on: Some(new.applies_on),
                    active: Some(new.active),
                };
                self.update(rule.id, patch).await
            }
            None => self.create(new).await,
        }
    }

    /// Physically removes a rule that no record has ever referenced.
    ///
    /// References are checked again after the removal and the rule is put back
    /// if a record appeared in between. This is not a transaction: a computation
    /// that loaded the rule earlier and inserts its record after the second
    /// check still leaves a record whose rule is gone. Records carry their own
    /// snapshots, so they stay complete; only `rule_id` dangles.
    pub async fn delete(&self, id: RuleId) -> Result<()> {
        let rule = self.get(id).await?;
        if self.records.references_rule(id).await? {
            return Err(referenced(id));
        }
        if !self.rules.remove(id).await? {
            return Err(CommissionError::NotFound(format!("commission rule {id}")));
        }
        if self.records.references_rule(id).await? {
            self.rules.store(rule).await?;
            warn!(rule_id = %id, "commission rule gained a record during delete, restored");
            return Err(referenced(id));
        }
        info!(rule_id = %id, "commission rule deleted");
        Ok(())
    }
}

fn referenced(id: RuleId) -> CommissionError {
    CommissionError::ValidationError(format!(
        "Commission rule {id} is referenced by existing records; deactivate it instead"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::TriggerType;
    use crate::domain::ports::{InsertOutcome, RecordStore};
    use crate::domain::record::{CommissionRecord, RecordId};
    use crate::domain::rule::RuleScope;
    use crate::infrastructure::in_memory::{InMemoryRecordStore, InMemoryRuleStore};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalog() -> RuleCatalog {
        RuleCatalog::new(
            Arc::new(InMemoryRuleStore::new()),
            Arc::new(InMemoryRecordStore::new()),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let catalog = catalog();
        let rule = catalog
            .create(NewRule::new("  base  ", dec!(3), TriggerType::OnClose))
            .await
            .unwrap();
        assert_eq!(rule.name, "base");
        assert_eq!(catalog.get(rule.id).await.unwrap(), rule);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_rule() {
        let catalog = catalog();
        let err = catalog
            .create(NewRule::new("too much", dec!(120), TriggerType::OnClose))
            .await
            .unwrap_err();
        assert!(matches!(err, CommissionError::ValidationError(_)));
        assert!(catalog.list(&RuleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_empty_name_and_keeps_rule() {
        let catalog = catalog();
        let rule = catalog
            .create(NewRule::new("base", dec!(3), TriggerType::OnClose))
            .await
            .unwrap();
        let err = catalog
            .update(
                rule.id,
                RulePatch {
                    name: Some(String::new()),
                    ..RulePatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommissionError::ValidationError(_)));
        assert_eq!(catalog.get(rule.id).await.unwrap().name, "base");
    }

    #[tokio::test]
    async fn test_unknown_rule_is_not_found() {
        let catalog = catalog();
        assert!(matches!(
            catalog.deactivate(RuleId::new()).await,
            Err(CommissionError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete(RuleId::new()).await,
            Err(CommissionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_and_list_filters() {
        let catalog = catalog();
        let global = catalog
            .create(NewRule::new("global", dec!(3), TriggerType::OnClose))
            .await
            .unwrap();
        let alliance = catalog
            .create(NewRule::new("alliance", dec!(5), TriggerType::OnPayment).for_alliance("X"))
            .await
            .unwrap();

        let deactivated = catalog.deactivate(global.id).await.unwrap();
        assert!(!deactivated.active);

        let active = catalog.list(&RuleFilter::active()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, alliance.id);

        let on_payment = catalog
            .list(&RuleFilter {
                applies_on: Some(TriggerType::OnPayment),
                ..RuleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(on_payment.len(), 1);
        assert_eq!(on_payment[0].scope, RuleScope::Alliance("X".to_string()));

        assert_eq!(catalog.list(&RuleFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_updates_rule_with_same_name() {
        let catalog = catalog();
        let first = catalog
            .sync(NewRule::new("base", dec!(3), TriggerType::OnClose))
            .await
            .unwrap();
        let second = catalog
            .sync(NewRule::new("base", dec!(4), TriggerType::OnClose).for_alliance("X"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.percent.value(), dec!(4));
        assert_eq!(second.scope, RuleScope::Alliance("X".to_string()));
        assert_eq!(catalog.list(&RuleFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unreferenced_rule() {
        let catalog = catalog();
        let rule = catalog
            .create(NewRule::new("typo", dec!(3), TriggerType::OnClose))
            .await
            .unwrap();
        catalog.delete(rule.id).await.unwrap();
        assert!(matches!(
            catalog.get(rule.id).await,
            Err(CommissionError::NotFound(_))
        ));
    }

    /// Reports no references on the first check and one on every later check,
    /// as if a record landed while the delete was in flight.
    #[derive(Default)]
    struct LateReferenceStore {
        inner: InMemoryRecordStore,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for LateReferenceStore {
        async fn insert(&self, record: CommissionRecord) -> Result<InsertOutcome> {
            self.inner.insert(record).await
        }

        async fn update(&self, record: CommissionRecord, expected_version: u64) -> Result<()> {
            self.inner.update(record, expected_version).await
        }

        async fn get(&self, record_id: RecordId) -> Result<Option<CommissionRecord>> {
            self.inner.get(record_id).await
        }

        async fn get_all(&self) -> Result<Vec<CommissionRecord>> {
            self.inner.get_all().await
        }

        async fn references_rule(&self, _rule_id: RuleId) -> Result<bool> {
            Ok(self.checks.fetch_add(1, Ordering::SeqCst) > 0)
        }
    }

    #[tokio::test]
    async fn test_delete_restores_rule_referenced_meanwhile() {
        let catalog = RuleCatalog::new(
            Arc::new(InMemoryRuleStore::new()),
            Arc::new(LateReferenceStore::default()),
        );
        let rule = catalog
            .create(NewRule::new("base", dec!(3), TriggerType::OnClose))
            .await
            .unwrap();

        assert!(matches!(
            catalog.delete(rule.id).await,
            Err(CommissionError::ValidationError(_))
        ));
        assert_eq!(catalog.get(rule.id).await.unwrap(), rule);
    }
}
