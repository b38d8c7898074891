use chrono::Utc;
use commission_engine::domain::context::{CalculationContext, TriggerEvent, TriggerType};
use commission_engine::domain::money::Amount;
use commission_engine::domain::ports::{RecordStoreRef, RuleStoreRef};
use commission_engine::domain::record::CommissionRecord;
use commission_engine::domain::rule::{CommissionRule, NewRule, RuleId};
use commission_engine::infrastructure::in_memory::{InMemoryRecordStore, InMemoryRuleStore};
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let rule_store: RuleStoreRef = Arc::new(InMemoryRuleStore::new());
    let record_store: RecordStoreRef = Arc::new(InMemoryRecordStore::new());

    let rule = CommissionRule::create(
        RuleId::new(),
        NewRule::new("base", dec!(3), TriggerType::OnClose),
        Utc::now(),
    )
    .unwrap();
    let event = TriggerEvent {
        source_event_id: "deal-1".to_string(),
        context: CalculationContext::new(TriggerType::OnClose),
        base_amount: Amount::new(dec!(100)).unwrap(),
    };
    let record = CommissionRecord::computed(&event, &rule, Utc::now());
    let record_id = record.id();
    let rule_id = rule.id;

    // Verify Send + Sync by spawning tasks
    let rs_handle = tokio::spawn(async move {
        rule_store.store(rule).await.unwrap();
        rule_store.get(rule_id).await.unwrap().unwrap()
    });

    let cs_handle = tokio::spawn(async move {
        record_store.insert(record).await.unwrap();
        record_store.get(record_id).await.unwrap().unwrap()
    });

    let retrieved_rule = rs_handle.await.unwrap();
    assert_eq!(retrieved_rule.name, "base");

    let retrieved_record = cs_handle.await.unwrap();
    assert_eq!(retrieved_record.rule_id(), rule_id);
}
