use super::context::{TriggerEvent, TriggerType};
use super::money::{Amount, Money, Percent};
use super::rule::{CommissionRule, RuleId, RuleScope};
use crate::error::CommissionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Computed,
    Pending,
    Paid,
    Cancelled,
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Paid | RecordStatus::Cancelled)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordStatus::Computed => "computed",
            RecordStatus::Pending => "pending",
            RecordStatus::Paid => "paid",
            RecordStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A commission computed for one trigger event under one rule.
///
/// The rule's percent, scope and name are copied in at computation time and
/// never change afterwards. Status, timestamps and `version` only move through
/// the transition methods below.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CommissionRecord {
    id: RecordId,
    rule_id: RuleId,
    source_event_id: String,
    trigger_type: TriggerType,
    alliance_id: Option<String>,
    base_amount: Amount,
    percent_snapshot: Percent,
    calculated_amount: Money,
    scope_snapshot: RuleScope,
    rule_name_snapshot: String,
    status: RecordStatus,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl CommissionRecord {
    /// Builds a freshly computed record, snapshotting the rule and the deal's alliance.
    ///
    /// The amount is always derived from the event's base amount and the rule's
    /// percent; there is no way to build a record with any other figure.
    pub fn computed(event: &TriggerEvent, rule: &CommissionRule, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            rule_id: rule.id,
            source_event_id: event.source_event_id.clone(),
            trigger_type: event.context.trigger_type,
            alliance_id: event.context.alliance_id.clone(),
            base_amount: event.base_amount,
            percent_snapshot: rule.percent,
            calculated_amount: Money::commission(event.base_amount, rule.percent),
            scope_snapshot: rule.scope.clone(),
            rule_name_snapshot: rule.name.clone(),
            status: RecordStatus::Computed,
            paid_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn rule_id(&self) -> RuleId {
        self.rule_id
    }

    pub fn source_event_id(&self) -> &str {
        &self.source_event_id
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    /// The alliance of the deal this commission came from, whatever the rule's scope.
    pub fn alliance_id(&self) -> Option<&str> {
        self.alliance_id.as_deref()
    }

    pub fn base_amount(&self) -> Amount {
        self.base_amount
    }

    pub fn percent_snapshot(&self) -> Percent {
        self.percent_snapshot
    }

    pub fn calculated_amount(&self) -> Money {
        self.calculated_amount
    }

    pub fn scope_snapshot(&self) -> &RuleScope {
        &self.scope_snapshot
    }

    pub fn rule_name_snapshot(&self) -> &str {
        &self.rule_name_snapshot
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Optimistic concurrency token, bumped by every applied transition.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn terminal_error(&self) -> Option<CommissionError> {
        match self.status {
            RecordStatus::Paid => Some(CommissionError::AlreadyPaid(self.id)),
            RecordStatus::Cancelled => Some(CommissionError::AlreadyCancelled(self.id)),
            _ => None,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }

    /// Moves a computed record into review.
    pub fn mark_pending(&mut self, now: DateTime<Utc>) -> Result<(), CommissionError> {
        if let Some(err) = self.terminal_error() {
            return Err(err);
        }
        if self.status != RecordStatus::Computed {
            return Err(CommissionError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: RecordStatus::Pending,
            });
        }
        self.status = RecordStatus::Pending;
        self.touch(now);
        Ok(())
    }

    /// Marks the record paid. Fails with `AlreadyPaid` when there is nothing to do,
    /// which callers treat as success.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), CommissionError> {
        if let Some(err) = self.terminal_error() {
            return Err(err);
        }
        self.status = RecordStatus::Paid;
        self.paid_at = Some(now);
        self.touch(now);
        Ok(())
    }

    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), CommissionError> {
        if let Some(err) = self.terminal_error() {
            return Err(err);
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CommissionError::ValidationError(
                "Cancellation reason must not be empty".to_string(),
            ));
        }
        self.status = RecordStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason.to_string());
        self.touch(now);
        Ok(())
    }
}
