use super::context::{CalculationContext, TriggerType};
use super::money::Percent;
use crate::error::CommissionError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether a rule applies to every alliance or to a single one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "alliance_id", rename_all = "snake_case")]
pub enum RuleScope {
    Global,
    Alliance(String),
}

impl RuleScope {
    pub fn matches(&self, alliance_id: Option<&str>) -> bool {
        match self {
            RuleScope::Global => true,
            RuleScope::Alliance(id) => alliance_id == Some(id.as_str()),
        }
    }

    pub fn is_alliance(&self) -> bool {
        matches!(self, RuleScope::Alliance(_))
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleScope::Global => f.write_str("global"),
            RuleScope::Alliance(id) => write!(f, "alliance:{id}"),
        }
    }
}

/// An optional narrowing filter on a rule. `Any` accepts every context value,
/// including a missing one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[default]
    Any,
    Exactly(String),
}

impl Criterion {
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Criterion::Any => true,
            Criterion::Exactly(expected) => value == Some(expected.as_str()),
        }
    }

    pub fn is_specific(&self) -> bool {
        matches!(self, Criterion::Exactly(_))
    }
}

impl From<Option<String>> for Criterion {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => Criterion::Exactly(v),
            None => Criterion::Any,
        }
    }
}

/// A configured commission rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRule {
    pub id: RuleId,
    pub name: String,
    pub scope: RuleScope,
    pub project_type: Criterion,
    pub product: Criterion,
    pub percent: Percent,
    pub applies_on: TriggerType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator input for creating a rule. The percent is raw so that
/// out-of-range values surface as validation errors from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    pub scope: RuleScope,
    #[serde(default)]
    pub project_type: Criterion,
    #[serde(default)]
    pub product: Criterion,
    pub percent: Decimal,
    pub applies_on: TriggerType,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewRule {
    pub fn new(name: impl Into<String>, percent: Decimal, applies_on: TriggerType) -> Self {
        Self {
            name: name.into(),
            scope: RuleScope::Global,
            project_type: Criterion::Any,
            product: Criterion::Any,
            percent,
            applies_on,
            active: true,
        }
    }

    pub fn for_alliance(mut self, alliance_id: impl Into<String>) -> Self {
        self.scope = RuleScope::Alliance(alliance_id.into());
        self
    }

    pub fn with_project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = Criterion::Exactly(project_type.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Criterion::Exactly(product.into());
        self
    }
}

/// A partial edit to a rule. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulePatch {
    pub name: Option<String>,
    pub scope: Option<RuleScope>,
    pub project_type: Option<Criterion>,
    pub product: Option<Criterion>,
    pub percent: Option<Decimal>,
    pub applies_on: Option<TriggerType>,
    pub active: Option<bool>,
}

/// Narrows `RuleCatalog::list`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleFilter {
    pub active: Option<bool>,
    pub applies_on: Option<TriggerType>,
    pub alliance_id: Option<String>,
}

impl RuleFilter {
    pub fn active() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    pub fn matches(&self, rule: &CommissionRule) -> bool {
        self.active.is_none_or(|a| rule.active == a)
            && self.applies_on.is_none_or(|t| rule.applies_on == t)
            && self
                .alliance_id
                .as_deref()
                .is_none_or(|id| rule.scope == RuleScope::Alliance(id.to_string()))
    }
}

impl CommissionRule {
    /// Validates operator input and builds a rule stamped with `now`.
    pub fn create(id: RuleId, new: NewRule, now: DateTime<Utc>) -> Result<Self, CommissionError> {
        let rule = Self {
            id,
            name: new.name.trim().to_string(),
            scope: new.scope,
            project_type: new.project_type,
            product: new.product,
            percent: Percent::new(new.percent)?,
            applies_on: new.applies_on,
            active: new.active,
            created_at: now,
            updated_at: now,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Applies a patch, returning the edited copy. `self` is untouched on error.
    pub fn patched(&self, patch: RulePatch, now: DateTime<Utc>) -> Result<Self, CommissionError> {
        let mut rule = self.clone();
        if let Some(name) = patch.name {
            rule.name = name.trim().to_string();
        }
        if let Some(scope) = patch.scope {
            rule.scope = scope;
        }
        if let Some(project_type) = patch.project_type {
            rule.project_type = project_type;
        }
        if let Some(product) = patch.product {
            rule.product = product;
        }
        if let Some(percent) = patch.percent {
            rule.percent = Percent::new(percent)?;
        }
        if let Some(applies_on) = patch.applies_on {
            rule.applies_on = applies_on;
        }
        if let Some(active) = patch.active {
            rule.active = active;
        }
        rule.validate()?;
        rule.updated_at = now;
        Ok(rule)
    }

    fn validate(&self) -> Result<(), CommissionError> {
        if self.name.is_empty() {
            return Err(CommissionError::ValidationError(
                "Rule name must not be empty".to_string(),
            ));
        }
        if let RuleScope::Alliance(id) = &self.scope
            && id.trim().is_empty()
        {
            return Err(CommissionError::ValidationError(
                "Alliance scope requires an alliance id".to_string(),
            ));
        }
        for (field, criterion) in [("project_type", &self.project_type), ("product", &self.product)] {
            if let Criterion::Exactly(value) = criterion
                && value.trim().is_empty()
            {
                return Err(CommissionError::ValidationError(format!(
                    "Rule {field} filter must not be empty; use Any instead"
                )));
            }
        }
        Ok(())
    }

    /// Whether every filter on this rule accepts the context.
    pub fn matches(&self, ctx: &CalculationContext) -> bool {
        self.active
            && self.applies_on == ctx.trigger_type
            && self.scope.matches(ctx.alliance_id.as_deref())
            && self.project_type.matches(ctx.project_type.as_deref())
            && self.product.matches(ctx.product.as_deref())
    }
}
