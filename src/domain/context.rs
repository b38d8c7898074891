use super::money::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of business event activates a rule.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    OnClose,
    OnPayment,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::OnClose => f.write_str("on_close"),
            TriggerType::OnPayment => f.write_str("on_payment"),
        }
    }
}

/// The facts about a deal or payment that rule resolution looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationContext {
    pub trigger_type: TriggerType,
    pub alliance_id: Option<String>,
    pub project_type: Option<String>,
    pub product: Option<String>,
}

impl CalculationContext {
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            alliance_id: None,
            project_type: None,
            product: None,
        }
    }

    pub fn with_alliance(mut self, alliance_id: impl Into<String>) -> Self {
        self.alliance_id = Some(alliance_id.into());
        self
    }

    pub fn with_project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = Some(project_type.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }
}

impl fmt::Display for CalculationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "trigger={} alliance={} project_type={} product={}",
            self.trigger_type,
            show(&self.alliance_id),
            show(&self.project_type),
            show(&self.product)
        )
    }
}

/// A deal-closed or payment-received notification from the sales module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub source_event_id: String,
    pub context: CalculationContext,
    pub base_amount: Amount,
}
