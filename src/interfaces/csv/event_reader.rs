use crate::domain::context::{CalculationContext, TriggerEvent, TriggerType};
use crate::domain::money::Amount;
use crate::error::{CommissionError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct EventRow {
    source_event_id: String,
    trigger_type: TriggerType,
    alliance_id: Option<String>,
    project_type: Option<String>,
    product: Option<String>,
    base_amount: Decimal,
}

impl TryFrom<EventRow> for TriggerEvent {
    type Error = CommissionError;

    fn try_from(row: EventRow) -> Result<Self> {
        if row.source_event_id.is_empty() {
            return Err(CommissionError::ValidationError(
                "Event source_event_id must not be empty".to_string(),
            ));
        }
        Ok(TriggerEvent {
            source_event_id: row.source_event_id,
            context: CalculationContext {
                trigger_type: row.trigger_type,
                alliance_id: row.alliance_id,
                project_type: row.project_type,
                product: row.product,
            },
            base_amount: Amount::new(row.base_amount)?,
        })
    }
}

/// Reads deal-closed / payment-received events from a CSV source.
///
/// Columns: `source_event_id, trigger_type, alliance_id, project_type, product, base_amount`.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates events, so large
    /// files are processed in a streaming fashion.
    pub fn events(self) -> impl Iterator<Item = Result<TriggerEvent>> {
        self.reader
            .into_deserialize::<EventRow>()
            .map(|row| TriggerEvent::try_from(row?))
    }
}
