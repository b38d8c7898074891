use crate::domain::money::Money;
use crate::domain::record::{CommissionRecord, RecordStatus};
use serde::Serialize;

/// Narrows record listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub status: Option<RecordStatus>,
    pub alliance_id: Option<String>,
    pub source_event_id: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &CommissionRecord) -> bool {
        self.status.is_none_or(|s| record.status() == s)
            && self
                .alliance_id
                .as_deref()
                .is_none_or(|id| record.alliance_id() == Some(id))
            && self
                .source_event_id
                .as_deref()
                .is_none_or(|id| record.source_event_id() == id)
    }
}

/// Commission sums per lifecycle state, as handed to reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommissionTotals {
    pub records: usize,
    pub computed: Money,
    pub pending: Money,
    pub paid: Money,
    pub cancelled: Money,
}

impl CommissionTotals {
    /// Owed but not yet paid.
    pub fn outstanding(&self) -> Money {
        self.computed + self.pending
    }
}

pub fn summarize<'a, I>(records: I) -> CommissionTotals
where
    I: IntoIterator<Item = &'a CommissionRecord>,
{
    records
        .into_iter()
        .fold(CommissionTotals::default(), |mut totals, record| {
            totals.records += 1;
            let amount = record.calculated_amount();
            match record.status() {
                RecordStatus::Computed => totals.computed += amount,
                RecordStatus::Pending => totals.pending += amount,
                RecordStatus::Paid => totals.paid += amount,
                RecordStatus::Cancelled => totals.cancelled += amount,
            }
            totals
        })
}
