use crate::domain::record::CommissionRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct RecordRow<'a> {
    source_event_id: &'a str,
    rule: &'a str,
    scope: String,
    percent: String,
    base_amount: String,
    amount: String,
    status: String,
}

impl<'a> From<&'a CommissionRecord> for RecordRow<'a> {
    fn from(record: &'a CommissionRecord) -> Self {
        Self {
            source_event_id: record.source_event_id(),
            rule: record.rule_name_snapshot(),
            scope: record.scope_snapshot().to_string(),
            percent: record.percent_snapshot().to_string(),
            base_amount: record.base_amount().to_string(),
            amount: record.calculated_amount().to_string(),
            status: record.status().to_string(),
        }
    }
}

/// Writes commission records as CSV.
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_records<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a CommissionRecord>,
    {
        for record in records {
            self.writer.serialize(RecordRow::from(record))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
