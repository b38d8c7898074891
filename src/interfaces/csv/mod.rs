//! CSV adapters for the batch command line: rule and trigger event readers,
//! and the commission record writer.

pub mod event_reader;
pub mod record_writer;
pub mod rule_reader;
