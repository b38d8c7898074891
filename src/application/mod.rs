//! Application layer containing the commission business logic orchestration.
//!
//! `CommissionEngine` is the entry point: it resolves rules for trigger events,
//! computes and stores commission records, and drives their lifecycle. The
//! resolver and calculator are pure functions usable on their own.

pub mod bulk;
pub mod calculator;
pub mod catalog;
pub mod engine;
pub mod lifecycle;
pub mod reporting;
pub mod resolver;
