use crate::domain::context::CalculationContext;
use crate::domain::record::{RecordId, RecordStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommissionError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("No commission rule configured for {context}")]
    NoMatchingRule { context: CalculationContext },
    #[error("Commission record {0} is already paid")]
    AlreadyPaid(RecordId),
    #[error("Commission record {0} is already cancelled")]
    AlreadyCancelled(RecordId),
    #[error("Commission record {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: RecordId,
        from: RecordStatus,
        to: RecordStatus,
    },
    #[error(
        "Commission record {id} was modified concurrently (expected version {expected}, found {found})"
    )]
    ConcurrentModification {
        id: RecordId,
        expected: u64,
        found: u64,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    StorageError(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CommissionError {
    fn from(err: rocksdb::Error) -> Self {
        CommissionError::StorageError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CommissionError>;
