use crate::domain::ports::RecordStoreRef;
use crate::domain::record::{CommissionRecord, RecordId};
use crate::error::{CommissionError, Result};
use chrono::Utc;
use tracing::{debug, info};

/// Applies lifecycle transitions to stored records.
///
/// Every transition is a reload, a guarded in-memory change, and a
/// compare-and-swap write on the version the record was loaded with. There is
/// no retry on conflict; the caller decides what to do with
/// `ConcurrentModification`.
#[derive(Clone)]
pub struct RecordLifecycle {
    records: RecordStoreRef,
}

impl RecordLifecycle {
    pub fn new(records: RecordStoreRef) -> Self {
        Self { records }
    }

    pub async fn load(&self, id: RecordId) -> Result<CommissionRecord> {
        self.records
            .get(id)
            .await?
            .ok_or_else(|| CommissionError::NotFound(format!("commission record {id}")))
    }

    async fn transition<F>(&self, id: RecordId, apply: F) -> Result<CommissionRecord>
    where
        F: FnOnce(&mut CommissionRecord) -> Result<()>,
    {
        let mut record = self.load(id).await?;
        let expected = record.version();
        apply(&mut record)?;
        self.records.update(record.clone(), expected).await?;
        info!(record_id = %id, status = %record.status(), version = record.version(), "commission record transitioned");
        Ok(record)
    }

    pub async fn mark_pending(&self, id: RecordId) -> Result<CommissionRecord> {
        self.transition(id, |r| r.mark_pending(Utc::now())).await
    }

    /// Marks a record paid, surfacing `AlreadyPaid` as an error.
    pub async fn try_mark_paid(&self, id: RecordId) -> Result<CommissionRecord> {
        self.transition(id, |r| r.mark_paid(Utc::now())).await
    }

    /// Marks a record paid. A record that is already paid is returned as stored.
    pub async fn mark_paid(&self, id: RecordId) -> Result<CommissionRecord> {
        match self.try_mark_paid(id).await {
            Err(CommissionError::AlreadyPaid(_)) => {
                debug!(record_id = %id, "commission record already paid");
                self.load(id).await
            }
            other => other,
        }
    }

    pub async fn cancel(&self, id: RecordId, reason: &str) -> Result<CommissionRecord> {
        self.transition(id, |r| r.cancel(reason, Utc::now())).await
    }
}
