use super::lifecycle::RecordLifecycle;
use crate::domain::record::{CommissionRecord, RecordId};
use crate::error::{CommissionError, Result};
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};

/// One id the batch could not mark paid, and why.
#[derive(Debug)]
pub struct BulkFailure {
    pub id: RecordId,
    pub error: CommissionError,
}

/// Per-item report of a bulk mark-paid. Both lists keep the input order.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<RecordId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<RecordId> {
        self.failed.iter().map(|f| f.id).collect()
    }
}

/// Marks many records paid, best effort.
///
/// Each distinct id is an independent transition guarded by its own version
/// check, so distinct ids run concurrently up to `concurrency` at a time. Repeated
/// occurrences of one id run one after another in the same task, so the later
/// ones see `paid` instead of racing the first. A failure on one id never
/// affects the others and never aborts the batch.
pub struct BulkPaymentProcessor {
    lifecycle: RecordLifecycle,
    concurrency: usize,
}

impl BulkPaymentProcessor {
    pub fn new(lifecycle: RecordLifecycle, concurrency: usize) -> Self {
        Self {
            lifecycle,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn mark_paid(&self, ids: &[RecordId]) -> BulkOutcome {
        let mut occurrences: HashMap<RecordId, usize> = HashMap::new();
        let mut distinct = Vec::new();
        for id in ids {
            let count = occurrences.entry(*id).or_default();
            if *count == 0 {
                distinct.push(*id);
            }
            *count += 1;
        }

        let lifecycle = &self.lifecycle;
        let occurrences = &occurrences;
        let mut per_id: HashMap<RecordId, VecDeque<Result<CommissionRecord>>> =
            stream::iter(distinct)
                .map(|id| async move {
                    let mut results = VecDeque::new();
                    for _ in 0..occurrences[&id] {
                        results.push_back(lifecycle.try_mark_paid(id).await);
                    }
                    (id, results)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut outcome = BulkOutcome::default();
        for &id in ids {
            let Some(result) = per_id.get_mut(&id).and_then(VecDeque::pop_front) else {
                continue;
            };
            match result {
                Ok(_) | Err(CommissionError::AlreadyPaid(_)) => outcome.succeeded.push(id),
                Err(error) => {
                    warn!(record_id = %id, %error, "bulk mark-paid item failed");
                    outcome.failed.push(BulkFailure { id, error });
                }
            }
        }

        info!(
            requested = ids.len(),
            concurrency = self.concurrency,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "bulk mark-paid finished"
        );
        outcome
    }
}
