//! Fire-and-forget receipt writes.
//!
//! Receipts are recorded off the request path by a single worker draining a
//! bounded queue. A full queue or a failed write never reaches the caller; it
//! is logged, counted, and forwarded to an optional failure sink.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::metrics;
use crate::models::ReceiptStatus;
use crate::services::receipt_tracker::ReceiptTracker;

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptJob {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub status: ReceiptStatus,
}

#[derive(Debug, Clone)]
pub struct ReceiptFailure {
    pub job: ReceiptJob,
    pub reason: String,
}

pub type FailureSink = mpsc::UnboundedSender<ReceiptFailure>;

#[derive(Clone)]
pub struct ReceiptDispatcher {
    queue: mpsc::Sender<ReceiptJob>,
    failures: Option<FailureSink>,
}

impl ReceiptDispatcher {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(
        tracker: Arc<ReceiptTracker>,
        capacity: usize,
        failures: Option<FailureSink>,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(rx, tracker, failures.clone()));
        (Self { queue, failures }, handle)
    }

    /// Enqueue a receipt write. Never blocks and never fails.
    pub fn dispatch(&self, message_id: Uuid, user_id: Uuid, status: ReceiptStatus) {
        let job = ReceiptJob {
            message_id,
            user_id,
            status,
        };
        match self.queue.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                report(&self.failures, job, "queue_full", "receipt queue full".into())
            }
            Err(TrySendError::Closed(job)) => report(
                &self.failures,
                job,
                "worker_stopped",
                "receipt worker stopped".into(),
            ),
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<ReceiptJob>,
    tracker: Arc<ReceiptTracker>,
    failures: Option<FailureSink>,
) {
    while let Some(job) = rx.recv().await {
        if let Err(e) = tracker
            .record_receipt(job.message_id, job.user_id, job.status)
            .await
        {
            report(&failures, job, "store_error", e.to_string());
        }
    }
    tracing::debug!("receipt worker exiting, queue closed");
}

fn report(failures: &Option<FailureSink>, job: ReceiptJob, kind: &str, reason: String) {
    tracing::warn!(
        message_id = %job.message_id,
        user_id = %job.user_id,
        status = job.status.as_str(),
        reason = %reason,
        "receipt write dropped"
    );
    metrics::record_receipt_failure(kind);
    if let Some(sink) = failures {
        let _ = sink.send(ReceiptFailure { job, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::StoreTable;
    use crate::repository::{MemoryStore, ReceiptStore};
    use std::time::Duration;

    #[tokio::test]
    async fn failed_writes_reach_the_sink_only() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(StoreTable::Receipts, true).await;
        let tracker = Arc::new(ReceiptTracker::new(store.clone(), store.clone()));
        let (sink, mut failures) = mpsc::unbounded_channel();
        let (dispatcher, _worker) = ReceiptDispatcher::spawn(tracker, 8, Some(sink));

        let message_id = Uuid::new_v4();
        dispatcher.dispatch(message_id, Uuid::new_v4(), ReceiptStatus::Delivered);

        let failure = tokio::time::timeout(Duration::from_secs(1), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failure.job.message_id, message_id);
    }

    #[tokio::test]
    async fn successful_writes_land_in_store() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(ReceiptTracker::new(store.clone(), store.clone()));
        let (dispatcher, worker) = ReceiptDispatcher::spawn(tracker, 8, None);

        let message_id = Uuid::new_v4();
        dispatcher.dispatch(message_id, Uuid::new_v4(), ReceiptStatus::Read);
        drop(dispatcher);
        worker.await.unwrap();

        let receipts = store.receipts_for_message(message_id).await.unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].status, ReceiptStatus::Read);
    }
}
