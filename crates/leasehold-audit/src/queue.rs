//! Producer side of the audit trail

use std::sync::Arc;

use leasehold_core::domain::NewLockEvent;
use leasehold_core::ports::{IAuditRepository, IEventSink};
use tokio::sync::mpsc;

use crate::worker::{AuditWorker, WorkerSettings};

/// Creates a connected queue and worker.
///
/// The queue may be cloned freely; the worker must be spawned exactly once.
pub fn channel(
    repo: Arc<dyn IAuditRepository>,
    settings: WorkerSettings,
) -> (AuditQueue, AuditWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AuditQueue { tx }, AuditWorker::new(rx, repo, settings))
}

/// Non-blocking event sink backed by an unbounded channel
#[derive(Debug, Clone)]
pub struct AuditQueue {
    tx: mpsc::UnboundedSender<NewLockEvent>,
}

impl AuditQueue {
    /// Whether the worker has stopped consuming
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl IEventSink for AuditQueue {
    fn record(&self, event: NewLockEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            tracing::warn!(
                name = %event.name,
                action = %event.action,
                "Audit worker stopped; event not persisted"
            );
        }
    }
}
