//! AuditWorker - single consumer of the audit queue
//!
//! Dequeues events one at a time, persists them through
//! `IAuditRepository::append`, and keeps the stored log at or below
//! `max_log_entries`. The dequeue waits at most `poll_interval` so the
//! worker notices shutdown even when no events arrive.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use leasehold_core::config::{AuditConfig, PersistFailurePolicy};
use leasehold_core::domain::NewLockEvent;
use leasehold_core::ports::IAuditRepository;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Tunables for [`AuditWorker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub max_log_entries: u64,
    pub poll_interval: Duration,
    pub on_persist_error: PersistFailurePolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

impl From<&AuditConfig> for WorkerSettings {
    fn from(config: &AuditConfig) -> Self {
        Self {
            max_log_entries: config.max_log_entries,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            on_persist_error: config.on_persist_error,
        }
    }
}

/// Counters reported when the worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Events written to the store
    pub persisted: u64,
    /// Events lost to a failed insert under [`PersistFailurePolicy::Drop`]
    pub dropped: u64,
    /// Rows removed by retention trimming
    pub trimmed: u64,
    /// The worker stopped early under [`PersistFailurePolicy::Halt`]
    pub halted: bool,
}

/// Consumer half of the audit channel; see [`crate::channel`]
pub struct AuditWorker {
    rx: mpsc::UnboundedReceiver<NewLockEvent>,
    repo: Arc<dyn IAuditRepository>,
    settings: WorkerSettings,
}

impl AuditWorker {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<NewLockEvent>,
        repo: Arc<dyn IAuditRepository>,
        settings: WorkerSettings,
    ) -> Self {
        Self { rx, repo, settings }
    }

    /// Consumes events until `shutdown` is cancelled or every producer is
    /// gone. Events already queued at shutdown are persisted before
    /// returning.
    pub async fn run(mut self, shutdown: CancellationToken) -> WorkerStats {
        let mut stats = WorkerStats::default();

        tracing::info!(
            max_log_entries = self.settings.max_log_entries,
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            policy = ?self.settings.on_persist_error,
            "Audit worker started"
        );

        while !shutdown.is_cancelled() {
            match tokio::time::timeout(self.settings.poll_interval, self.rx.recv()).await {
                Ok(Some(event)) => {
                    if self.persist(event, &mut stats).await.is_break() {
                        return self.halt(stats);
                    }
                }
                Ok(None) => {
                    tracing::debug!("Audit queue closed");
                    return self.finish(stats);
                }
                // Timed out; loop to re-check shutdown
                Err(_) => {}
            }
        }

        // Drain what producers already handed over
        while let Ok(event) = self.rx.try_recv() {
            if self.persist(event, &mut stats).await.is_break() {
                return self.halt(stats);
            }
        }

        self.finish(stats)
    }

    async fn persist(&self, event: NewLockEvent, stats: &mut WorkerStats) -> ControlFlow<()> {
        if let Err(e) = self.repo.append(&event).await {
            return match self.settings.on_persist_error {
                PersistFailurePolicy::Drop => {
                    stats.dropped += 1;
                    tracing::warn!(
                        error = %e,
                        name = %event.name,
                        action = %event.action,
                        "Failed to persist lock event; dropping it"
                    );
                    ControlFlow::Continue(())
                }
                PersistFailurePolicy::Halt => {
                    tracing::error!(
                        error = %e,
                        name = %event.name,
                        action = %event.action,
                        "Failed to persist lock event; halting audit worker"
                    );
                    ControlFlow::Break(())
                }
            };
        }
        stats.persisted += 1;

        match self.enforce_retention().await {
            Ok(trimmed) => {
                stats.trimmed += trimmed;
                ControlFlow::Continue(())
            }
            Err(e) => match self.settings.on_persist_error {
                PersistFailurePolicy::Drop => {
                    tracing::warn!(error = %e, "Failed to trim lock event log");
                    ControlFlow::Continue(())
                }
                PersistFailurePolicy::Halt => {
                    tracing::error!(
                        error = %e,
                        "Failed to trim lock event log; halting audit worker"
                    );
                    ControlFlow::Break(())
                }
            },
        }
    }

    async fn enforce_retention(&self) -> anyhow::Result<u64> {
        let count = self.repo.count().await?;
        if count <= self.settings.max_log_entries {
            return Ok(0);
        }
        self.repo.trim_to(self.settings.max_log_entries).await
    }

    fn halt(mut self, mut stats: WorkerStats) -> WorkerStats {
        stats.halted = true;
        self.rx.close();
        self.finish(stats)
    }

    fn finish(self, stats: WorkerStats) -> WorkerStats {
        tracing::info!(
            persisted = stats.persisted,
            dropped = stats.dropped,
            trimmed = stats.trimmed,
            halted = stats.halted,
            "Audit worker stopped"
        );
        stats
    }
}
