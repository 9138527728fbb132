//! Reaper - periodic expiry reconciliation
//!
//! Evicts expired leases on a fixed interval so that names nobody queries
//! are still reclaimed. It runs the same reconciliation as the request
//! path; concurrent passes split the expired rows between them and each
//! eviction is reported once.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ServiceContext;

/// Background task that reconciles expired locks on an interval
pub struct Reaper {
    ctx: Arc<ServiceContext>,
    interval: Duration,
}

impl Reaper {
    /// Creates a new Reaper
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared service context
    /// * `interval` - Time between passes; the first pass runs immediately
    pub fn new(ctx: Arc<ServiceContext>, interval: Duration) -> Self {
        Self { ctx, interval }
    }

    /// Runs one reconciliation pass at the current time.
    ///
    /// Returns the number of evicted locks.
    pub async fn tick(&self) -> anyhow::Result<usize> {
        self.tick_at(leasehold_core::usecases::unix_now()).await
    }

    /// Runs one reconciliation pass at `now`.
    pub async fn tick_at(&self, now: i64) -> anyhow::Result<usize> {
        let evicted = self.ctx.service().reconcile_at(now).await?;
        let held = self.ctx.service().held_count().await?;
        self.ctx.metrics().set_active_locks(held);

        debug!(evicted = evicted.len(), held, "Reaper pass complete");
        Ok(evicted.len())
    }

    /// Runs passes until `shutdown` is cancelled.
    ///
    /// A failed pass is logged and the loop keeps going.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Starting reaper");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "Reaper pass failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Reaper shutting down");
                    break;
                }
            }
        }
    }
}
