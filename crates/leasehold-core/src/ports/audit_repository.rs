//! Audit repository port
//!
//! Persistence for the lock event log. Only the audit worker writes
//! through this port; readers use `recent` for the log view.
//!
//! Retention is ordered by `timestamp`, not by insertion id. Rows with
//! equal timestamps are ordered by id.

use crate::domain::{LockEvent, NewLockEvent};

/// Port trait for audit event persistence
#[async_trait::async_trait]
pub trait IAuditRepository: Send + Sync {
    /// Appends an event and returns it with its assigned id
    async fn append(&self, event: &NewLockEvent) -> anyhow::Result<LockEvent>;

    /// Number of stored events
    async fn count(&self) -> anyhow::Result<u64>;

    /// Deletes the oldest events (by timestamp) until at most `capacity`
    /// remain; returns the number deleted
    async fn trim_to(&self, capacity: u64) -> anyhow::Result<u64>;

    /// Most recent events, newest first, up to `limit`
    async fn recent(&self, limit: u32) -> anyhow::Result<Vec<LockEvent>>;
}
