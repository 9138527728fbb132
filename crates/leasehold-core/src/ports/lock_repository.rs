//! Lock repository port (driven/secondary port)
//!
//! This module defines the storage primitives the lock lifecycle engine
//! depends on. Every method must be a short atomic operation on the
//! durable store; correctness under concurrent requests rests on these
//! primitives, not on in-process synchronization.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and are never retried by the core.
//! - `try_insert` is a single conditional write. A read followed by a
//!   separate insert would let two racing callers both observe "absent".
//! - `reap_expired` is idempotent: concurrent callers partition the
//!   expired rows between them, and each row is reported exactly once.

use crate::domain::{Lock, LockName, Owner};

/// Result of a conditional insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was created
    Inserted,
    /// A row already existed; it is returned unchanged
    Held(Lock),
}

/// Result of an owner-guarded mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedOutcome {
    /// The row existed, the owner matched, and the mutation was applied
    Applied,
    /// No row exists for the name
    NotFound,
    /// A row exists but belongs to a different owner; nothing changed
    Forbidden,
}

/// Port trait for lock persistence
#[async_trait::async_trait]
pub trait ILockRepository: Send + Sync {
    /// Deletes every lock with `expires_at <= now` and returns the
    /// deleted rows
    async fn reap_expired(&self, now: i64) -> anyhow::Result<Vec<Lock>>;

    /// Inserts `lock` only if no row exists for its name
    async fn try_insert(&self, lock: &Lock) -> anyhow::Result<InsertOutcome>;

    /// Deletes the lock if `owner` holds it
    async fn delete_owned(&self, name: &LockName, owner: &Owner) -> anyhow::Result<OwnedOutcome>;

    /// Sets a new expiry if `owner` holds the lock
    async fn update_expiry_owned(
        &self,
        name: &LockName,
        owner: &Owner,
        expires_at: i64,
    ) -> anyhow::Result<OwnedOutcome>;

    /// Retrieves the lock row for a name, expired or not
    async fn get(&self, name: &LockName) -> anyhow::Result<Option<Lock>>;

    /// All lock rows ordered by name ascending
    async fn list(&self) -> anyhow::Result<Vec<Lock>>;

    /// Number of lock rows
    async fn count(&self) -> anyhow::Result<u64>;
}
