//! Leasehold Store - SQLite persistence
//!
//! SQLite-backed storage for:
//! - The lock table (one row per held name)
//! - The bounded lock event log
//!
//! ## Architecture
//!
//! This crate implements the `ILockRepository` and `IAuditRepository`
//! ports from `leasehold-core`. It is a driven (secondary) adapter in the
//! hexagonal architecture. Every lock primitive is a single statement or
//! a short transaction, so concurrent requests from any number of tasks
//! (or processes sharing the file) stay consistent.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use leasehold_store::{DatabasePool, SqliteLockRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/leasehold/locks.db")).await?;
//! let repo = SqliteLockRepository::new(pool.pool().clone());
//! // Use repo as ILockRepository and IAuditRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteLockRepository;

/// Errors that can occur in the store adapter
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be turned back into a domain value
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
