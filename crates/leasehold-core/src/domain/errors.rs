//! Domain error types
//!
//! Validation failures for lock names, owners and TTLs, plus the error
//! taxonomy returned by lock lifecycle operations.

use thiserror::Error;

/// Errors raised while constructing validated domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Lock name is empty, too long, or contains control characters
    #[error("Invalid lock name: {0}")]
    InvalidName(String),

    /// Owner identity is empty or too long
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    /// TTL is not a positive number of seconds
    #[error("Invalid ttl: {0}")]
    InvalidTtl(String),

    /// A stored action string could not be parsed
    #[error("Unknown lock action: {0}")]
    UnknownAction(String),
}

/// Errors returned by lock lifecycle operations
///
/// Contention is not an error; it is reported through `AcquireOutcome`.
#[derive(Debug, Error)]
pub enum LockError {
    /// No lock exists for the name
    #[error("Lock not found: {0}")]
    NotFound(String),

    /// The lock exists but is held by a different owner
    #[error("Lock '{name}' is not owned by '{owner}'")]
    Forbidden {
        /// Lock name
        name: String,
        /// Owner that attempted the operation
        owner: String,
    },

    /// Request carried an invalid name, owner or ttl
    #[error(transparent)]
    Invalid(#[from] DomainError),

    /// The durable store failed; never retried
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}
