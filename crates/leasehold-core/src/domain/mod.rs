//! Domain entities
//!
//! This module contains the core domain types for leasehold:
//! - Newtypes for validated lock names, owners and TTLs
//! - The `Lock` entity and operation outcomes
//! - Audit events describing lifecycle transitions
//! - Domain-specific error types

pub mod errors;
pub mod event;
pub mod lock;
pub mod newtypes;

// Re-export commonly used types
pub use errors::{DomainError, LockError};
pub use event::{LockAction, LockEvent, NewLockEvent};
pub use lock::{AcquireOutcome, ActiveLock, Lock, LockStatus, RenewOutcome};
pub use newtypes::*;
