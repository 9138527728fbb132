//! Use cases (interactors) for leasehold
//!
//! Use cases are thin coordinators that delegate atomicity to the
//! storage ports and durability of events to the event sink.
//!
//! ## Use Cases
//!
//! - [`LockService`] - Acquire, release, renew, status, listing and
//!   expiry reconciliation

pub mod lock_service;

pub use lock_service::{unix_now, LockService};
