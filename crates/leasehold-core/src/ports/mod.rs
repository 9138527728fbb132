//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILockRepository`] - Atomic lock table primitives
//! - [`IAuditRepository`] - Persistent, size-bounded event log
//! - [`IEventSink`] - Non-blocking hand-off of lifecycle events

pub mod audit_repository;
pub mod event_sink;
pub mod lock_repository;

pub use audit_repository::IAuditRepository;
pub use event_sink::{IEventSink, NullEventSink};
pub use lock_repository::{ILockRepository, InsertOutcome, OwnedOutcome};
