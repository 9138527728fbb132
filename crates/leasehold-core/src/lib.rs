//! Leasehold Core - Domain logic for named, TTL-bounded advisory locks
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Lock`, `LockEvent`, `LockAction` and validated newtypes
//! - **Use cases** - `LockService`, the lock lifecycle engine (acquire, release,
//!   renew, status, listing, expiry reconciliation)
//! - **Port definitions** - Traits for adapters: `ILockRepository`,
//!   `IAuditRepository`, `IEventSink`
//! - **Configuration** - Typed YAML configuration with validation
//! - **Wire types** - JSON request/response bodies of the HTTP API
//!
//! # Architecture
//!
//! The domain module contains pure types with no I/O. Ports define the
//! storage and audit boundaries; the SQLite adapter and the audit worker
//! live in their own crates. Mutual exclusion is delegated entirely to the
//! storage port's atomic conditional insert, so the use case holds no
//! in-process locks of its own.

pub mod api;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
