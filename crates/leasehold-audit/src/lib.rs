//! Leasehold Audit - asynchronous lock event trail
//!
//! Provides:
//! - `AuditQueue`: the non-blocking `IEventSink` handed to producers
//! - `AuditWorker`: the single consumer that persists events in queue
//!   order and trims the log to its configured capacity
//! - `channel`: creates a connected queue/worker pair
//!
//! Persisted order equals arrival order at the queue. Producers racing on
//! different tasks may arrive in a different order than their wall-clock
//! timestamps suggest; the trail does not reorder them.

pub mod queue;
pub mod worker;

pub use leasehold_core::config::PersistFailurePolicy;
pub use queue::{channel, AuditQueue};
pub use worker::{AuditWorker, WorkerSettings, WorkerStats};
