//! Leasehold Server - HTTP API, expiry reaper and metrics
//!
//! Provides:
//! - [`ApiServer`]: hyper-based JSON API over the lock service
//! - [`Reaper`]: periodic expiry reconciliation
//! - [`ServiceContext`]: shared state constructed once at startup
//! - [`LockMetrics`]: Prometheus counters served on `/metrics`

pub mod context;
pub mod http;
pub mod metrics;
pub mod reaper;

pub use context::{ApiSettings, ServiceContext};
pub use http::{handle_request, ApiServer};
pub use metrics::{LockMetrics, MeteredEventSink};
pub use reaper::Reaper;
