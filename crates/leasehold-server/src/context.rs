//! Shared state handed to every request handler and background task

use std::sync::Arc;

use leasehold_core::config::Config;
use leasehold_core::domain::{DomainError, Ttl};
use leasehold_core::ports::{IAuditRepository, IEventSink, ILockRepository};
use leasehold_core::usecases::LockService;

use crate::metrics::{LockMetrics, MeteredEventSink};

/// Request-facing settings derived from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSettings {
    /// TTL applied when a request body omits `ttl`
    pub default_ttl: Ttl,
    /// Maximum number of events returned by `GET /log`
    pub log_page_size: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            default_ttl: Ttl::default(),
            log_page_size: 100,
        }
    }
}

impl ApiSettings {
    pub fn from_config(config: &Config) -> Result<Self, DomainError> {
        Ok(Self {
            default_ttl: Ttl::from_secs(config.server.default_ttl)?,
            log_page_size: config.audit.log_page_size,
        })
    }
}

/// Everything the API surface and the reaper share
///
/// Constructed once at startup and passed around behind an `Arc`.
pub struct ServiceContext {
    service: LockService,
    audit: Arc<dyn IAuditRepository>,
    metrics: Arc<LockMetrics>,
    settings: ApiSettings,
}

impl ServiceContext {
    /// Wires the lock service to its repositories
    ///
    /// `events` is wrapped so that evictions are counted in `metrics`
    /// before reaching the audit queue.
    pub fn new(
        locks: Arc<dyn ILockRepository>,
        audit: Arc<dyn IAuditRepository>,
        events: Arc<dyn IEventSink>,
        metrics: Arc<LockMetrics>,
        settings: ApiSettings,
    ) -> Self {
        let sink = Arc::new(MeteredEventSink::new(events, Arc::clone(&metrics)));
        Self {
            service: LockService::new(locks, sink),
            audit,
            metrics,
            settings,
        }
    }

    pub fn service(&self) -> &LockService {
        &self.service
    }

    /// Read side of the audit trail
    pub fn audit(&self) -> &dyn IAuditRepository {
        self.audit.as_ref()
    }

    pub fn metrics(&self) -> &LockMetrics {
        &self.metrics
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }
}
