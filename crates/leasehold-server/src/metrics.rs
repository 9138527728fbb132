//! Prometheus metrics for the lock service
//!
//! Counters are registered under the `leasehold` namespace and served in
//! text exposition format on `GET /metrics`.

use std::sync::Arc;

use leasehold_core::domain::{LockAction, NewLockEvent};
use leasehold_core::ports::IEventSink;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Registry holding every lock service metric.
pub struct LockMetrics {
    registry: Registry,
    /// Counter: API operations by (operation, outcome)
    pub lock_operations_total: IntCounterVec,
    /// Counter: leases evicted by reconciliation (lazy or reaper)
    pub locks_expired_total: IntCounter,
    /// Gauge: held locks as of the last listing or reaper pass
    pub active_locks: IntGauge,
}

impl LockMetrics {
    /// Creates a new `LockMetrics` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("leasehold".to_string()), None)?;

        let lock_operations_total = IntCounterVec::new(
            Opts::new("lock_operations_total", "Total lock API operations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(lock_operations_total.clone()))?;

        let locks_expired_total = IntCounter::with_opts(Opts::new(
            "locks_expired_total",
            "Total leases evicted after their TTL elapsed",
        ))?;
        registry.register(Box::new(locks_expired_total.clone()))?;

        let active_locks = IntGauge::with_opts(Opts::new("active_locks", "Currently held locks"))?;
        registry.register(Box::new(active_locks.clone()))?;

        Ok(Self {
            registry,
            lock_operations_total,
            locks_expired_total,
            active_locks,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record the outcome of one API operation.
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        self.lock_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_expired(&self) {
        self.locks_expired_total.inc();
    }

    pub fn set_active_locks(&self, count: u64) {
        self.active_locks
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Event sink decorator that counts evictions before forwarding
///
/// Every `expired` event passes through here regardless of which
/// reconciliation path produced it.
pub struct MeteredEventSink {
    inner: Arc<dyn IEventSink>,
    metrics: Arc<LockMetrics>,
}

impl MeteredEventSink {
    pub fn new(inner: Arc<dyn IEventSink>, metrics: Arc<LockMetrics>) -> Self {
        Self { inner, metrics }
    }
}

impl IEventSink for MeteredEventSink {
    fn record(&self, event: NewLockEvent) {
        if event.action == LockAction::Expired {
            self.metrics.record_expired();
        }
        self.inner.record(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use leasehold_core::domain::{LockName, Owner};

    use super::*;

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<NewLockEvent>>);

    impl IEventSink for CollectingSink {
        fn record(&self, event: NewLockEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn event(action: LockAction) -> NewLockEvent {
        NewLockEvent::new(
            1,
            &LockName::new("db").unwrap(),
            &Owner::new("ci1").unwrap(),
            action,
        )
    }

    #[test]
    fn test_metrics_registry_creation() {
        let metrics = LockMetrics::new().expect("create registry");
        let output = metrics.encode().expect("encode");
        assert!(output.contains("leasehold_locks_expired_total"));
        assert!(output.contains("leasehold_active_locks"));
    }

    #[test]
    fn test_record_operation() {
        let metrics = LockMetrics::new().unwrap();
        metrics.record_operation("acquire", "locked");
        metrics.record_operation("acquire", "locked");
        metrics.record_operation("release", "forbidden");

        assert_eq!(
            metrics
                .lock_operations_total
                .with_label_values(&["acquire", "locked"])
                .get(),
            2
        );
        let output = metrics.encode().unwrap();
        assert!(output.contains("leasehold_lock_operations_total"));
        assert!(output.contains("forbidden"));
    }

    #[test]
    fn test_set_active_locks() {
        let metrics = LockMetrics::new().unwrap();
        metrics.set_active_locks(3);
        assert_eq!(metrics.active_locks.get(), 3);
    }

    #[test]
    fn test_metered_sink_counts_only_expirations() {
        let metrics = Arc::new(LockMetrics::new().unwrap());
        let inner = Arc::new(CollectingSink::default());
        let sink = MeteredEventSink::new(inner.clone(), Arc::clone(&metrics));

        sink.record(event(LockAction::Acquire));
        sink.record(event(LockAction::Expired));
        sink.record(event(LockAction::Expired));

        assert_eq!(metrics.locks_expired_total.get(), 2);
        assert_eq!(inner.0.lock().unwrap().len(), 3);
    }
}
