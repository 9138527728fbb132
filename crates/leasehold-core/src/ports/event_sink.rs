//! Event sink port
//!
//! Producers hand lifecycle events to the sink without waiting for
//! durability. The implementation decides when (and whether) an event
//! reaches the audit store.

use crate::domain::NewLockEvent;

/// Non-blocking destination for lock events
pub trait IEventSink: Send + Sync {
    /// Enqueues an event; must not block on I/O
    fn record(&self, event: NewLockEvent);
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl IEventSink for NullEventSink {
    fn record(&self, _event: NewLockEvent) {}
}
