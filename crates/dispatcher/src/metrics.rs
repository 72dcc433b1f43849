//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Total successful sends
    sent_count: AtomicU64,
    /// Total send failures
    failure_count: AtomicU64,
    /// Total fields delivered
    field_count: AtomicU64,
    /// Latency of the last send, microseconds
    last_latency_us: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total send count
    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }

    /// Record a successful send of `fields` fields
    pub fn record_sent(&self, fields: usize) {
        self.sent_count.fetch_add(1, Ordering::Relaxed);
        self.field_count.fetch_add(fields as u64, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total delivered field count
    pub fn field_count(&self) -> u64 {
        self.field_count.load(Ordering::Relaxed)
    }

    /// Set last send latency
    pub fn set_last_latency_us(&self, latency_us: u64) {
        self.last_latency_us.store(latency_us, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent_count: self.sent_count(),
            failure_count: self.failure_count(),
            field_count: self.field_count(),
            last_latency_us: self.last_latency_us.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sent_count: u64,
    pub failure_count: u64,
    pub field_count: u64,
    pub last_latency_us: u64,
}
