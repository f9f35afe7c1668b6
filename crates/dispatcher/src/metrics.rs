//! Output metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single output
#[derive(Debug, Default)]
pub struct OutputMetrics {
    /// Total successful deliveries
    send_count: AtomicU64,
    /// Total failed deliveries (including cancellations)
    failure_count: AtomicU64,
    /// Total deliveries aborted by cancellation
    cancelled_count: AtomicU64,
}

impl OutputMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total send count
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::Relaxed)
    }

    /// Increment send count
    pub fn inc_send_count(&self) {
        self.send_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cancelled_count(&self) -> u64 {
        self.cancelled_count.load(Ordering::Relaxed)
    }

    pub fn inc_cancelled_count(&self) {
        self.cancelled_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            send_count: self.send_count(),
            failure_count: self.failure_count(),
            cancelled_count: self.cancelled_count(),
        }
    }
}

/// Snapshot of output metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub send_count: u64,
    pub failure_count: u64,
    pub cancelled_count: u64,
}
