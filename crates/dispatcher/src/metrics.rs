//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single dispatch run
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Operations pulled into the preload buffer
    preloaded_count: AtomicU64,
    /// Operations enqueued on the handoff queue
    dispatched_count: AtomicU64,
    /// Paced operations enqueued behind schedule
    late_count: AtomicU64,
    /// Throughput snapshots logged so far
    progress_reports: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get preloaded count
    pub fn preloaded_count(&self) -> u64 {
        self.preloaded_count.load(Ordering::Relaxed)
    }

    /// Increment preloaded count
    pub fn inc_preloaded_count(&self) {
        self.preloaded_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get dispatched count
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    /// Increment dispatched count
    pub fn inc_dispatched_count(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get late count
    pub fn late_count(&self) -> u64 {
        self.late_count.load(Ordering::Relaxed)
    }

    /// Increment late count
    pub fn inc_late_count(&self) {
        self.late_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get progress report count
    pub fn progress_reports(&self) -> u64 {
        self.progress_reports.load(Ordering::Relaxed)
    }

    /// Increment progress report count
    pub fn inc_progress_reports(&self) {
        self.progress_reports.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            preloaded_count: self.preloaded_count(),
            dispatched_count: self.dispatched_count(),
            late_count: self.late_count(),
            progress_reports: self.progress_reports(),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub preloaded_count: u64,
    pub dispatched_count: u64,
    pub late_count: u64,
    pub progress_reports: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = DispatchMetrics::new();
        metrics.inc_preloaded_count();
        metrics.inc_preloaded_count();
        metrics.inc_dispatched_count();
        metrics.inc_late_count();
        metrics.inc_progress_reports();
        metrics.set_queue_len(7);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                queue_len: 7,
                preloaded_count: 2,
                dispatched_count: 1,
                late_count: 1,
                progress_reports: 1,
            }
        );
    }
}
