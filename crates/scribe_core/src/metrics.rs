//! Counters for monitoring admission and drain activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Lock-free counters shared by every user's queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Total submissions seen by `enqueue`
    pub submitted: AtomicU64,

    /// Submissions that took the direct pass-through path
    pub direct: AtomicU64,

    /// Items placed in a live queue (directly or by a window flush)
    pub queued: AtomicU64,

    /// Collection windows opened
    pub windows_opened: AtomicU64,

    /// Collection windows flushed
    pub windows_flushed: AtomicU64,

    /// Items that were flushed out of windows
    pub windowed_items: AtomicU64,

    /// Queued items the processor completed successfully
    pub processed: AtomicU64,

    /// Queued items whose processing failed or panicked
    pub failed: AtomicU64,

    /// Items cancelled individually or discarded by a clear
    pub removed: AtomicU64,

    /// Calls to `clear_queue` that found something to clear
    pub clears: AtomicU64,

    /// Total time queued items waited before processing started
    pub total_wait_ms: AtomicU64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_direct(&self) {
        self.direct.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_opened(&self) {
        self.windows_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_flushed(&self, batch_size: usize) {
        self.windows_flushed.fetch_add(1, Ordering::Relaxed);
        self.windowed_items
            .fetch_add(batch_size as u64, Ordering::Relaxed);
    }

    pub fn record_dequeued(&self, wait_time: Duration) {
        self.total_wait_ms
            .fetch_add(wait_time.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self, count: usize) {
        self.removed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let windows_flushed = self.windows_flushed.load(Ordering::Relaxed);
        let windowed_items = self.windowed_items.load(Ordering::Relaxed);
        let total_wait_ms = self.total_wait_ms.load(Ordering::Relaxed);

        let drained = processed + failed;
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            direct: self.direct.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            windows_opened: self.windows_opened.load(Ordering::Relaxed),
            windows_flushed,
            processed,
            failed,
            removed: self.removed.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            avg_batch_size: if windows_flushed > 0 {
                windowed_items as f64 / windows_flushed as f64
            } else {
                0.0
            },
            avg_wait_ms: if drained > 0 {
                total_wait_ms as f64 / drained as f64
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time copy of [`QueueMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub direct: u64,
    pub queued: u64,
    pub windows_opened: u64,
    pub windows_flushed: u64,
    pub processed: u64,
    pub failed: u64,
    pub removed: u64,
    pub clears: u64,
    pub avg_batch_size: f64,
    pub avg_wait_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages() {
        let metrics = QueueMetrics::new();
        metrics.record_window_flushed(3);
        metrics.record_window_flushed(1);
        metrics.record_dequeued(Duration::from_millis(30));
        metrics.record_dequeued(Duration::from_millis(10));
        metrics.record_processed();
        metrics.record_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.windows_flushed, 2);
        assert_eq!(snapshot.avg_batch_size, 2.0);
        assert_eq!(snapshot.avg_wait_ms, 20.0);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.failed, 1);
    }

    #[test]
    fn empty_snapshot_has_zero_averages() {
        let snapshot = QueueMetrics::new().snapshot();
        assert_eq!(snapshot.avg_batch_size, 0.0);
        assert_eq!(snapshot.avg_wait_ms, 0.0);
        assert_eq!(snapshot.submitted, 0);
    }
}
