//! Tracing setup and pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber
///
/// `RUST_LOG` wins when set; otherwise `level` (from settings) is used.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed (tests, embedding applications)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Metrics handle for recording pipeline counters
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_expanded: AtomicU64,
    tasks_emitted: AtomicU64,
    expansion_failures: AtomicU64,
    duplicates_dropped: AtomicU64,
    tasks_completed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_expanded(&self, emitted: u64) {
        self.tasks_expanded.fetch_add(1, Ordering::Relaxed);
        self.tasks_emitted.fetch_add(emitted, Ordering::Relaxed);
        tracing::trace!(counter = "tasks_expanded", emitted, "Metric incremented");
    }

    pub fn expansion_failed(&self) {
        self.expansion_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "expansion_failures", "Metric incremented");
    }

    pub fn duplicate_dropped(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "duplicates_dropped", "Metric incremented");
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "tasks_completed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_expanded: self.tasks_expanded.load(Ordering::Relaxed),
            tasks_emitted: self.tasks_emitted.load(Ordering::Relaxed),
            expansion_failures: self.expansion_failures.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_expanded: u64,
    pub tasks_emitted: u64,
    pub expansion_failures: u64,
    pub duplicates_dropped: u64,
    pub tasks_completed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.task_expanded(3);
        metrics.task_expanded(1);
        metrics.expansion_failed();
        metrics.duplicate_dropped();
        metrics.task_completed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_expanded, 2);
        assert_eq!(snapshot.tasks_emitted, 4);
        assert_eq!(snapshot.expansion_failures, 1);
        assert_eq!(snapshot.duplicates_dropped, 1);
        assert_eq!(snapshot.tasks_completed, 1);
    }
}
