use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::counter::{QueueAddCount, Result};
use crate::observability::Metrics;
use crate::task::Task;

/// Work queue fed by the expander output
///
/// Workers share one queue and pull [`Lease`]s from it. A URL is handed out
/// at most once per run; later duplicates are acknowledged on arrival.
#[derive(Debug)]
pub struct WorkQueue {
    rx: AsyncMutex<mpsc::UnboundedReceiver<Task>>,
    seen: Mutex<HashSet<String>>,
    counter: QueueAddCount,
    cancel: CancellationToken,
    metrics: Arc<Metrics>,
}

impl WorkQueue {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Task>,
        counter: QueueAddCount,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx: AsyncMutex::new(rx),
            seen: Mutex::new(HashSet::new()),
            counter,
            cancel,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Next unique task, or `None` once the run is drained or cancelled
    pub async fn next(&self) -> Result<Option<Lease>> {
        loop {
            let mut rx = self.rx.lock().await;

            let task = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                task = rx.recv() => match task {
                    Some(task) => task,
                    // Every sender is gone; nothing can be registered any more
                    None => return Ok(None),
                },
                _ = self.counter.wait_drained() => {
                    if self.counter.is_drained() {
                        debug!("Work queue drained");
                        return Ok(None);
                    }
                    continue;
                }
            };
            drop(rx);

            if self.first_sighting(&task) {
                let lease = Lease::new(task, self.counter.clone(), Arc::clone(&self.metrics));
                return Ok(Some(lease));
            }

            debug!(url = %task.url(), "Dropping duplicate task");
            self.metrics.duplicate_dropped();
            self.counter.done(1)?;
        }
    }

    /// Number of distinct URLs handed out so far
    pub fn seen_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn first_sighting(&self, task: &Task) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.url().as_str().to_string())
    }
}

/// A task checked out of the [`WorkQueue`]
///
/// Completing the lease acknowledges the task. A lease dropped without
/// completion (a panicking worker) is acknowledged on drop so the run can
/// still drain.
#[derive(Debug)]
pub struct Lease {
    task: Task,
    counter: QueueAddCount,
    metrics: Arc<Metrics>,
    completed: bool,
}

impl Lease {
    fn new(task: Task, counter: QueueAddCount, metrics: Arc<Metrics>) -> Self {
        Self {
            task,
            counter,
            metrics,
            completed: false,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Acknowledge the task; any discoveries must be submitted before this
    pub fn complete(mut self) -> Result<()> {
        self.completed = true;
        self.acknowledge()
    }

    fn acknowledge(&self) -> Result<()> {
        self.counter.done(1)?;
        self.metrics.task_completed();
        Ok(())
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        warn!(url = %self.task.url(), "Lease dropped without completion");
        if let Err(e) = self.acknowledge() {
            error!(url = %self.task.url(), error = %e, "Failed to acknowledge dropped lease");
        }
    }
}
