use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::ExpandPolicy;
use crate::observability::Metrics;
use crate::task::Task;
use crate::workqueue::{AccountingError, QueueAddCount};

#[derive(Debug, Error)]
pub enum ExpanderError {
    #[error("expand called before set_add_count bound a pending-work counter")]
    AddCountUnset,
    #[error("accounting invariant broken: {0}")]
    Accounting(#[from] AccountingError),
}

/// Totals for one expansion stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    /// Input tasks taken off the stream
    pub received: u64,
    /// Tasks delivered downstream
    pub emitted: u64,
    /// Inputs skipped because they could not be expanded
    pub failed: u64,
    /// Inputs or outputs discarded on cancellation or a closed downstream
    pub dropped: u64,
}

/// A running expansion stage
#[derive(Debug)]
pub struct Expansion {
    /// Expanded tasks, each registered with the counter before it was sent
    pub output: mpsc::UnboundedReceiver<Task>,
    pub handle: JoinHandle<Result<ExpansionStats, ExpanderError>>,
}

/// Stream stage turning discovered tasks into expanded tasks
///
/// Every task arriving on the input must have been reserved with
/// [`QueueAddCount::begin_expansion`]; the expander registers each output
/// with [`QueueAddCount::add`] before sending it, then retires the reservation.
pub trait Expander: Send + Sync {
    /// Bind the pending-work counter; required before [`Expander::expand`]
    fn set_add_count(&mut self, counter: QueueAddCount);

    /// Start expanding `input` on a background task
    fn expand(&self, input: mpsc::Receiver<Task>) -> Result<Expansion, ExpanderError>;
}

/// Expander driven by an [`ExpandPolicy`]
#[derive(Debug, Clone)]
pub struct TaskExpander {
    policy: Arc<dyn ExpandPolicy>,
    counter: Option<QueueAddCount>,
    cancel: CancellationToken,
    metrics: Arc<Metrics>,
}

impl TaskExpander {
    pub fn new(policy: Arc<dyn ExpandPolicy>, cancel: CancellationToken) -> Self {
        Self {
            policy,
            counter: None,
            cancel,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl Expander for TaskExpander {
    fn set_add_count(&mut self, counter: QueueAddCount) {
        self.counter = Some(counter);
    }

    fn expand(&self, input: mpsc::Receiver<Task>) -> Result<Expansion, ExpanderError> {
        let counter = self.counter.clone().ok_or(ExpanderError::AddCountUnset)?;

        // Unbounded: workers feed the input, a bounded output would close the cycle
        let (tx, output) = mpsc::unbounded_channel();

        let stage = ExpandStage {
            policy: Arc::clone(&self.policy),
            counter,
            cancel: self.cancel.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        let handle = tokio::spawn(stage.run(input, tx));

        Ok(Expansion { output, handle })
    }
}

struct ExpandStage {
    policy: Arc<dyn ExpandPolicy>,
    counter: QueueAddCount,
    cancel: CancellationToken,
    metrics: Arc<Metrics>,
}

impl ExpandStage {
    async fn run(
        self,
        mut input: mpsc::Receiver<Task>,
        output: mpsc::UnboundedSender<Task>,
    ) -> Result<ExpansionStats, ExpanderError> {
        let mut stats = ExpansionStats::default();
        debug!(policy = self.policy.name(), "Expander started");

        loop {
            let task = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Expander cancelled");
                    break;
                }
                task = input.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };
            stats.received += 1;

            let closed = self.expand_one(&task, &output, &mut stats)?;
            if closed {
                warn!("Expander output closed, stopping");
                break;
            }
        }

        // Retire reservations of inputs that will never be expanded. After
        // close, recv still yields tasks sent through outstanding permits.
        input.close();
        while let Some(task) = input.recv().await {
            debug!(url = %task.url(), "Dropping unexpanded task");
            stats.dropped += 1;
            self.counter.end_expansion()?;
        }

        info!(
            received = stats.received,
            emitted = stats.emitted,
            failed = stats.failed,
            dropped = stats.dropped,
            "Expander finished"
        );
        Ok(stats)
    }

    /// Expand and forward one task; returns true once downstream is gone
    fn expand_one(
        &self,
        task: &Task,
        output: &mpsc::UnboundedSender<Task>,
        stats: &mut ExpansionStats,
    ) -> Result<bool, ExpanderError> {
        let derived = match self.policy.expand(task) {
            Ok(derived) => derived,
            Err(e) => {
                warn!(url = %task.url(), error = %e, "Skipping task that cannot be expanded");
                stats.failed += 1;
                self.metrics.expansion_failed();
                self.counter.end_expansion()?;
                return Ok(false);
            }
        };

        let total = derived.len() as u64;
        if total > 0 {
            self.counter.add(total)?;
        }

        let mut delivered = 0;
        for expanded in derived {
            if output.send(expanded).is_err() {
                break;
            }
            delivered += 1;
        }

        let undelivered = total - delivered;
        if undelivered > 0 {
            self.counter.done(undelivered)?;
            stats.dropped += undelivered;
        }
        self.counter.end_expansion()?;

        stats.emitted += delivered;
        self.metrics.task_expanded(delivered);
        debug!(url = %task.url(), emitted = delivered, "Task expanded");

        Ok(undelivered > 0)
    }
}
