use tokio::sync::mpsc;
use tracing::debug;

use crate::task::Task;
use crate::workqueue::{AccountingError, QueueAddCount};

/// Feeds tasks into the expander input, reserving each one first
#[derive(Debug, Clone)]
pub struct Submitter {
    tx: mpsc::Sender<Task>,
    counter: QueueAddCount,
    max_depth: u32,
}

impl Submitter {
    pub fn new(tx: mpsc::Sender<Task>, counter: QueueAddCount, max_depth: u32) -> Self {
        Self {
            tx,
            counter,
            max_depth,
        }
    }

    /// Submit one task; `Ok(false)` when it was dropped
    ///
    /// Tasks deeper than the depth limit are dropped without touching the
    /// counter. A closed expander input (cancelled run) drops the task and
    /// retires its reservation.
    pub async fn submit(&self, task: Task) -> Result<bool, AccountingError> {
        if task.depth() > self.max_depth {
            debug!(url = %task.url(), depth = task.depth(), "Task beyond depth limit");
            return Ok(false);
        }

        self.counter.begin_expansion();
        if let Err(mpsc::error::SendError(task)) = self.tx.send(task).await {
            debug!(url = %task.url(), "Expander input closed, dropping task");
            self.counter.end_expansion()?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Submit every task, returning how many were accepted
    pub async fn submit_all(
        &self,
        tasks: impl IntoIterator<Item = Task>,
    ) -> Result<usize, AccountingError> {
        let mut accepted = 0;
        for task in tasks {
            if self.submit(task).await? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_reserves_before_send() {
        let counter = QueueAddCount::new();
        let (tx, mut rx) = mpsc::channel(4);
        let submitter = Submitter::new(tx, counter.clone(), 2);

        assert!(submitter.submit(Task::parse("https://example.com/").unwrap()).await.unwrap());
        assert_eq!(counter.expansions(), 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_depth_limit_skips_accounting() {
        let counter = QueueAddCount::new();
        let (tx, _rx) = mpsc::channel(4);
        let submitter = Submitter::new(tx, counter.clone(), 0);

        let root = Task::parse("https://example.com/").unwrap();
        let child = root.discovered(url::Url::parse("https://example.com/a").unwrap(), Some(200));

        assert!(!submitter.submit(child).await.unwrap());
        assert!(counter.is_drained());
    }

    #[tokio::test]
    async fn test_closed_input_retires_reservation() {
        let counter = QueueAddCount::new();
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let submitter = Submitter::new(tx, counter.clone(), 5);

        let accepted = submitter
            .submit_all([
                Task::parse("https://example.com/a").unwrap(),
                Task::parse("https://example.com/b").unwrap(),
            ])
            .await
            .unwrap();
        assert_eq!(accepted, 0);
        assert!(counter.is_drained());
    }
}
