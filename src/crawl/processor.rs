use async_trait::async_trait;
use thiserror::Error;

use crate::task::Task;

/// Processor errors
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("processing {url} timed out")]
    Timeout { url: String },
    /// Aborts the whole run
    #[error("fatal processor error: {0}")]
    Fatal(String),
}

/// Fetch collaborator: visits one task and reports what it discovered
///
/// Discovered tasks should be built with [`Task::discovered`] so they carry
/// the response status and the next depth. The crawler feeds them back
/// through the expander.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: &Task) -> Result<Vec<Task>, ProcessError>;
}
