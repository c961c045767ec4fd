//! Crawl orchestration
//!
//! A run wires the pieces together:
//!
//! ```text
//! seeds ─► Submitter ─► TaskExpander ─► WorkQueue ─► workers ─► TaskProcessor
//!              ▲                                        │
//!              └────────────── discoveries ─────────────┘
//! ```
//!
//! The run ends when the pending-work counter drains (every task processed,
//! nothing left in flight) or when it is cancelled.

mod processor;
mod submitter;

pub use processor::{ProcessError, TaskProcessor};
pub use submitter::Submitter;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::filter::{
    Expander, ExpanderError, Expansion, PolicyRegistry, RegistryError, TaskExpander,
};
use crate::observability::Metrics;
use crate::settings::{ScanSettings, SettingsError};
use crate::task::{Task, TaskError};
use crate::workqueue::{AccountingError, QueueAddCount, WorkQueue};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("policy error: {0}")]
    Registry(#[from] RegistryError),

    #[error("expander error: {0}")]
    Expander(#[from] ExpanderError),

    #[error("accounting error: {0}")]
    Accounting(#[from] AccountingError),

    #[error("invalid seed: {0}")]
    Task(#[from] TaskError),

    #[error("processor aborted the run: {0}")]
    Processor(String),

    #[error("worker task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Tasks processed and acknowledged
    pub completed: u64,
    /// Tasks emitted by the expander
    pub emitted: u64,
    /// Distinct URLs handed to workers
    pub unique_urls: u64,
    /// Duplicate URLs dropped by the queue
    pub duplicates: u64,
    /// Tasks skipped because they could not be expanded
    pub expansion_failures: u64,
    /// Tasks whose processing returned a non-fatal error
    pub process_failures: u64,
    /// The run stopped on cancellation instead of draining
    pub cancelled: bool,
}

/// Owns the settings and policies of a crawl
#[derive(Debug)]
pub struct Crawler {
    settings: Arc<ScanSettings>,
    registry: PolicyRegistry,
    cancel: CancellationToken,
}

impl Crawler {
    /// Build a crawler from validated settings
    pub fn new(settings: Arc<ScanSettings>) -> Result<Self> {
        settings.ensure_initialized()?;
        let registry = PolicyRegistry::from_settings(&settings)?;

        Ok(Self {
            settings,
            registry,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the policy registry; its `status` and `robots` entries drive expansion
    pub fn with_registry(mut self, registry: PolicyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Token that cancels every run of this crawler
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Root tasks for the configured base URLs
    pub fn seeds(&self) -> Result<Vec<Task>> {
        self.settings
            .base_urls
            .iter()
            .map(|url| Task::parse(url).map_err(CrawlError::from))
            .collect()
    }

    /// Crawl from `seeds` until the work drains or the run is cancelled
    pub async fn run<P>(&self, seeds: Vec<Task>, processor: Arc<P>) -> Result<CrawlStats>
    where
        P: TaskProcessor + ?Sized + 'static,
    {
        let run_cancel = self.cancel.child_token();
        let metrics = Arc::new(Metrics::new());
        let counter = QueueAddCount::new();

        let policy = self.registry.default_chain()?;
        let mut expander = TaskExpander::new(Arc::new(policy), run_cancel.clone())
            .with_metrics(Arc::clone(&metrics));
        expander.set_add_count(counter.clone());

        let (tx, rx) = mpsc::channel(self.settings.queue_capacity);
        let Expansion { output, handle } = expander.expand(rx)?;

        let queue = Arc::new(
            WorkQueue::new(output, counter.clone(), run_cancel.clone())
                .with_metrics(Arc::clone(&metrics)),
        );
        let submitter = Submitter::new(tx, counter, self.settings.max_depth);

        let accepted = submitter.submit_all(seeds).await?;
        info!(
            seeds = accepted,
            workers = self.settings.workers,
            max_depth = self.settings.max_depth,
            "Starting crawl"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.workers {
            let worker = Worker {
                id: worker_id,
                queue: Arc::clone(&queue),
                submitter: submitter.clone(),
                processor: Arc::clone(&processor),
                timeout: self.settings.timeout,
            };
            workers.spawn(worker.run());
        }
        // Workers hold the only senders now; the expander stops once they exit
        drop(submitter);

        let mut process_failures = 0;
        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.map_err(|e| CrawlError::Join(e.to_string())).and_then(|r| r);
            match outcome {
                Ok(failures) => process_failures += failures,
                Err(e) => {
                    error!(error = %e, "Worker failed, cancelling run");
                    run_cancel.cancel();
                    first_error.get_or_insert(e);
                }
            }
        }

        let expansion = handle
            .await
            .map_err(|e| CrawlError::Join(e.to_string()))?;
        if let Some(e) = first_error {
            return Err(e);
        }
        let expansion = expansion?;
        debug!(?expansion, "Expander stats");

        let snapshot = metrics.snapshot();
        let stats = CrawlStats {
            completed: snapshot.tasks_completed,
            emitted: snapshot.tasks_emitted,
            unique_urls: queue.seen_count() as u64,
            duplicates: snapshot.duplicates_dropped,
            expansion_failures: snapshot.expansion_failures,
            process_failures,
            cancelled: run_cancel.is_cancelled(),
        };
        info!(
            completed = stats.completed,
            unique_urls = stats.unique_urls,
            duplicates = stats.duplicates,
            cancelled = stats.cancelled,
            "Crawl finished"
        );
        Ok(stats)
    }
}

struct Worker<P: ?Sized> {
    id: usize,
    queue: Arc<WorkQueue>,
    submitter: Submitter,
    processor: Arc<P>,
    timeout: Duration,
}

impl<P> Worker<P>
where
    P: TaskProcessor + ?Sized,
{
    /// Returns the number of non-fatal processing failures
    async fn run(self) -> Result<u64> {
        let mut failures = 0;

        while let Some(lease) = self.queue.next().await? {
            let task = lease.task();
            debug!(worker_id = self.id, url = %task.url(), depth = task.depth(), "Processing task");

            let processing = self.processor.process(task);
            let outcome = match tokio::time::timeout(self.timeout, processing).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProcessError::Timeout {
                    url: task.url().to_string(),
                }),
            };

            match outcome {
                Ok(discovered) => {
                    self.submitter.submit_all(discovered).await?;
                }
                Err(ProcessError::Fatal(reason)) => {
                    lease.complete()?;
                    return Err(CrawlError::Processor(reason));
                }
                Err(e) => {
                    warn!(worker_id = self.id, error = %e, "Processing failed");
                    failures += 1;
                }
            }

            // Discoveries are reserved above, so acknowledging cannot drain early
            lease.complete()?;
        }

        debug!(worker_id = self.id, "Worker finished");
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ValidationError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    /// Serves a fixed link graph and records visits
    #[derive(Default)]
    struct SiteProcessor {
        links: HashMap<String, Vec<String>>,
        visited: Mutex<Vec<String>>,
    }

    impl SiteProcessor {
        fn new(links: &[(&str, &[&str])]) -> Self {
            Self {
                links: links
                    .iter()
                    .map(|(page, targets)| {
                        (page.to_string(), targets.iter().map(|t| t.to_string()).collect())
                    })
                    .collect(),
                visited: Mutex::new(Vec::new()),
            }
        }

        fn visited(&self) -> Vec<String> {
            let mut visited = self.visited.lock().unwrap().clone();
            visited.sort();
            visited
        }
    }

    #[async_trait]
    impl TaskProcessor for SiteProcessor {
        async fn process(&self, task: &Task) -> std::result::Result<Vec<Task>, ProcessError> {
            let path = task.path().to_string();
            self.visited.lock().unwrap().push(path.clone());

            let Some(targets) = self.links.get(&path) else {
                return Ok(Vec::new());
            };
            Ok(targets
                .iter()
                .map(|target| {
                    let url = task.url().join(target).unwrap();
                    task.discovered(url, Some(200))
                })
                .collect())
        }
    }

    struct FailingProcessor;

    #[async_trait]
    impl TaskProcessor for FailingProcessor {
        async fn process(&self, _task: &Task) -> std::result::Result<Vec<Task>, ProcessError> {
            Err(ProcessError::Fatal("disk full".to_string()))
        }
    }

    fn settings(extensions: &[&str]) -> Arc<ScanSettings> {
        let mut settings = ScanSettings::new();
        settings.extensions = extensions.iter().map(|e| e.to_string()).collect();
        settings.workers = 3;
        Arc::new(settings.validated().unwrap())
    }

    fn seed(url: &str) -> Vec<Task> {
        vec![Task::new(Url::parse(url).unwrap())]
    }

    #[test]
    fn test_uninitialized_settings_rejected() {
        let result = Crawler::new(Arc::new(ScanSettings::uninitialized()));
        assert!(matches!(
            result,
            Err(CrawlError::Settings(SettingsError::NotInitialized))
        ));
    }

    #[test]
    fn test_edited_settings_rejected() {
        // new() starts out initialized, but its fields stay editable
        let mut settings = ScanSettings::new();
        settings.queue_capacity = 0;

        let result = Crawler::new(Arc::new(settings));
        assert!(matches!(
            result,
            Err(CrawlError::Settings(SettingsError::ValidationError(
                ValidationError::InvalidQueueCapacity
            )))
        ));
    }

    #[tokio::test]
    async fn test_run_visits_expanded_graph() {
        let crawler = Crawler::new(settings(&["bak"])).unwrap();
        let processor = Arc::new(SiteProcessor::new(&[("/", &["/a", "/b"]), ("/a", &["/b"])]));

        let stats = crawler
            .run(seed("https://example.com/"), Arc::clone(&processor))
            .await
            .unwrap();

        assert_eq!(
            processor.visited(),
            vec!["/", "/a", "/a.bak", "/b", "/b.bak"]
        );
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.unique_urls, 5);
        // /b and /b.bak arrive a second time from /a
        assert_eq!(stats.duplicates, 2);
        assert!(!stats.cancelled);
    }

    #[tokio::test]
    async fn test_empty_seed_list_finishes() {
        let crawler = Crawler::new(settings(&[])).unwrap();
        let processor = Arc::new(SiteProcessor::default());

        let stats = crawler.run(Vec::new(), processor).await.unwrap();
        assert_eq!(stats, CrawlStats::default());
    }

    #[tokio::test]
    async fn test_depth_limit_stops_discovery() {
        let mut settings = ScanSettings::new();
        settings.extensions = Vec::new();
        settings.max_depth = 1;
        let crawler = Crawler::new(Arc::new(settings.validated().unwrap())).unwrap();
        let processor = Arc::new(SiteProcessor::new(&[("/", &["/one"]), ("/one", &["/two"])]));

        crawler
            .run(seed("https://example.com/"), Arc::clone(&processor))
            .await
            .unwrap();
        assert_eq!(processor.visited(), vec!["/", "/one"]);
    }

    #[tokio::test]
    async fn test_fatal_processor_error_aborts_run() {
        let crawler = Crawler::new(settings(&[])).unwrap();
        let result = crawler
            .run(seed("https://example.com/"), Arc::new(FailingProcessor))
            .await;
        assert!(matches!(result, Err(CrawlError::Processor(_))));
    }

    #[tokio::test]
    async fn test_cancelled_crawler_stops_immediately() {
        let crawler = Crawler::new(settings(&["bak"])).unwrap();
        crawler.cancel_token().cancel();

        let processor = Arc::new(SiteProcessor::new(&[("/", &["/a"])]));
        let stats = crawler
            .run(seed("https://example.com/"), processor)
            .await
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.completed, 0);
    }

    #[test]
    fn test_seeds_from_base_urls() {
        let mut settings = ScanSettings::new();
        settings.base_urls = vec!["https://example.com/".to_string()];
        let crawler = Crawler::new(Arc::new(settings.validated().unwrap())).unwrap();

        let seeds = crawler.seeds().unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].depth(), 0);
    }
}
