mod cli;

use async_trait::async_trait;
use borer::crawl::{Crawler, ProcessError, TaskProcessor};
use borer::observability;
use borer::settings::ScanSettings;
use borer::task::Task;
use clap::Parser;
use cli::{Cli, Commands, ScanArgs};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => scan(args).await?,
    }

    Ok(())
}

async fn scan(args: ScanArgs) -> Result<(), AnyError> {
    let mut settings = ScanSettings::load_unvalidated(args.config.as_deref())?;

    for (flag, value) in args.flag_values() {
        settings.apply_flag(flag, value)?;
    }
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
    if let Some(max_depth) = args.max_depth {
        settings.max_depth = max_depth;
    }
    if let Some(level) = &args.log_level {
        settings.log_level = level.clone();
    }
    settings.mangle_case |= args.mangle_case;
    settings.base_urls.extend(args.urls.iter().cloned());

    let settings = settings.validated()?;
    observability::init_tracing(&settings.log_level);

    let crawler = Crawler::new(Arc::new(settings))?;
    let seeds = crawler.seeds()?;
    if seeds.is_empty() {
        return Err("no base URLs given".into());
    }

    tokio::spawn(cancel_on_signal(crawler.cancel_token()));

    let processor = Arc::new(ListingProcessor { json: args.json });
    let stats = crawler.run(seeds, processor).await?;

    info!(
        completed = stats.completed,
        emitted = stats.emitted,
        unique_urls = stats.unique_urls,
        duplicates = stats.duplicates,
        expansion_failures = stats.expansion_failures,
        cancelled = stats.cancelled,
        "Scan finished"
    );
    Ok(())
}

/// Prints every task the queue hands out and discovers nothing
struct ListingProcessor {
    json: bool,
}

#[async_trait]
impl TaskProcessor for ListingProcessor {
    async fn process(&self, task: &Task) -> Result<Vec<Task>, ProcessError> {
        if self.json {
            let line = serde_json::to_string(task).map_err(|e| ProcessError::Fatal(e.to_string()))?;
            println!("{}", line);
        } else {
            println!("{}", task);
        }
        Ok(Vec::new())
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => return,
    }
    info!("Shutdown signal received, cancelling scan");
    cancel.cancel();
}
