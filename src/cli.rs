use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "borer")]
#[command(about = "Content discovery crawler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand and walk the given base URLs without touching the network
    Scan(ScanArgs),
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Base URLs to start from (added to any in the settings file)
    pub urls: Vec<String>,

    /// Settings file (defaults to $BORER_CONFIG or config/borer.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated extensions to try on every path
    #[arg(long)]
    pub extensions: Option<String>,

    /// Comma-separated status codes whose discoveries are expanded
    #[arg(long)]
    pub spider_codes: Option<String>,

    /// robots.txt handling: ignore, obey or seed
    #[arg(long)]
    pub robots: Option<String>,

    /// Comma-separated disallowed path prefixes
    #[arg(long)]
    pub robots_disallow: Option<String>,

    /// Per-task timeout, e.g. 30s or 1m30s
    #[arg(long)]
    pub timeout: Option<String>,

    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Also try case variants of the last path segment
    #[arg(long)]
    pub mangle_case: bool,

    #[arg(long)]
    pub log_level: Option<String>,

    /// Print tasks as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    /// Textual option values in the order they are applied
    pub fn flag_values(&self) -> Vec<(&'static str, &str)> {
        [
            ("extensions", self.extensions.as_deref()),
            ("spider-codes", self.spider_codes.as_deref()),
            ("robots", self.robots.as_deref()),
            ("robots-disallow", self.robots_disallow.as_deref()),
            ("timeout", self.timeout.as_deref()),
        ]
        .into_iter()
        .filter_map(|(flag, value)| value.map(|value| (flag, value)))
        .collect()
    }
}
