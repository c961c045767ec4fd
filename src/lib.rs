pub mod crawl;
pub mod filter;
pub mod humanize;
pub mod observability;
pub mod settings;
pub mod task;
pub mod workqueue;
