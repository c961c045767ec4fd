//! Crawl task value
//!
//! A [`Task`] is the unit of work that flows through the expansion pipeline
//! and the work queue. Tasks are never mutated once built; every derivation
//! produces a new value that points back at the URL it came from.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL has no path component: {0}")]
    CannotBeABase(String),

    #[error("Unsupported scheme '{scheme}' in {url}")]
    UnsupportedScheme { scheme: String, url: String },
}

/// Immutable unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    url: Url,
    depth: u32,
    /// URL of the task this one was derived or discovered from
    parent: Option<Url>,
    /// HTTP status of the response that discovered this task
    source_status: Option<u16>,
}

impl Task {
    /// Create a root task (depth 0, no parent)
    pub fn new(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            parent: None,
            source_status: None,
        }
    }

    /// Parse a root task from text
    pub fn parse(text: &str) -> Result<Self, TaskError> {
        let url = Url::parse(text).map_err(|source| TaskError::InvalidUrl {
            url: text.to_string(),
            source,
        })?;
        Ok(Self::new(url))
    }

    /// A task discovered on the page behind `self`, one level deeper
    pub fn discovered(&self, url: Url, status: Option<u16>) -> Self {
        Self {
            url,
            depth: self.depth + 1,
            parent: Some(self.url.clone()),
            source_status: status,
        }
    }

    /// A sibling candidate at the same depth, derived from `self`
    pub fn derive(&self, url: Url) -> Self {
        Self {
            url,
            depth: self.depth,
            parent: Some(self.url.clone()),
            source_status: self.source_status,
        }
    }

    /// Derive a sibling with the path replaced, keeping query and origin
    pub fn with_path(&self, path: &str) -> Self {
        let mut url = self.url.clone();
        url.set_path(path);
        self.derive(url)
    }

    /// Check that the task can be expanded: http(s) and path-bearing
    pub fn check_expandable(&self) -> Result<(), TaskError> {
        if self.url.cannot_be_a_base() {
            return Err(TaskError::CannotBeABase(self.url.to_string()));
        }
        match self.url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(TaskError::UnsupportedScheme {
                scheme: scheme.to_string(),
                url: self.url.to_string(),
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<&Url> {
        self.parent.as_ref()
    }

    pub fn source_status(&self) -> Option<u16> {
        self.source_status
    }

    /// True when the path names a directory rather than a file
    pub fn is_directory(&self) -> bool {
        self.url.path().ends_with('/')
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_task() {
        let task = Task::parse("https://example.com/admin").unwrap();
        assert_eq!(task.depth(), 0);
        assert!(task.parent().is_none());
        assert_eq!(task.path(), "/admin");
    }

    #[test]
    fn test_parse_invalid_url() {
        let result = Task::parse("not a url");
        assert!(matches!(result, Err(TaskError::InvalidUrl { .. })));
    }

    #[test]
    fn test_with_path_keeps_query_and_depth() {
        let task = Task::parse("https://example.com/admin?x=1").unwrap();
        let derived = task.with_path("/admin.bak");

        assert_eq!(derived.url().as_str(), "https://example.com/admin.bak?x=1");
        assert_eq!(derived.depth(), 0);
        assert_eq!(derived.parent(), Some(task.url()));
        // Original is untouched
        assert_eq!(task.path(), "/admin");
    }

    #[test]
    fn test_discovered_increments_depth() {
        let root = Task::parse("https://example.com/").unwrap();
        let child = root.discovered(Url::parse("https://example.com/docs").unwrap(), Some(200));

        assert_eq!(child.depth(), 1);
        assert_eq!(child.source_status(), Some(200));
        assert_eq!(child.parent().map(Url::as_str), Some("https://example.com/"));
    }

    #[test]
    fn test_check_expandable() {
        assert!(Task::parse("https://example.com/a").unwrap().check_expandable().is_ok());
        assert!(matches!(
            Task::parse("mailto:someone@example.com").unwrap().check_expandable(),
            Err(TaskError::CannotBeABase(_))
        ));
        assert!(matches!(
            Task::parse("ftp://example.com/file").unwrap().check_expandable(),
            Err(TaskError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_is_directory() {
        assert!(Task::parse("https://example.com/dir/").unwrap().is_directory());
        assert!(!Task::parse("https://example.com/file").unwrap().is_directory());
    }
}
