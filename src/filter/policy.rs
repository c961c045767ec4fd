use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::settings::RobotsMode;
use crate::task::{Task, TaskError};

/// Per-task expansion failures; the task is skipped, the pipeline keeps going
#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("malformed task: {0}")]
    Malformed(#[from] TaskError),
    #[error("{policy} policy failed: {reason}")]
    Policy { policy: &'static str, reason: String },
}

/// One expansion rule: consume a task, produce the tasks it stands for
///
/// Implementations are pure: the same input yields the same output.
pub trait ExpandPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn expand(&self, task: &Task) -> Result<Vec<Task>, ExpansionError>;
}

/// Forwards the task unchanged
#[derive(Debug, Clone, Default)]
pub struct IdentityPolicy;

impl ExpandPolicy for IdentityPolicy {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn expand(&self, task: &Task) -> Result<Vec<Task>, ExpansionError> {
        Ok(vec![task.clone()])
    }
}

/// Emits the task plus one sibling per configured extension
#[derive(Debug, Clone)]
pub struct ExtensionPolicy {
    extensions: Vec<String>,
}

impl ExtensionPolicy {
    /// Extensions may be given with or without the leading dot
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().trim();
                if ext.starts_with('.') {
                    ext.to_string()
                } else {
                    format!(".{}", ext)
                }
            })
            .filter(|ext| ext.len() > 1 && seen.insert(ext.clone()))
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl ExpandPolicy for ExtensionPolicy {
    fn name(&self) -> &'static str {
        "extensions"
    }

    fn expand(&self, task: &Task) -> Result<Vec<Task>, ExpansionError> {
        task.check_expandable()?;

        let mut tasks = Vec::with_capacity(self.extensions.len() + 1);
        tasks.push(task.clone());

        if task.is_directory() {
            return Ok(tasks);
        }

        let path = task.path();
        tasks.extend(
            self.extensions
                .iter()
                .map(|ext| task.with_path(&format!("{}{}", path, ext))),
        );
        Ok(tasks)
    }
}

/// Emits lower, upper and capitalised variants of the last path segment
#[derive(Debug, Clone, Default)]
pub struct CasePolicy;

impl CasePolicy {
    fn variants(segment: &str) -> Vec<String> {
        let candidates = [
            recase(segment, |_, c, out| out.extend(c.to_lowercase())),
            recase(segment, |_, c, out| out.extend(c.to_uppercase())),
            recase(segment, |first, c, out| {
                if first {
                    out.extend(c.to_uppercase())
                } else {
                    out.extend(c.to_lowercase())
                }
            }),
        ];

        let mut variants = Vec::with_capacity(3);
        for candidate in candidates {
            if candidate != segment && !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
        variants
    }
}

/// Case-map `segment` one char at a time, copying `%XX` escapes unchanged
///
/// `map` receives whether the char is the first of the segment. Escapes are
/// case-insensitive, so mapping them would only respell the same URL.
fn recase(segment: &str, map: impl Fn(bool, char, &mut String)) -> String {
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.char_indices();
    while let Some((idx, c)) = chars.next() {
        let escape = c == '%'
            && bytes.get(idx + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(idx + 2).is_some_and(u8::is_ascii_hexdigit);
        if escape {
            out.push_str(&segment[idx..idx + 3]);
            chars.nth(1);
        } else {
            map(idx == 0, c, &mut out);
        }
    }
    out
}

impl ExpandPolicy for CasePolicy {
    fn name(&self) -> &'static str {
        "case"
    }

    fn expand(&self, task: &Task) -> Result<Vec<Task>, ExpansionError> {
        task.check_expandable()?;

        let mut tasks = vec![task.clone()];

        let path = task.path();
        let trimmed = path.trim_end_matches('/');
        let trailing = &path[trimmed.len()..];
        let (dir, segment) = match trimmed.rfind('/') {
            Some(idx) => trimmed.split_at(idx + 1),
            None => ("", trimmed),
        };
        if segment.is_empty() {
            return Ok(tasks);
        }

        tasks.extend(
            Self::variants(segment)
                .into_iter()
                .map(|variant| task.with_path(&format!("{}{}{}", dir, variant, trailing))),
        );
        Ok(tasks)
    }
}

/// Applies `inner` only to tasks discovered on a spiderable response
///
/// Tasks without a source status (seeds, derived candidates) always qualify;
/// the rest are forwarded unexpanded.
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    codes: BTreeSet<u16>,
    inner: Arc<dyn ExpandPolicy>,
}

impl StatusPolicy {
    pub fn new(codes: impl IntoIterator<Item = u16>, inner: Arc<dyn ExpandPolicy>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            inner,
        }
    }
}

impl ExpandPolicy for StatusPolicy {
    fn name(&self) -> &'static str {
        "status"
    }

    fn expand(&self, task: &Task) -> Result<Vec<Task>, ExpansionError> {
        match task.source_status() {
            Some(status) if !self.codes.contains(&status) => Ok(vec![task.clone()]),
            _ => self.inner.expand(task),
        }
    }
}

/// Applies robots.txt exclusions according to the configured mode
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    mode: RobotsMode,
    disallowed: Vec<String>,
}

impl RobotsPolicy {
    pub fn new(mode: RobotsMode, disallowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            mode,
            disallowed: disallowed.into_iter().collect(),
        }
    }

    pub fn is_disallowed(&self, path: &str) -> bool {
        self.disallowed.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl ExpandPolicy for RobotsPolicy {
    fn name(&self) -> &'static str {
        "robots"
    }

    fn expand(&self, task: &Task) -> Result<Vec<Task>, ExpansionError> {
        match self.mode {
            RobotsMode::Ignore => Ok(vec![task.clone()]),
            RobotsMode::Obey => {
                if self.is_disallowed(task.path()) {
                    Ok(Vec::new())
                } else {
                    Ok(vec![task.clone()])
                }
            }
            RobotsMode::Seed => {
                let mut tasks = vec![task.clone()];
                if task.path() == "/" {
                    task.check_expandable()?;
                    tasks.extend(self.disallowed.iter().map(|path| task.with_path(path)));
                }
                Ok(tasks)
            }
        }
    }
}

/// Runs each stage over everything the previous stage produced
///
/// The result is de-duplicated by URL, keeping first occurrences in order.
/// An empty chain behaves like [`IdentityPolicy`].
#[derive(Debug, Clone, Default)]
pub struct PolicyChain {
    stages: Vec<Arc<dyn ExpandPolicy>>,
}

impl PolicyChain {
    pub fn new(stages: Vec<Arc<dyn ExpandPolicy>>) -> Self {
        Self { stages }
    }

    pub fn then(mut self, stage: Arc<dyn ExpandPolicy>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl ExpandPolicy for PolicyChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn expand(&self, task: &Task) -> Result<Vec<Task>, ExpansionError> {
        let mut current = vec![task.clone()];

        for stage in &self.stages {
            let mut next = Vec::with_capacity(current.len());
            for task in &current {
                next.extend(stage.expand(task)?);
            }
            current = next;
        }

        let mut seen = HashSet::with_capacity(current.len());
        current.retain(|task| seen.insert(task.url().as_str().to_string()));
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(url: &str) -> Task {
        Task::parse(url).unwrap()
    }

    fn paths(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(Task::path).collect()
    }

    #[test]
    fn test_identity_policy() {
        let t = task("https://example.com/admin");
        assert_eq!(IdentityPolicy.expand(&t).unwrap(), vec![t]);
    }

    #[test]
    fn test_extension_policy_fanout() {
        let policy = ExtensionPolicy::new([".bak", "old"]);
        let tasks = policy.expand(&task("https://example.com/admin")).unwrap();

        assert_eq!(paths(&tasks), vec!["/admin", "/admin.bak", "/admin.old"]);
        assert!(tasks[1..].iter().all(|t| t.parent().map(|p| p.path()) == Some("/admin")));
    }

    #[test]
    fn test_extension_policy_skips_directories() {
        let policy = ExtensionPolicy::new(["php"]);
        let tasks = policy.expand(&task("https://example.com/admin/")).unwrap();
        assert_eq!(paths(&tasks), vec!["/admin/"]);
    }

    #[test]
    fn test_extension_policy_normalises_and_dedups() {
        let policy = ExtensionPolicy::new(["php", ".php", " .", ""]);
        assert_eq!(policy.extensions(), &[".php".to_string()]);
    }

    #[test]
    fn test_extension_policy_rejects_malformed_task() {
        let policy = ExtensionPolicy::new(["php"]);
        let result = policy.expand(&task("mailto:someone@example.com"));
        assert!(matches!(result, Err(ExpansionError::Malformed(_))));
    }

    #[test]
    fn test_case_policy_variants() {
        let tasks = CasePolicy.expand(&task("https://example.com/dir/Admin")).unwrap();
        assert_eq!(paths(&tasks), vec!["/dir/Admin", "/dir/admin", "/dir/ADMIN"]);
    }

    #[test]
    fn test_case_policy_keeps_trailing_slash() {
        let tasks = CasePolicy.expand(&task("https://example.com/docs/")).unwrap();
        assert_eq!(paths(&tasks), vec!["/docs/", "/DOCS/", "/Docs/"]);
    }

    #[test]
    fn test_case_policy_leaves_escapes_alone() {
        let tasks = CasePolicy.expand(&task("https://example.com/%C3%A9")).unwrap();
        assert_eq!(paths(&tasks), vec!["/%C3%A9"]);

        let tasks = CasePolicy.expand(&task("https://example.com/caf%C3%A9")).unwrap();
        assert_eq!(
            paths(&tasks),
            vec!["/caf%C3%A9", "/CAF%C3%A9", "/Caf%C3%A9"]
        );
    }

    #[test]
    fn test_case_policy_root_unchanged() {
        let tasks = CasePolicy.expand(&task("https://example.com/")).unwrap();
        assert_eq!(paths(&tasks), vec!["/"]);
    }

    #[test]
    fn test_status_policy() {
        let inner: Arc<dyn ExpandPolicy> = Arc::new(ExtensionPolicy::new([".bak"]));
        let policy = StatusPolicy::new([200], inner);
        let root = task("https://example.com/");
        let url = url::Url::parse("https://example.com/page").unwrap();

        let spiderable = root.discovered(url.clone(), Some(200));
        assert_eq!(policy.expand(&spiderable).unwrap().len(), 2);

        let not_spiderable = root.discovered(url, Some(404));
        assert_eq!(paths(&policy.expand(&not_spiderable).unwrap()), vec!["/page"]);

        // Seeds carry no status and are always expanded
        assert_eq!(policy.expand(&task("https://example.com/x")).unwrap().len(), 2);
    }

    #[test]
    fn test_robots_policy_modes() {
        let disallow = vec!["/private".to_string()];
        let blocked = task("https://example.com/private/data");
        let open = task("https://example.com/public");

        let ignore = RobotsPolicy::new(RobotsMode::Ignore, disallow.clone());
        assert_eq!(ignore.expand(&blocked).unwrap().len(), 1);

        let obey = RobotsPolicy::new(RobotsMode::Obey, disallow.clone());
        assert!(obey.expand(&blocked).unwrap().is_empty());
        assert_eq!(obey.expand(&open).unwrap().len(), 1);

        let seed = RobotsPolicy::new(RobotsMode::Seed, disallow);
        let tasks = seed.expand(&task("https://example.com/")).unwrap();
        assert_eq!(paths(&tasks), vec!["/", "/private"]);
        assert_eq!(seed.expand(&open).unwrap().len(), 1);
    }

    #[test]
    fn test_chain_composes_and_dedups() {
        let chain = PolicyChain::default()
            .then(Arc::new(ExtensionPolicy::new([".bak"])))
            .then(Arc::new(CasePolicy));

        let tasks = chain.expand(&task("https://example.com/a")).unwrap();
        assert_eq!(paths(&tasks), vec!["/a", "/A", "/a.bak", "/A.BAK", "/A.bak"]);
        assert_eq!(chain.stage_names(), vec!["extensions", "case"]);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let t = task("https://example.com/a");
        assert_eq!(PolicyChain::default().expand(&t).unwrap(), vec![t]);
    }

    #[test]
    fn test_expansion_is_repeatable() {
        let chain = PolicyChain::new(vec![
            Arc::new(ExtensionPolicy::new([".bak", ".old"])),
            Arc::new(CasePolicy),
        ]);
        let t = task("https://example.com/Admin");
        assert_eq!(chain.expand(&t).unwrap(), chain.expand(&t).unwrap());
    }
}
