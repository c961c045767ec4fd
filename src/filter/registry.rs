use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::policy::{
    CasePolicy, ExpandPolicy, ExtensionPolicy, IdentityPolicy, PolicyChain, RobotsPolicy,
    StatusPolicy,
};
use crate::settings::{ScanSettings, SettingsError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("policy not found: {0}")]
    NotFound(String),
    #[error("cannot build policies: {0}")]
    Settings(#[from] SettingsError),
}

/// Registry mapping policy names to policy instances
#[derive(Clone, Debug, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, Arc<dyn ExpandPolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, policy: Arc<dyn ExpandPolicy>) {
        self.policies.insert(name.into(), policy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ExpandPolicy>, RegistryError> {
        self.policies
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn has_policy(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Chain the named policies in order
    pub fn chain(&self, names: &[&str]) -> Result<PolicyChain, RegistryError> {
        names
            .iter()
            .map(|name| self.get(name))
            .collect::<Result<Vec<_>, _>>()
            .map(PolicyChain::new)
    }

    /// Build the built-in policies from validated settings
    ///
    /// Registers `identity`, `extensions`, `case`, `robots`, and `status`,
    /// the latter wrapping extension fan-out (plus case variants when
    /// `mangle_case` is set) behind the spiderable status codes.
    pub fn from_settings(settings: &ScanSettings) -> Result<Self, RegistryError> {
        settings.ensure_initialized()?;

        let mut registry = Self::new();

        let extensions: Arc<dyn ExpandPolicy> =
            Arc::new(ExtensionPolicy::new(&settings.extensions));
        let case: Arc<dyn ExpandPolicy> = Arc::new(CasePolicy);

        let mut mutations = PolicyChain::default().then(extensions.clone());
        if settings.mangle_case {
            mutations = mutations.then(case.clone());
        }

        registry.register("identity", Arc::new(IdentityPolicy));
        registry.register("extensions", extensions);
        registry.register("case", case);
        registry.register(
            "robots",
            Arc::new(RobotsPolicy::new(
                settings.robots_mode,
                settings.robots_disallow.iter().cloned(),
            )),
        );
        registry.register(
            "status",
            Arc::new(StatusPolicy::new(
                settings.spider_code_set(),
                Arc::new(mutations),
            )),
        );

        Ok(registry)
    }

    /// The standard pipeline: status-gated mutations, then robots handling
    pub fn default_chain(&self) -> Result<PolicyChain, RegistryError> {
        self.chain(&["status", "robots"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RobotsMode;
    use crate::task::Task;

    fn settings() -> ScanSettings {
        let mut settings = ScanSettings::new();
        settings.extensions = vec![".bak".to_string(), ".old".to_string()];
        settings
    }

    #[test]
    fn test_from_settings_registers_builtins() {
        let registry = PolicyRegistry::from_settings(&settings()).unwrap();
        for name in ["identity", "extensions", "case", "robots", "status"] {
            assert!(registry.has_policy(name), "missing {}", name);
        }
        assert_eq!(registry.names().count(), 5);
    }

    #[test]
    fn test_get_unknown_policy() {
        let registry = PolicyRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.chain(&["identity"]),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_uninitialized_settings_rejected() {
        let settings = ScanSettings::uninitialized();
        assert!(matches!(
            PolicyRegistry::from_settings(&settings),
            Err(RegistryError::Settings(SettingsError::NotInitialized))
        ));
    }

    #[test]
    fn test_edited_settings_rejected() {
        let mut settings = settings();
        settings.extensions.push("a/b".to_string());
        assert!(matches!(
            PolicyRegistry::from_settings(&settings),
            Err(RegistryError::Settings(SettingsError::ValidationError(_)))
        ));
    }

    #[test]
    fn test_default_chain_expands_admin() {
        let registry = PolicyRegistry::from_settings(&settings()).unwrap();
        let chain = registry.default_chain().unwrap();

        let tasks = chain.expand(&Task::parse("https://example.com/admin").unwrap()).unwrap();
        let paths: Vec<_> = tasks.iter().map(Task::path).collect();
        assert_eq!(paths, vec!["/admin", "/admin.bak", "/admin.old"]);
    }

    #[test]
    fn test_default_chain_obeys_robots_on_variants() {
        let mut settings = settings();
        settings.robots_mode = RobotsMode::Obey;
        settings.robots_disallow = vec!["/admin.old".to_string()];

        let registry = PolicyRegistry::from_settings(&settings).unwrap();
        let chain = registry.default_chain().unwrap();

        let tasks = chain.expand(&Task::parse("https://example.com/admin").unwrap()).unwrap();
        let paths: Vec<_> = tasks.iter().map(Task::path).collect();
        assert_eq!(paths, vec!["/admin", "/admin.bak"]);
    }

    #[test]
    fn test_register_custom_policy() {
        let mut registry = PolicyRegistry::new();
        registry.register("mine", Arc::new(IdentityPolicy));
        let chain = registry.chain(&["mine", "mine"]).unwrap();
        assert_eq!(chain.len(), 2);
    }
}
