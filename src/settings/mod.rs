//! Scan settings for borer
//!
//! Settings are loaded once at startup from layered sources:
//! 1. Default values (embedded in the struct)
//! 2. TOML settings file
//! 3. Environment variables (highest priority)
//!
//! Command-line flags are applied on top through the typed option values in
//! [`flags`], which share the validate-then-commit behaviour of the loaders.
//!
//! # Environment Variables
//!
//! Any field can be overridden with `BORER__<FIELD>`:
//! - `BORER__EXTENSIONS=.bak,.old`
//! - `BORER__SPIDER_CODES=200,403`
//! - `BORER__ROBOTS_MODE=obey`
//!
//! # Settings File
//!
//! By default, settings are read from `config/borer.toml`.
//! This can be overridden using the `BORER_CONFIG` environment variable.

pub mod flags;
mod models;
mod robots;
mod sources;
mod validation;

pub use flags::{DurationFlag, FlagError, FlagValue, IntListFlag, RobotsFlag, StringListFlag};
pub use models::{LOG_LEVELS, ScanSettings};
pub use robots::{ROBOTS_MODE_STRINGS, RobotsMode, UnknownRobotsMode};
pub use sources::config_path;
pub use validation::ValidationError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Settings validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Invalid value for --{flag}: {source}")]
    FlagError {
        flag: &'static str,
        #[source]
        source: FlagError,
    },

    #[error("Settings used before initialisation")]
    NotInitialized,

    #[error("Unknown flag --{0}")]
    UnknownFlag(&'static str),
}

impl ScanSettings {
    /// Unvalidated settings from all sources, for callers that still apply flags
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self, SettingsError> {
        Ok(sources::load(path)?)
    }

    /// Validate and mark these settings as ready for consumers
    pub fn validated(mut self) -> Result<Self, SettingsError> {
        validation::validate(&self)?;
        self.mark_initialized();
        Ok(self)
    }

    /// Apply one textual flag value to the matching field
    ///
    /// The field is left untouched when the value does not parse.
    pub fn apply_flag(&mut self, flag: &'static str, value: &str) -> Result<(), SettingsError> {
        let mut robots_index = self.robots_mode.as_index();

        let result = match flag {
            "extensions" => StringListFlag::new(&mut self.extensions).set(value),
            "spider-codes" => IntListFlag::new(&mut self.spider_codes).set(value),
            "robots-disallow" => StringListFlag::new(&mut self.robots_disallow).set(value),
            "timeout" => DurationFlag::new(&mut self.timeout).set(value),
            "robots" => RobotsFlag::new(&mut robots_index).set(value),
            _ => return Err(SettingsError::UnknownFlag(flag)),
        };
        result.map_err(|source| SettingsError::FlagError { flag, source })?;

        if let Some(mode) = RobotsMode::from_index(robots_index) {
            self.robots_mode = mode;
        }
        // Any change invalidates a previous validation pass
        self.clear_initialized();
        Ok(())
    }

    /// Fail unless these settings went through validation and still pass it
    ///
    /// Fields are public, so a validated value can be edited afterwards;
    /// consumers re-check before building anything from it.
    pub fn ensure_initialized(&self) -> Result<(), SettingsError> {
        if !self.is_initialized() {
            return Err(SettingsError::NotInitialized);
        }
        validation::validate(self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("borer.toml");

        fs::write(&config_path, "base_urls = [\"https://example.com/\"]\n").unwrap();

        let settings = ScanSettings::load_unvalidated(Some(&config_path))
            .unwrap()
            .validated()
            .unwrap();
        assert!(settings.is_initialized());
        assert!(settings.ensure_initialized().is_ok());
        assert_eq!(settings.base_urls.len(), 1);
    }

    #[test]
    fn test_validation_catches_bad_extension() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("borer.toml");

        fs::write(&config_path, "extensions = [\"ok\", \"a/b\"]\n").unwrap();

        let result = ScanSettings::load_unvalidated(Some(&config_path)).and_then(ScanSettings::validated);
        assert!(matches!(
            result,
            Err(SettingsError::ValidationError(ValidationError::InvalidExtension { .. }))
        ));
    }

    #[test]
    fn test_apply_flags() {
        let mut settings = ScanSettings::new();
        settings.apply_flag("extensions", ".bak,.old").unwrap();
        settings.apply_flag("spider-codes", "200,403").unwrap();
        settings.apply_flag("robots", "obey").unwrap();
        settings.apply_flag("timeout", "5s").unwrap();

        assert_eq!(settings.extensions, vec![".bak", ".old"]);
        assert_eq!(settings.spider_codes, vec![200, 403]);
        assert_eq!(settings.robots_mode, RobotsMode::Obey);
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert!(!settings.is_initialized());

        let settings = settings.validated().unwrap();
        assert!(settings.is_initialized());
    }

    #[test]
    fn test_apply_flag_failure_keeps_value() {
        let mut settings = ScanSettings::new();
        let before = settings.spider_codes.clone();

        let result = settings.apply_flag("spider-codes", "1,2,xyz");
        assert!(matches!(
            result,
            Err(SettingsError::FlagError { flag: "spider-codes", .. })
        ));
        assert_eq!(settings.spider_codes, before);

        assert!(settings.apply_flag("robots", "wtfmate").is_err());
        assert_eq!(settings.robots_mode, RobotsMode::Ignore);
    }

    #[test]
    fn test_unknown_flag_name() {
        let mut settings = ScanSettings::new();
        assert!(matches!(
            settings.apply_flag("colour", "red"),
            Err(SettingsError::UnknownFlag("colour"))
        ));
        assert!(settings.is_initialized());
    }

    #[test]
    fn test_edited_settings_fail_revalidation() {
        let mut settings = ScanSettings::new();
        assert!(settings.ensure_initialized().is_ok());

        settings.queue_capacity = 0;
        assert!(settings.is_initialized());
        assert!(matches!(
            settings.ensure_initialized(),
            Err(SettingsError::ValidationError(ValidationError::InvalidQueueCapacity))
        ));
    }

    #[test]
    fn test_uninitialized_settings_refused() {
        let settings = ScanSettings::uninitialized();
        assert!(matches!(
            settings.ensure_initialized(),
            Err(SettingsError::NotInitialized)
        ));
    }
}
