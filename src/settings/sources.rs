use super::models::ScanSettings;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "BORER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/borer.toml";
const ENV_PREFIX: &str = "BORER";
const ENV_SEPARATOR: &str = "__";

/// Path of the settings file: `BORER_CONFIG` or the default location
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load settings with priority:
/// 1. Defaults (field-level serde defaults)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(path: Option<&Path>) -> Result<ScanSettings, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    load_from_sources(config_path)
}

/// Load settings from a specific path and the environment
pub fn load_from_sources(config_path: PathBuf) -> Result<ScanSettings, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading settings from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Settings file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // BORER__MAX_DEPTH -> max_depth
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
