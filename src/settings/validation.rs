use super::models::{LOG_LEVELS, ScanSettings};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Extension '{extension}' is invalid: {reason}")]
    InvalidExtension { extension: String, reason: &'static str },

    #[error("Spider code {code} is not an HTTP status code (100-599)")]
    InvalidStatusCode { code: u16 },

    #[error("Base URL '{url}' is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Robots disallow entry '{path}' must be an absolute path")]
    InvalidRobotsPath { path: String },

    #[error("Worker count must be positive")]
    InvalidWorkerCount,

    #[error("Queue capacity must be positive")]
    InvalidQueueCapacity,

    #[error("Timeout must be positive")]
    InvalidTimeout,

    #[error("Unknown log level '{level}', expected one of: {}", LOG_LEVELS.join(", "))]
    InvalidLogLevel { level: String },
}

/// Validate the entire scan configuration
pub fn validate(settings: &ScanSettings) -> Result<(), ValidationError> {
    validate_extensions(settings)?;
    validate_spider_codes(settings)?;
    validate_base_urls(settings)?;
    validate_robots(settings)?;
    validate_limits(settings)?;
    validate_log_level(settings)?;
    Ok(())
}

/// Extensions are appended to a path segment, so they cannot span segments
fn validate_extensions(settings: &ScanSettings) -> Result<(), ValidationError> {
    for extension in &settings.extensions {
        let bare = extension.strip_prefix('.').unwrap_or(extension);
        let reason = if bare.is_empty() {
            Some("empty extension")
        } else if bare.contains('/') {
            Some("contains '/'")
        } else if bare.chars().any(char::is_whitespace) {
            Some("contains whitespace")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(ValidationError::InvalidExtension {
                extension: extension.clone(),
                reason,
            });
        }
    }

    Ok(())
}

fn validate_spider_codes(settings: &ScanSettings) -> Result<(), ValidationError> {
    match settings
        .spider_codes
        .iter()
        .find(|code| !(100..=599).contains(*code))
    {
        Some(&code) => Err(ValidationError::InvalidStatusCode { code }),
        None => Ok(()),
    }
}

fn validate_base_urls(settings: &ScanSettings) -> Result<(), ValidationError> {
    for base in &settings.base_urls {
        let url = Url::parse(base).map_err(|e| ValidationError::InvalidBaseUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ValidationError::InvalidBaseUrl {
                url: base.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
    }

    Ok(())
}

fn validate_robots(settings: &ScanSettings) -> Result<(), ValidationError> {
    if let Some(path) = settings.robots_disallow.iter().find(|p| !p.starts_with('/')) {
        return Err(ValidationError::InvalidRobotsPath { path: path.clone() });
    }

    Ok(())
}

fn validate_limits(settings: &ScanSettings) -> Result<(), ValidationError> {
    if settings.workers == 0 {
        return Err(ValidationError::InvalidWorkerCount);
    }

    if settings.queue_capacity == 0 {
        return Err(ValidationError::InvalidQueueCapacity);
    }

    if settings.timeout.is_zero() {
        return Err(ValidationError::InvalidTimeout);
    }

    Ok(())
}

fn validate_log_level(settings: &ScanSettings) -> Result<(), ValidationError> {
    if !LOG_LEVELS.contains(&settings.log_level.as_str()) {
        return Err(ValidationError::InvalidLogLevel {
            level: settings.log_level.clone(),
        });
    }

    Ok(())
}
