//! Model settings: model id, timeout, temperature, and retry policy
//!
//! ## Configuration Resolution
//!
//! Settings are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/config/model.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Environment variables are applied on top by the backend constructors,
//! see [`crate::ai::ModelClient::from_env`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ai::RetryPolicy;
use crate::error::{Error, Result};

/// Embedded default settings (compiled into binary)
const DEFAULT_SETTINGS: &str = include_str!("../../../config/model.toml");

/// Resolved settings for upstream model calls
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Model identifier sent to the provider
    pub model: String,
    /// Per-call timeout
    pub timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            timeout: Duration::from_secs(30),
            temperature: 0.1,
            retry: RetryPolicy::default(),
        }
    }
}

impl ModelSettings {
    /// Load settings, preferring the user override if present
    pub fn load() -> Result<Self> {
        match default_settings_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => parse_settings(DEFAULT_SETTINGS),
        }
    }

    /// Load from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read settings: {}", e)))?;
        parse_settings(&content)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        parse_settings(DEFAULT_SETTINGS)
    }
}

/// Default settings override path
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("model.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawSettings {
    model: Option<RawModel>,
    retry: Option<RawRetry>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    id: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

/// Parse settings from TOML content
fn parse_settings(content: &str) -> Result<ModelSettings> {
    let raw: RawSettings = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid settings TOML: {}", e)))?;

    let mut settings = ModelSettings::default();

    if let Some(model) = raw.model {
        if let Some(id) = model.id {
            settings.model = id;
        }
        if let Some(timeout) = model.timeout_secs {
            settings.timeout = Duration::from_secs(timeout);
        }
        if let Some(temperature) = model.temperature {
            settings.temperature = temperature;
        }
    }

    if let Some(retry) = raw.retry {
        if let Some(max_retries) = retry.max_retries {
            settings.retry.max_retries = max_retries;
        }
        if let Some(base) = retry.base_delay_ms {
            settings.retry.base_delay = Duration::from_millis(base);
        }
        if let Some(max) = retry.max_delay_ms {
            settings.retry.max_delay = Duration::from_millis(max);
        }
    }

    if settings.model.trim().is_empty() {
        return Err(Error::Config("model id must not be empty".into()));
    }
    if settings.timeout.is_zero() {
        return Err(Error::Config("timeout_secs must be positive".into()));
    }

    Ok(settings)
}
