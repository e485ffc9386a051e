//! Model invocation adapter
//!
//! Backend-agnostic interface for structured generation against a hosted
//! model API. Callers hand over a system instruction, a user turn, and the
//! output schema they expect; the backend returns the decoded JSON object or
//! a typed error.
//!
//! # Architecture
//!
//! - `ModelBackend` trait: defines the interface for all backends
//! - `ModelClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `TALLY_BACKEND`: Backend to use (gemini, openai_compatible, mock). Default: gemini
//! - `TALLY_MODEL`: Model id, overrides the settings file
//! - `TALLY_API_BASE`: Upstream base URL, overrides the backend default
//! - `GEMINI_API_KEY`: Credential for the gemini backend
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod gemini;
mod mock;
mod openai_compatible;
pub mod parsing;
pub mod retry;
pub mod schema;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use retry::RetryPolicy;
pub use schema::OutputSchema;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::settings::ModelSettings;

/// One structured generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// System instruction (rules, taxonomy, output contract)
    pub system: String,
    /// User turn carrying the request data
    pub user: String,
    /// Shape the model is asked to produce
    pub schema: OutputSchema,
}

/// Trait defining the interface for all model backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run one generation in JSON mode and return the decoded object
    ///
    /// Transient failures are retried according to the backend's
    /// [`RetryPolicy`] before an error is returned.
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value>;

    /// Check if the upstream API is reachable with the configured credential
    async fn health_check(&self) -> bool;

    /// Short backend name (for health output and logs)
    fn name(&self) -> &'static str;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;

    /// Whether a credential was supplied at construction
    fn credential_configured(&self) -> bool;
}

/// Concrete model client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ModelClient {
    /// Google Generative Language API (default)
    Gemini(GeminiBackend),
    /// OpenAI-compatible chat completions server
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ModelClient {
    /// Create a model client from environment variables and the settings file
    ///
    /// Checks `TALLY_BACKEND` to determine which backend to use:
    /// - `gemini` (default): Uses GEMINI_API_KEY. A missing key is not an
    ///   error here; every call then fails with an auth error.
    /// - `openai_compatible`: Uses OPENAI_COMPATIBLE_HOST and OPENAI_COMPATIBLE_API_KEY
    /// - `mock`: Creates a mock backend
    pub fn from_env() -> Result<Self> {
        let settings = ModelSettings::load()?;
        Self::from_env_with_settings(settings)
    }

    /// Same as [`ModelClient::from_env`] with explicit base settings
    pub fn from_env_with_settings(mut settings: ModelSettings) -> Result<Self> {
        if let Some(model) = env_non_empty("TALLY_MODEL") {
            settings.model = model;
        }
        let backend = env_non_empty("TALLY_BACKEND").unwrap_or_else(|| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" | "google" => GeminiBackend::from_env(&settings).map(ModelClient::Gemini),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env(&settings).map(ModelClient::OpenAICompatible)
            }
            "mock" => Ok(ModelClient::Mock(MockBackend::new())),
            _ => Err(Error::Config(format!(
                "Unknown TALLY_BACKEND '{}' (expected gemini, openai_compatible, or mock)",
                backend
            ))),
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ModelClient::Mock(MockBackend::new())
    }
}

/// Read an environment variable, treating blank values as unset
pub(crate) fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map a non-2xx upstream response onto the error taxonomy
///
/// 401 and 403 are credential problems; everything else keeps its status so
/// [`Error::is_transient`] can decide about retries. The message is taken
/// from the provider's `{"error": {"message": ...}}` envelope when present.
pub(crate) fn status_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        401 | 403 => Error::UpstreamAuth(message),
        _ => Error::UpstreamStatus { status, message },
    }
}

// Implement ModelBackend for ModelClient by delegating to the inner backend
#[async_trait]
impl ModelBackend for ModelClient {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value> {
        match self {
            ModelClient::Gemini(b) => b.generate_json(request).await,
            ModelClient::OpenAICompatible(b) => b.generate_json(request).await,
            ModelClient::Mock(b) => b.generate_json(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ModelClient::Gemini(b) => b.health_check().await,
            ModelClient::OpenAICompatible(b) => b.health_check().await,
            ModelClient::Mock(b) => b.health_check().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ModelClient::Gemini(b) => b.name(),
            ModelClient::OpenAICompatible(b) => b.name(),
            ModelClient::Mock(b) => b.name(),
        }
    }

    fn model(&self) -> &str {
        match self {
            ModelClient::Gemini(b) => b.model(),
            ModelClient::OpenAICompatible(b) => b.model(),
            ModelClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ModelClient::Gemini(b) => b.host(),
            ModelClient::OpenAICompatible(b) => b.host(),
            ModelClient::Mock(b) => b.host(),
        }
    }

    fn credential_configured(&self) -> bool {
        match self {
            ModelClient::Gemini(b) => b.credential_configured(),
            ModelClient::OpenAICompatible(b) => b.credential_configured(),
            ModelClient::Mock(b) => b.credential_configured(),
        }
    }
}
