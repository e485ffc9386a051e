//! Gemini backend implementation
//!
//! Calls the Google Generative Language API (`generateContent`) in JSON mode:
//! the request carries `responseMimeType: application/json` and a
//! `responseSchema`, so the first candidate's text is a JSON document.
//!
//! # Configuration
//!
//! Environment variables:
//! - `GEMINI_API_KEY`: API key, sent in the `x-goog-api-key` header
//! - `TALLY_API_BASE`: Base URL override (default: https://generativelanguage.googleapis.com)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::ModelSettings;

use super::parsing::parse_json_object;
use super::{env_non_empty, status_error, GenerationRequest, ModelBackend, RetryPolicy};

/// Public Generative Language endpoint
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";

/// Gemini backend
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    retry: RetryPolicy,
}

impl GeminiBackend {
    /// Create a backend against the public endpoint
    ///
    /// A `None` key is accepted; every generation call then fails with
    /// [`Error::UpstreamAuth`] without contacting the API.
    pub fn new(api_key: Option<String>, settings: &ModelSettings) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: DEFAULT_GEMINI_BASE.to_string(),
            model: settings.model.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            temperature: settings.temperature,
            retry: settings.retry,
        })
    }

    /// Point the backend at a different host (proxies, mock servers)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create from environment variables
    ///
    /// Optional: `GEMINI_API_KEY`, `TALLY_API_BASE`
    pub fn from_env(settings: &ModelSettings) -> Result<Self> {
        let mut backend = Self::new(env_non_empty("GEMINI_API_KEY"), settings)?;
        if let Some(base) = env_non_empty("TALLY_API_BASE") {
            backend = backend.with_base_url(&base);
        }
        Ok(backend)
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// One attempt, no retries
    async fn generate_once(&self, request: &GenerationRequest) -> Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::UpstreamAuth("GEMINI_API_KEY is not set".into()))?;

        let body = GenerateContentRequest {
            system_instruction: (!request.system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: request.system.clone(),
                }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.user.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: request.schema.gemini_schema(),
                temperature: self.temperature,
            },
        };

        let response = self
            .http_client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.into_text()?;
        debug!(schema = request.schema.name(), "Gemini response: {}", text);

        parse_json_object(&text)
    }
}

/// Gemini reports a bad key as 400 INVALID_ARGUMENT rather than 401
fn classify_failure(status: u16, body: &str) -> Error {
    if status == 400 && (body.contains("API key not valid") || body.contains("API_KEY_INVALID")) {
        return Error::UpstreamAuth("API key not valid".into());
    }
    status_error(status, body)
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value> {
        self.retry
            .run("gemini.generate_content", || self.generate_once(request))
            .await
    }

    async fn health_check(&self) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            return false;
        };

        // Model metadata lookup is cheap and validates both key and model id
        match self
            .http_client
            .get(format!("{}/v1beta/models/{}", self.base_url, self.model))
            .header("x-goog-api-key", api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }

    fn credential_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
    temperature: f32,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(Error::MalformedResponse(format!(
                "prompt blocked by provider: {}",
                reason
            )));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse("no candidates in response".into()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::MalformedResponse(format!(
                "empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}
