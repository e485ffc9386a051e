//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API
//! and honors `response_format: {"type": "json_schema"}`:
//! - OpenAI itself
//! - vLLM (http://localhost:8000)
//! - LocalAI (http://localhost:8080)
//! - llama-server / llama.cpp (http://localhost:8080)
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required unless `TALLY_API_BASE` is set)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)
//! - `TALLY_MODEL`: Model name (default from settings)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::ModelSettings;

use super::parsing::parse_json_object;
use super::{env_non_empty, status_error, GenerationRequest, ModelBackend, RetryPolicy};

/// OpenAI-compatible backend
///
/// # Example
///
/// ```rust,ignore
/// // vLLM
/// export TALLY_BACKEND="openai_compatible"
/// export OPENAI_COMPATIBLE_HOST="http://192.168.1.100:8000"
/// export TALLY_MODEL="meta-llama/Llama-3.2-3B-Instruct"
/// ```
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, settings: &ModelSettings) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: None,
            temperature: settings.temperature,
            retry: settings.retry,
        })
    }

    /// Attach an API key, sent as a Bearer token
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create from environment variables
    ///
    /// Required: `TALLY_API_BASE` or `OPENAI_COMPATIBLE_HOST`
    /// Optional: `OPENAI_COMPATIBLE_API_KEY`
    pub fn from_env(settings: &ModelSettings) -> Result<Self> {
        let host = env_non_empty("TALLY_API_BASE")
            .or_else(|| env_non_empty("OPENAI_COMPATIBLE_HOST"))
            .ok_or_else(|| {
                Error::Config(
                    "openai_compatible backend needs OPENAI_COMPATIBLE_HOST or TALLY_API_BASE"
                        .into(),
                )
            })?;

        let mut backend = Self::new(&host, settings)?;
        if let Some(key) = env_non_empty("OPENAI_COMPATIBLE_API_KEY") {
            backend = backend.with_api_key(&key);
        }
        Ok(backend)
    }

    /// One attempt, no retries
    async fn chat_completion(&self, request: &GenerationRequest) -> Result<Value> {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.user.clone(),
        });

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema.name(),
                    "schema": request.schema.json_schema(),
                    "strict": true
                }
            }),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &text));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::MalformedResponse("no choices in chat completion".into()))?;

        debug!(
            schema = request.schema.name(),
            "OpenAI-compatible response: {}", content
        );
        parse_json_object(&content)
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: Value,
    stream: bool,
}

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// Chat completion choice
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

/// Chat response message (content is null on refusals)
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ModelBackend for OpenAICompatibleBackend {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value> {
        self.retry
            .run("openai_compatible.chat_completion", || {
                self.chat_completion(request)
            })
            .await
    }

    async fn health_check(&self) -> bool {
        let mut req = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key);
        }
        if let Ok(resp) = req.send().await {
            if resp.status().is_success() {
                return true;
            }
        }

        // Try /health (common for LocalAI, llama-server)
        if let Ok(resp) = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        false
    }

    fn name(&self) -> &'static str {
        "openai_compatible"
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
