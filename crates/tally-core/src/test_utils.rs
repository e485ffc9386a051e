//! Test utilities for tally-core
//!
//! This module provides a mock Gemini server that speaks enough of the
//! `generateContent` protocol to exercise the real HTTP backend: auth
//! failures, transient 5xx, and malformed model output.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// How the mock upstream answers generation calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamBehavior {
    /// Valid JSON for whichever schema was requested
    Ok,
    /// 401 on every call
    Unauthorized,
    /// 503 for the first `failures` calls, then `Ok`
    FlakyThenOk { failures: usize },
    /// 503 on every call
    Unavailable,
    /// 200 with prose instead of JSON in the candidate text
    NonJsonText,
    /// 200 with a JSON object lacking the required fields
    MissingFields,
}

struct MockState {
    behavior: UpstreamBehavior,
    hits: AtomicUsize,
}

/// Mock Gemini server for testing and development
pub struct MockGeminiServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockGeminiServer {
    /// Start the mock server on an available port
    pub async fn start(behavior: UpstreamBehavior) -> Self {
        let state = Arc::new(MockState {
            behavior,
            hits: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route(
                "/v1beta/models/:model",
                get(handle_model).post(handle_generate),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of generateContent calls received
    pub fn hit_count(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Model metadata lookup (health check)
async fn handle_model(headers: HeaderMap) -> Response {
    if !headers.contains_key("x-goog-api-key") {
        return error_response(StatusCode::FORBIDDEN, "Method doesn't allow unregistered callers");
    }
    Json(json!({
        "name": "models/gemini-2.0-flash",
        "supportedGenerationMethods": ["generateContent"]
    }))
    .into_response()
}

/// generateContent endpoint
async fn handle_generate(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst);

    if !headers.contains_key("x-goog-api-key") {
        return error_response(StatusCode::FORBIDDEN, "Method doesn't allow unregistered callers");
    }

    let wants_classification = request["generationConfig"]["responseSchema"]["properties"]
        .get("category")
        .is_some();

    let text = match state.behavior {
        UpstreamBehavior::Unauthorized => {
            return error_response(StatusCode::UNAUTHORIZED, "Request had invalid credentials")
        }
        UpstreamBehavior::Unavailable => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "The model is overloaded")
        }
        UpstreamBehavior::FlakyThenOk { failures } if hit < failures => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "The model is overloaded")
        }
        UpstreamBehavior::NonJsonText => {
            "I'm sorry, I can't help categorize that message.".to_string()
        }
        UpstreamBehavior::MissingFields => r#"{"label": "Food"}"#.to_string(),
        UpstreamBehavior::Ok | UpstreamBehavior::FlakyThenOk { .. } => {
            if wants_classification {
                // Field casing as older prompt revisions produced it
                r#"{"category": "Food & Drinks", "Merchant": "Zomato", "Transaction": "True"}"#
                    .to_string()
            } else {
                json!({
                    "monthly_summary": "Spending fell steadily from 15000 to 8000, a 46.7% drop.",
                    "suggestions": ["Keep dining spend at the March level."]
                })
                .to_string()
            }
        }
    };

    Json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {"code": status.as_u16(), "message": message, "status": "ERROR"}
        })),
    )
        .into_response()
}
