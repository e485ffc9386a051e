//! Liveness, health, and fallback handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, Uri},
    Json,
};
use serde::Serialize;

use crate::{AppError, AppState};
use tally_core::ModelBackend;

/// Root status message
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
}

/// Upstream health report
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the upstream answered, "degraded" otherwise
    pub status: &'static str,
    pub backend: &'static str,
    pub model: String,
    pub host: String,
    pub credential_configured: bool,
    pub upstream_reachable: bool,
}

/// GET / - Liveness message
pub async fn root() -> Json<StatusMessage> {
    Json(StatusMessage {
        status: "Tally expense analyzer is running.",
    })
}

/// GET /health - Backend configuration and upstream reachability
///
/// Always 200; a failing upstream shows up as `"status": "degraded"`.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let client = &state.client;
    let upstream_reachable = client.health_check().await;

    Json(HealthResponse {
        status: if upstream_reachable { "ok" } else { "degraded" },
        backend: client.name(),
        model: client.model().to_string(),
        host: client.host().to_string(),
        credential_configured: client.credential_configured(),
        upstream_reachable,
    })
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(&format!("No route for {}", uri.path()))
}

/// Fallback for known routes called with the wrong method
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::method_not_allowed(&format!(
        "{} is not supported on {}",
        method,
        uri.path()
    ))
}
