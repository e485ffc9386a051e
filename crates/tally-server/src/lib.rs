//! Tally Web Server
//!
//! Axum-based REST API for the Tally expense service.
//!
//! - `POST /analyze` classifies one transaction message
//! - `POST /analyze_insights` summarizes one to three months of spending
//! - `GET /` and `GET /health` report liveness and upstream status
//!
//! Every failure is rendered as `{"error": "<code>", "message": "..."}` with
//! upstream details logged, not returned.

use std::any::Any;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use tally_core::{
    CategoryTaxonomy, ErrorKind, InsightSummarizer, ModelBackend, ModelClient, PromptLibrary,
    TransactionClassifier,
};

mod handlers;

/// Maximum request body size (1 MiB)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub client: ModelClient,
    pub classifier: TransactionClassifier,
    pub summarizer: InsightSummarizer,
}

impl AppState {
    /// Wire the classifier and summarizer to one client and prompt library
    pub fn new(client: ModelClient, taxonomy: CategoryTaxonomy, prompts: PromptLibrary) -> Self {
        let prompts = Arc::new(RwLock::new(prompts));
        Self {
            classifier: TransactionClassifier::new(client.clone(), taxonomy, prompts.clone()),
            summarizer: InsightSummarizer::new(client.clone(), prompts),
            client,
        }
    }

    /// Build state from environment variables and override files
    pub fn from_env() -> anyhow::Result<Self> {
        let client = ModelClient::from_env()?;
        let taxonomy = CategoryTaxonomy::load()?;
        info!(
            "Model backend configured: {} at {} (model: {})",
            client.name(),
            client.host(),
            client.model()
        );
        info!(
            "Category taxonomy v{} ({} labels)",
            taxonomy.version,
            taxonomy.categories.len()
        );
        if !client.credential_configured() {
            warn!("⚠️  No model API credential configured - analysis requests will fail");
        }
        Ok(Self::new(client, taxonomy, PromptLibrary::new()))
    }
}

/// Create the application router from environment configuration
pub fn create_router(config: ServerConfig) -> anyhow::Result<Router> {
    Ok(create_router_with_state(AppState::from_env()?, config))
}

/// Create the application router around prepared state (for testing)
pub fn create_router_with_state(state: AppState, config: ServerConfig) -> Router {
    let state = Arc::new(state);

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/", get(handlers::root).fallback(handlers::method_not_allowed))
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .route(
            "/analyze",
            post(handlers::analyze).fallback(handlers::method_not_allowed),
        )
        .route(
            "/analyze_insights",
            post(handlers::analyze_insights).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Start the server
pub async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(host, port, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_env()?;

    // Check upstream connection
    check_ai_connection(&state.client).await;

    let app = create_router_with_state(state, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log model backend connection status
async fn check_ai_connection(client: &ModelClient) {
    if client.health_check().await {
        info!(
            "✅ Model backend connected: {} (model: {})",
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "⚠️  Model backend configured but not responding: {} (model: {})",
            client.host(),
            client.model()
        );
    }
}

/// Render a handler panic as a JSON internal error
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = detail, "Handler panicked");
    AppError::internal("An internal error occurred").into_response()
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn method_not_allowed(msg: &str) -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            code: "method_not_allowed",
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: ErrorKind::Internal.as_str(),
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(code = self.code, error = %err, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.code,
            "message": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<tally_core::Error> for AppError {
    fn from(err: tally_core::Error) -> Self {
        let kind = err.kind();
        let (status, message) = match kind {
            ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, err.to_string()),
            ErrorKind::UpstreamUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The model API is unavailable, try again later".to_string(),
            ),
            ErrorKind::UpstreamAuthFailure => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The service could not authenticate with the model API".to_string(),
            ),
            ErrorKind::UpstreamMalformedResponse => (
                StatusCode::BAD_GATEWAY,
                "The model returned a response that could not be used".to_string(),
            ),
            ErrorKind::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        };

        Self {
            status,
            code: kind.as_str(),
            message,
            // Only upstream and internal failures are logged
            internal: (kind != ErrorKind::InvalidInput).then(|| anyhow::Error::new(err)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            code: ErrorKind::InvalidInput.as_str(),
            message: rejection.body_text(),
            internal: None,
        }
    }
}

/// JSON body extractor whose rejections use the API error contract
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests;
