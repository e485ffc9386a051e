//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::time::Duration;
use tally_core::test_utils::{MockGeminiServer, UpstreamBehavior};
use tally_core::{GeminiBackend, MockBackend, ModelSettings, RetryPolicy};
use tower::ServiceExt;

fn app_with_client(client: ModelClient) -> Router {
    let state = AppState::new(
        client,
        CategoryTaxonomy::embedded().unwrap(),
        PromptLibrary::embedded_only(),
    );
    create_router_with_state(state, ServerConfig::default())
}

fn setup_test_app() -> Router {
    app_with_client(ModelClient::mock())
}

fn gemini_app(server: &MockGeminiServer) -> Router {
    let backend = GeminiBackend::new(Some("test-key".into()), &ModelSettings::default())
        .unwrap()
        .with_base_url(&server.url())
        .with_retry(RetryPolicy {
            max_retries: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        });
    app_with_client(ModelClient::Gemini(backend))
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn three_months() -> serde_json::Value {
    serde_json::json!([
        {"year": 2024, "month": 1, "month_name": "January", "total_amount": 15000,
         "categories": {"Food & Drinks": 6000, "Shopping": 9000}},
        {"year": 2024, "month": 2, "month_name": "February", "total_amount": 12000,
         "categories": {"Food & Drinks": 5000, "Travel & Transport": 7000}},
        {"year": 2024, "month": 3, "month_name": "March", "total_amount": 8000,
         "categories": {"Groceries": 8000}}
    ])
}

// ========== Status Tests ==========

#[tokio::test]
async fn test_root_status() {
    let response = setup_test_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "Tally expense analyzer is running.");
}

#[tokio::test]
async fn test_health_reports_backend() {
    let response = setup_test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["backend"], "mock");
    assert_eq!(json["upstream_reachable"], true);
}

#[tokio::test]
async fn test_health_degraded_is_still_200() {
    let response = app_with_client(ModelClient::Mock(MockBackend::unhealthy()))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "degraded");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let response = setup_test_app()
        .oneshot(
            Request::builder()
                .uri("/api/transactions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_wrong_method_is_json_405() {
    let mock = MockBackend::new();
    let app = app_with_client(ModelClient::Mock(mock.clone()));

    for (method, uri) in [
        ("GET", "/analyze"),
        ("GET", "/analyze_insights"),
        ("DELETE", "/health"),
        ("POST", "/"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
        let json = get_body_json(response).await;
        assert_eq!(json["error"], "method_not_allowed");
        assert!(json["message"].as_str().unwrap().contains(uri));
    }
    assert_eq!(mock.call_count(), 0);
}

// ========== Analyze Tests ==========

#[tokio::test]
async fn test_analyze_zomato_debit() {
    let response = setup_test_app()
        .oneshot(post_json(
            "/analyze",
            r#"{"description": "Your A/c XXXXX4321 debited by Rs.425.50 at Zomato Order #ZMTO12345"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(!json["category"].as_str().unwrap().is_empty());
    assert_eq!(json["merchant"], "Zomato");
    assert_eq!(json["transaction"], true);
}

#[tokio::test]
async fn test_analyze_accepts_transaction_alias() {
    let response = setup_test_app()
        .oneshot(post_json(
            "/analyze",
            r#"{"transaction": "Your OTP for payment is 123456"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["merchant"].is_null());
    assert_eq!(json["transaction"], false);
}

#[tokio::test]
async fn test_analyze_empty_description() {
    let mock = MockBackend::new();
    let response = app_with_client(ModelClient::Mock(mock.clone()))
        .oneshot(post_json("/analyze", r#"{"description": "   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "invalid_input");
    assert!(json["message"].is_string());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_analyze_malformed_json() {
    let response = setup_test_app()
        .oneshot(post_json("/analyze", r#"{"description": "#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "invalid_input");
}

#[tokio::test]
async fn test_analyze_wrong_shape() {
    let response = setup_test_app()
        .oneshot(post_json("/analyze", r#"{"text": "Rs.100 debited"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "invalid_input");
}

#[tokio::test]
async fn test_analyze_body_too_large() {
    let description = "x".repeat(MAX_BODY_SIZE + 1);
    let body = serde_json::json!({ "description": description }).to_string();
    let response = setup_test_app()
        .oneshot(post_json("/analyze", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "invalid_input");
}

#[tokio::test]
async fn test_analyze_transport_failure() {
    let response = app_with_client(ModelClient::Mock(MockBackend::failing(
        ErrorKind::UpstreamUnavailable,
    )))
    .oneshot(post_json("/analyze", r#"{"description": "Rs.99 debited at Swiggy"}"#))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "upstream_unavailable");
}

// ========== Insight Tests ==========

#[tokio::test]
async fn test_insights_three_months() {
    let response = setup_test_app()
        .oneshot(post_json("/analyze_insights", &three_months().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(!json["monthly_summary"].as_str().unwrap().is_empty());
    let suggestions = json["suggestions"].as_array().unwrap();
    assert!(!suggestions.is_empty() && suggestions.len() <= 3);
}

#[tokio::test]
async fn test_insights_empty_list() {
    let response = setup_test_app()
        .oneshot(post_json("/analyze_insights", "[]"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "invalid_input");
}

#[tokio::test]
async fn test_insights_too_many_months() {
    let mut months = three_months();
    months.as_array_mut().unwrap().push(serde_json::json!(
        {"year": 2024, "month": 4, "month_name": "April", "total_amount": 7000, "categories": {}}
    ));
    let response = setup_test_app()
        .oneshot(post_json("/analyze_insights", &months.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insights_transport_failure() {
    let response = app_with_client(ModelClient::Mock(MockBackend::failing(
        ErrorKind::UpstreamUnavailable,
    )))
    .oneshot(post_json("/analyze_insights", &three_months().to_string()))
    .await
    .unwrap();

    assert!(!response.status().is_success());
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ========== Upstream Error Mapping Tests ==========

#[tokio::test]
async fn test_upstream_401_maps_to_500() {
    let server = MockGeminiServer::start(UpstreamBehavior::Unauthorized).await;
    let response = gemini_app(&server)
        .oneshot(post_json("/analyze", r#"{"description": "Rs.99 debited at Swiggy"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "upstream_auth_failure");
    // Credentials and upstream wording stay out of the response
    assert!(!json["message"].as_str().unwrap().contains("test-key"));
    assert_eq!(server.hit_count(), 1);
}

#[tokio::test]
async fn test_upstream_non_json_maps_to_502() {
    let server = MockGeminiServer::start(UpstreamBehavior::NonJsonText).await;
    let response = gemini_app(&server)
        .oneshot(post_json("/analyze", r#"{"description": "Rs.99 debited at Swiggy"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "upstream_malformed_response");
}

#[tokio::test]
async fn test_upstream_503_is_retried_then_succeeds() {
    let server = MockGeminiServer::start(UpstreamBehavior::FlakyThenOk { failures: 1 }).await;
    let response = gemini_app(&server)
        .oneshot(post_json("/analyze_insights", &three_months().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.hit_count(), 2);
}

#[tokio::test]
async fn test_upstream_503_exhausts_retries() {
    let server = MockGeminiServer::start(UpstreamBehavior::Unavailable).await;
    let response = gemini_app(&server)
        .oneshot(post_json("/analyze", r#"{"description": "Rs.99 debited at Swiggy"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(server.hit_count(), 2);
}

// ========== Error Rendering Tests ==========

#[tokio::test]
async fn test_panic_renders_internal_error() {
    let response = handle_panic(Box::new("boom"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "internal_error");
}

#[test]
fn test_core_error_mapping() {
    let cases = [
        (
            tally_core::Error::InvalidInput("x".into()),
            StatusCode::BAD_REQUEST,
        ),
        (
            tally_core::Error::UpstreamStatus {
                status: 429,
                message: "quota".into(),
            },
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            tally_core::Error::SchemaMismatch("missing".into()),
            StatusCode::BAD_GATEWAY,
        ),
        (
            tally_core::Error::Config("bad toml".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (err, status) in cases {
        assert_eq!(AppError::from(err).status(), status);
    }
}
