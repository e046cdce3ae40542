//! Health check and general HTTP behaviour.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, FixedAnalyzer};

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let app = build_test_app(Arc::new(FixedAnalyzer(Vec::new())));
    let response = get(app.router.clone(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["db_healthy"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(Arc::new(FixedAnalyzer(Vec::new())));
    let response = get(app.router.clone(), "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app(Arc::new(FixedAnalyzer(Vec::new())));
    let response = get(app.router.clone(), "/api/v1/drivers/1/earnings").await;

    assert!(response.headers().contains_key("x-request-id"));
}
