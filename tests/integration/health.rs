//! Health endpoint integration tests
//!
//! Tests for the health check endpoints:
//! - GET /health - Full health report
//! - GET /health/ready - Readiness probe
//! - GET /health/live - Liveness probe
//! - GET /metrics - Prometheus scrape endpoint

use axum::http::StatusCode;
use serde_json::Value;

use crate::common::{constants::DEPLOYMENT_KEY, deployment, test_server};

fn configured_server() -> axum_test::TestServer {
    test_server(vec![
        deployment("gpt-4o", "http://127.0.0.1:9/", DEPLOYMENT_KEY),
        deployment("ada", "http://127.0.0.1:9/", DEPLOYMENT_KEY),
    ])
}

#[tokio::test]
async fn test_health_reports_registry() {
    let response = configured_server().get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["checks"]["registry"]["deployments"], 2);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_liveness_always_ok() {
    let response = test_server(Vec::new()).get("/health/live").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_follows_registry() {
    let response = configured_server().get("/health/ready").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = test_server(Vec::new()).get("/health/ready").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], "unhealthy");
}

#[tokio::test]
async fn test_health_not_under_api_base() {
    let response = configured_server().get("/v1/health").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    aoai_relay::routes::metrics::init_metrics();

    let response = configured_server().get("/metrics").await;

    assert_eq!(response.status_code(), StatusCode::OK);
}
