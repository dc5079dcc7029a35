//! Health check endpoints
//!
//! Provides endpoints for monitoring and container orchestration:
//! - `/health` - Full health report with registry status
//! - `/health/ready` - Readiness probe
//! - `/health/live` - Liveness probe
//!
//! Deployments are never probed from here; a health check must not spend
//! backend quota.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// Health status enum
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Registry check result
#[derive(Debug, Serialize)]
pub struct RegistryCheck {
    pub status: HealthStatus,
    pub deployments: usize,
}

/// Dependency checks collection
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub registry: RegistryCheck,
}

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub checks: HealthChecks,
}

/// Simple health response for liveness/readiness
#[derive(Debug, Serialize)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

fn check_registry(state: &AppState) -> RegistryCheck {
    let deployments = state.registry.len();
    RegistryCheck {
        status: if deployments == 0 {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        },
        deployments,
    }
}

fn status_code(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Full health check endpoint
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let registry = check_registry(&state);
    let status = registry.status.clone();

    let response = HealthResponse {
        status: status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: HealthChecks { registry },
    };

    (status_code(&status), Json(response))
}

/// Readiness probe endpoint
///
/// Ready once at least one deployment is configured.
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SimpleHealthResponse>) {
    let status = check_registry(&state).status;
    (status_code(&status), Json(SimpleHealthResponse { status }))
}

/// Liveness probe endpoint
pub async fn liveness_check() -> (StatusCode, Json<SimpleHealthResponse>) {
    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}
