//! HTTP routes for the relay
//!
//! Proxied endpoints live under the configured API base (`/v1` by default);
//! health and metrics endpoints are always at the root.

pub mod health;
pub mod metrics;
pub mod models;
pub mod proxy;

use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::{error::ErrorResponse, AppState};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let base = state.config.api_base.clone();
    let at = |path: &str| format!("{base}{path}");

    // OPTIONS is routed to the same handlers; the engine answers preflights.
    let proxied_routes = Router::new()
        .route(
            &at("/chat/completions"),
            post(proxy::chat_completions).options(proxy::chat_completions),
        )
        .route(
            &at("/completions"),
            post(proxy::completions).options(proxy::completions),
        )
        .route(
            &at("/embeddings"),
            post(proxy::embeddings).options(proxy::embeddings),
        )
        .route(
            &at("/engines/:model/embeddings"),
            post(proxy::engine_embeddings).options(proxy::engine_embeddings),
        )
        .route(&at("/models"), get(models::list_models).options(proxy::preflight))
        .route(
            &at("/models/:model"),
            get(proxy::model_detail).options(proxy::model_detail),
        );

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    Router::new()
        .merge(public_routes)
        .merge(proxied_routes)
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Preflight for any other path, JSON 404 for everything else
async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return proxy::preflight().await;
    }

    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("NOT_FOUND", "No route for this path")),
    )
        .into_response()
}
