//! Proxied OpenAI-compatible endpoints
//!
//! Each handler only picks the API family and the path model; the engine
//! does the rest.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    response::Response,
};

use crate::{
    error::AppResult,
    proxy::{engine::preflight_response, ApiFamily},
    AppState,
};

/// `POST /chat/completions`
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> AppResult<Response> {
    state
        .engine
        .handle(request, None, &ApiFamily::ChatCompletions)
        .await
}

/// `POST /completions`
pub async fn completions(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> AppResult<Response> {
    state
        .engine
        .handle(request, None, &ApiFamily::Completions)
        .await
}

/// `POST /embeddings`
pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> AppResult<Response> {
    state
        .engine
        .handle(request, None, &ApiFamily::Embeddings)
        .await
}

/// `POST /engines/:model/embeddings`, the legacy form naming the model in the path
pub async fn engine_embeddings(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    request: Request,
) -> AppResult<Response> {
    state
        .engine
        .handle(request, Some(model), &ApiFamily::Embeddings)
        .await
}

/// `GET /models/:model`
pub async fn model_detail(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    request: Request,
) -> AppResult<Response> {
    state
        .engine
        .handle(request, Some(model), &ApiFamily::ModelDetail)
        .await
}

/// `OPTIONS` on paths without a proxied route
pub async fn preflight() -> Response {
    preflight_response()
}
