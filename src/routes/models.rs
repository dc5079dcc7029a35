//! Models endpoint
//!
//! Lists the deployments of every configured Azure resource.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    proxy::{headers::extract_bearer_token, AggregatedListing},
    AppState,
};

/// List available models
///
/// Never fails: resources that cannot be queried are left out of the list.
/// The caller's bearer token is used for deployments without their own key.
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<AggregatedListing> {
    let fallback = extract_bearer_token(&headers);
    Json(state.aggregator.list_all_models(fallback).await)
}
