//! Header policy for deployment proxying
//!
//! Decides which credential a request carries upstream and makes sure the
//! client's own `Authorization` header never leaves the relay.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::deployment::Deployment;
use crate::error::{AppError, AppResult};

/// Header carrying the deployment credential
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("api-key");

/// Hop-by-hop headers that must never be forwarded
const HOP_BY_HOP_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Check if a header is a hop-by-hop header that should not be forwarded
pub fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name) || name.as_str() == "keep-alive"
}

/// Extract bearer token from Authorization header
///
/// A value without the `Bearer ` prefix is used as-is.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Pick the credential for an outbound request
///
/// The deployment's own key wins; otherwise the client's bearer token is
/// used. Neither being available fails the request.
pub fn resolve_credential(deployment: &Deployment, inbound: &HeaderMap) -> AppResult<String> {
    if deployment.has_api_key() {
        return Ok(deployment.api_key.clone());
    }
    extract_bearer_token(inbound).ok_or(AppError::MissingCredential)
}

/// Build the outbound header set from the client's headers
///
/// Copies everything except hop-by-hop headers, `Host`, `Content-Length`
/// (recomputed by the client library) and `Authorization`, then sets
/// `api-key` to `credential`.
pub fn build_outbound_headers(inbound: &HeaderMap, credential: &str) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in inbound {
        if is_hop_by_hop_header(name)
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == header::AUTHORIZATION
            || name == API_KEY_HEADER
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    let mut credential = HeaderValue::from_str(credential).map_err(|_| {
        AppError::Conversion("credential contains characters not allowed in a header".to_string())
    })?;
    credential.set_sensitive(true);
    headers.insert(API_KEY_HEADER, credential);

    Ok(headers)
}

/// Filter hop-by-hop headers and `Content-Length` from a deployment response
///
/// Used when converting deployment responses back to client responses; the
/// body is re-streamed, so its length is not known up front.
pub fn filter_response_headers(response_headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();

    for (name, value) in response_headers {
        if !is_hop_by_hop_header(name) && name != header::CONTENT_LENGTH {
            filtered.append(name.clone(), value.clone());
        }
    }

    filtered
}

/// Whether a `Content-Type` names an event stream
pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"))
}

/// Permissive CORS headers returned for preflight probes
pub fn preflight_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS, POST"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers
}
