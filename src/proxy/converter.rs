//! Request converters
//!
//! Each API family knows how to turn the generic outbound skeleton into the
//! Azure wire format: a deployment-scoped path under the resource endpoint
//! plus the `api-version` query parameter. Bodies pass through unchanged.

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use reqwest::Url;
use thiserror::Error;

use crate::deployment::Deployment;

/// Request about to be sent to a deployment
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Converter failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("endpoint {0} cannot carry a deployment path")]
    InvalidEndpoint(String),

    #[error("deployment name for model {0} is empty")]
    EmptyDeploymentName(String),
}

/// Rewrites an outbound request for one API family
pub trait RequestConverter: Send + Sync {
    /// Family name for logging and metrics
    fn name(&self) -> &'static str;

    /// Rewrite `request` so it targets `deployment`
    fn convert(
        &self,
        request: OutboundRequest,
        deployment: &Deployment,
    ) -> Result<OutboundRequest, ConversionError>;
}

/// The API families the relay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    ChatCompletions,
    Completions,
    Embeddings,
    /// `GET` of a single deployment's metadata
    ModelDetail,
}

impl ApiFamily {
    /// Path segments appended after `openai/deployments/{deployment}`
    fn operation_segments(&self) -> &'static [&'static str] {
        match self {
            ApiFamily::ChatCompletions => &["chat", "completions"],
            ApiFamily::Completions => &["completions"],
            ApiFamily::Embeddings => &["embeddings"],
            ApiFamily::ModelDetail => &[],
        }
    }
}

impl RequestConverter for ApiFamily {
    fn name(&self) -> &'static str {
        match self {
            ApiFamily::ChatCompletions => "chat_completions",
            ApiFamily::Completions => "completions",
            ApiFamily::Embeddings => "embeddings",
            ApiFamily::ModelDetail => "model_detail",
        }
    }

    fn convert(
        &self,
        mut request: OutboundRequest,
        deployment: &Deployment,
    ) -> Result<OutboundRequest, ConversionError> {
        if deployment.deployment_name.is_empty() {
            return Err(ConversionError::EmptyDeploymentName(
                deployment.model_name.clone(),
            ));
        }

        let mut segments = vec!["openai", "deployments", deployment.deployment_name.as_str()];
        segments.extend_from_slice(self.operation_segments());

        request.url = endpoint_url(&deployment.endpoint, &segments, &deployment.api_version)?;
        Ok(request)
    }
}

/// Build `{endpoint}/{segments...}?api-version={api_version}`
///
/// Segments are percent-encoded; any path already on the endpoint is kept as
/// a prefix and any query on it is replaced.
pub fn endpoint_url(
    endpoint: &Url,
    segments: &[&str],
    api_version: &str,
) -> Result<Url, ConversionError> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| ConversionError::InvalidEndpoint(endpoint.to_string()))?
        .pop_if_empty()
        .extend(segments);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair("api-version", api_version);
    Ok(url)
}
