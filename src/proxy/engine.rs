//! Proxy engine
//!
//! Turns one inbound OpenAI-style request into one Azure deployment call and
//! relays the answer. The sequence per request:
//!
//! 1. `OPTIONS` short-circuits with permissive CORS headers
//! 2. the body is read into memory (it is needed for the model lookup, the
//!    outbound request and failure diagnostics)
//! 3. the model comes from the path, else from the body's `"model"` field
//! 4. the model is resolved to a deployment
//! 5. the credential is chosen and the client's `Authorization` dropped
//! 6. the converter rewrites the URL for the API family
//! 7. the request is forwarded, once
//! 8. status and headers are relayed, the body streamed through [`StreamRelay`]
//! 9. event streams get one trailing `\n`
//! 10. non-200 outcomes log the original body
//!
//! Any failure before step 8 produces a single JSON error. After step 8 the
//! headers are committed and a failure can only truncate the stream.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, Instrument};

use crate::{
    deployment::DeploymentRegistry,
    error::{AppError, AppResult},
    routes::metrics::{record_relay, record_request},
    streaming::{client_body, RelayConfig, StreamRelay},
};

use super::{
    converter::{OutboundRequest, RequestConverter},
    headers::{
        build_outbound_headers, filter_response_headers, is_event_stream, preflight_headers,
        resolve_credential,
    },
    logging::RequestContext,
};

/// Appended to event streams once the backend is done
const EVENT_STREAM_TRAILER: &[u8] = b"\n";

/// Relays inbound requests to their deployments
#[derive(Debug, Clone)]
pub struct ProxyEngine {
    registry: Arc<DeploymentRegistry>,
    client: reqwest::Client,
    relay: StreamRelay,
    max_body_bytes: usize,
}

impl ProxyEngine {
    pub fn new(
        registry: Arc<DeploymentRegistry>,
        client: reqwest::Client,
        relay_config: RelayConfig,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            registry,
            client,
            relay: StreamRelay::new(relay_config),
            max_body_bytes,
        }
    }

    /// Handle one proxied request
    ///
    /// `path_model` is the model named in the URL, if the route has one.
    pub async fn handle<C: RequestConverter>(
        &self,
        request: Request,
        path_model: Option<String>,
        converter: &C,
    ) -> AppResult<Response> {
        if request.method() == Method::OPTIONS {
            return Ok(preflight_response());
        }

        let (parts, body) = request.into_parts();
        let mut ctx = RequestContext::new(converter.name(), parts.uri.path());
        let span = ctx.create_span();

        let result = self
            .proxy(&mut ctx, parts, body, path_model, converter)
            .instrument(span)
            .await;

        if let Err(e) = &result {
            ctx.log_rejected(&e.to_string());
            // Only registry-resolved models become metric labels.
            record_request(
                e.status_and_code().1,
                ctx.model.as_deref().unwrap_or("unknown"),
                ctx.elapsed_secs(),
            );
        }

        result
    }

    async fn proxy<C: RequestConverter>(
        &self,
        ctx: &mut RequestContext,
        parts: Parts,
        body: Body,
        path_model: Option<String>,
        converter: &C,
    ) -> AppResult<Response> {
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| AppError::BodyRead(e.to_string()))?;

        let model = extract_model(path_model.as_deref(), &body)?;
        let deployment = self.registry.resolve(&model)?;
        ctx.model = Some(deployment.model_name.clone());
        ctx.deployment = Some(deployment.deployment_name.clone());

        let credential = resolve_credential(deployment, &parts.headers)?;

        let skeleton = OutboundRequest {
            method: parts.method.clone(),
            url: deployment.endpoint.clone(),
            headers: build_outbound_headers(&parts.headers, &credential)?,
            body: body.clone(),
        };
        let outbound = converter
            .convert(skeleton, deployment)
            .map_err(|e| AppError::Conversion(e.to_string()))?;

        ctx.log_proxying(outbound.url.as_str());

        let upstream = self.forward(ctx, outbound).await?;
        Ok(self.relay_response(ctx.clone(), upstream, body))
    }

    /// Send the converted request; no retries
    async fn forward(
        &self,
        ctx: &RequestContext,
        outbound: OutboundRequest,
    ) -> AppResult<reqwest::Response> {
        let OutboundRequest {
            method,
            url,
            headers,
            body,
        } = outbound;

        let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);
        if method != Method::GET && method != Method::HEAD && !body.is_empty() {
            builder = builder.body(chunked_body(body));
        }

        builder.send().await.map_err(|e| {
            error!(
                trace_id = %ctx.trace_id,
                url = %url,
                error = %e,
                "Failed to send request to deployment"
            );
            AppError::Forwarding(e)
        })
    }

    /// Commit status and headers, then stream the body in the background
    fn relay_response(
        &self,
        ctx: RequestContext,
        upstream: reqwest::Response,
        inbound_body: Bytes,
    ) -> Response {
        let status = upstream.status();
        let headers = filter_response_headers(upstream.headers());
        let event_stream = is_event_stream(upstream.headers());
        ctx.log_upstream_response(status.as_u16(), event_stream);

        let (sink, body) = client_body();
        let relay = self.relay.clone();
        let trailer = event_stream.then(|| Bytes::from_static(EVENT_STREAM_TRAILER));
        let span = ctx.create_span();

        tokio::spawn(
            async move {
                let outcome = relay.run(upstream.bytes_stream(), sink, trailer).await;

                ctx.log_relay_finished(status.as_u16(), &outcome);
                record_relay(
                    status,
                    ctx.model.as_deref().unwrap_or("unknown"),
                    &outcome,
                    ctx.elapsed_secs(),
                );

                if status != StatusCode::OK {
                    ctx.log_failed_request_body(status.as_u16(), &inbound_body);
                }
            }
            .instrument(span),
        );

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// CORS preflight answer; never touches the registry or a deployment
pub fn preflight_response() -> Response {
    (StatusCode::OK, preflight_headers()).into_response()
}

#[derive(Deserialize)]
struct ModelProbe {
    #[serde(default)]
    model: Option<Value>,
}

/// Determine the requested model from the path or the JSON body
pub fn extract_model(path_model: Option<&str>, body: &[u8]) -> AppResult<String> {
    if let Some(model) = path_model.filter(|m| !m.is_empty()) {
        return Ok(model.to_string());
    }

    if body.is_empty() {
        return Err(AppError::EmptyBody);
    }

    let probe: ModelProbe = serde_json::from_slice(body)
        .map_err(|e| AppError::ModelResolution(format!("get model error: {e}")))?;

    match probe.model {
        Some(Value::String(model)) if !model.is_empty() => Ok(model),
        Some(Value::String(_)) => Err(AppError::ModelResolution(
            "\"model\" field is empty".to_string(),
        )),
        Some(other) => Err(AppError::ModelResolution(format!(
            "get model name error: expected a string, got {other}"
        ))),
        None => Err(AppError::ModelResolution(
            "request body has no \"model\" field".to_string(),
        )),
    }
}

/// Wrap the materialised body so it goes out with chunked transfer encoding
fn chunked_body(body: Bytes) -> reqwest::Body {
    reqwest::Body::wrap_stream(futures::stream::once(async move {
        Ok::<_, std::io::Error>(body)
    }))
}
