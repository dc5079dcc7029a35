//! Request logging utilities for proxied requests
//!
//! Provides structured logging with correlation IDs so every line emitted
//! while relaying one request can be tied back to it.

use std::time::Instant;
use tracing::{debug, info, warn, Span};
use uuid::Uuid;

use crate::streaming::RelayOutcome;

/// Context for tracking a request through the relay
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request (for log correlation)
    pub trace_id: String,
    /// When the request started
    pub start_time: Instant,
    /// API family handling this request
    pub family: &'static str,
    /// Inbound path as the client sent it
    pub path: String,
    /// Model resolved for the request (once known)
    pub model: Option<String>,
    /// Azure deployment serving the request (once known)
    pub deployment: Option<String>,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(family: &'static str, path: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string()[..8].to_string(), // Short ID for readability
            start_time: Instant::now(),
            family,
            path: path.to_string(),
            model: None,
            deployment: None,
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    /// Elapsed time in seconds, for histograms
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Log the inbound → outbound rewrite
    pub fn log_proxying(&self, outbound_url: &str) {
        info!(
            trace_id = %self.trace_id,
            family = %self.family,
            model = ?self.model,
            deployment = ?self.deployment,
            from = %self.path,
            to = %outbound_url,
            "Proxying request"
        );
    }

    /// Log response headers received from the deployment
    pub fn log_upstream_response(&self, status: u16, event_stream: bool) {
        debug!(
            trace_id = %self.trace_id,
            status = %status,
            event_stream = %event_stream,
            elapsed_ms = %self.elapsed_ms(),
            "Response received from deployment"
        );
    }

    /// Log relay completion
    pub fn log_relay_finished(&self, status: u16, outcome: &RelayOutcome) {
        info!(
            trace_id = %self.trace_id,
            family = %self.family,
            model = ?self.model,
            status = %status,
            termination = %outcome.termination.as_str(),
            bytes = outcome.bytes_received,
            flushes = outcome.flushes,
            dropped_ticks = outcome.dropped_ticks,
            elapsed_ms = %self.elapsed_ms(),
            "Relay finished"
        );
    }

    /// Log the original request body of a request that did not succeed
    pub fn log_failed_request_body(&self, status: u16, body: &[u8]) {
        warn!(
            trace_id = %self.trace_id,
            model = ?self.model,
            status = %status,
            body = %String::from_utf8_lossy(body),
            "Encountering error with body"
        );
    }

    /// Log a request rejected before reaching the deployment
    pub fn log_rejected(&self, error: &str) {
        warn!(
            trace_id = %self.trace_id,
            family = %self.family,
            path = %self.path,
            model = ?self.model,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Request rejected"
        );
    }

    /// Create a tracing span for this request
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "relay_request",
            trace_id = %self.trace_id,
            family = %self.family,
            path = %self.path,
        )
    }
}
