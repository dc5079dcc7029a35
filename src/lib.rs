//! aoai-relay - OpenAI-compatible streaming relay for Azure OpenAI
//!
//! Accepts OpenAI-style requests, routes them by model name to a configured
//! Azure deployment and streams the deployment's answer back through a
//! buffered, timer-flushed relay.

pub mod config;
pub mod deployment;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod streaming;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

pub use crate::config::Config;
pub use crate::deployment::{Deployment, DeploymentRegistry};
pub use crate::proxy::{ModelAggregator, ProxyEngine};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    /// Model to deployment table, immutable after startup
    pub registry: Arc<DeploymentRegistry>,
    pub start_time: Instant,
    pub engine: ProxyEngine,
    pub aggregator: ModelAggregator,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, registry: DeploymentRegistry) -> Result<Self> {
        let registry = Arc::new(registry);

        // One pooled client for forwarding and discovery
        let http_client = proxy::build_http_client(&config)?;

        let engine = ProxyEngine::new(
            Arc::clone(&registry),
            http_client.clone(),
            config.relay.clone(),
            config.max_request_body_bytes,
        );
        let aggregator = ModelAggregator::new(Arc::clone(&registry), http_client);

        Ok(Self {
            config,
            registry,
            start_time: Instant::now(),
            engine,
            aggregator,
        })
    }
}
