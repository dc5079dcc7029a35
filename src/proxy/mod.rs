//! Proxy module
//!
//! Handles request conversion and forwarding to Azure OpenAI deployments.

pub mod aggregator;
pub mod client;
pub mod converter;
pub mod engine;
pub mod headers;
pub mod logging;

pub use aggregator::{AggregatedListing, ModelAggregator};
pub use client::build_http_client;
pub use converter::{ApiFamily, OutboundRequest, RequestConverter};
pub use engine::ProxyEngine;
