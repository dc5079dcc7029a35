//! Configuration management for the relay
//!
//! Process settings are loaded from environment variables. The deployment
//! registry itself is loaded separately by [`crate::deployment::loader`],
//! either from the YAML file named here or from the `AZURE_OPENAI_*` variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::streaming::RelayConfig;

/// Default Azure OpenAI API version used when a deployment does not name one
pub const DEFAULT_API_VERSION: &str = "2024-02-01";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path prefix for the proxied API routes (e.g. `/v1`)
    pub api_base: String,

    /// YAML file describing the deployments
    pub deployments_file: Option<PathBuf>,
    /// Azure endpoint used when no deployments file is configured
    pub azure_endpoint: Option<String>,
    /// `model=deployment` pairs used with `azure_endpoint`
    pub azure_model_mapper: Option<String>,
    /// API version applied to env-configured deployments
    pub azure_api_version: String,
    /// API key applied to env-configured deployments
    pub azure_api_key: Option<String>,

    /// Outbound HTTP proxy for backend calls
    pub http_proxy: Option<String>,
    /// Outbound SOCKS5 proxy for backend calls (wins over `http_proxy`)
    pub socks_proxy: Option<String>,
    /// Optional timeout for backend calls; none by default
    pub upstream_timeout: Option<Duration>,

    /// Upper bound for a materialised inbound request body
    pub max_request_body_bytes: usize,

    /// Streaming relay tuning
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_base: "/v1".to_string(),
            deployments_file: None,
            azure_endpoint: None,
            azure_model_mapper: None,
            azure_api_version: DEFAULT_API_VERSION.to_string(),
            azure_api_key: None,
            http_proxy: None,
            socks_proxy: None,
            upstream_timeout: None,
            max_request_body_bytes: 32 * 1024 * 1024,
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let relay = RelayConfig {
            flush_interval: Duration::from_millis(parse_or(
                "RELAY_FLUSH_INTERVAL_MS",
                defaults.relay.flush_interval.as_millis() as u64,
            )?),
            queue_capacity: parse_or("RELAY_FLUSH_QUEUE_CAPACITY", defaults.relay.queue_capacity)?,
            workers: parse_or("RELAY_FLUSH_WORKERS", defaults.relay.workers)?,
            high_water_mark: parse_or(
                "RELAY_BUFFER_HIGH_WATER_BYTES",
                defaults.relay.high_water_mark,
            )?,
            ..defaults.relay.clone()
        };
        relay.validate()?;

        Ok(Self {
            host: env::var("RELAY_HOST").unwrap_or(defaults.host),
            port: parse_or("RELAY_PORT", defaults.port)?,
            api_base: env::var("RELAY_API_BASE")
                .map(|v| normalize_api_base(&v))
                .unwrap_or(defaults.api_base),

            deployments_file: non_empty_var("RELAY_DEPLOYMENTS_FILE").map(PathBuf::from),
            azure_endpoint: non_empty_var("AZURE_OPENAI_ENDPOINT"),
            azure_model_mapper: non_empty_var("AZURE_OPENAI_MODEL_MAPPER"),
            azure_api_version: non_empty_var("AZURE_OPENAI_API_VERSION")
                .unwrap_or(defaults.azure_api_version),
            azure_api_key: non_empty_var("AZURE_OPENAI_API_KEY"),

            http_proxy: non_empty_var("AZURE_OPENAI_HTTP_PROXY"),
            socks_proxy: non_empty_var("AZURE_OPENAI_SOCKS_PROXY"),
            upstream_timeout: non_empty_var("RELAY_UPSTREAM_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>().context("Invalid RELAY_UPSTREAM_TIMEOUT_SECS"))
                .transpose()?
                .map(Duration::from_secs),

            max_request_body_bytes: parse_or(
                "RELAY_MAX_REQUEST_BODY_BYTES",
                defaults.max_request_body_bytes,
            )?,

            relay,
        })
    }
}

/// Normalise a route prefix to either `""` or `/segment[/segment]` without a trailing slash
pub fn normalize_api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}")),
        None => Ok(default),
    }
}
