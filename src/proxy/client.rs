//! Shared HTTP client for deployment calls
//!
//! One pooled `reqwest::Client` serves every request. An explicitly
//! configured outbound proxy wins; otherwise reqwest's own detection of
//! `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY` applies.

use anyhow::{Context, Result};
use reqwest::{Client, Proxy};
use tracing::info;

use crate::config::Config;

/// Build the client used for forwarding and discovery
pub fn build_http_client(config: &Config) -> Result<Client> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(100)
        .user_agent(concat!("aoai-relay/", env!("CARGO_PKG_VERSION")));

    // No timeout unless asked for: streamed completions can run for minutes.
    if let Some(timeout) = config.upstream_timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy) = outbound_proxy(config)? {
        builder = builder.proxy(proxy);
    }

    builder.build().context("Failed to build HTTP client")
}

fn outbound_proxy(config: &Config) -> Result<Option<Proxy>> {
    if let Some(url) = &config.socks_proxy {
        let proxy = Proxy::all(url).with_context(|| format!("Invalid SOCKS proxy '{url}'"))?;
        info!(proxy = %url, "Using SOCKS proxy for deployment requests");
        return Ok(Some(proxy));
    }

    if let Some(url) = &config.http_proxy {
        let proxy = Proxy::all(url).with_context(|| format!("Invalid HTTP proxy '{url}'"))?;
        info!(proxy = %url, "Using HTTP proxy for deployment requests");
        return Ok(Some(proxy));
    }

    Ok(None)
}
