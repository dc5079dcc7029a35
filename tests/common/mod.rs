//! Common test utilities for the relay
//!
//! Builds the real router around deployments pointing at mock servers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use aoai_relay::{
    config::Config, routes::create_router, streaming::RelayConfig, AppState, Deployment,
    DeploymentRegistry,
};
use axum::Router;
use axum_test::TestServer;
use reqwest::Url;

/// Test configuration constants
pub mod constants {
    /// Key configured on deployments that carry their own credential
    pub const DEPLOYMENT_KEY: &str = "test-deployment-key";
    /// Token a client presents as `Authorization: Bearer ...`
    pub const CLIENT_TOKEN: &str = "test-client-token";
    pub const API_VERSION: &str = "2024-02-01";
}

/// Deployment for `model` served by the mock at `endpoint`
pub fn deployment(model: &str, endpoint: &str, api_key: &str) -> Deployment {
    Deployment {
        model_name: model.to_string(),
        deployment_name: model.replace('.', ""),
        endpoint: Url::parse(endpoint).expect("mock server URI is a valid URL"),
        api_key: api_key.to_string(),
        api_version: constants::API_VERSION.to_string(),
    }
}

/// Config with a short flush interval so streaming tests stay quick
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        relay: RelayConfig {
            flush_interval: Duration::from_millis(20),
            ..RelayConfig::default()
        },
        ..Config::default()
    }
}

/// Build the application router with the given config and deployments
pub fn build_app_with_config(config: Config, deployments: Vec<Deployment>) -> Router {
    let registry =
        DeploymentRegistry::from_deployments(deployments).expect("test deployments are valid");
    let state = AppState::new(config, registry).expect("application state builds");
    create_router(Arc::new(state))
}

pub fn build_app(deployments: Vec<Deployment>) -> Router {
    build_app_with_config(test_config(), deployments)
}

/// Test server around [`build_app`]
pub fn test_server(deployments: Vec<Deployment>) -> TestServer {
    TestServer::new(build_app(deployments)).expect("Failed to create test server")
}
