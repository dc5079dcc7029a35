//! Model discovery across deployments
//!
//! `GET /models` fans out to every configured deployment's Azure resource,
//! asks it for its deployment listing and concatenates the answers. A
//! resource that cannot be reached, refuses the credential or returns
//! garbage simply contributes nothing.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::deployment::{Deployment, DeploymentRegistry};

use super::converter::{endpoint_url, ConversionError};
use super::headers::API_KEY_HEADER;

/// API version of the Azure deployment listing endpoint
pub const DISCOVERY_API_VERSION: &str = "2022-12-01";

/// Combined listing returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedListing {
    pub data: Vec<Value>,
    pub object: String,
}

impl AggregatedListing {
    fn new(data: Vec<Value>) -> Self {
        Self {
            data,
            object: "list".to_string(),
        }
    }
}

/// Why one deployment contributed nothing
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no credential available")]
    NoCredential,

    #[error(transparent)]
    Endpoint(#[from] ConversionError),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("malformed listing: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct DeploymentListing {
    data: Vec<Value>,
}

/// Queries every deployment's resource for its deployment listing
#[derive(Debug, Clone)]
pub struct ModelAggregator {
    registry: Arc<DeploymentRegistry>,
    client: Client,
}

impl ModelAggregator {
    pub fn new(registry: Arc<DeploymentRegistry>, client: Client) -> Self {
        Self { registry, client }
    }

    /// List models from all deployments concurrently
    ///
    /// `fallback_credential` is used for deployments without their own key.
    /// Results arrive in completion order; each deployment's records keep
    /// their own order.
    pub async fn list_all_models(&self, fallback_credential: Option<String>) -> AggregatedListing {
        let total = self.registry.len();
        if total == 0 {
            return AggregatedListing::new(Vec::new());
        }

        let (tx, mut rx) = mpsc::channel::<Vec<Value>>(total);

        for deployment in self.registry.iter() {
            let tx = tx.clone();
            let client = self.client.clone();
            let deployment = deployment.clone();
            let fallback = fallback_credential.clone();

            tokio::spawn(async move {
                let records =
                    match fetch_deployment_listing(&client, &deployment, fallback.as_deref()).await
                    {
                        Ok(records) => {
                            debug!(
                                model = %deployment.model_name,
                                count = records.len(),
                                "Fetched deployment listing"
                            );
                            records
                        }
                        Err(e) => {
                            warn!(
                                model = %deployment.model_name,
                                endpoint = %deployment.endpoint,
                                error = %e,
                                "Failed to list deployments"
                            );
                            metrics::counter!("relay_discovery_failures_total").increment(1);
                            Vec::new()
                        }
                    };
                // Receiver only goes away if the client request was dropped.
                let _ = tx.send(records).await;
            });
        }
        drop(tx);

        let mut data = Vec::new();
        for _ in 0..total {
            match rx.recv().await {
                Some(records) => data.extend(records),
                None => break,
            }
        }

        AggregatedListing::new(data)
    }
}

/// Fetch `{endpoint}/openai/deployments` for one deployment's resource
pub async fn fetch_deployment_listing(
    client: &Client,
    deployment: &Deployment,
    fallback_credential: Option<&str>,
) -> Result<Vec<Value>, DiscoveryError> {
    let credential = if deployment.has_api_key() {
        deployment.api_key.as_str()
    } else {
        fallback_credential
            .filter(|c| !c.is_empty())
            .ok_or(DiscoveryError::NoCredential)?
    };

    let url = endpoint_url(
        &deployment.endpoint,
        &["openai", "deployments"],
        DISCOVERY_API_VERSION,
    )?;

    let response = client
        .get(url)
        .header(API_KEY_HEADER, credential)
        .send()
        .await
        .map_err(DiscoveryError::Transport)?;

    if response.status() != StatusCode::OK {
        return Err(DiscoveryError::Status(response.status()));
    }

    let body = response.bytes().await.map_err(DiscoveryError::Body)?;
    let listing: DeploymentListing = serde_json::from_slice(&body)?;
    Ok(listing.data)
}
