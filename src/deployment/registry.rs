//! Deployment registry
//!
//! Immutable mapping from the client-facing model name to the Azure
//! deployment that serves it. Built once at startup and shared behind an
//! `Arc`; lookups need no locking.

use std::collections::HashMap;
use std::fmt;

use reqwest::Url;
use thiserror::Error;

use crate::error::{AppError, AppResult};

/// A configured backend deployment
#[derive(Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Client-facing model name (registry key)
    pub model_name: String,
    /// Azure deployment name used in the outbound path
    pub deployment_name: String,
    /// Azure resource endpoint, e.g. `https://my-resource.openai.azure.com/`
    pub endpoint: Url,
    /// Deployment API key; empty means "use the client's bearer token"
    pub api_key: String,
    /// `api-version` query parameter sent with every request
    pub api_version: String,
}

impl Deployment {
    /// Whether the deployment carries its own credential
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("model_name", &self.model_name)
            .field("deployment_name", &self.deployment_name)
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &if self.has_api_key() { "<redacted>" } else { "" })
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Errors raised while building a registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("model name must not be empty")]
    EmptyModelName,

    #[error("model {0} is configured more than once")]
    DuplicateModel(String),
}

/// Read-only model → deployment lookup
#[derive(Debug, Default)]
pub struct DeploymentRegistry {
    deployments: HashMap<String, Deployment>,
}

impl DeploymentRegistry {
    /// Build a registry, rejecting empty and duplicate model names
    pub fn from_deployments(
        deployments: impl IntoIterator<Item = Deployment>,
    ) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();
        for deployment in deployments {
            if deployment.model_name.is_empty() {
                return Err(RegistryError::EmptyModelName);
            }
            if map.contains_key(&deployment.model_name) {
                return Err(RegistryError::DuplicateModel(deployment.model_name));
            }
            map.insert(deployment.model_name.clone(), deployment);
        }
        Ok(Self { deployments: map })
    }

    /// Resolve a model name to its deployment (exact match only)
    pub fn resolve(&self, model: &str) -> AppResult<&Deployment> {
        self.deployments
            .get(model)
            .ok_or_else(|| AppError::DeploymentNotFound(model.to_string()))
    }

    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }

    /// Iterate over every configured deployment, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Deployment> {
        self.deployments.values()
    }
}
