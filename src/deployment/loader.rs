//! Deployment loading
//!
//! Two sources are supported, checked in order:
//! 1. a YAML file (`RELAY_DEPLOYMENTS_FILE`) with a `deployment_config` list
//! 2. `AZURE_OPENAI_ENDPOINT` plus `AZURE_OPENAI_MODEL_MAPPER`
//!
//! Unknown YAML keys are ignored.

use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use tracing::info;

use super::registry::{Deployment, DeploymentRegistry};
use crate::config::{Config, DEFAULT_API_VERSION};

/// Top-level layout of the deployments file
#[derive(Debug, Deserialize)]
pub struct DeploymentsFile {
    #[serde(default)]
    pub deployment_config: Vec<DeploymentEntry>,
}

/// One `deployment_config` entry
#[derive(Debug, Deserialize)]
pub struct DeploymentEntry {
    pub model_name: String,
    #[serde(default)]
    pub deployment_name: Option<String>,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Build the registry from whichever source the configuration names
pub fn load_registry(config: &Config) -> Result<DeploymentRegistry> {
    let deployments = match (&config.deployments_file, &config.azure_endpoint) {
        (Some(path), _) => load_file(path)?,
        (None, Some(endpoint)) => from_model_mapper(
            endpoint,
            config.azure_model_mapper.as_deref().unwrap_or_default(),
            config.azure_api_key.as_deref().unwrap_or_default(),
            &config.azure_api_version,
        )?,
        (None, None) => {
            bail!("no deployments configured: set RELAY_DEPLOYMENTS_FILE or AZURE_OPENAI_ENDPOINT")
        }
    };

    if deployments.is_empty() {
        bail!("deployment configuration contains no deployments");
    }

    for deployment in &deployments {
        info!(
            model = %deployment.model_name,
            deployment = %deployment.deployment_name,
            endpoint = %deployment.endpoint,
            api_version = %deployment.api_version,
            has_api_key = deployment.has_api_key(),
            "Loaded deployment"
        );
    }

    DeploymentRegistry::from_deployments(deployments).context("Invalid deployment configuration")
}

fn load_file(path: &Path) -> Result<Vec<Deployment>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read deployments file {}", path.display()))?;
    parse_deployments_yaml(&raw)
        .with_context(|| format!("Failed to parse deployments file {}", path.display()))
}

/// Parse the YAML deployments document
pub fn parse_deployments_yaml(raw: &str) -> Result<Vec<Deployment>> {
    let file: DeploymentsFile = serde_yaml::from_str(raw)?;
    file.deployment_config
        .into_iter()
        .map(DeploymentEntry::into_deployment)
        .collect()
}

impl DeploymentEntry {
    fn into_deployment(self) -> Result<Deployment> {
        let model_name = self.model_name.trim().to_string();
        if model_name.is_empty() {
            bail!("deployment_config contains an empty model_name");
        }

        let deployment_name = self
            .deployment_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_deployment_name(&model_name));

        Ok(Deployment {
            endpoint: parse_endpoint(&self.endpoint)
                .with_context(|| format!("model {model_name}"))?,
            deployment_name,
            api_key: self.api_key.unwrap_or_default().trim().to_string(),
            api_version: self
                .api_version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            model_name,
        })
    }
}

/// Build deployments from a single endpoint and a `model=deployment,...` mapper
pub fn from_model_mapper(
    endpoint: &str,
    mapper: &str,
    api_key: &str,
    api_version: &str,
) -> Result<Vec<Deployment>> {
    let endpoint = parse_endpoint(endpoint).context("AZURE_OPENAI_ENDPOINT")?;

    mapper
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (model, deployment) = pair
                .split_once('=')
                .with_context(|| format!("invalid AZURE_OPENAI_MODEL_MAPPER entry '{pair}'"))?;
            let model = model.trim();
            if model.is_empty() {
                bail!("invalid AZURE_OPENAI_MODEL_MAPPER entry '{pair}'");
            }
            let deployment = deployment.trim();
            Ok(Deployment {
                model_name: model.to_string(),
                deployment_name: if deployment.is_empty() {
                    default_deployment_name(model)
                } else {
                    deployment.to_string()
                },
                endpoint: endpoint.clone(),
                api_key: api_key.trim().to_string(),
                api_version: api_version.to_string(),
            })
        })
        .collect()
}

/// Azure deployment names cannot contain dots (`gpt-3.5-turbo` → `gpt-35-turbo`)
pub fn default_deployment_name(model: &str) -> String {
    model.replace('.', "")
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid endpoint '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        bail!("endpoint '{raw}' must be an http(s) base URL");
    }
    Ok(url)
}
