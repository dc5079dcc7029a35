//! Deployment configuration
//!
//! The registry maps model names to Azure deployments; the loader builds it
//! from a YAML file or from environment variables.

pub mod loader;
pub mod registry;

pub use loader::load_registry;
pub use registry::{Deployment, DeploymentRegistry, RegistryError};
