//! Mock servers for integration tests


pub use azure::MockAzureResource;
