//! Integration tests for the relay
//!
//! Each test runs the full router in-process against wiremock servers
//! standing in for Azure OpenAI resources.

mod health;
mod proxy;
