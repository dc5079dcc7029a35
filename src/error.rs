//! Error types for the relay
//!
//! Every per-request failure is detected once, turned into an [`AppError`]
//! and rendered as a JSON error payload. Nothing in the request path retries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Request body is empty")]
    EmptyBody,

    #[error("Failed to determine model: {0}")]
    ModelResolution(String),

    #[error("Deployment config for {0} not found")]
    DeploymentNotFound(String),

    #[error("No credential available: deployment has no api key and no bearer token was supplied")]
    MissingCredential,

    #[error("Convert request error: {0}")]
    Conversion(String),

    #[error("Failed to reach deployment: {0}")]
    Forwarding(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

impl AppError {
    /// Status code and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BodyRead(_) => (StatusCode::BAD_REQUEST, "BODY_READ_FAILED"),
            AppError::EmptyBody => (StatusCode::BAD_REQUEST, "EMPTY_BODY"),
            AppError::ModelResolution(_) => (StatusCode::BAD_REQUEST, "MODEL_RESOLUTION_FAILED"),
            AppError::DeploymentNotFound(_) => (StatusCode::NOT_FOUND, "DEPLOYMENT_NOT_FOUND"),
            AppError::MissingCredential => (StatusCode::UNAUTHORIZED, "MISSING_CREDENTIAL"),
            AppError::Conversion(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONVERSION_ERROR"),
            AppError::Forwarding(_) => (StatusCode::BAD_GATEWAY, "FORWARDING_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Internal(e) => {
                warn!(error = %e, "Internal error while handling request");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
