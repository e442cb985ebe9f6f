use thiserror::Error;
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;

use crate::download::AccessDecision;
use crate::services::{TokenError, UpstreamError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Access denied: {0}")]
    Forbidden(AccessDecision),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Token acquisition failed: {0}")]
    AuthProvider(#[from] TokenError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::AuthProvider(_)
            | AppError::Upstream(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side failures carry upstream URLs and provider messages
        let body = match &self {
            AppError::Config(_) | AppError::Internal(_) => "Internal error".to_string(),
            AppError::AuthProvider(_) => "Could not obtain service credentials".to_string(),
            AppError::Upstream(_) => "Upstream service error".to_string(),
            _ => self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %crate::logging::sanitize_log_message(&self.to_string()), "Request failed");
        }

        (status, body).into_response()
    }
}
