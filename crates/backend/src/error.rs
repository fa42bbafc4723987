//! Unified error handling for the backend API.
//!
//! This module provides a centralized error type that implements `IntoResponse`,
//! allowing handlers to use `?` operator naturally while returning appropriate
//! HTTP status codes and error messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::deadpool::PoolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Database, integration, or other unexpected failure
    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Feature disabled by server configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication required but not provided or invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl ApiError {
    /// Create a not found error with a custom message
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    /// Status code this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(e) if e.downcast_ref::<PoolError>().is_some() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Internal(e)
                if matches!(
                    e.downcast_ref::<diesel::result::Error>(),
                    Some(diesel::result::Error::NotFound)
                ) =>
            {
                StatusCode::NOT_FOUND
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_message, details) = match &self {
            ApiError::Internal(e) => match status {
                StatusCode::SERVICE_UNAVAILABLE => {
                    tracing::error!("Connection pool error: {:?}", e);
                    ("Database connection unavailable".to_string(), None)
                }
                StatusCode::NOT_FOUND => ("Resource not found".to_string(), None),
                _ => {
                    tracing::error!("Internal error: {:?}", e);
                    ("Internal server error".to_string(), None)
                }
            },
            ApiError::NotFound(resource) => (format!("{} not found", resource), None),
            ApiError::BadRequest(msg) => (msg.clone(), None),
            ApiError::Config(msg) => {
                tracing::warn!("Configuration error: {}", msg);
                ("Feature not configured".to_string(), Some(msg.clone()))
            }
            ApiError::Unauthorized(msg) => (msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
