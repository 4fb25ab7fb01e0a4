//! Centralized error types for the Tunepool core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::room::StoreError;
use crate::utils::RoomNameError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for ProviderError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::Status { .. } if self.is_unauthorized() => "provider_unauthorized",
            Self::Status { .. } => "http_error_status",
            Self::Decode(_) => "provider_decode_error",
            Self::InvalidUrl(_) => "provider_invalid_url",
        }
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::RoomExists(_) => "room_already_exists",
            Self::RoomNotFound(_) => "room_not_found",
            Self::Io(_) => "store_io_error",
            Self::Serialization(_) => "store_serialization_error",
        }
    }
}

/// Application-wide error type for the Tunepool server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum TunepoolError {
    /// No room with the given name exists.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// The room's queue has no song with the given uri.
    #[error("Song not found: {0}")]
    SongNotFound(String),

    /// A room with the requested name already exists.
    #[error("Room already exists: {0}")]
    RoomAlreadyExists(String),

    /// A call to the streaming provider failed.
    #[error("Provider request failed: {0}")]
    Provider(String),

    /// The provider rejected the room's credential and it could not be renewed.
    #[error("Stale credential: {0}")]
    StaleCredential(String),

    /// Reading or writing room records failed.
    #[error("Storage error: {0}")]
    Store(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server configuration error (missing required settings).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TunepoolError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "room_not_found",
            Self::SongNotFound(_) => "song_not_found",
            Self::RoomAlreadyExists(_) => "room_already_exists",
            Self::Provider(_) => "provider_error",
            Self::StaleCredential(_) => "stale_credential",
            Self::Store(_) => "store_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RoomNotFound(_) | Self::SongNotFound(_) => StatusCode::NOT_FOUND,
            Self::RoomAlreadyExists(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::StaleCredential(_) => StatusCode::UNAUTHORIZED,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

// Re-export Result type aliases from their defining modules
pub use crate::provider::ProviderResult;
pub use crate::room::StoreResult;

/// Convenient Result alias for application-wide operations.
pub type TunepoolResult<T> = Result<T, TunepoolError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for TunepoolError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ProviderError> for TunepoolError {
    fn from(err: ProviderError) -> Self {
        if err.is_unauthorized() {
            Self::StaleCredential(err.to_string())
        } else {
            Self::Provider(err.to_string())
        }
    }
}

impl From<StoreError> for TunepoolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomExists(name) => Self::RoomAlreadyExists(name),
            StoreError::RoomNotFound(name) => Self::RoomNotFound(name),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<RoomNameError> for TunepoolError {
    fn from(err: RoomNameError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
