//! Low-level HTTP plumbing for provider calls.
//!
//! Error classification and response checking shared by every endpoint. For
//! the endpoint-level API, see `client.rs`.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur when calling the streaming provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success HTTP status.
    #[error("HTTP error {status}: {message}")]
    Status { status: u16, message: String },

    /// Provider response could not be decoded.
    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    /// A provider URL could not be built from the configured base.
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
}

/// Convenient Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    /// Returns true if the operation should be retried.
    ///
    /// Timeouts, connection failures, rate limiting (429) and server errors
    /// (5xx) are transient. Client errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            ProviderError::Decode(_) | ProviderError::InvalidUrl(_) => false,
        }
    }

    /// Returns true if the provider rejected the bearer credential.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ProviderError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED.as_u16())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Handling
// ─────────────────────────────────────────────────────────────────────────────

/// Web API error body: `{"error": {"status": 401, "message": "..."}}`.
#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Accounts service error body: `{"error": "invalid_grant", "error_description": "..."}`.
#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Pulls a human-readable message out of a provider error body.
///
/// Falls back to the raw body text when it is not one of the known shapes.
fn extract_error_message(body: &str) -> String {
    if let Ok(api) = serde_json::from_str::<ApiErrorBody>(body) {
        return api.error.message;
    }
    if let Ok(oauth) = serde_json::from_str::<OAuthErrorBody>(body) {
        return match oauth.error_description {
            Some(desc) => format!("{}: {}", oauth.error, desc),
            None => oauth.error,
        };
    }
    body.trim().to_string()
}

/// Converts a non-success response into [`ProviderError::Status`].
pub(crate) async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        message: extract_error_message(&body),
    })
}

/// Checks the status and decodes a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let response = check_status(response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}
