//! Error types for HTTP exchanges.

pub mod server;

pub use server::{ApiErrorCause, OAuth2ServerError, ProviderApiError, ServerError};

use thiserror::Error;

use crate::http::TransportError;

/// Classified failure of a single HTTP exchange.
///
/// Every request issued through [`ApiClient`](crate::api::ApiClient) fails
/// with one of these variants, regardless of the payload type requested.
#[derive(Error, Debug)]
pub enum ApiClientError {
    /// No response was received (connectivity, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-2xx response whose body is not a recognizable error document.
    #[error("Unexpected HTTP status {0}")]
    StatusCode(u16),

    /// Non-2xx response carrying a structured server error.
    #[error("Server error: {0}")]
    ServerError(ServerError),

    /// 2xx response whose body does not match the expected schema.
    #[error("Cannot parse response: {0}")]
    CannotParse(#[source] serde_json::Error),

    /// The response is not a well-formed HTTP response.
    #[error("Invalid response")]
    InvalidResponse,

    /// The request could not be constructed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiClientError {
    /// HTTP status associated with this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::StatusCode(status) => Some(*status),
            Self::ServerError(error) => Some(error.status()),
            _ => None,
        }
    }

    /// The OAuth2 error body, when the server returned one.
    pub fn oauth2_error(&self) -> Option<&OAuth2ServerError> {
        match self {
            Self::ServerError(ServerError::OAuth2 { error, .. }) => Some(error),
            _ => None,
        }
    }

    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::StatusCode(status) => *status == 429 || (500..=599).contains(status),
            Self::ServerError(error) => {
                let status = error.status();
                status == 429 || (500..=599).contains(&status)
            }
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiClientError>;
