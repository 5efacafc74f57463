use thiserror::Error;

use crate::error::ApiClientError;
use crate::oauth2::classify::{classify, OAuth2ErrorKind};

/// Failures surfaced by the device authorization flow and token storage.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error("Authorization session was cancelled")]
    Cancelled,
    #[error("Device code expired before the user authorized it")]
    SessionExpired,
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// OAuth2 classification of the underlying server error, if any.
    pub fn kind(&self) -> Option<OAuth2ErrorKind> {
        match self {
            Self::Api(error) => Some(classify(error)),
            _ => None,
        }
    }

    /// The user declined the authorization request.
    pub fn is_access_denied(&self) -> bool {
        self.kind() == Some(OAuth2ErrorKind::AccessDenied)
    }

    /// The device code is no longer valid, per the server or the local clock.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::SessionExpired) || self.kind() == Some(OAuth2ErrorKind::ExpiredToken)
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
