//! Structured error documents returned by the authorization server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// OAuth2 error body (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2ServerError {
    #[serde(rename = "error")]
    pub code: String,
    #[serde(rename = "error_description", default)]
    pub description: Option<String>,
    #[serde(rename = "error_uri", default)]
    pub uri: Option<String>,
}

/// Management-API error body (`errorCode`, `errorSummary`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderApiError {
    pub error_code: String,
    #[serde(default)]
    pub error_summary: Option<String>,
    #[serde(default)]
    pub error_link: Option<String>,
    #[serde(default)]
    pub error_id: Option<String>,
    #[serde(default)]
    pub error_causes: Vec<ApiErrorCause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorCause {
    pub error_summary: String,
}

/// A non-2xx response whose body decoded into a known error schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    OAuth2 {
        status: u16,
        error: OAuth2ServerError,
    },
    Api {
        status: u16,
        error: ProviderApiError,
    },
}

impl ServerError {
    /// Try to decode an error body, OAuth2 schema first.
    ///
    /// Returns `None` when the body matches neither schema.
    pub fn decode(status: u16, body: &[u8]) -> Option<Self> {
        if let Ok(error) = serde_json::from_slice::<OAuth2ServerError>(body) {
            return Some(Self::OAuth2 { status, error });
        }
        serde_json::from_slice::<ProviderApiError>(body)
            .ok()
            .map(|error| Self::Api { status, error })
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::OAuth2 { status, .. } | Self::Api { status, .. } => *status,
        }
    }

    /// Server-provided error code.
    pub fn code(&self) -> &str {
        match self {
            Self::OAuth2 { error, .. } => &error.code,
            Self::Api { error, .. } => &error.error_code,
        }
    }

    /// Server-provided human readable description.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::OAuth2 { error, .. } => error.description.as_deref(),
            Self::Api { error, .. } => error.error_summary.as_deref(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => write!(f, "{} ({description})", self.code()),
            None => f.write_str(self.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_oauth2_body() {
        let body = br#"{"error":"access_denied","error_description":"The user denied"}"#;
        let error = ServerError::decode(400, body).unwrap();
        assert_eq!(error.code(), "access_denied");
        assert_eq!(error.description(), Some("The user denied"));
        assert!(matches!(error, ServerError::OAuth2 { status: 400, .. }));
    }

    #[test]
    fn decodes_management_api_body() {
        let body = br#"{
            "errorCode": "E0000011",
            "errorSummary": "Invalid token provided",
            "errorLink": "E0000011",
            "errorId": "oaeXYZ",
            "errorCauses": [{"errorSummary": "token expired"}]
        }"#;
        let error = ServerError::decode(401, body).unwrap();
        assert_eq!(error.code(), "E0000011");
        assert_eq!(error.to_string(), "E0000011 (Invalid token provided)");
        match error {
            ServerError::Api { error, .. } => assert_eq!(error.error_causes.len(), 1),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(ServerError::decode(500, b"<html>oops</html>").is_none());
        assert!(ServerError::decode(500, br#"{"error":{"nested":true}}"#).is_none());
        assert!(ServerError::decode(500, b"").is_none());
    }
}
