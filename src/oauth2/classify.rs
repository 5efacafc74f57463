//! Maps server failures onto the device-flow polling protocol.

use strum::{AsRefStr, Display};

use crate::api::ApiResponse;
use crate::auth::{AuthError, PollOutcome, Token};
use crate::error::ApiClientError;

/// Structured kind of an OAuth2 error, as seen by the device flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum OAuth2ErrorKind {
    /// Transient: the user has not acted yet.
    AuthorizationPending,
    /// Transient: poll less often.
    SlowDown,
    /// Terminal: the user declined.
    AccessDenied,
    /// Terminal: the device code window elapsed.
    ExpiredToken,
    /// Terminal: anything else, including non-OAuth failures.
    Other,
}

impl OAuth2ErrorKind {
    /// Whether the device flow should keep polling after this error.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::AuthorizationPending | Self::SlowDown)
    }
}

/// Classify an error.
///
/// Only bodies that decoded into the OAuth2 error schema are recognized;
/// codes are matched exactly and case-sensitively.
pub fn classify(error: &ApiClientError) -> OAuth2ErrorKind {
    let Some(oauth) = error.oauth2_error() else {
        return OAuth2ErrorKind::Other;
    };
    match oauth.code.as_str() {
        "authorization_pending" => OAuth2ErrorKind::AuthorizationPending,
        "slow_down" => OAuth2ErrorKind::SlowDown,
        "access_denied" => OAuth2ErrorKind::AccessDenied,
        "expired_token" => OAuth2ErrorKind::ExpiredToken,
        _ => OAuth2ErrorKind::Other,
    }
}

/// Reduce one token-endpoint exchange to a [`PollOutcome`].
///
/// Terminal errors are forwarded unchanged inside [`AuthError::Api`].
pub fn poll_outcome(result: Result<ApiResponse<Token>, ApiClientError>) -> PollOutcome {
    match result {
        Ok(response) => {
            let date = response.date;
            let mut token = response.result;
            token.issued_at.get_or_insert(date);
            PollOutcome::Token(token)
        }
        Err(error) => match classify(&error) {
            OAuth2ErrorKind::AuthorizationPending => PollOutcome::Pending,
            OAuth2ErrorKind::SlowDown => PollOutcome::SlowDown,
            _ => PollOutcome::Terminal(AuthError::Api(error)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OAuth2ServerError, ProviderApiError, ServerError};
    use crate::http::TransportError;

    fn oauth_error(code: &str) -> ApiClientError {
        ApiClientError::ServerError(ServerError::OAuth2 {
            status: 400,
            error: OAuth2ServerError {
                code: code.to_string(),
                description: None,
                uri: None,
            },
        })
    }

    #[test]
    fn recognizes_device_flow_codes() {
        assert_eq!(
            classify(&oauth_error("authorization_pending")),
            OAuth2ErrorKind::AuthorizationPending
        );
        assert_eq!(classify(&oauth_error("slow_down")), OAuth2ErrorKind::SlowDown);
        assert_eq!(classify(&oauth_error("access_denied")), OAuth2ErrorKind::AccessDenied);
        assert_eq!(classify(&oauth_error("expired_token")), OAuth2ErrorKind::ExpiredToken);
        assert_eq!(classify(&oauth_error("invalid_grant")), OAuth2ErrorKind::Other);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(
            classify(&oauth_error("Authorization_Pending")),
            OAuth2ErrorKind::Other
        );
        assert_eq!(classify(&oauth_error("SLOW_DOWN")), OAuth2ErrorKind::Other);
    }

    #[test]
    fn non_oauth_failures_are_never_pending() {
        let management = ApiClientError::ServerError(ServerError::Api {
            status: 400,
            error: ProviderApiError {
                error_code: "authorization_pending".to_string(),
                error_summary: None,
                error_link: None,
                error_id: None,
                error_causes: Vec::new(),
            },
        });
        assert_eq!(classify(&management), OAuth2ErrorKind::Other);
        assert_eq!(classify(&ApiClientError::StatusCode(400)), OAuth2ErrorKind::Other);
        assert_eq!(classify(&ApiClientError::InvalidResponse), OAuth2ErrorKind::Other);
        assert_eq!(
            classify(&ApiClientError::Transport(TransportError::Other("offline".into()))),
            OAuth2ErrorKind::Other
        );
    }

    #[test]
    fn poll_outcome_keeps_polling_only_for_transient_codes() {
        assert!(matches!(
            poll_outcome(Err(oauth_error("authorization_pending"))),
            PollOutcome::Pending
        ));
        assert!(matches!(
            poll_outcome(Err(oauth_error("slow_down"))),
            PollOutcome::SlowDown
        ));
        match poll_outcome(Err(oauth_error("access_denied"))) {
            PollOutcome::Terminal(error) => assert!(error.is_access_denied()),
            other => panic!("expected terminal, got {other:?}"),
        }
        match poll_outcome(Err(ApiClientError::StatusCode(500))) {
            PollOutcome::Terminal(AuthError::Api(ApiClientError::StatusCode(500))) => {}
            other => panic!("expected status passthrough, got {other:?}"),
        }
    }

    #[test]
    fn kind_renders_as_wire_code() {
        assert_eq!(OAuth2ErrorKind::AuthorizationPending.to_string(), "authorization_pending");
        assert_eq!(OAuth2ErrorKind::ExpiredToken.as_ref(), "expired_token");
        assert!(OAuth2ErrorKind::SlowDown.is_transient());
        assert!(!OAuth2ErrorKind::AccessDenied.is_transient());
    }
}
