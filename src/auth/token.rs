use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::serde_helpers::iso8601;

/// Token set returned by the token endpoint.
///
/// # Example
/// ```
/// use device_grant::auth::Token;
///
/// let token: Token = serde_json::from_str(
///     r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#,
/// )?;
/// assert_eq!(token.access_token, "tok");
/// assert!(token.refresh_token.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_secret: Option<String>,
    /// When the token was issued, taken from the response `Date`.
    #[serde(
        default,
        with = "iso8601::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = Duration::try_seconds(i64::try_from(self.expires_in).ok()?)?;
        self.issued_at.map(|issued| issued + lifetime)
    }

    /// Unknown issue time counts as not expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|exp| exp <= Utc::now())
    }

    /// Granted scopes, split on whitespace.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token(issued_at: Option<DateTime<Utc>>) -> Token {
        Token {
            access_token: "tok".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            scope: Some("openid  profile offline_access".to_string()),
            refresh_token: None,
            id_token: None,
            device_secret: None,
            issued_at,
        }
    }

    #[test]
    fn expiry_is_relative_to_issue_time() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let token = token(Some(issued));
        assert_eq!(
            token.expires_at(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap())
        );
        assert!(token.is_expired());
    }

    #[test]
    fn unknown_issue_time_is_not_expired() {
        let token = token(None);
        assert_eq!(token.expires_at(), None);
        assert!(!token.is_expired());
    }

    #[test]
    fn scopes_split_on_whitespace() {
        assert_eq!(token(None).scopes(), vec!["openid", "profile", "offline_access"]);
    }

    #[test]
    fn issued_at_round_trips_in_wire_format() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(token(Some(issued))).unwrap();
        assert_eq!(json["issued_at"], "2024-05-01T12:00:00.000+0000");
        let back: Token = serde_json::from_value(json).unwrap();
        assert_eq!(back.issued_at, Some(issued));
    }
}
