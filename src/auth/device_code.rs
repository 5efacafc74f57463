use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::AuthError;
use super::Token;
use crate::api::serde_helpers::seconds;

/// Interval used when the server does not specify one (RFC 8628 §3.2).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

fn default_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

/// Device-authorization session details returned by the server.
///
/// `user_code` and `verification_uri` are meant to be shown to the user;
/// `device_code` stays on the device and is exchanged while polling.
///
/// # Example
/// ```
/// use device_grant::auth::DeviceCodeSession;
///
/// let session: DeviceCodeSession = serde_json::from_str(r#"{
///     "device_code": "d1",
///     "user_code": "U1",
///     "verification_uri": "https://x/activate",
///     "verification_uri_complete": "https://x/activate?u=U1",
///     "expires_in": 600,
///     "interval": 5
/// }"#)?;
/// assert_eq!(session.interval.as_secs(), 5);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCodeSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: Url,
    pub verification_uri_complete: Url,
    #[serde(with = "seconds")]
    pub expires_in: Duration,
    #[serde(with = "seconds", default = "default_interval")]
    pub interval: Duration,
}

/// Verdict for a single poll attempt.
#[derive(Debug)]
pub enum PollOutcome {
    /// `authorization_pending`: keep polling.
    Pending,
    /// `slow_down`: keep polling with a longer interval.
    SlowDown,
    /// The user approved; polling is over.
    Token(Token),
    /// Polling is over without a token.
    Terminal(AuthError),
}
