//! Convenience re-exports for common use.

pub use crate::api::{ApiClient, ApiClientObserver, ApiResponse, LinkRelation, RateLimit};
pub use crate::auth::{
    AuthError, DeviceAuthorizationFlow, DeviceAuthorizationObserver, DeviceCodeSession,
    FileTokenStore, FlowOptions, FlowState, Token, TokenStore,
};
pub use crate::config::{ClientConfig, ConfigError};
pub use crate::error::{ApiClientError, ServerError};
pub use crate::http::{HttpTransport, ReqwestTransport};
pub use crate::oauth2::{OAuth2Client, OAuth2ErrorKind};
