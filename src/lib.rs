//! device-grant: OAuth2 Device Authorization Grant client.
//!
//! Obtains tokens for input-constrained devices (RFC 8628). The crate is
//! layered:
//!
//! - [`http`]: the transport seam ([`http::HttpTransport`]) and its reqwest
//!   implementation.
//! - [`api`]: validation of every HTTP exchange into a typed
//!   [`api::ApiResponse`] or a classified [`error::ApiClientError`].
//! - [`oauth2`]: the device-authorization and token requests, and the
//!   classification of OAuth2 error codes.
//! - [`auth`]: the [`auth::DeviceAuthorizationFlow`] state machine, tokens
//!   and token storage.
//!
//! # Quick Start
//!
//! ```no_run
//! use device_grant::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let flow = DeviceAuthorizationFlow::from_config(&config)?;
//! let session = flow.resume().await?;
//! println!("Visit {} and enter {}", session.verification_uri, session.user_code);
//! let token = flow.resume_with(session).await?;
//! println!("{}", token.access_token);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth2;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
