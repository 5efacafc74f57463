//! OAuth2 device-grant requests and error classification.

pub mod classify;
pub mod client;

pub use classify::{classify, poll_outcome, OAuth2ErrorKind};
pub use client::{Endpoints, OAuth2Client, DEVICE_CODE_GRANT_TYPE};
