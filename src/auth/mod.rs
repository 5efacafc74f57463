//! Device Authorization Grant flow, tokens and token storage.

pub mod device_code;
pub mod error;
pub mod flow;
pub mod observer;
pub mod store;
pub mod token;

pub use device_code::{DeviceCodeSession, PollOutcome, DEFAULT_POLL_INTERVAL};
pub use error::AuthError;
pub use flow::{Completion, DeviceAuthorizationFlow, FlowOptions, FlowState};
pub use observer::{DeviceAuthorizationObserver, ObserverRegistry};
pub use store::{FileTokenStore, TokenStore, DEFAULT_PROFILE};
pub use token::Token;
