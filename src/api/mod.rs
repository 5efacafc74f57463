//! Response validation pipeline shared by every request type.
//!
//! [`ApiClient::send`] is the single entry point: it stamps common headers
//! onto a request, lets observers amend it, performs the exchange through an
//! [`HttpTransport`], runs [`validate`] on the result and reports the outcome
//! back to the observers.

pub mod headers;
pub mod observer;
pub mod response;
pub mod serde_helpers;
pub mod validate;

pub use headers::DEFAULT_REQUEST_ID_HEADER;
pub use observer::{ApiClientObserver, ApiObserverRegistry};
pub use response::{ApiResponse, LinkRelation, RateLimit};
pub use validate::validate;

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::ApiClientError;
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Sends requests and validates their responses.
///
/// Clones share their observers.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    request_id_header: Option<String>,
    user_agent: String,
    additional_headers: HeaderMap,
    observers: Arc<ApiObserverRegistry>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("transport", &"..")
            .field("request_id_header", &self.request_id_header)
            .field("user_agent", &self.user_agent)
            .field("additional_headers", &self.additional_headers)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            request_id_header: Some(DEFAULT_REQUEST_ID_HEADER.to_string()),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            additional_headers: HeaderMap::new(),
            observers: Arc::default(),
        }
    }

    /// Header holding the correlation id; `None` disables extraction.
    pub fn with_request_id_header(mut self, header: Option<String>) -> Self {
        self.request_id_header = header;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Extra header sent with every request. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.additional_headers.insert(name, value);
        }
        self
    }

    pub fn add_observer(&self, observer: Arc<dyn ApiClientObserver>) {
        self.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn ApiClientObserver>) -> bool {
        self.observers.remove(observer)
    }

    pub fn request_id_header(&self) -> Option<&str> {
        self.request_id_header.as_deref()
    }

    /// Perform `request` and decode a 2xx body as `T`.
    pub async fn send<T>(&self, mut request: HttpRequest) -> Result<ApiResponse<T>, ApiClientError>
    where
        T: DeserializeOwned,
    {
        self.prepare(&mut request);
        self.observers.notify(|o| o.will_send(&mut request));
        let sent = request.clone();
        let method = request.method.clone();
        let url = request.url.clone();
        tracing::debug!(%method, %url, "Sending request");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(%method, %url, error = %error, "Transport failure");
                let error = ApiClientError::Transport(error);
                self.observers.notify(|o| o.did_send_error(&sent, &error));
                return Err(error);
            }
        };

        let request_id = headers::request_id(&response.headers, self.request_id_header());
        let result = validate::<T>(&response, self.request_id_header());
        match &result {
            Ok(_) => {
                tracing::debug!(
                    %method,
                    %url,
                    status = response.status,
                    request_id = request_id.as_deref().unwrap_or("-"),
                    "Received response"
                );
                self.observers
                    .notify(|o| o.did_send_response(&sent, &response));
            }
            Err(error) => {
                tracing::debug!(
                    %method,
                    %url,
                    status = response.status,
                    request_id = request_id.as_deref().unwrap_or("-"),
                    error = %error,
                    "Request failed"
                );
                self.observers.notify(|o| o.did_send_error(&sent, error));
            }
        }
        result
    }

    fn prepare(&self, request: &mut HttpRequest) {
        for (name, value) in &self.additional_headers {
            request.headers.insert(name.clone(), value.clone());
        }
        if !request.headers.contains_key(ACCEPT) {
            request
                .headers
                .insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        if let Ok(agent) = HeaderValue::from_str(&self.user_agent) {
            request.headers.insert(USER_AGENT, agent);
        }
    }
}
