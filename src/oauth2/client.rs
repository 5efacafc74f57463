use std::sync::Arc;

use reqwest::Method;
use url::Url;

use crate::api::{ApiClient, ApiResponse};
use crate::auth::{DeviceCodeSession, Token};
use crate::config::ClientConfig;
use crate::error::ApiClientError;
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};

/// `grant_type` sent with every device-code token request.
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Device-authorization and token endpoints of one authorization server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub device_authorization: Url,
    pub token: Url,
}

impl Endpoints {
    /// Derive endpoints from an issuer URL.
    ///
    /// An issuer whose path already contains `/oauth2` (a custom
    /// authorization server) gets `/v1/...` appended; any other issuer
    /// gets `/oauth2/v1/...`.
    pub fn from_issuer(issuer: &Url) -> Result<Self, ApiClientError> {
        let base = issuer.as_str().trim_end_matches('/');
        let prefix = if issuer.path().contains("/oauth2") {
            base.to_string()
        } else {
            format!("{base}/oauth2")
        };
        Ok(Self {
            device_authorization: join(&prefix, "/v1/device/authorize")?,
            token: join(&prefix, "/v1/token")?,
        })
    }

    /// Explicit endpoints win over issuer-derived ones.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let derived = Self::from_issuer(&config.issuer)?;
        Ok(Self {
            device_authorization: config
                .device_authorization_endpoint
                .clone()
                .unwrap_or(derived.device_authorization),
            token: config.token_endpoint.clone().unwrap_or(derived.token),
        })
    }
}

fn join(prefix: &str, path: &str) -> Result<Url, ApiClientError> {
    Url::parse(&format!("{prefix}{path}"))
        .map_err(|err| ApiClientError::InvalidRequest(format!("invalid endpoint URL: {err}")))
}

/// Issues the two device-grant requests.
///
/// Each call only builds a form request and hands it to
/// [`ApiClient::send`]; validation and error mapping live there.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    api: ApiClient,
    endpoints: Endpoints,
}

impl OAuth2Client {
    pub fn new(api: ApiClient, endpoints: Endpoints) -> Self {
        Self { api, endpoints }
    }

    /// Client for `config` over the given transport.
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ApiClientError> {
        let api = ApiClient::new(transport)
            .with_request_id_header(config.request_id_header.clone())
            .with_user_agent(config.user_agent.clone());
        Ok(Self::new(api, Endpoints::from_config(config)?))
    }

    /// Client for `config` using reqwest with the configured timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let transport = ReqwestTransport::with_timeout(config.timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// The underlying client; register [`ApiClientObserver`](crate::api::ApiClientObserver)s here.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// POST `client_id` and `scope` to the device-authorization endpoint.
    pub async fn start_authorization(
        &self,
        client_id: &str,
        scopes: &str,
    ) -> Result<ApiResponse<DeviceCodeSession>, ApiClientError> {
        let request = HttpRequest::new(Method::POST, self.endpoints.device_authorization.clone())
            .form(&[("client_id", client_id), ("scope", scopes)]);
        self.api.send(request).await
    }

    /// POST the device-code grant to the token endpoint.
    pub async fn poll_for_token(
        &self,
        client_id: &str,
        device_code: &str,
    ) -> Result<ApiResponse<Token>, ApiClientError> {
        let request = HttpRequest::new(Method::POST, self.endpoints.token.clone()).form(&[
            ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ("device_code", device_code),
            ("client_id", client_id),
        ]);
        self.api.send(request).await
    }
}
