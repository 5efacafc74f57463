//! Client configuration (code > env > config file).

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::api::{DEFAULT_REQUEST_ID_HEADER, DEFAULT_USER_AGENT};

/// Environment variable holding the issuer URL.
pub const ENV_ISSUER: &str = "DEVICE_GRANT_ISSUER";
/// Environment variable holding the OAuth2 client id.
pub const ENV_CLIENT_ID: &str = "DEVICE_GRANT_CLIENT_ID";
/// Environment variable holding space-separated scopes.
pub const ENV_SCOPES: &str = "DEVICE_GRANT_SCOPES";
/// Optional override for the device-authorization endpoint.
pub const ENV_DEVICE_AUTHORIZATION_ENDPOINT: &str = "DEVICE_GRANT_DEVICE_AUTHORIZATION_ENDPOINT";
/// Optional override for the token endpoint.
pub const ENV_TOKEN_ENDPOINT: &str = "DEVICE_GRANT_TOKEN_ENDPOINT";

/// Name of the per-user configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Added to the polling interval on every `slow_down` response.
pub const DEFAULT_SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Failures while loading a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Default configuration file not found")]
    DefaultFileNotFound,
    #[error("Invalid configuration file: {}", .0.display())]
    InvalidFile(PathBuf),
    #[error("Cannot parse configuration: {0}")]
    CannotParse(#[from] toml::de::Error),
    #[error("Missing configuration values: {}", .0.join(", "))]
    MissingValues(Vec<&'static str>),
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings for one OAuth2 client.
///
/// # Example
/// ```
/// use device_grant::config::ClientConfig;
/// use url::Url;
///
/// let config = ClientConfig::builder()
///     .issuer(Url::parse("https://example.okta.com/oauth2/default")?)
///     .client_id("0oa1")
///     .scopes("openid profile offline_access")
///     .build();
/// assert_eq!(config.scope_list(), vec!["openid", "profile", "offline_access"]);
/// # Ok::<(), url::ParseError>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    pub issuer: Url,
    #[builder(into)]
    pub client_id: String,
    /// Space-separated scopes requested at start.
    #[builder(into)]
    pub scopes: String,
    pub device_authorization_endpoint: Option<Url>,
    pub token_endpoint: Option<Url>,
    /// Correlation-id header; `None` disables extraction.
    #[builder(required, default = Some(DEFAULT_REQUEST_ID_HEADER.to_string()))]
    pub request_id_header: Option<String>,
    #[builder(into, default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default = DEFAULT_SLOW_DOWN_INCREMENT)]
    pub slow_down_increment: Duration,
    /// Stop polling locally once `expires_in` elapses.
    #[builder(default)]
    pub enforce_expiry: bool,
}

impl ClientConfig {
    pub fn scope_list(&self) -> Vec<&str> {
        self.scopes.split_whitespace().collect()
    }

    /// Load from environment variables (reads `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|value: &String| !value.trim().is_empty());
        ConfigFile {
            issuer: value(ENV_ISSUER),
            client_id: value(ENV_CLIENT_ID),
            scopes: value(ENV_SCOPES),
            device_authorization_endpoint: value(ENV_DEVICE_AUTHORIZATION_ENDPOINT),
            token_endpoint: value(ENV_TOKEN_ENDPOINT),
            ..ConfigFile::default()
        }
        .into_config()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        file.into_config()
    }

    /// Load a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::InvalidFile(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Load the per-user configuration file.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path().ok_or(ConfigError::DefaultFileNotFound)?;
        if !path.is_file() {
            return Err(ConfigError::DefaultFileNotFound);
        }
        Self::from_file(path)
    }
}

/// Location of the per-user configuration file, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
        .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
}

/// On-disk shape; every field optional so missing ones can be reported together.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    issuer: Option<String>,
    client_id: Option<String>,
    scopes: Option<String>,
    device_authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    request_id_header: Option<String>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
    slow_down_increment_secs: Option<u64>,
    enforce_expiry: Option<bool>,
}

impl ConfigFile {
    fn into_config(self) -> Result<ClientConfig, ConfigError> {
        let mut missing = Vec::new();
        if self.issuer.is_none() {
            missing.push("issuer");
        }
        if self.client_id.is_none() {
            missing.push("client_id");
        }
        if self.scopes.is_none() {
            missing.push("scopes");
        }
        let (Some(issuer), Some(client_id), Some(scopes)) =
            (self.issuer, self.client_id, self.scopes)
        else {
            return Err(ConfigError::MissingValues(missing));
        };

        let request_id_header = match self.request_id_header {
            Some(header) if header.is_empty() => None,
            Some(header) => Some(header),
            None => Some(DEFAULT_REQUEST_ID_HEADER.to_string()),
        };

        Ok(ClientConfig::builder()
            .issuer(parse_url("issuer", &issuer)?)
            .client_id(client_id)
            .scopes(scopes)
            .maybe_device_authorization_endpoint(
                self.device_authorization_endpoint
                    .map(|url| parse_url("device_authorization_endpoint", &url))
                    .transpose()?,
            )
            .maybe_token_endpoint(
                self.token_endpoint
                    .map(|url| parse_url("token_endpoint", &url))
                    .transpose()?,
            )
            .request_id_header(request_id_header)
            .maybe_user_agent(self.user_agent)
            .maybe_timeout(self.timeout_secs.map(Duration::from_secs))
            .maybe_slow_down_increment(self.slow_down_increment_secs.map(Duration::from_secs))
            .maybe_enforce_expiry(self.enforce_expiry)
            .build())
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidValue {
        name,
        message: err.to_string(),
    })
}
