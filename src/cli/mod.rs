//! CLI entry point for device-grant.

pub mod auth;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::auth::DEFAULT_PROFILE;
use crate::config::{ClientConfig, ConfigError};

/// OAuth2 Device Authorization Grant client
#[derive(Parser, Debug)]
#[command(name = "device-grant", version, about = "OAuth2 device authorization CLI")]
pub struct Cli {
    /// Configuration file (TOML). Defaults to environment variables, then
    /// the per-user config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Token profile name
    #[arg(short, long, global = true, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the device flow and store the resulting token
    Login(LoginArgs),
    /// Show the stored token for the configured client
    Status,
    /// Remove the stored token
    Logout,
}

/// Arguments for `device-grant login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Override the configured scopes
    #[arg(short, long)]
    pub scopes: Option<String>,

    /// Give up locally once the device code expires
    #[arg(long)]
    pub enforce_expiry: bool,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Explicit file, else environment, else the per-user config file.
    pub fn load_config(&self) -> Result<ClientConfig, ConfigError> {
        if let Some(path) = &self.config {
            return ClientConfig::from_file(path);
        }
        match ClientConfig::from_env() {
            Ok(config) => Ok(config),
            Err(ConfigError::MissingValues(missing)) => {
                tracing::debug!(?missing, "Environment incomplete, trying config file");
                ClientConfig::load_default()
            }
            Err(err) => Err(err),
        }
    }
}
