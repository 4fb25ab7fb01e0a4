//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tunepool_core::{ClientCredentials, StaleTokenPolicy};

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = first free port in the default range).
    /// Override: `TUNEPOOL_BIND_PORT`
    pub bind_port: u16,

    /// Provider OAuth client id.
    /// Override: `TUNEPOOL_CLIENT_ID`
    pub client_id: Option<String>,

    /// Provider OAuth client secret.
    /// Override: `TUNEPOOL_CLIENT_SECRET`
    pub client_secret: Option<String>,

    /// Redirect URI registered with the provider.
    /// Override: `TUNEPOOL_REDIRECT_URI`
    pub redirect_uri: Option<String>,

    /// Provider accounts base URL (defaults to the public one).
    pub accounts_url: Option<String>,

    /// Provider Web API base URL (defaults to the public one).
    pub api_url: Option<String>,

    /// Tracks returned per search.
    pub search_limit: Option<u32>,

    /// Provider request timeout in seconds.
    pub request_timeout_secs: Option<u64>,

    /// What to do when an expired token cannot be refreshed.
    pub stale_token_policy: StaleTokenPolicy,

    /// Browser origins allowed to call the API.
    pub trusted_origins: Option<Vec<String>>,

    /// Directory for the room snapshot. Rooms are kept in memory only when unset.
    /// Override: `TUNEPOOL_DATA_DIR`
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 3000,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            accounts_url: None,
            api_url: None,
            search_limit: None,
            request_timeout_secs: None,
            stale_token_policy: StaleTokenPolicy::default(),
            trusted_origins: None,
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TUNEPOOL_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("TUNEPOOL_CLIENT_ID") {
            self.client_id = Some(val);
        }

        if let Ok(val) = std::env::var("TUNEPOOL_CLIENT_SECRET") {
            self.client_secret = Some(val);
        }

        if let Ok(val) = std::env::var("TUNEPOOL_REDIRECT_URI") {
            self.redirect_uri = Some(val);
        }

        // Note: TUNEPOOL_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Provider client credentials; both halves are required.
    pub fn credentials(&self) -> Result<ClientCredentials> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok(ClientCredentials::new(id, secret))
            }
            _ => bail!(
                "Provider client credentials missing. Set client_id and client_secret \
                 in the config file or TUNEPOOL_CLIENT_ID and TUNEPOOL_CLIENT_SECRET."
            ),
        }
    }

    /// Converts to tunepool-core's Config type.
    pub fn to_core_config(&self) -> tunepool_core::Config {
        let defaults = tunepool_core::Config::default();
        tunepool_core::Config {
            preferred_port: self.bind_port,
            accounts_url: self.accounts_url.clone().unwrap_or(defaults.accounts_url),
            api_url: self.api_url.clone().unwrap_or(defaults.api_url),
            redirect_uri: self.redirect_uri.clone().unwrap_or(defaults.redirect_uri),
            search_limit: self.search_limit.unwrap_or(defaults.search_limit),
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            stale_token_policy: self.stale_token_policy,
            trusted_origins: self
                .trusted_origins
                .clone()
                .unwrap_or(defaults.trusted_origins),
            ..defaults
        }
    }
}
