//! Core configuration types.
//!
//! [`Config`] carries every tunable knob of the core. Provider client
//! credentials live separately in [`ClientCredentials`] so they are never
//! written back out with the rest of the configuration.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL, DEFAULT_SCOPES, DEFAULT_SEARCH_LIMIT,
    EVENT_CHANNEL_CAPACITY, MAX_SEARCH_LIMIT, PROVIDER_TIMEOUT_SECS,
};

/// What to do when an expired access token cannot be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleTokenPolicy {
    /// Log the failure and hand out the stored (stale) token anyway.
    ///
    /// The provider call that follows will most likely be rejected, which
    /// surfaces as a provider failure at that call site.
    #[default]
    ReuseStale,
    /// Fail the caller immediately with a stale-credential error.
    FailFast,
}

/// OAuth client credentials registered with the provider.
#[derive(Clone, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for the Tunepool core.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    // Provider
    /// Base URL of the provider's accounts service (token endpoint, consent page).
    pub accounts_url: String,

    /// Base URL of the provider's Web API.
    pub api_url: String,

    /// Redirect URI registered with the provider for the authorization-code flow.
    pub redirect_uri: String,

    /// Space-separated OAuth scopes requested on the consent page.
    pub scopes: String,

    /// Timeout applied to every provider HTTP request (seconds).
    pub request_timeout_secs: u64,

    /// Number of tracks returned by a search.
    pub search_limit: u32,

    /// Behavior when an expired token cannot be refreshed.
    pub stale_token_policy: StaleTokenPolicy,

    // Events
    /// Capacity of the room event broadcast channel.
    pub event_channel_capacity: usize,

    /// Origin prefixes allowed to call the API from a browser.
    pub trusted_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            redirect_uri: "http://localhost:3000/create-room".to_string(),
            scopes: DEFAULT_SCOPES.to_string(),
            request_timeout_secs: PROVIDER_TIMEOUT_SECS,
            search_limit: DEFAULT_SEARCH_LIMIT,
            stale_token_policy: StaleTokenPolicy::default(),
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            trusted_origins: vec![
                "http://localhost".to_string(),
                "http://127.0.0.1".to_string(),
            ],
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.accounts_url.trim().is_empty() {
            return Err("accounts_url must not be empty".to_string());
        }
        if self.api_url.trim().is_empty() {
            return Err("api_url must not be empty".to_string());
        }
        if self.redirect_uri.trim().is_empty() {
            return Err("redirect_uri must not be empty".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be >= 1".to_string());
        }
        if self.search_limit == 0 || self.search_limit > MAX_SEARCH_LIMIT {
            return Err(format!("search_limit must be between 1 and {MAX_SEARCH_LIMIT}"));
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search_limit, 5);
        assert_eq!(config.stale_token_policy, StaleTokenPolicy::ReuseStale);
    }

    #[test]
    fn config_rejects_bad_values() {
        let mut config = Config::default();
        config.search_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search_limit = MAX_SEARCH_LIMIT + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.event_channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"search_limit": 10, "stale_token_policy": "fail_fast"}"#)
                .unwrap();
        assert_eq!(config.search_limit, 10);
        assert_eq!(config.stale_token_policy, StaleTokenPolicy::FailFast);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = ClientCredentials::new("id", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("id"));
        assert!(!rendered.contains("hunter2"));
    }
}
