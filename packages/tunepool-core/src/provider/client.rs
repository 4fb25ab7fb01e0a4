//! Provider Web API client.
//!
//! One method per consumed endpoint. Idempotent calls are wrapped in
//! [`with_retry`]; the authorization-code exchange is not, since a code can
//! only be redeemed once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::http::{check_status, read_json, ProviderError, ProviderResult};
use super::retry::with_retry;
use super::traits::{ProviderAuth, ProviderCatalog, ProviderPlayback};
use super::types::{
    Device, RawDevice, RawDeviceList, RawProfile, RawSearchResponse, TokenGrant, TrackSummary,
};
use crate::state::{ClientCredentials, Config};

/// reqwest-backed implementation of the provider traits.
#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
    accounts_url: String,
    api_url: String,
    redirect_uri: String,
    scopes: String,
    credentials: ClientCredentials,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("http", &"Client")
            .field("accounts_url", &self.accounts_url)
            .field("api_url", &self.api_url)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl ProviderClient {
    /// Creates a client from the core configuration.
    ///
    /// Every request carries the configured timeout.
    pub fn new(config: &Config, credentials: ClientCredentials) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            accounts_url: config.accounts_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            credentials,
        })
    }

    /// Builds the consent page URL users are redirected to before room creation.
    pub fn authorize_url(&self) -> ProviderResult<String> {
        let base = format!("{}/authorize", self.accounts_url);
        let url = Url::parse_with_params(
            &base,
            &[
                ("response_type", "code"),
                ("client_id", self.credentials.client_id.as_str()),
                ("scope", self.scopes.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| ProviderError::InvalidUrl(format!("{base}: {e}")))?;
        Ok(url.into())
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn token_grant(&self, form: &[(&str, &str)]) -> ProviderResult<TokenGrant> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(form)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let response = self
            .http
            .get(self.api(path))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn put_json(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> ProviderResult<()> {
        let response = self
            .http
            .put(self.api(path))
            .bearer_auth(access_token)
            .query(query)
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Query for the play endpoint; no `device_id` means "the active device".
fn device_query(device_id: Option<&str>) -> Vec<(&'static str, &str)> {
    device_id.map(|id| ("device_id", id)).into_iter().collect()
}

#[async_trait]
impl ProviderAuth for ProviderClient {
    async fn exchange_code(&self, code: &str) -> ProviderResult<TokenGrant> {
        log::info!("[Provider] Exchanging authorization code");
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<TokenGrant> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        with_retry("RefreshToken", || self.token_grant(&form)).await
    }

    async fn current_user_email(&self, access_token: &str) -> ProviderResult<Option<String>> {
        let profile: RawProfile =
            with_retry("Profile", || self.get_json(access_token, "/me", &[])).await?;
        Ok(profile.email)
    }
}

#[async_trait]
impl ProviderPlayback for ProviderClient {
    async fn list_devices(&self, access_token: &str) -> ProviderResult<Vec<Device>> {
        let list: RawDeviceList = with_retry("Devices", || {
            self.get_json(access_token, "/me/player/devices", &[])
        })
        .await?;
        Ok(list
            .devices
            .into_iter()
            .filter_map(RawDevice::into_selectable)
            .collect())
    }

    async fn transfer_playback(&self, access_token: &str, device_id: &str) -> ProviderResult<()> {
        log::info!("[Provider] Transferring playback to device {}", device_id);
        let body = json!({ "device_ids": [device_id] });
        with_retry("TransferPlayback", || {
            self.put_json(access_token, "/me/player", &[], &body)
        })
        .await
    }

    async fn start_playback(
        &self,
        access_token: &str,
        device_id: Option<&str>,
        uri: &str,
    ) -> ProviderResult<()> {
        log::info!(
            "[Provider] Play: uri={}, device={}",
            uri,
            device_id.unwrap_or("<active>")
        );
        let query = device_query(device_id);
        let body = json!({ "uris": [uri] });
        with_retry("Play", || {
            self.put_json(access_token, "/me/player/play", &query, &body)
        })
        .await
    }
}

#[async_trait]
impl ProviderCatalog for ProviderClient {
    async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        limit: u32,
    ) -> ProviderResult<Vec<TrackSummary>> {
        let limit = limit.to_string();
        let params = [("q", query), ("type", "track"), ("limit", limit.as_str())];
        let response: RawSearchResponse =
            with_retry("Search", || self.get_json(access_token, "/search", &params)).await?;
        Ok(response
            .tracks
            .items
            .into_iter()
            .map(TrackSummary::from)
            .collect())
    }
}
