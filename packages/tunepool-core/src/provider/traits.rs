//! Trait abstractions for provider operations.
//!
//! Services depend on these traits rather than on [`ProviderClient`](super::ProviderClient),
//! so tests can substitute hand-written fakes.

use async_trait::async_trait;

use super::http::ProviderResult;
use super::types::{Device, TokenGrant, TrackSummary};

/// OAuth token grants and identity lookup.
#[async_trait]
pub trait ProviderAuth: Send + Sync {
    /// Exchanges an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> ProviderResult<TokenGrant>;

    /// Obtains a new access token using a refresh token.
    ///
    /// The grant carries a `refresh_token` only if the provider rotated it.
    async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<TokenGrant>;

    /// Reads the account email for the token's owner, if the provider shares one.
    async fn current_user_email(&self, access_token: &str) -> ProviderResult<Option<String>>;
}

/// Device listing and playback control.
#[async_trait]
pub trait ProviderPlayback: Send + Sync {
    /// Lists devices that can be targeted for playback.
    async fn list_devices(&self, access_token: &str) -> ProviderResult<Vec<Device>>;

    /// Transfers the account's playback to `device_id`.
    async fn transfer_playback(&self, access_token: &str, device_id: &str) -> ProviderResult<()>;

    /// Starts playing `uri`.
    ///
    /// # Arguments
    /// * `device_id` - Target device; `None` lets the provider use the active device
    async fn start_playback(
        &self,
        access_token: &str,
        device_id: Option<&str>,
        uri: &str,
    ) -> ProviderResult<()>;
}

/// Catalog search.
#[async_trait]
pub trait ProviderCatalog: Send + Sync {
    /// Searches tracks matching `query`, returning at most `limit` results.
    async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        limit: u32,
    ) -> ProviderResult<Vec<TrackSummary>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Traits (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Combined trait for all provider operations.
///
/// Used by `AppState` and the services to share one client.
pub trait ProviderApi: ProviderAuth + ProviderPlayback + ProviderCatalog {}

/// Blanket implementation for any type implementing all traits.
impl<T: ProviderAuth + ProviderPlayback + ProviderCatalog> ProviderApi for T {}
