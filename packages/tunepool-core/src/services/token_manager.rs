//! Keeps each room's provider access token usable.
//!
//! Every provider call made on behalf of a room goes through
//! [`TokenManager::ensure_valid_token`] or [`TokenManager::call_with_token`].
//! An expired token is refreshed (and the new one persisted) before it is
//! handed out; a token the provider rejects anyway gets one forced refresh.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{TunepoolError, TunepoolResult};
use crate::protocol_constants::TOKEN_LIFETIME_PERCENT;
use crate::provider::{ProviderApi, ProviderError, ProviderResult};
use crate::room::{Room, RoomStore, RoomUpdate};
use crate::runtime::Clock;
use crate::state::StaleTokenPolicy;

/// Computes the stored expiry for a freshly granted token.
///
/// Only [`TOKEN_LIFETIME_PERCENT`] of the stated lifetime is used, so
/// `expires_in = 3600` at `now_ms = T` gives `T + 3_528_000`.
#[must_use]
pub fn token_expiry(now_ms: u64, expires_in_secs: u64) -> u64 {
    let usable_ms = expires_in_secs
        .saturating_mul(1000)
        .saturating_mul(TOKEN_LIFETIME_PERCENT)
        / 100;
    now_ms.saturating_add(usable_ms)
}

/// Ensures a room has a non-expired bearer token before provider calls.
pub struct TokenManager {
    store: Arc<dyn RoomStore>,
    provider: Arc<dyn ProviderApi>,
    clock: Arc<dyn Clock>,
    policy: StaleTokenPolicy,
    /// Per-room refresh locks so concurrent callers trigger a single refresh.
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn RoomStore>,
        provider: Arc<dyn ProviderApi>,
        clock: Arc<dyn Clock>,
        policy: StaleTokenPolicy,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            policy,
            refresh_locks: DashMap::new(),
        }
    }

    fn refresh_lock(&self, room: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .entry(room.to_string())
            .or_default()
            .clone()
    }

    async fn load(&self, room: &str) -> TunepoolResult<Room> {
        self.store
            .find_by_name(room)
            .await?
            .ok_or_else(|| TunepoolError::RoomNotFound(room.to_string()))
    }

    /// Returns a bearer token for `room`, refreshing it first if it has expired.
    ///
    /// A token is expired once the current time is strictly past its stored
    /// expiry. If the refresh fails, the outcome follows the configured
    /// [`StaleTokenPolicy`].
    ///
    /// # Errors
    /// * [`TunepoolError::RoomNotFound`] if the room does not exist
    /// * [`TunepoolError::StaleCredential`] if refresh failed under `FailFast`
    pub async fn ensure_valid_token(&self, room: &str) -> TunepoolResult<String> {
        let record = self.load(room).await?;
        if !record.token_expired(self.clock.now_millis()) {
            return Ok(record.access_token);
        }

        let lock = self.refresh_lock(room);
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        let record = self.load(room).await?;
        if !record.token_expired(self.clock.now_millis()) {
            return Ok(record.access_token);
        }

        match self.refresh(&record).await {
            Ok(token) => Ok(token),
            Err(e) => {
                log::warn!(
                    "[TokenManager] Token refresh failed for room '{}': {}",
                    room,
                    e
                );
                match self.policy {
                    StaleTokenPolicy::ReuseStale => Ok(record.access_token),
                    StaleTokenPolicy::FailFast => Err(TunepoolError::StaleCredential(format!(
                        "refresh failed for room '{room}': {e}"
                    ))),
                }
            }
        }
    }

    /// Refreshes the token for `room` regardless of its stored expiry.
    ///
    /// Used after the provider rejects a token that looked valid locally.
    /// Refresh errors are returned as-is rather than governed by the policy.
    pub async fn force_refresh(&self, room: &str) -> TunepoolResult<String> {
        let lock = self.refresh_lock(room);
        let _guard = lock.lock().await;

        let record = self.load(room).await?;
        self.refresh(&record).await.map_err(TunepoolError::from)
    }

    /// Runs a provider call with a valid token for `room`.
    ///
    /// If the provider answers 401, the token is force-refreshed and the call
    /// is retried exactly once with the new token.
    pub async fn call_with_token<T, F, Fut>(&self, room: &str, op: F) -> TunepoolResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let token = self.ensure_valid_token(room).await?;
        match op(token).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_unauthorized() => {
                log::warn!(
                    "[TokenManager] Provider rejected token for room '{}', forcing refresh",
                    room
                );
                let token = self
                    .force_refresh(room)
                    .await
                    .map_err(|e| TunepoolError::StaleCredential(e.to_string()))?;
                op(token).await.map_err(TunepoolError::from)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Performs the refresh grant and persists the result.
    ///
    /// A failed persist is logged; the fresh token is still returned since it
    /// is valid with the provider either way.
    async fn refresh(&self, record: &Room) -> Result<String, ProviderError> {
        log::info!("[TokenManager] Refreshing token for room '{}'", record.name);

        let grant = self.provider.refresh_token(&record.refresh_token).await?;
        let expiry = token_expiry(self.clock.now_millis(), grant.expires_in);

        let update = RoomUpdate::credentials(grant.access_token.clone(), grant.refresh_token, expiry);
        if let Err(e) = self.store.update(&record.name, update).await {
            log::error!(
                "[TokenManager] Failed to persist refreshed token for room '{}': {}",
                record.name,
                e
            );
        }

        Ok(grant.access_token)
    }
}
