//! Room creation from an OAuth authorization code, and room lookup.

use std::sync::Arc;

use super::token_manager::token_expiry;
use crate::error::{TunepoolError, TunepoolResult};
use crate::provider::ProviderApi;
use crate::room::{Room, RoomStore, RoomSummary};
use crate::runtime::Clock;
use crate::utils::validate_room_name;

pub struct RoomRegistrar {
    store: Arc<dyn RoomStore>,
    provider: Arc<dyn ProviderApi>,
    clock: Arc<dyn Clock>,
}

impl RoomRegistrar {
    pub fn new(
        store: Arc<dyn RoomStore>,
        provider: Arc<dyn ProviderApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
        }
    }

    /// Creates a room owned by whoever authorized `code`.
    ///
    /// The name is checked before the code is exchanged, since an
    /// authorization code can only be redeemed once.
    ///
    /// # Errors
    /// * [`TunepoolError::InvalidRequest`] for a bad name or blank code
    /// * [`TunepoolError::RoomAlreadyExists`] if the name is taken
    /// * Provider errors from the code exchange
    pub async fn create_room(&self, name: &str, code: &str) -> TunepoolResult<Room> {
        let name = validate_room_name(name)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(TunepoolError::InvalidRequest(
                "authorization code must not be empty".to_string(),
            ));
        }
        if self.store.find_by_name(name).await?.is_some() {
            return Err(TunepoolError::RoomAlreadyExists(name.to_string()));
        }

        let grant = self.provider.exchange_code(code).await?;
        let refresh_token = grant.refresh_token.ok_or_else(|| {
            TunepoolError::Provider("authorization grant carried no refresh token".to_string())
        })?;

        let owner_email = match self.provider.current_user_email(&grant.access_token).await {
            Ok(email) => email,
            Err(e) => {
                log::warn!(
                    "[RoomRegistrar] Could not read owner email for room '{}': {}",
                    name,
                    e
                );
                None
            }
        };

        let expiry = token_expiry(self.clock.now_millis(), grant.expires_in);
        let room = Room::new(name, owner_email, grant.access_token, refresh_token, expiry);
        self.store.insert(room.clone()).await?;

        log::info!(
            "[RoomRegistrar] Created room '{}' (owner: {})",
            name,
            room.owner_email.as_deref().unwrap_or("unknown")
        );
        Ok(room)
    }

    /// Loads a room by name.
    pub async fn room(&self, name: &str) -> TunepoolResult<Room> {
        self.store
            .find_by_name(name)
            .await?
            .ok_or_else(|| TunepoolError::RoomNotFound(name.to_string()))
    }

    /// Public view of a room, without credentials.
    pub async fn summary(&self, name: &str) -> TunepoolResult<RoomSummary> {
        Ok(self.room(name).await?.summary())
    }
}
