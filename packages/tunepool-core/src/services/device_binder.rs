//! Binds a room to a provider playback device.

use std::sync::Arc;

use super::token_manager::TokenManager;
use crate::error::{TunepoolError, TunepoolResult};
use crate::events::{EventEmitter, RoomEvent};
use crate::provider::{Device, ProviderApi};
use crate::room::{RoomStore, RoomUpdate};

pub struct DeviceBinder {
    store: Arc<dyn RoomStore>,
    provider: Arc<dyn ProviderApi>,
    tokens: Arc<TokenManager>,
    emitter: Arc<dyn EventEmitter>,
}

impl DeviceBinder {
    pub fn new(
        store: Arc<dyn RoomStore>,
        provider: Arc<dyn ProviderApi>,
        tokens: Arc<TokenManager>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            store,
            provider,
            tokens,
            emitter,
        }
    }

    /// Transfers playback to `device_id` and records it as the room's device.
    ///
    /// The binding is persisted only after the provider accepted the
    /// transfer, so a failed transfer leaves the previous binding in place.
    pub async fn bind_device(&self, room: &str, device_id: &str) -> TunepoolResult<()> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(TunepoolError::InvalidRequest(
                "device id must not be empty".to_string(),
            ));
        }

        let provider = &self.provider;
        self.tokens
            .call_with_token(room, move |token| async move {
                provider.transfer_playback(&token, device_id).await
            })
            .await?;

        self.store
            .update(room, RoomUpdate::device(device_id.to_string()))
            .await?;

        log::info!("[DeviceBinder] Room '{}' bound to device {}", room, device_id);
        self.emitter.publish(
            room,
            RoomEvent::DeviceBound {
                device_id: device_id.to_string(),
            },
        );
        Ok(())
    }

    /// Lists the devices the room's account can play on.
    pub async fn list_devices(&self, room: &str) -> TunepoolResult<Vec<Device>> {
        let provider = &self.provider;
        let devices = self
            .tokens
            .call_with_token(room, move |token| async move {
                provider.list_devices(&token).await
            })
            .await?;
        log::debug!(
            "[DeviceBinder] Room '{}' has {} selectable device(s)",
            room,
            devices.len()
        );
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_support::room_with_queue;
    use crate::services::test_support::{status_error, Harness};

    fn unbound(name: &str) -> crate::room::Room {
        let mut room = room_with_queue(name, vec![]);
        room.device_id = None;
        room
    }

    #[tokio::test]
    async fn bind_transfers_then_persists() {
        let h = Harness::new(vec![unbound("lobby")]);

        h.binder.bind_device("lobby", "kitchen").await.unwrap();

        assert_eq!(h.provider.transfers(), vec!["kitchen".to_string()]);
        assert_eq!(h.room("lobby").await.device_id.as_deref(), Some("kitchen"));
        assert_eq!(
            h.emitter.named("device_bound"),
            vec![RoomEvent::DeviceBound {
                device_id: "kitchen".into()
            }]
        );
    }

    #[tokio::test]
    async fn failed_transfer_keeps_previous_binding() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![])]);
        h.provider.fail_next_transfer(status_error(404));

        let err = h.binder.bind_device("lobby", "kitchen").await.unwrap_err();

        assert!(matches!(err, TunepoolError::Provider(_)));
        assert_eq!(h.room("lobby").await.device_id.as_deref(), Some("device-1"));
        assert!(h.emitter.events().is_empty());
    }

    #[tokio::test]
    async fn blank_device_is_rejected_without_provider_call() {
        let h = Harness::new(vec![unbound("lobby")]);

        let err = h.binder.bind_device("lobby", "  ").await.unwrap_err();

        assert!(matches!(err, TunepoolError::InvalidRequest(_)));
        assert!(h.provider.transfers().is_empty());
    }

    #[tokio::test]
    async fn bind_unknown_room_is_lookup_failure() {
        let h = Harness::new(vec![]);
        let err = h.binder.bind_device("ghost", "kitchen").await.unwrap_err();
        assert!(matches!(err, TunepoolError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn lists_provider_devices() {
        let h = Harness::new(vec![unbound("lobby")]);
        h.provider.set_devices(vec![Device {
            id: "kitchen".into(),
            name: "Kitchen".into(),
            device_type: "Speaker".into(),
        }]);

        let devices = h.binder.list_devices("lobby").await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Kitchen");
    }
}
