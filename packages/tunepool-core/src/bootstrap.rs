//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::api::{AppState, ServerError, WsConnectionManager};
use crate::error::{TunepoolError, TunepoolResult};
use crate::events::{BroadcastEventBridge, EventEmitter, LoggingEventEmitter};
use crate::provider::{ProviderApi, ProviderClient};
use crate::room::RoomStore;
use crate::runtime::{Clock, SystemClock, TokioSpawner};
use crate::services::{
    AdvanceScheduler, Catalog, DeviceBinder, QueueAdvancer, QueueEditor, RoomRegistrar,
    TokenManager,
};
use crate::state::{ClientCredentials, Config};

/// Container for all bootstrapped services.
///
/// It's consumed by `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Room persistence.
    pub store: Arc<dyn RoomStore>,
    /// Concrete provider client (consent page URL).
    pub provider: Arc<ProviderClient>,
    pub tokens: Arc<TokenManager>,
    pub scheduler: Arc<AdvanceScheduler>,
    pub advancer: Arc<QueueAdvancer>,
    pub binder: Arc<DeviceBinder>,
    pub catalog: Arc<Catalog>,
    pub registrar: Arc<RoomRegistrar>,
    pub editor: Arc<QueueEditor>,
    /// Event bridge for emitting events to WebSocket members.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    pub config: Arc<RwLock<Config>>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown. Parent of every scheduled advance.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Builds the API state over these services.
    pub fn app_state(&self) -> Result<AppState, ServerError> {
        AppState::builder()
            .registrar(Arc::clone(&self.registrar))
            .advancer(Arc::clone(&self.advancer))
            .binder(Arc::clone(&self.binder))
            .catalog(Arc::clone(&self.catalog))
            .editor(Arc::clone(&self.editor))
            .provider(Arc::clone(&self.provider))
            .event_bridge(Arc::clone(&self.event_bridge))
            .ws_manager(Arc::clone(&self.ws_manager))
            .config(Arc::clone(&self.config))
            .build()
    }

    /// Re-arms advancements persisted before the last shutdown.
    pub async fn resume(&self) -> TunepoolResult<usize> {
        self.advancer.resume_scheduled().await
    }

    /// Initiates graceful shutdown of all services.
    ///
    /// Pending advancements are cancelled (their due times stay persisted so
    /// the next start resumes them), sockets are closed and the store flushed.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        let cancelled = self.scheduler.cancel_all();
        self.cancel_token.cancel();
        log::info!("[Bootstrap] Cancelled {} pending advance(s)", cancelled);

        let closed = self.ws_manager.close_all();
        if closed > 0 {
            log::info!("[Bootstrap] Closed {} WebSocket connection(s)", closed);
        }

        if let Err(e) = self.store.close().await {
            log::error!("[Bootstrap] Failed to close room store: {}", e);
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// # Errors
///
/// * [`TunepoolError::Configuration`] if `config` is invalid
/// * [`TunepoolError::Internal`] if the HTTP client cannot be built
pub fn bootstrap_services(
    config: &Config,
    credentials: ClientCredentials,
    store: Arc<dyn RoomStore>,
) -> TunepoolResult<BootstrappedServices> {
    config.validate().map_err(TunepoolError::Configuration)?;

    let client = Arc::new(
        ProviderClient::new(config, credentials)
            .map_err(|e| TunepoolError::Internal(format!("Failed to create HTTP client: {e}")))?,
    );
    let provider: Arc<dyn ProviderApi> = Arc::clone(&client) as Arc<dyn ProviderApi>;

    Ok(bootstrap_with_provider(
        config,
        client,
        provider,
        store,
        SystemClock::arc(),
    ))
}

/// Wires the services over an explicit provider and clock.
///
/// The wiring order follows the dependencies:
///
/// 1. Shared infrastructure (cancellation token, event bridge, scheduler)
/// 2. Token manager (store, provider, clock)
/// 3. Queue advancer (token manager, scheduler, event bridge)
/// 4. Edge services (binder, catalog, registrar, editor)
pub fn bootstrap_with_provider(
    config: &Config,
    client: Arc<ProviderClient>,
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn RoomStore>,
    clock: Arc<dyn Clock>,
) -> BootstrappedServices {
    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();

    let event_bridge = Arc::new(BroadcastEventBridge::with_clock(
        config.event_channel_capacity,
        Arc::clone(&clock),
    ));
    if log::log_enabled!(log::Level::Debug) {
        event_bridge.set_external_emitter(Arc::new(LoggingEventEmitter));
    }
    let emitter = Arc::clone(&event_bridge) as Arc<dyn EventEmitter>;

    let scheduler = Arc::new(AdvanceScheduler::new(
        spawner.clone(),
        cancel_token.clone(),
    ));

    let tokens = Arc::new(TokenManager::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        Arc::clone(&clock),
        config.stale_token_policy,
    ));

    let advancer = Arc::new(QueueAdvancer::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        Arc::clone(&tokens),
        Arc::clone(&emitter),
        Arc::clone(&scheduler),
        Arc::clone(&clock),
    ));

    let binder = Arc::new(DeviceBinder::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        Arc::clone(&tokens),
        Arc::clone(&emitter),
    ));
    let catalog = Arc::new(Catalog::new(
        Arc::clone(&provider),
        Arc::clone(&tokens),
        config.search_limit,
    ));
    let registrar = Arc::new(RoomRegistrar::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        Arc::clone(&clock),
    ));
    let editor = Arc::new(QueueEditor::new(Arc::clone(&store), emitter));

    log::info!(
        "[Bootstrap] Services wired (stale token policy: {:?}, search limit: {})",
        config.stale_token_policy,
        config.search_limit
    );

    BootstrappedServices {
        store,
        provider: client,
        tokens,
        scheduler,
        advancer,
        binder,
        catalog,
        registrar,
        editor,
        event_bridge,
        ws_manager: Arc::new(WsConnectionManager::new()),
        config: Arc::new(RwLock::new(config.clone())),
        spawner,
        cancel_token,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::RoomEvent;
    use crate::room::test_support::{room_with_queue, song};
    use crate::room::{FileRoomStore, MemoryRoomStore};
    use crate::runtime::ManualClock;
    use crate::services::test_support::{settle, MockProvider, T0};

    fn credentials() -> ClientCredentials {
        ClientCredentials::new("client-id", "client-secret")
    }

    fn wired(store: Arc<dyn RoomStore>) -> (BootstrappedServices, Arc<MockProvider>) {
        let config = Config::default();
        let client = Arc::new(ProviderClient::new(&config, credentials()).unwrap());
        let provider = Arc::new(MockProvider::default());
        let services = bootstrap_with_provider(
            &config,
            client,
            provider.clone(),
            store,
            ManualClock::at(T0),
        );
        (services, provider)
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = Config {
            search_limit: 0,
            ..Config::default()
        };
        let result = bootstrap_services(&config, credentials(), Arc::new(MemoryRoomStore::new()));
        assert!(matches!(result, Err(TunepoolError::Configuration(_))));
    }

    #[tokio::test]
    async fn default_config_bootstraps() {
        let services =
            bootstrap_services(&Config::default(), credentials(), Arc::new(MemoryRoomStore::new()))
                .unwrap();
        assert!(services.app_state().is_ok());
    }

    #[tokio::test]
    async fn events_reach_bridge_subscribers() {
        let (services, _) = wired(Arc::new(MemoryRoomStore::with_rooms([room_with_queue(
            "lobby",
            vec![],
        )])));
        let mut rx = services.event_bridge.subscribe();

        services.editor.add_song("lobby", song("A", 0)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.room, "lobby");
        assert_eq!(received.timestamp, T0);
        assert!(matches!(received.event, RoomEvent::SongAdded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_timers_and_keeps_due_times() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileRoomStore::open(dir.path()).unwrap());
        store
            .insert(room_with_queue("lobby", vec![song("A", 1), song("B", 0)]))
            .await
            .unwrap();
        let (services, provider) = wired(store);

        services.advancer.advance("lobby").await.unwrap();
        assert_eq!(services.scheduler.pending_count(), 1);

        services.shutdown().await;
        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;

        assert_eq!(provider.plays().len(), 1);
        assert_eq!(services.scheduler.pending_count(), 0);

        let reopened = FileRoomStore::open(dir.path()).unwrap();
        let room = reopened.find_by_name("lobby").await.unwrap().unwrap();
        assert_eq!(room.next_advance_at_ms, Some(T0 + 180_000));
        assert_eq!(room.song_queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_after_restart_plays_overdue_rooms() {
        let mut room = room_with_queue("lobby", vec![song("B", 0)]);
        room.next_advance_at_ms = Some(T0 - 1);
        let (services, provider) = wired(Arc::new(MemoryRoomStore::with_rooms([room])));

        assert_eq!(services.resume().await.unwrap(), 1);
        settle().await;

        assert_eq!(provider.plays().len(), 1);
        assert_eq!(provider.plays()[0].uri, "B");
    }
}
