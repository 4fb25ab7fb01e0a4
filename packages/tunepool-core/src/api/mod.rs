//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::events::BroadcastEventBridge;
use crate::protocol_constants::DEFAULT_PORT_RANGE;
use crate::provider::ProviderClient;
use crate::services::{Catalog, DeviceBinder, QueueAdvancer, QueueEditor, RoomRegistrar};
use crate::state::Config;

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    /// `AppStateBuilder::build` was called without a required component.
    #[error("Missing application state component: {0}")]
    MissingComponent(&'static str),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Creates and looks up rooms.
    pub registrar: Arc<RoomRegistrar>,
    /// Plays, stops and schedules room queues.
    pub advancer: Arc<QueueAdvancer>,
    /// Device listing and binding.
    pub binder: Arc<DeviceBinder>,
    /// Track search.
    pub catalog: Arc<Catalog>,
    /// Queue additions and likes.
    pub editor: Arc<QueueEditor>,
    /// Provider client, for building the consent page URL.
    pub provider: Arc<ProviderClient>,
    /// Fans room events out to WebSocket members.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Application configuration.
    pub config: Arc<RwLock<Config>>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    registrar: Option<Arc<RoomRegistrar>>,
    advancer: Option<Arc<QueueAdvancer>>,
    binder: Option<Arc<DeviceBinder>>,
    catalog: Option<Arc<Catalog>>,
    editor: Option<Arc<QueueEditor>>,
    provider: Option<Arc<ProviderClient>>,
    event_bridge: Option<Arc<BroadcastEventBridge>>,
    ws_manager: Option<Arc<WsConnectionManager>>,
    config: Option<Arc<RwLock<Config>>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrar(mut self, registrar: Arc<RoomRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn advancer(mut self, advancer: Arc<QueueAdvancer>) -> Self {
        self.advancer = Some(advancer);
        self
    }

    pub fn binder(mut self, binder: Arc<DeviceBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn editor(mut self, editor: Arc<QueueEditor>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn provider(mut self, provider: Arc<ProviderClient>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn event_bridge(mut self, bridge: Arc<BroadcastEventBridge>) -> Self {
        self.event_bridge = Some(bridge);
        self
    }

    /// Sets the WebSocket connection manager. A fresh one is used if unset.
    pub fn ws_manager(mut self, manager: Arc<WsConnectionManager>) -> Self {
        self.ws_manager = Some(manager);
        self
    }

    pub fn config(mut self, config: Arc<RwLock<Config>>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState`.
    ///
    /// # Errors
    /// [`ServerError::MissingComponent`] naming the first unset required field.
    pub fn build(self) -> Result<AppState, ServerError> {
        Ok(AppState {
            registrar: self
                .registrar
                .ok_or(ServerError::MissingComponent("registrar"))?,
            advancer: self
                .advancer
                .ok_or(ServerError::MissingComponent("advancer"))?,
            binder: self.binder.ok_or(ServerError::MissingComponent("binder"))?,
            catalog: self.catalog.ok_or(ServerError::MissingComponent("catalog"))?,
            editor: self.editor.ok_or(ServerError::MissingComponent("editor"))?,
            provider: self
                .provider
                .ok_or(ServerError::MissingComponent("provider"))?,
            event_bridge: self
                .event_bridge
                .ok_or(ServerError::MissingComponent("event_bridge"))?,
            ws_manager: self.ws_manager.unwrap_or_default(),
            config: self.config.ok_or(ServerError::MissingComponent("config"))?,
        })
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Binds the configured port, or the first free port in the default range.
pub async fn bind_listener(
    preferred_port: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    if preferred_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
        Ok((preferred_port, tokio::net::TcpListener::bind(&addr).await?))
    } else {
        let (start, end) = DEFAULT_PORT_RANGE;
        find_available_port(start, end).await
    }
}

/// Serves the API on `listener` until `shutdown` is cancelled.
///
/// Open WebSocket connections are force-closed when shutdown begins so the
/// graceful drain does not wait on them.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let ws_manager = Arc::clone(&state.ws_manager);
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.cancelled().await;
        ws_manager.close_all();
        log::info!("[Server] Shutdown requested, draining connections");
    })
    .await?;
    Ok(())
}

/// Starts the HTTP server on the configured or auto-discovered port.
pub async fn start_server(state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let (port, listener) = bind_listener(preferred_port).await?;

    log::info!("[Server] Listening on http://0.0.0.0:{}", port);
    serve(listener, state, shutdown).await
}
