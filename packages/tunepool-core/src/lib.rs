//! Tunepool Core - shared room queues driving a streaming provider's playback.
//!
//! Members of a named room search the provider's catalog, add tracks to a
//! shared queue and like them. The room's bound device plays the most-liked
//! track, and the queue advances by itself when each track ends. The room's
//! OAuth access token is refreshed transparently before it expires.
//!
//! # Architecture
//!
//! - [`room`]: Room/song records and the [`RoomStore`](room::RoomStore) persistence trait
//! - [`provider`]: Streaming provider Web API client and its traits
//! - [`services`]: Token manager, queue advancer, scheduler and the edge services
//! - [`events`]: Room events and their WebSocket fan-out
//! - [`api`]: HTTP/WebSocket surface
//! - [`bootstrap`]: Composition root
//! - [`state`]: Configuration
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`TaskSpawner`](runtime::TaskSpawner) and [`Clock`](runtime::Clock): runtime and time
//! - [`EventEmitter`](events::EventEmitter): publishing room events
//! - [`RoomStore`](room::RoomStore): room persistence
//! - [`ProviderApi`](provider::ProviderApi): the streaming provider

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod provider;
pub mod room;
pub mod runtime;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{ErrorCode, TunepoolError, TunepoolResult};
pub use events::{BroadcastEvent, BroadcastEventBridge, EventEmitter, RoomEvent};
pub use runtime::{Clock, SystemClock, TaskSpawner, TokioSpawner};
pub use state::{ClientCredentials, Config, StaleTokenPolicy};
pub use utils::{now_millis, validate_room_name, RoomNameError};

// Re-export domain types
pub use provider::{Device, ProviderApi, ProviderClient, ProviderError, TrackSummary};
pub use room::{FileRoomStore, MemoryRoomStore, Room, RoomStore, RoomSummary, Song};

// Re-export service types
pub use services::{AdvanceOutcome, OperationResult, QueueAdvancer, TokenManager};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_with_provider, BootstrappedServices};

// Re-export API types
pub use api::{bind_listener, serve, start_server, AppState, AppStateBuilder, ServerError, WsConnectionManager};
