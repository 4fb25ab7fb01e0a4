//! Bridge implementation that maps domain events to broadcast transport.
//!
//! The [`BroadcastEventBridge`] lives at the boundary between domain services
//! and transport concerns, mapping room events to the WebSocket broadcast
//! channel.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BroadcastEvent, RoomEvent};
use crate::runtime::{Clock, SystemClock};

/// Bridges room events to the WebSocket broadcast channel.
///
/// Every event for every room travels on one channel; WebSocket handlers
/// filter by room name on the receiving side.
///
/// The bridge also forwards to an optional external emitter that can be set
/// after construction (the server uses it for debug logging).
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    clock: Arc<dyn Clock>,
    /// Optional external emitter for additional event delivery
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, SystemClock::arc())
    }

    /// Creates a new bridge stamping events with `clock`.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            clock,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that receives every event before broadcast.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    ///
    /// WebSocket handlers use this to subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn publish(&self, room: &str, event: RoomEvent) {
        if let Some(ref emitter) = *self.external_emitter.read() {
            emitter.publish(room, event.clone());
        }
        let envelope = BroadcastEvent::new(room, event, self.clock.now_millis());
        if let Err(e) = self.tx.send(envelope) {
            log::trace!("[EventBridge] No broadcast receivers: {}", e);
        }
    }
}
