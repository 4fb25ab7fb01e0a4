//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, enabling testing and alternative transport implementations.

use super::RoomEvent;

/// Trait for publishing room events without knowledge of transport.
///
/// Publishing is fire-and-forget: delivery failures never reach the caller.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn on_played(&self, room: &str, uri: String) {
///         self.emitter.publish(room, RoomEvent::SongPlayed { uri });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Publishes `event` to every member of `room`.
    fn publish(&self, room: &str, event: RoomEvent);
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn publish(&self, room: &str, event: RoomEvent) {
        tracing::debug!(room, kind = event.name(), ?event, "room_event");
    }
}

/// Test emitter that records every published event.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingEventEmitter {
    events: parking_lot::Mutex<Vec<(String, RoomEvent)>>,
}

#[cfg(test)]
impl RecordingEventEmitter {
    pub fn events(&self) -> Vec<(String, RoomEvent)> {
        self.events.lock().clone()
    }

    /// Events of the given kind, e.g. `"song_played"`.
    pub fn named(&self, name: &str) -> Vec<RoomEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| e.name() == name)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[cfg(test)]
impl EventEmitter for RecordingEventEmitter {
    fn publish(&self, room: &str, event: RoomEvent) {
        self.events.lock().push((room.to_string(), event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn recording_emitter_tracks_events() {
        let emitter = Arc::new(RecordingEventEmitter::default());

        emitter.publish("lobby", RoomEvent::SongPlayed { uri: "a".into() });
        emitter.publish(
            "lobby",
            RoomEvent::SongLiked {
                uri: "b".into(),
                likes: 3,
            },
        );
        emitter.publish("den", RoomEvent::SongPlayed { uri: "c".into() });

        assert_eq!(emitter.events().len(), 3);
        assert_eq!(emitter.named("song_played").len(), 2);
        assert_eq!(emitter.events()[2].0, "den");
    }

    #[test]
    fn logging_emitter_accepts_events() {
        LoggingEventEmitter.publish("lobby", RoomEvent::SongPlayed { uri: "a".into() });
    }
}
