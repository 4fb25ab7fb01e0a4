//! Event system for real-time room notifications.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to publish room events
//! - [`BroadcastEventBridge`] for WebSocket transport
//! - [`RoomEvent`] and the [`BroadcastEvent`] envelope sent to clients

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter};

#[cfg(test)]
pub(crate) use emitter::RecordingEventEmitter;

use serde::Serialize;

use crate::room::Song;

/// Events published to the members of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// A song started playing and left the queue.
    SongPlayed {
        /// The played song's uri.
        uri: String,
    },
    /// A song was appended to the queue.
    SongAdded { song: Song },
    /// A queued song's likes changed.
    SongLiked { uri: String, likes: i64 },
    /// Playback was transferred to a new device.
    DeviceBound {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
}

impl RoomEvent {
    /// Wire name of the event, matching the serialized `type` tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SongPlayed { .. } => "song_played",
            Self::SongAdded { .. } => "song_added",
            Self::SongLiked { .. } => "song_liked",
            Self::DeviceBound { .. } => "device_bound",
        }
    }
}

/// Envelope carried on the broadcast channel: one room event, addressed to a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastEvent {
    pub room: String,
    pub event: RoomEvent,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl BroadcastEvent {
    pub fn new(room: impl Into<String>, event: RoomEvent, timestamp: u64) -> Self {
        Self {
            room: room.into(),
            event,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_played_serializes_with_type_tag() {
        let event = BroadcastEvent::new(
            "lobby",
            RoomEvent::SongPlayed {
                uri: "spotify:track:B".into(),
            },
            1_000,
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["room"], "lobby");
        assert_eq!(json["event"]["type"], "song_played");
        assert_eq!(json["event"]["uri"], "spotify:track:B");
        assert_eq!(json["timestamp"], 1_000);
    }

    #[test]
    fn name_matches_serialized_tag() {
        let events = [
            RoomEvent::SongPlayed { uri: "u".into() },
            RoomEvent::SongLiked {
                uri: "u".into(),
                likes: 1,
            },
            RoomEvent::DeviceBound {
                device_id: "d".into(),
            },
            RoomEvent::SongAdded {
                song: crate::room::test_support::song("u", 0),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn device_bound_uses_camel_case_field() {
        let json = serde_json::to_value(RoomEvent::DeviceBound {
            device_id: "kitchen".into(),
        })
        .unwrap();
        assert_eq!(json["deviceId"], "kitchen");
    }
}
