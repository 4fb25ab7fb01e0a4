//! WebSocket handler for room members.
//!
//! A member connects to `/ws/{room}`, receives the room's current state, then
//! every event published to that room. Members may like songs over the same
//! socket and must send a heartbeat at least every
//! [`WS_HEARTBEAT_TIMEOUT_SECS`].

use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::AppState;
use crate::error::TunepoolResult;
use crate::events::BroadcastEvent;
use crate::protocol_constants::{WS_HEARTBEAT_CHECK_INTERVAL_SECS, WS_HEARTBEAT_TIMEOUT_SECS};
use crate::room::RoomSummary;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Message Types
// ─────────────────────────────────────────────────────────────────────────────

fn default_like_delta() -> i64 {
    1
}

/// Incoming WebSocket message envelope.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsIncoming {
    Heartbeat,
    Like {
        uri: String,
        #[serde(default = "default_like_delta")]
        delta: i64,
    },
}

/// Outgoing messages that are not room events.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsOutgoing {
    /// Sent once on connect. `members` counts this socket too.
    RoomState { room: RoomSummary, members: usize },
    HeartbeatAck,
    /// The member fell behind and missed `missed` events.
    Lagged { missed: u64 },
    Error { message: String },
}

impl WsOutgoing {
    /// Serializes the message to a WebSocket text message.
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self)
            .ok()
            .map(|s| Message::Text(s.into()))
    }
}

/// Serializes `event` for a member of `room`, or `None` if it belongs to
/// another room.
fn event_message(event: &BroadcastEvent, room: &str) -> Option<Message> {
    if event.room != room {
        return None;
    }
    serde_json::to_string(event)
        .ok()
        .map(|s| Message::Text(s.into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Subscribes to room events, then snapshots the room.
///
/// Subscribing first means any change after the snapshot reaches the member
/// as an event.
async fn join_room(
    state: &AppState,
    room: &str,
) -> TunepoolResult<(RoomSummary, broadcast::Receiver<BroadcastEvent>)> {
    let events = state.event_bridge.subscribe();
    let summary = state.registrar.summary(room).await?;
    Ok((summary, events))
}

/// WebSocket upgrade handler. Unknown rooms are rejected before upgrading.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> TunepoolResult<Response> {
    let (summary, events) = join_room(&state, &room).await?;
    Ok(ws
        .on_upgrade(move |socket| handle_ws(socket, state, room, summary, events))
        .into_response())
}

async fn handle_incoming(state: &AppState, room: &str, text: &str) -> Option<WsOutgoing> {
    match serde_json::from_str::<WsIncoming>(text) {
        Ok(WsIncoming::Heartbeat) => Some(WsOutgoing::HeartbeatAck),
        // Success is announced to every member through the song_liked event.
        Ok(WsIncoming::Like { uri, delta }) => match state.editor.like_song(room, &uri, delta).await {
            Ok(_) => None,
            Err(e) => Some(WsOutgoing::Error {
                message: e.to_string(),
            }),
        },
        Err(e) => {
            log::debug!("[WS] Unparseable message in room '{}': {}", room, e);
            Some(WsOutgoing::Error {
                message: format!("invalid message: {e}"),
            })
        }
    }
}

/// Main WebSocket connection handler.
async fn handle_ws(
    socket: WebSocket,
    state: AppState,
    room: String,
    summary: RoomSummary,
    events: broadcast::Receiver<BroadcastEvent>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(events);
    let mut last_activity = Instant::now();

    let conn_guard = state.ws_manager.register(&room);
    let cancel_token = conn_guard.cancel_token().clone();
    let members = state.ws_manager.room_member_count(&room);
    log::info!(
        "[WS] {} joined room '{}' ({} member(s) connected)",
        conn_guard.id(),
        room,
        members
    );

    let greeting = WsOutgoing::RoomState {
        room: summary,
        members,
    };
    if let Some(msg) = greeting.to_message() {
        if sender.send(msg).await.is_err() {
            log::warn!("[WS] Failed to send room state, client disconnected");
            return;
        }
    }

    let mut heartbeat_interval =
        tokio::time::interval(Duration::from_secs(WS_HEARTBEAT_CHECK_INTERVAL_SECS));
    heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_guard.id());
                break;
            }
            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_incoming(&state, &room, text.as_str()).await {
                            if let Some(msg) = reply.to_message() {
                                if sender.send(msg).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            Some(item) = events.next() => {
                let outgoing = match item {
                    Ok(event) => event_message(&event, &room),
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        log::warn!("[WS] {} lagged, {} event(s) dropped", conn_guard.id(), missed);
                        WsOutgoing::Lagged { missed }.to_message()
                    }
                };
                if let Some(msg) = outgoing {
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            _ = heartbeat_interval.tick() => {
                if last_activity.elapsed() > Duration::from_secs(WS_HEARTBEAT_TIMEOUT_SECS) {
                    log::warn!("[WS] Heartbeat timeout: {}", conn_guard.id());
                    break;
                }
            }
        }
    }

    // ConnectionGuard's Drop unregisters the socket.
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::http::tests::app_state;
    use crate::events::{BroadcastEventBridge, EventEmitter, RoomEvent};
    use crate::room::test_support::{room_with_queue, song};
    use crate::services::test_support::Harness;

    #[test]
    fn parses_incoming_messages() {
        assert_eq!(
            serde_json::from_str::<WsIncoming>(r#"{"type":"heartbeat"}"#).unwrap(),
            WsIncoming::Heartbeat
        );
        assert_eq!(
            serde_json::from_str::<WsIncoming>(r#"{"type":"like","uri":"A"}"#).unwrap(),
            WsIncoming::Like {
                uri: "A".into(),
                delta: 1
            }
        );
        assert!(serde_json::from_str::<WsIncoming>(r#"{"type":"play"}"#).is_err());
    }

    #[test]
    fn events_for_other_rooms_are_filtered() {
        let event = BroadcastEvent::new("den", RoomEvent::SongPlayed { uri: "A".into() }, 1);
        assert!(event_message(&event, "lobby").is_none());

        let Some(Message::Text(text)) = event_message(&event, "den") else {
            panic!("expected a text message");
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["room"], "den");
        assert_eq!(json["event"]["type"], "song_played");
        assert_eq!(json["event"]["uri"], "A");
    }

    #[test]
    fn outgoing_messages_are_tagged() {
        let Some(Message::Text(text)) = WsOutgoing::Lagged { missed: 3 }.to_message() else {
            panic!("expected a text message");
        };
        assert_eq!(text.as_str(), r#"{"type":"lagged","missed":3}"#);
    }

    #[tokio::test]
    async fn joining_sees_changes_made_after_the_snapshot() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![song("A", 0)])]);
        let bridge = Arc::new(BroadcastEventBridge::new(8));
        let state = app_state(&h, Arc::clone(&bridge));

        let (summary, mut events) = join_room(&state, "lobby").await.unwrap();
        assert_eq!(summary.queue.len(), 1);

        // Published before the socket upgrade completes.
        bridge.publish("lobby", RoomEvent::SongPlayed { uri: "A".into() });

        let received = events.recv().await.unwrap();
        assert_eq!(received.event, RoomEvent::SongPlayed { uri: "A".into() });
    }

    #[tokio::test]
    async fn joining_unknown_room_fails() {
        let h = Harness::new(vec![]);
        let state = app_state(&h, Arc::new(BroadcastEventBridge::new(8)));

        assert!(join_room(&state, "nowhere").await.is_err());
    }
}
