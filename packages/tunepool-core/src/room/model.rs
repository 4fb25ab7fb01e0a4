//! Room and song records.

use serde::{Deserialize, Serialize};

/// A track waiting in a room's queue.
///
/// `uri` is the provider's track identifier and doubles as the song's key
/// within a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub uri: String,
    pub title: String,
    pub artist: String,
    pub image: String,
    /// Track duration in milliseconds.
    pub length: u64,
    #[serde(default)]
    pub likes: i64,
}

/// A named collaborative session: one credential pair, one bound device,
/// one song queue.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    #[serde(default)]
    pub owner_email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix ms after which `access_token` must be refreshed before use.
    pub token_expiry_ms: u64,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub song_queue: Vec<Song>,
    /// Unix ms at which the next scheduled advancement is due.
    #[serde(default)]
    pub next_advance_at_ms: Option<u64>,
}

impl Room {
    /// Creates a room with an empty queue and no bound device.
    pub fn new(
        name: impl Into<String>,
        owner_email: Option<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_expiry_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            owner_email,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_expiry_ms,
            device_id: None,
            song_queue: Vec::new(),
            next_advance_at_ms: None,
        }
    }

    /// Returns true once `now_ms` is strictly past the token expiry.
    #[must_use]
    pub fn token_expired(&self, now_ms: u64) -> bool {
        now_ms > self.token_expiry_ms
    }

    /// Looks up a queued song by uri.
    #[must_use]
    pub fn find_song(&self, uri: &str) -> Option<&Song> {
        self.song_queue.iter().find(|s| s.uri == uri)
    }

    /// Removes the queued song with `uri`. Returns true if one was removed.
    pub fn remove_song(&mut self, uri: &str) -> bool {
        let len_before = self.song_queue.len();
        self.song_queue.retain(|s| s.uri != uri);
        self.song_queue.len() < len_before
    }

    /// Appends `song` unless its uri is already queued.
    pub fn push_song(&mut self, song: Song) -> bool {
        if self.find_song(&song.uri).is_some() {
            return false;
        }
        self.song_queue.push(song);
        true
    }

    /// Adds `delta` to the likes of the song with `uri`, returning the new count.
    pub fn add_likes(&mut self, uri: &str, delta: i64) -> Option<i64> {
        let song = self.song_queue.iter_mut().find(|s| s.uri == uri)?;
        song.likes = song.likes.saturating_add(delta);
        Some(song.likes)
    }

    /// Public view of the room without credentials.
    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            name: self.name.clone(),
            owner_email: self.owner_email.clone(),
            device_id: self.device_id.clone(),
            queue: self.song_queue.clone(),
            next_advance_at: self.next_advance_at_ms,
        }
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("owner_email", &self.owner_email)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_expiry_ms", &self.token_expiry_ms)
            .field("device_id", &self.device_id)
            .field("song_queue", &self.song_queue)
            .field("next_advance_at_ms", &self.next_advance_at_ms)
            .finish()
    }
}

/// Room as exposed over the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub queue: Vec<Song>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_advance_at: Option<u64>,
}

/// Partial update applied to a stored room.
///
/// Only `Some` fields are written. `next_advance_at_ms` is doubly optional so
/// a pending due time can be cleared (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expiry_ms: Option<u64>,
    pub device_id: Option<String>,
    pub next_advance_at_ms: Option<Option<u64>>,
}

impl RoomUpdate {
    /// Credential fields written after a successful refresh.
    pub fn credentials(
        access_token: String,
        refresh_token: Option<String>,
        token_expiry_ms: u64,
    ) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token,
            token_expiry_ms: Some(token_expiry_ms),
            ..Default::default()
        }
    }

    pub fn device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            ..Default::default()
        }
    }

    pub fn next_advance(due_at_ms: Option<u64>) -> Self {
        Self {
            next_advance_at_ms: Some(due_at_ms),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes the set fields onto `room`.
    pub fn apply(self, room: &mut Room) {
        if let Some(token) = self.access_token {
            room.access_token = token;
        }
        if let Some(token) = self.refresh_token {
            room.refresh_token = token;
        }
        if let Some(expiry) = self.token_expiry_ms {
            room.token_expiry_ms = expiry;
        }
        if let Some(device) = self.device_id {
            room.device_id = Some(device);
        }
        if let Some(due) = self.next_advance_at_ms {
            room.next_advance_at_ms = due;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new("lobby", None, "access", "refresh", 1_000)
    }

    #[test]
    fn token_not_expired_at_exact_expiry() {
        let room = room();
        assert!(!room.token_expired(999));
        assert!(!room.token_expired(1_000));
        assert!(room.token_expired(1_001));
    }

    #[test]
    fn update_only_touches_set_fields() {
        let mut room = room();
        room.device_id = Some("speaker".into());

        RoomUpdate::credentials("new-access".into(), None, 5_000).apply(&mut room);

        assert_eq!(room.access_token, "new-access");
        assert_eq!(room.refresh_token, "refresh");
        assert_eq!(room.token_expiry_ms, 5_000);
        assert_eq!(room.device_id.as_deref(), Some("speaker"));
    }

    #[test]
    fn next_advance_can_be_cleared() {
        let mut room = room();
        RoomUpdate::next_advance(Some(9_000)).apply(&mut room);
        assert_eq!(room.next_advance_at_ms, Some(9_000));

        RoomUpdate::next_advance(None).apply(&mut room);
        assert_eq!(room.next_advance_at_ms, None);
    }

    #[test]
    fn debug_output_hides_tokens() {
        let rendered = format!("{:?}", room());
        assert!(!rendered.contains("access\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn summary_serializes_camel_case_without_credentials() {
        let json = serde_json::to_value(room().summary()).unwrap();
        assert_eq!(json["name"], "lobby");
        assert!(json.get("accessToken").is_none());
        assert!(json.get("deviceId").is_none());
    }

    #[test]
    fn song_likes_default_to_zero() {
        let song: Song = serde_json::from_str(
            r#"{"uri":"u","title":"t","artist":"a","image":"i","length":1000}"#,
        )
        .unwrap();
        assert_eq!(song.likes, 0);
    }
}
