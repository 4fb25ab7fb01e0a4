//! Queue edits made by room members: adding songs and voting on them.

use std::sync::Arc;

use crate::error::{TunepoolError, TunepoolResult};
use crate::events::{EventEmitter, RoomEvent};
use crate::room::{RoomStore, Song};

pub struct QueueEditor {
    store: Arc<dyn RoomStore>,
    emitter: Arc<dyn EventEmitter>,
}

impl QueueEditor {
    pub fn new(store: Arc<dyn RoomStore>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self { store, emitter }
    }

    /// Appends `song` to the room's queue with zero likes.
    ///
    /// # Errors
    /// * [`TunepoolError::InvalidRequest`] for a blank uri or a uri already queued
    /// * [`TunepoolError::RoomNotFound`] if the room does not exist
    pub async fn add_song(&self, room: &str, mut song: Song) -> TunepoolResult<Song> {
        if song.uri.trim().is_empty() {
            return Err(TunepoolError::InvalidRequest(
                "song uri must not be empty".to_string(),
            ));
        }
        song.likes = 0;

        if !self.store.push_queue_entry(room, song.clone()).await? {
            return Err(TunepoolError::InvalidRequest(format!(
                "{} is already queued in room '{}'",
                song.uri, room
            )));
        }

        log::info!("[QueueEditor] Queued {} in room '{}'", song.uri, room);
        self.emitter
            .publish(room, RoomEvent::SongAdded { song: song.clone() });
        Ok(song)
    }

    /// Adds `delta` likes to a queued song and returns the new count.
    pub async fn like_song(&self, room: &str, uri: &str, delta: i64) -> TunepoolResult<i64> {
        let likes = self
            .store
            .increment_likes(room, uri, delta)
            .await?
            .ok_or_else(|| TunepoolError::SongNotFound(format!("{uri} in room '{room}'")))?;

        log::debug!(
            "[QueueEditor] {} in room '{}' now has {} likes",
            uri,
            room,
            likes
        );
        self.emitter.publish(
            room,
            RoomEvent::SongLiked {
                uri: uri.to_string(),
                likes,
            },
        );
        Ok(likes)
    }

    /// Current queue in stored order.
    pub async fn queue(&self, room: &str) -> TunepoolResult<Vec<Song>> {
        self.store
            .find_by_name(room)
            .await?
            .map(|r| r.song_queue)
            .ok_or_else(|| TunepoolError::RoomNotFound(room.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_support::{room_with_queue, song};
    use crate::services::select_next;
    use crate::services::test_support::Harness;

    #[tokio::test]
    async fn add_resets_likes_and_publishes() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![song("A", 0)])]);

        let added = h.editor.add_song("lobby", song("B", 99)).await.unwrap();

        assert_eq!(added.likes, 0);
        let queue = h.editor.queue("lobby").await.unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[1].uri, "B");
        assert_eq!(queue[1].likes, 0);
        assert_eq!(
            h.emitter.named("song_added"),
            vec![RoomEvent::SongAdded { song: added }]
        );
    }

    #[tokio::test]
    async fn duplicate_uri_is_rejected() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![song("A", 3)])]);

        let err = h.editor.add_song("lobby", song("A", 0)).await.unwrap_err();

        assert!(matches!(err, TunepoolError::InvalidRequest(_)));
        assert_eq!(h.editor.queue("lobby").await.unwrap()[0].likes, 3);
    }

    #[tokio::test]
    async fn add_to_unknown_room_is_lookup_failure() {
        let h = Harness::new(vec![]);
        let err = h.editor.add_song("ghost", song("A", 0)).await.unwrap_err();
        assert!(matches!(err, TunepoolError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn likes_change_selection() {
        let h = Harness::new(vec![room_with_queue(
            "lobby",
            vec![song("A", 0), song("B", 0)],
        )]);

        assert_eq!(h.editor.like_song("lobby", "B", 1).await.unwrap(), 1);
        assert_eq!(h.editor.like_song("lobby", "A", -2).await.unwrap(), -2);

        let queue = h.editor.queue("lobby").await.unwrap();
        assert_eq!(select_next(&queue).unwrap().uri, "B");
        assert_eq!(h.emitter.named("song_liked").len(), 2);
    }

    #[tokio::test]
    async fn liking_unknown_song_is_not_found() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![])]);

        let err = h.editor.like_song("lobby", "missing", 1).await.unwrap_err();

        assert!(matches!(err, TunepoolError::SongNotFound(_)));
        assert!(h.emitter.events().is_empty());
    }
}
