//! Room storage abstraction and the in-memory implementation.
//!
//! Services depend on the [`RoomStore`] trait rather than a concrete database
//! handle. Every mutation is a single atomic operation on the stored record;
//! callers never load, modify and save a room themselves.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use super::model::{Room, RoomUpdate, Song};

/// Errors raised by room stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A room with this name already exists.
    #[error("Room already exists: {0}")]
    RoomExists(String),

    /// The referenced room does not exist.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Reading or writing the backing file failed.
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded or decoded.
    #[error("Storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenient Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Document-style storage for room records.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Loads a room by its unique name.
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Room>>;

    /// Inserts a new room. Fails with [`StoreError::RoomExists`] on a duplicate name.
    async fn insert(&self, room: Room) -> StoreResult<()>;

    /// Applies a partial update to an existing room.
    async fn update(&self, name: &str, update: RoomUpdate) -> StoreResult<()>;

    /// Removes the queued song with `uri`, if present.
    ///
    /// Returns `true` if a song was removed.
    async fn remove_queue_entry(&self, name: &str, uri: &str) -> StoreResult<bool>;

    /// Appends a song unless one with the same uri is already queued.
    ///
    /// Returns `true` if the song was added.
    async fn push_queue_entry(&self, name: &str, song: Song) -> StoreResult<bool>;

    /// Adds `delta` to a queued song's likes.
    ///
    /// Returns the new count, or `None` if no song with `uri` is queued.
    async fn increment_likes(&self, name: &str, uri: &str, delta: i64)
        -> StoreResult<Option<i64>>;

    /// Returns every stored room.
    async fn list_rooms(&self) -> StoreResult<Vec<Room>>;

    /// Flushes and releases the store. Called once at shutdown.
    async fn close(&self) -> StoreResult<()>;
}

/// Room store held entirely in memory.
///
/// Each mutation holds the room's shard lock for its duration, which makes
/// the read-modify-write of a single room atomic.
#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    rooms: DashMap<String, Room>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `rooms`.
    pub fn with_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        let store = Self::new();
        for room in rooms {
            store.rooms.insert(room.name.clone(), room);
        }
        store
    }

    /// Returns all rooms sorted by name.
    pub fn snapshot(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    /// Stores `room` under its name, replacing any previous record.
    pub(crate) fn put(&self, room: Room) {
        self.rooms.insert(room.name.clone(), room);
    }

    /// Runs `f` against the stored room under its shard lock.
    fn with_room_mut<T>(&self, name: &str, f: impl FnOnce(&mut Room) -> T) -> StoreResult<T> {
        let mut room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| StoreError::RoomNotFound(name.to_string()))?;
        Ok(f(room.value_mut()))
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Room>> {
        Ok(self.rooms.get(name).map(|r| r.value().clone()))
    }

    async fn insert(&self, room: Room) -> StoreResult<()> {
        match self.rooms.entry(room.name.clone()) {
            Entry::Occupied(_) => Err(StoreError::RoomExists(room.name)),
            Entry::Vacant(slot) => {
                slot.insert(room);
                Ok(())
            }
        }
    }

    async fn update(&self, name: &str, update: RoomUpdate) -> StoreResult<()> {
        self.with_room_mut(name, |room| update.apply(room))
    }

    async fn remove_queue_entry(&self, name: &str, uri: &str) -> StoreResult<bool> {
        self.with_room_mut(name, |room| room.remove_song(uri))
    }

    async fn push_queue_entry(&self, name: &str, song: Song) -> StoreResult<bool> {
        self.with_room_mut(name, |room| room.push_song(song))
    }

    async fn increment_likes(
        &self,
        name: &str,
        uri: &str,
        delta: i64,
    ) -> StoreResult<Option<i64>> {
        self.with_room_mut(name, |room| room.add_likes(uri, delta))
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(self.snapshot())
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
