//! Room store persisted as a JSON snapshot in the data directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::model::{Room, RoomUpdate, Song};
use super::store::{MemoryRoomStore, RoomStore, StoreError, StoreResult};
use crate::protocol_constants::ROOMS_FILE;

#[derive(Serialize, Deserialize, Default)]
struct RoomsFile {
    rooms: Vec<Room>,
}

/// [`RoomStore`] that keeps rooms in memory and rewrites `rooms.json` after
/// every change.
///
/// A change is applied to a copy of the room, written out, and only then
/// committed to memory, so a failed write leaves the store as it was. Writes
/// go to a temp file which is then renamed over the snapshot, so a crash
/// mid-write leaves the previous snapshot intact.
pub struct FileRoomStore {
    inner: MemoryRoomStore,
    dir: PathBuf,
    /// Held from reading a room through committing its change, which also
    /// keeps snapshot writes in order.
    write_lock: Mutex<()>,
}

impl FileRoomStore {
    /// Opens the store in `dir`, loading an existing snapshot if present.
    ///
    /// Creates the directory if it doesn't exist. A snapshot that exists but
    /// cannot be parsed is an error rather than silently starting empty.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(ROOMS_FILE);
        let rooms = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<RoomsFile>(&contents)?.rooms,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        log::info!(
            "[RoomStore] Opened {} with {} room(s)",
            path.display(),
            rooms.len()
        );

        Ok(Self {
            inner: MemoryRoomStore::with_rooms(rooms),
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the snapshot.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Applies `f` to a copy of room `name`. When `f` reports a change, the
    /// snapshot including the copy is written and the copy committed.
    async fn mutate<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Room) -> (T, bool),
    ) -> StoreResult<T> {
        let _guard = self.write_lock.lock().await;
        let mut room = self
            .inner
            .find_by_name(name)
            .await?
            .ok_or_else(|| StoreError::RoomNotFound(name.to_string()))?;

        let (result, changed) = f(&mut room);
        if changed {
            self.write_with(&room).await?;
            self.inner.put(room);
        }
        Ok(result)
    }

    /// Writes the current rooms with `room` in place of its stored version.
    async fn write_with(&self, room: &Room) -> StoreResult<()> {
        let mut rooms = self.inner.snapshot();
        match rooms.iter_mut().find(|r| r.name == room.name) {
            Some(slot) => *slot = room.clone(),
            None => {
                rooms.push(room.clone());
                rooms.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        self.write_snapshot(rooms).await
    }

    async fn write_snapshot(&self, rooms: Vec<Room>) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(&RoomsFile { rooms })?;
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let path = dir.join(ROOMS_FILE);
            let temp_path = dir.join(format!("{ROOMS_FILE}.tmp"));
            std::fs::write(&temp_path, contents)?;
            std::fs::rename(&temp_path, &path)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl RoomStore for FileRoomStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Room>> {
        self.inner.find_by_name(name).await
    }

    async fn insert(&self, room: Room) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.inner.find_by_name(&room.name).await?.is_some() {
            return Err(StoreError::RoomExists(room.name));
        }
        self.write_with(&room).await?;
        self.inner.put(room);
        Ok(())
    }

    async fn update(&self, name: &str, update: RoomUpdate) -> StoreResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.mutate(name, |room| {
            update.apply(room);
            ((), true)
        })
        .await
    }

    async fn remove_queue_entry(&self, name: &str, uri: &str) -> StoreResult<bool> {
        self.mutate(name, |room| {
            let removed = room.remove_song(uri);
            (removed, removed)
        })
        .await
    }

    async fn push_queue_entry(&self, name: &str, song: Song) -> StoreResult<bool> {
        self.mutate(name, |room| {
            let added = room.push_song(song);
            (added, added)
        })
        .await
    }

    async fn increment_likes(
        &self,
        name: &str,
        uri: &str,
        delta: i64,
    ) -> StoreResult<Option<i64>> {
        self.mutate(name, |room| {
            let likes = room.add_likes(uri, delta);
            (likes, likes.is_some())
        })
        .await
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        self.inner.list_rooms().await
    }

    async fn close(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_snapshot(self.inner.snapshot()).await?;
        log::info!("[RoomStore] Flushed {}", self.dir.join(ROOMS_FILE).display());
        Ok(())
    }
}
