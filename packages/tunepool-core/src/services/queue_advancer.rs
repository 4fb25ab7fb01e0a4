//! Queue advancement: pick the most-liked song, play it, remove it, notify,
//! and schedule the next advancement for when it ends.
//!
//! Advancement for one room is serialized by a per-room lock held from
//! selection through removal, so a user-triggered play and a timer firing at
//! the same moment cannot both select the same song. A timer that fired but
//! waited on the lock while another advancement rescheduled the room gives up
//! once it gets the lock.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;

use super::advance_scheduler::AdvanceScheduler;
use super::token_manager::TokenManager;
use super::OperationResult;
use crate::error::{TunepoolError, TunepoolResult};
use crate::events::{EventEmitter, RoomEvent};
use crate::provider::ProviderApi;
use crate::room::{RoomStore, RoomUpdate, Song};
use crate::runtime::Clock;

/// Result of a single advancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Nothing queued; no provider call was made.
    QueueEmpty,
    /// `song` is now playing and left the queue.
    Played {
        song: Song,
        /// Wall-clock time the next advancement is scheduled for.
        next_advance_at_ms: u64,
    },
}

impl AdvanceOutcome {
    /// Message reported at the play boundary.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::QueueEmpty => "Queue is empty",
            Self::Played { .. } => "Song played",
        }
    }
}

/// Selects the song to play next: the one with strictly the most likes.
///
/// Ties go to the song stored first.
#[must_use]
pub fn select_next(queue: &[Song]) -> Option<&Song> {
    queue.iter().fold(None, |best: Option<&Song>, song| match best {
        Some(current) if song.likes <= current.likes => Some(current),
        _ => Some(song),
    })
}

/// Drives playback through each room's queue.
pub struct QueueAdvancer {
    store: Arc<dyn RoomStore>,
    provider: Arc<dyn ProviderApi>,
    tokens: Arc<TokenManager>,
    emitter: Arc<dyn EventEmitter>,
    scheduler: Arc<AdvanceScheduler>,
    clock: Arc<dyn Clock>,
    room_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl QueueAdvancer {
    pub fn new(
        store: Arc<dyn RoomStore>,
        provider: Arc<dyn ProviderApi>,
        tokens: Arc<TokenManager>,
        emitter: Arc<dyn EventEmitter>,
        scheduler: Arc<AdvanceScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            tokens,
            emitter,
            scheduler,
            clock,
            room_locks: DashMap::new(),
        }
    }

    fn room_lock(&self, room: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.room_locks.entry(room.to_string()).or_default().clone()
    }

    /// Plays the next song in `room` and schedules the following advancement.
    ///
    /// On success the song is removed from the queue, `song_played` is
    /// published, and the next advancement is scheduled `song.length` ms out,
    /// replacing any pending one. On playback failure the queue is left
    /// untouched, nothing is published and nothing is scheduled.
    ///
    /// # Errors
    /// * [`TunepoolError::RoomNotFound`] if the room does not exist
    /// * Provider or credential errors from the playback command
    pub async fn advance(self: &Arc<Self>, room: &str) -> TunepoolResult<AdvanceOutcome> {
        Ok(self
            .advance_locked(room, None)
            .await?
            .unwrap_or(AdvanceOutcome::QueueEmpty))
    }

    /// Runs one advancement under the room lock. With `generation` set, the
    /// run belongs to that scheduled timer and returns `None` without acting
    /// if the room was rescheduled or stopped in the meantime.
    async fn advance_locked(
        self: &Arc<Self>,
        room: &str,
        generation: Option<u64>,
    ) -> TunepoolResult<Option<AdvanceOutcome>> {
        let lock = self.room_lock(room);
        let _guard = lock.lock().await;

        if let Some(id) = generation {
            if !self.scheduler.is_current(room, id) {
                log::debug!(
                    "[QueueAdvancer] Superseded scheduled advance for room '{}' skipped",
                    room
                );
                return Ok(None);
            }
        }

        let record = self
            .store
            .find_by_name(room)
            .await?
            .ok_or_else(|| TunepoolError::RoomNotFound(room.to_string()))?;

        let Some(song) = select_next(&record.song_queue).cloned() else {
            log::info!("[QueueAdvancer] Queue for room '{}' is empty", room);
            return Ok(Some(AdvanceOutcome::QueueEmpty));
        };

        log::info!(
            "[QueueAdvancer] Playing '{}' ({}, {} likes) in room '{}'",
            song.title,
            song.uri,
            song.likes,
            room
        );

        let provider = &self.provider;
        let device = record.device_id.as_deref();
        let uri = song.uri.as_str();
        let played = self
            .tokens
            .call_with_token(room, move |token| async move {
                provider.start_playback(&token, device, uri).await
            })
            .await;

        if let Err(e) = played {
            log::warn!(
                "[QueueAdvancer] Playback of {} failed in room '{}': {}",
                song.uri,
                room,
                e
            );
            return Err(e);
        }

        match self.store.remove_queue_entry(room, &song.uri).await {
            Ok(true) => {}
            Ok(false) => log::warn!(
                "[QueueAdvancer] {} already gone from room '{}' after playing",
                song.uri,
                room
            ),
            Err(e) => log::error!(
                "[QueueAdvancer] Failed to remove played song {} from room '{}': {}",
                song.uri,
                room,
                e
            ),
        }

        self.emitter.publish(
            room,
            RoomEvent::SongPlayed {
                uri: song.uri.clone(),
            },
        );

        let next_advance_at_ms = self.clock.now_millis().saturating_add(song.length);
        self.schedule_next(room, song.length, next_advance_at_ms);
        if let Err(e) = self
            .store
            .update(room, RoomUpdate::next_advance(Some(next_advance_at_ms)))
            .await
        {
            log::warn!(
                "[QueueAdvancer] Failed to persist next advance for room '{}': {}",
                room,
                e
            );
        }

        Ok(Some(AdvanceOutcome::Played {
            song,
            next_advance_at_ms,
        }))
    }

    /// Boundary wrapper around [`advance`](Self::advance) that never fails.
    pub async fn play(self: &Arc<Self>, room: &str) -> OperationResult {
        match self.advance(room).await {
            Ok(outcome) => OperationResult::ok(outcome.message()),
            Err(e) => {
                log::warn!("[QueueAdvancer] Play failed for room '{}': {}", room, e);
                OperationResult::failed(e.to_string())
            }
        }
    }

    /// Cancels the pending advancement for `room` and clears its due time.
    ///
    /// A song that is already playing keeps playing. Returns true if an
    /// advancement was pending.
    pub async fn stop(&self, room: &str) -> TunepoolResult<bool> {
        let record = self
            .store
            .find_by_name(room)
            .await?
            .ok_or_else(|| TunepoolError::RoomNotFound(room.to_string()))?;

        let cancelled = self.scheduler.cancel(room);
        if record.next_advance_at_ms.is_some() {
            self.store
                .update(room, RoomUpdate::next_advance(None))
                .await?;
        }
        log::info!(
            "[QueueAdvancer] Stopped room '{}' (pending advance cancelled: {})",
            room,
            cancelled
        );
        Ok(cancelled)
    }

    /// Re-arms advancements persisted before a restart.
    ///
    /// Rooms whose due time has already passed advance immediately. Returns
    /// the number of rooms rescheduled.
    pub async fn resume_scheduled(self: &Arc<Self>) -> TunepoolResult<usize> {
        let now = self.clock.now_millis();
        let mut resumed = 0;
        for room in self.store.list_rooms().await? {
            if let Some(due) = room.next_advance_at_ms {
                self.schedule_next(&room.name, due.saturating_sub(now), due);
                resumed += 1;
            }
        }
        if resumed > 0 {
            log::info!("[QueueAdvancer] Resumed {} scheduled advance(s)", resumed);
        }
        Ok(resumed)
    }

    fn schedule_next(self: &Arc<Self>, room: &str, delay_ms: u64, due_at_ms: u64) {
        self.scheduler.schedule(
            room,
            Duration::from_millis(delay_ms),
            due_at_ms,
            |id| self.advance_task(room.to_string(), id),
        );
    }

    /// The scheduled self-advance. Boxed to break the `advance -> schedule -> advance`
    /// type cycle.
    fn advance_task(self: &Arc<Self>, room: String, generation: u64) -> BoxFuture<'static, ()> {
        let this = Arc::clone(self);
        async move {
            log::info!("[QueueAdvancer] Scheduled advance firing for room '{}'", room);
            match this.advance_locked(&room, Some(generation)).await {
                Ok(None) | Ok(Some(AdvanceOutcome::Played { .. })) => {}
                Ok(Some(AdvanceOutcome::QueueEmpty)) => this.clear_due(&room, generation).await,
                Err(e) => {
                    log::warn!(
                        "[QueueAdvancer] Scheduled advance failed for room '{}': {}",
                        room,
                        e
                    );
                    this.clear_due(&room, generation).await;
                }
            }
        }
        .boxed()
    }

    /// Clears the persisted due time unless the room was rescheduled since
    /// timer `generation` fired.
    async fn clear_due(&self, room: &str, generation: u64) {
        let lock = self.room_lock(room);
        let _guard = lock.lock().await;
        if !self.scheduler.is_current(room, generation) {
            return;
        }
        if let Err(e) = self
            .store
            .update(room, RoomUpdate::next_advance(None))
            .await
        {
            log::warn!(
                "[QueueAdvancer] Failed to clear next advance for room '{}': {}",
                room,
                e
            );
        }
    }
}
