//! Per-room registry of pending queue advancements.
//!
//! Each room has at most one pending advancement. Scheduling a new one
//! cancels the previous one, and every pending timer can be cancelled by room
//! name or all at once through the shutdown token.
//!
//! Every `schedule` and `cancel` starts a new generation for the room. A timer
//! that already fired checks [`AdvanceScheduler::is_current`] with its id
//! before acting, so a replacement scheduled while it waited wins.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::runtime::{TaskSpawner, TokioSpawner};

struct PendingAdvance {
    /// Distinguishes this timer from a replacement scheduled for the same room.
    id: u64,
    due_at_ms: u64,
    cancel: CancellationToken,
}

/// Cancellable timers keyed by room name.
pub struct AdvanceScheduler {
    pending: Arc<DashMap<String, PendingAdvance>>,
    /// Id of the latest `schedule` or `cancel` per room.
    generations: DashMap<String, u64>,
    next_id: AtomicU64,
    spawner: TokioSpawner,
    /// Parent of every timer's token.
    shutdown: CancellationToken,
}

impl AdvanceScheduler {
    pub fn new(spawner: TokioSpawner, shutdown: CancellationToken) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            generations: DashMap::new(),
            next_id: AtomicU64::new(1),
            spawner,
            shutdown,
        }
    }

    /// Runs the future built by `task` for `room` after `delay`, replacing any
    /// pending advancement. `task` receives the timer's generation id.
    ///
    /// `due_at_ms` is the wall-clock time the timer corresponds to; it is
    /// reported by [`due_at`](Self::due_at) but does not drive the timer.
    pub fn schedule<T, F>(&self, room: &str, delay: Duration, due_at_ms: u64, task: T)
    where
        T: FnOnce(u64) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            log::debug!(
                "[Scheduler] Shutting down, not scheduling advance for room '{}'",
                room
            );
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.generations.insert(room.to_string(), id);
        let task = task(id);
        let cancel = self.shutdown.child_token();
        let entry = PendingAdvance {
            id,
            due_at_ms,
            cancel: cancel.clone(),
        };
        if let Some(previous) = self.pending.insert(room.to_string(), entry) {
            previous.cancel.cancel();
            log::debug!("[Scheduler] Replaced pending advance for room '{}'", room);
        }

        log::info!(
            "[Scheduler] Advance for room '{}' in {}ms (due at {})",
            room,
            delay.as_millis(),
            due_at_ms
        );

        // Deadline is fixed now, not when the task is first polled.
        let deadline = tokio::time::Instant::now() + delay;
        let pending = Arc::clone(&self.pending);
        let room = room.to_string();
        self.spawner.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("[Scheduler] Advance for room '{}' cancelled", room);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    pending.remove_if(&room, |_, p| p.id == id);
                    task.await;
                }
            }
        });
    }

    /// Cancels the pending advancement for `room`.
    ///
    /// Returns true if one was pending.
    pub fn cancel(&self, room: &str) -> bool {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.generations.insert(room.to_string(), id);
        match self.pending.remove(room) {
            Some((_, pending)) => {
                pending.cancel.cancel();
                log::info!("[Scheduler] Cancelled pending advance for room '{}'", room);
                true
            }
            None => false,
        }
    }

    /// Cancels every pending advancement. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let rooms: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        rooms.iter().filter(|room| self.cancel(room)).count()
    }

    /// True while no later `schedule` or `cancel` has happened for `room`
    /// since the timer with `id` was scheduled.
    #[must_use]
    pub fn is_current(&self, room: &str, id: u64) -> bool {
        self.generations.get(room).is_some_and(|current| *current == id)
    }

    /// Wall-clock due time of the pending advancement for `room`.
    #[must_use]
    pub fn due_at(&self, room: &str) -> Option<u64> {
        self.pending.get(room).map(|p| p.due_at_ms)
    }

    /// Number of rooms with a pending advancement.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::future::BoxFuture;
    use futures::FutureExt;

    use super::*;
    use crate::services::test_support::settle;

    fn scheduler() -> (AdvanceScheduler, CancellationToken) {
        let shutdown = CancellationToken::new();
        (
            AdvanceScheduler::new(TokioSpawner::current(), shutdown.clone()),
            shutdown,
        )
    }

    fn counting_task(counter: &Arc<AtomicUsize>) -> impl FnOnce(u64) -> BoxFuture<'static, ()> {
        let counter = Arc::clone(counter);
        move |_| {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_and_clears_entry() {
        let (scheduler, _shutdown) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule("lobby", Duration::from_millis(200_000), 42, counting_task(&fired));
        assert_eq!(scheduler.due_at("lobby"), Some(42));

        tokio::time::advance(Duration::from_millis(199_999)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_pending_timer() {
        let (scheduler, _shutdown) = scheduler();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler.schedule("lobby", Duration::from_secs(10), 1, counting_task(&first));
        scheduler.schedule("lobby", Duration::from_secs(20), 2, counting_task(&second));
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(scheduler.due_at("lobby"), Some(2));

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (scheduler, _shutdown) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule("lobby", Duration::from_secs(5), 1, counting_task(&fired));
        assert!(scheduler.cancel("lobby"));
        assert!(!scheduler.cancel("lobby"));

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything() {
        let (scheduler, shutdown) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule("a", Duration::from_secs(5), 1, counting_task(&fired));
        scheduler.schedule("b", Duration::from_secs(5), 1, counting_task(&fired));
        shutdown.cancel();

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        scheduler.schedule("c", Duration::from_secs(1), 1, counting_task(&fired));
        assert_eq!(scheduler.due_at("c"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_reports_count() {
        let (scheduler, _shutdown) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule("a", Duration::from_secs(5), 1, counting_task(&fired));
        scheduler.schedule("b", Duration::from_secs(5), 1, counting_task(&fired));

        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fired_timer_is_superseded_by_later_schedule_or_cancel() {
        let (scheduler, _shutdown) = scheduler();
        let fired_id = Arc::new(AtomicU64::new(0));

        let seen = Arc::clone(&fired_id);
        scheduler.schedule("lobby", Duration::from_secs(5), 1, move |id| async move {
            seen.store(id, Ordering::SeqCst);
        });
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;

        let id = fired_id.load(Ordering::SeqCst);
        assert!(scheduler.is_current("lobby", id));
        assert!(!scheduler.is_current("den", id));

        scheduler.schedule("lobby", Duration::from_secs(5), 2, counting_task(&Arc::default()));
        assert!(!scheduler.is_current("lobby", id));

        let fired_id = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&fired_id);
        scheduler.schedule("den", Duration::from_secs(1), 3, move |id| async move {
            seen.store(id, Ordering::SeqCst);
        });
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        let id = fired_id.load(Ordering::SeqCst);
        assert!(!scheduler.cancel("den"));
        assert!(!scheduler.is_current("den", id));
    }
}
