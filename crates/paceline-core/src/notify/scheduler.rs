//! The accountability loop: a long-running, resumable notification engine.
//!
//! One instance runs per deployment environment, enforced by a named lease.
//! The loop cycles through three phases:
//!
//! ```text
//! Refresh -> AwaitNext -> (fire | spurious) -> AwaitNext
//!                      -> Idle -> Refresh
//! ```
//!
//! Refresh reloads every user's goals, settings, and the events ending
//! inside the configured horizon. AwaitNext computes the next batch of
//! notifications (all sharing the minimum fire instant) and races a timer
//! against the store's schedule-updated signal; an update always wins over
//! a stale fire. The `last_event_time` watermark is the only state carried
//! across outer iterations and advances exactly when a batch fires, giving
//! at-most-once delivery intent. Every phase change writes a checkpoint so
//! a crashed loop resumes from its watermark; re-entry always starts at
//! Refresh, which is idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{CoreError, InvariantError, Result};
use crate::event::{ExternalEvent, Interval};
use crate::goal::Goal;
use crate::notify::dispatch::Dispatcher;
use crate::notify::{fire_times, NotificationSettings, PlannedNotification};

/// Everything one refresh loads from the schedule store.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSnapshot {
    pub goals: Vec<Goal>,
    pub settings: Vec<NotificationSettings>,
    pub events: Vec<ExternalEvent>,
}

impl ScheduleSnapshot {
    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.id == id)
    }

    pub fn settings_for(&self, goal_id: &str) -> Option<&NotificationSettings> {
        self.settings.iter().find(|s| s.goal_id == goal_id)
    }
}

/// The persisted schedule, seen through a collaborator seam.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Load all users' goals and settings plus the events whose end falls
    /// inside `window`. Must be idempotent.
    async fn load_snapshot(&self, window: Interval) -> Result<ScheduleSnapshot>;

    /// Resolves the next time the persisted schedule changes.
    async fn schedule_updated(&self);
}

/// Durable loop state: lease and write-ahead checkpoints.
#[async_trait]
pub trait LoopStore: Send + Sync {
    /// Take the named exclusivity lease, failing if it is already held.
    async fn acquire_lease(&self, key: &str) -> Result<()>;

    async fn release_lease(&self, key: &str);

    async fn save_checkpoint(&self, checkpoint: &LoopCheckpoint) -> Result<()>;

    async fn load_checkpoint(&self) -> Result<Option<LoopCheckpoint>>;
}

/// Phase of the loop, recorded in checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Refresh,
    AwaitNext,
    Idle,
}

/// Write-ahead record persisted after every phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopCheckpoint {
    pub phase: LoopPhase,
    /// Notifications at or before this instant are considered fired.
    pub last_event_time: Option<DateTime<Utc>>,
}

/// Create the stop signal pair for a loop. Sending `true` (or dropping the
/// sender) tears the loop down at its next suspension point; calling
/// [`AccountabilityLoop::run`] again restarts it.
pub fn stop_switch() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// The minimum-fire-time batch the loop is currently waiting on.
#[derive(Debug, Clone)]
struct PendingBatch {
    fire_at: DateTime<Utc>,
    notifications: Vec<PlannedNotification>,
}

/// What a completed AwaitNext pass asks the driver to do.
enum Step {
    /// Stay in AwaitNext on the same snapshot.
    Continue,
    /// Discard the snapshot and refresh.
    Reload,
    /// No candidates remain; idle until something changes.
    Drained,
    /// Tear the loop down.
    Stop,
}

/// Outcome of the timer-vs-signal race.
enum Race {
    StopSignal,
    StopClosed,
    Updated,
    IdleCap,
    Timer,
}

/// The accountability notification loop.
pub struct AccountabilityLoop<S, L> {
    store: Arc<S>,
    state: L,
    dispatcher: Dispatcher,
    config: SchedulerConfig,
    stop: watch::Receiver<bool>,
    phase: LoopPhase,
    last_event_time: Option<DateTime<Utc>>,
}

impl<S, L> AccountabilityLoop<S, L>
where
    S: ScheduleStore + 'static,
    L: LoopStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        state: L,
        dispatcher: Dispatcher,
        config: SchedulerConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            state,
            dispatcher,
            config,
            stop,
            phase: LoopPhase::Refresh,
            last_event_time: None,
        }
    }

    pub fn last_event_time(&self) -> Option<DateTime<Utc>> {
        self.last_event_time
    }

    /// Run until stopped. Acquires the exclusivity lease, restores the
    /// watermark from the latest checkpoint, and drives the phase machine.
    pub async fn run(mut self) -> Result<()> {
        self.state.acquire_lease(&self.config.lease_key).await?;
        info!(lease = %self.config.lease_key, "accountability loop started");

        if let Some(checkpoint) = self.state.load_checkpoint().await? {
            debug!(?checkpoint, "resuming from checkpoint");
            self.last_event_time = checkpoint.last_event_time;
        }
        // Re-entry always starts at Refresh; it is idempotent and safe to redo.
        self.phase = LoopPhase::Refresh;

        let result = self.drive().await;
        self.state.release_lease(&self.config.lease_key).await;
        info!("accountability loop stopped");
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let mut snapshot = ScheduleSnapshot::default();
        loop {
            if *self.stop.borrow() {
                return Ok(());
            }
            match self.phase {
                LoopPhase::Refresh => {
                    snapshot = self.refresh().await?;
                    self.transition(LoopPhase::AwaitNext).await;
                }
                LoopPhase::AwaitNext => match self.await_next(&snapshot).await? {
                    Step::Continue => {}
                    Step::Reload => self.transition(LoopPhase::Refresh).await,
                    Step::Drained => self.transition(LoopPhase::Idle).await,
                    Step::Stop => return Ok(()),
                },
                LoopPhase::Idle => {
                    self.idle_wait().await;
                    self.transition(LoopPhase::Refresh).await;
                }
            }
        }
    }

    /// Reload the full planning context, with bounded retries on store
    /// failures.
    async fn refresh(&mut self) -> Result<ScheduleSnapshot> {
        let now = Utc::now();
        let window = Interval::new(
            now - Duration::minutes(self.config.lookbehind_minutes.max(0)),
            now + Duration::minutes(self.config.lookahead_minutes.max(1)),
        )
        .ok_or_else(|| CoreError::Custom("refresh window is empty".to_string()))?;

        let attempts = self.config.store_retry_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.load_snapshot(window).await {
                Ok(snapshot) => {
                    debug!(
                        goals = snapshot.goals.len(),
                        events = snapshot.events.len(),
                        "schedule snapshot loaded"
                    );
                    return Ok(snapshot);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(attempt, error = %e, "snapshot load failed, retrying");
                    let backoff = self.config.store_retry_backoff_ms * attempt as u64;
                    tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Compute the next batch: every not-yet-fired notification time, take
    /// the minimum strictly after both `now` and the watermark, and batch
    /// all notifications sharing that exact instant.
    fn next_batch(
        &self,
        snapshot: &ScheduleSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingBatch>> {
        let mut best: Option<PendingBatch> = None;
        for event in &snapshot.events {
            let Some(goal_id) = &event.goal_id else {
                continue;
            };
            let goal = snapshot
                .goal(goal_id)
                .ok_or_else(|| InvariantError::UnknownGoal {
                    event_id: event.id.clone(),
                    goal_id: goal_id.clone(),
                })?;
            let settings =
                snapshot
                    .settings_for(goal_id)
                    .ok_or_else(|| InvariantError::MissingSettings {
                        goal_id: goal_id.clone(),
                    })?;

            for notification in fire_times(event, goal, settings) {
                if notification.fire_at <= now {
                    continue;
                }
                if let Some(watermark) = self.last_event_time {
                    if notification.fire_at <= watermark {
                        continue;
                    }
                }
                match &mut best {
                    Some(batch) if notification.fire_at == batch.fire_at => {
                        batch.notifications.push(notification);
                    }
                    Some(batch) if notification.fire_at < batch.fire_at => {
                        *batch = PendingBatch {
                            fire_at: notification.fire_at,
                            notifications: vec![notification],
                        };
                    }
                    Some(_) => {}
                    None => {
                        best = Some(PendingBatch {
                            fire_at: notification.fire_at,
                            notifications: vec![notification],
                        });
                    }
                }
            }
        }
        Ok(best)
    }

    /// One AwaitNext pass: compute the batch, race the timer against the
    /// update signal, and fire if the wake is genuine.
    async fn await_next(&mut self, snapshot: &ScheduleSnapshot) -> Result<Step> {
        let now = Utc::now();
        let Some(batch) = self.next_batch(snapshot, now)? else {
            return Ok(Step::Drained);
        };

        debug!(
            fire_at = %batch.fire_at,
            size = batch.notifications.len(),
            "awaiting next batch"
        );

        let sleep_for = (batch.fire_at - now).to_std().unwrap_or_default();
        let idle_cap =
            std::time::Duration::from_secs(self.config.idle_timeout_minutes.max(1) as u64 * 60);
        let mut stop = self.stop.clone();

        let race = tokio::select! {
            biased;
            changed = stop.changed() => match changed {
                Ok(()) => Race::StopSignal,
                Err(_) => Race::StopClosed,
            },
            _ = self.store.schedule_updated() => Race::Updated,
            _ = tokio::time::sleep(idle_cap), if idle_cap < sleep_for => Race::IdleCap,
            _ = tokio::time::sleep(sleep_for) => Race::Timer,
        };

        match race {
            Race::StopClosed => return Ok(Step::Stop),
            Race::StopSignal => {
                if *self.stop.borrow() {
                    return Ok(Step::Stop);
                }
                return Ok(Step::Continue);
            }
            Race::Updated => {
                info!("schedule updated, discarding pending batch");
                return Ok(Step::Reload);
            }
            Race::IdleCap => {
                debug!("await cap reached before batch time, refreshing");
                return Ok(Step::Reload);
            }
            Race::Timer => {}
        }

        // The timer won. Guard against waking far past the target (system
        // suspend, clock drift): stale notifications must not fire.
        let woke_at = Utc::now();
        let drift = (woke_at - batch.fire_at).num_seconds();
        if drift > self.config.drift_tolerance_secs.max(0) {
            warn!(drift_secs = drift, "woke far past batch time, treating as spurious");
            return Ok(Step::Continue);
        }

        // Guard against replayed or concurrently-advanced state: the batch
        // time must still be the freshly-recomputed minimum.
        match self.next_batch(snapshot, now)? {
            Some(recomputed) if recomputed.fire_at == batch.fire_at => {}
            _ => {
                debug!("recomputed minimum moved, treating wake as spurious");
                return Ok(Step::Continue);
            }
        }

        let outcome = self.dispatcher.dispatch(batch.notifications).await;
        info!(
            fire_at = %batch.fire_at,
            delivered = outcome.delivered,
            failed = outcome.failed,
            "notification batch fired"
        );

        // The watermark advances exactly when a batch fires.
        self.last_event_time = Some(batch.fire_at);
        self.checkpoint().await;
        Ok(Step::Continue)
    }

    /// Sleep until the schedule changes, the idle timeout passes, or the
    /// loop is stopped.
    async fn idle_wait(&mut self) {
        let idle_cap =
            std::time::Duration::from_secs(self.config.idle_timeout_minutes.max(1) as u64 * 60);
        let mut stop = self.stop.clone();
        tokio::select! {
            biased;
            _ = stop.changed() => {}
            _ = self.store.schedule_updated() => {
                info!("schedule updated during idle");
            }
            _ = tokio::time::sleep(idle_cap) => {
                debug!("idle timeout reached");
            }
        }
    }

    async fn transition(&mut self, phase: LoopPhase) {
        self.phase = phase;
        self.checkpoint().await;
    }

    /// Persist the current phase and watermark, retrying store failures.
    /// A persistent failure degrades durability but must not kill the loop.
    async fn checkpoint(&self) {
        let checkpoint = LoopCheckpoint {
            phase: self.phase,
            last_event_time: self.last_event_time,
        };
        let attempts = self.config.store_retry_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.state.save_checkpoint(&checkpoint).await {
                Ok(()) => return,
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "checkpoint write failed, retrying");
                    let backoff = self.config.store_retry_backoff_ms * attempt as u64;
                    tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    error!(error = %e, "checkpoint write failed, continuing on in-memory state");
                    return;
                }
            }
        }
    }
}

/// In-memory [`LoopStore`]: lease and checkpoint held in process memory.
/// Suitable for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryLoopStore {
    inner: std::sync::Mutex<MemoryLoopState>,
}

#[derive(Default)]
struct MemoryLoopState {
    leases: std::collections::HashSet<String>,
    checkpoint: Option<LoopCheckpoint>,
}

impl MemoryLoopStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLoopState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LoopStore for MemoryLoopStore {
    async fn acquire_lease(&self, key: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.leases.insert(key.to_string()) {
            return Err(CoreError::LeaseHeld {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn release_lease(&self, key: &str) {
        self.lock().leases.remove(key);
    }

    async fn save_checkpoint(&self, checkpoint: &LoopCheckpoint) -> Result<()> {
        self.lock().checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    async fn load_checkpoint(&self) -> Result<Option<LoopCheckpoint>> {
        Ok(self.lock().checkpoint.clone())
    }
}

/// In-memory [`ScheduleStore`] whose `replace` doubles as the
/// schedule-updated signal. Suitable for tests and single-process embedding.
pub struct MemoryScheduleStore {
    snapshot: std::sync::Mutex<ScheduleSnapshot>,
    update_tx: watch::Sender<()>,
    update_rx: watch::Receiver<()>,
}

impl MemoryScheduleStore {
    pub fn new(snapshot: ScheduleSnapshot) -> Self {
        let (update_tx, update_rx) = watch::channel(());
        Self {
            snapshot: std::sync::Mutex::new(snapshot),
            update_tx,
            update_rx,
        }
    }

    /// Replace the stored schedule and signal every waiting loop.
    pub fn replace(&self, snapshot: ScheduleSnapshot) {
        *self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
        let _ = self.update_tx.send(());
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn load_snapshot(&self, window: Interval) -> Result<ScheduleSnapshot> {
        let snapshot = self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Ok(ScheduleSnapshot {
            goals: snapshot.goals,
            settings: snapshot.settings,
            events: snapshot
                .events
                .into_iter()
                .filter(|event| {
                    event.interval.end >= window.start && event.interval.end <= window.end
                })
                .collect(),
        })
    }

    async fn schedule_updated(&self) {
        let mut rx = self.update_rx.clone();
        rx.borrow_and_update();
        let _ = rx.changed().await;
    }
}
