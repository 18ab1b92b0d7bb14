//! Integration tests for the accountability loop driving the full
//! notification pipeline against in-memory collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use paceline_core::{
    stop_switch, AccountabilityLoop, Channel, CoreError, DeliveryConfig, Direction, Dispatcher,
    ExternalEvent, Goal, GoalPriority, GoalTarget, Interval, LoopStore, MemoryLoopStore,
    MemoryScheduleStore, NotificationSettings, NotificationSink, PlannedNotification,
    ScheduleSnapshot, SchedulerConfig,
};

struct RecordingSink {
    delivered: Mutex<Vec<PlannedNotification>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
        })
    }

    fn fired(&self) -> Vec<PlannedNotification> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &PlannedNotification) -> Result<(), CoreError> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn make_goal(id: &str) -> Goal {
    let mut goal = Goal::new(
        "u1",
        "Guitar",
        GoalPriority::High,
        GoalTarget::Weekly { hours_per_week: 5.0 },
    );
    goal.id = id.to_string();
    goal
}

fn make_loop(
    store: Arc<MemoryScheduleStore>,
    sink: Arc<RecordingSink>,
    stop: tokio::sync::watch::Receiver<bool>,
) -> AccountabilityLoop<MemoryScheduleStore, MemoryLoopStore> {
    AccountabilityLoop::new(
        store,
        MemoryLoopStore::new(),
        Dispatcher::new(sink, DeliveryConfig::default()),
        SchedulerConfig::default(),
        stop,
    )
}

#[tokio::test(start_paused = true)]
async fn before_and_after_offsets_fire_as_separate_batches() {
    // The canonical example: text 20 minutes before, push 2 minutes after,
    // around a one-hour session. Expected fires: start-20 and end+2.
    let goal = make_goal("g1");
    let mut settings = NotificationSettings::for_goal("g1");
    settings.text_before = Some(20);
    settings.push_after = Some(2);

    let start = Utc::now() + Duration::minutes(120);
    let event = ExternalEvent::new(
        "Guitar practice",
        Interval::new(start, start + Duration::minutes(60)).unwrap(),
    )
    .for_goal("g1");

    let store = Arc::new(MemoryScheduleStore::new(ScheduleSnapshot {
        goals: vec![goal],
        settings: vec![settings],
        events: vec![event],
    }));
    let sink = RecordingSink::new();
    let (stop_tx, stop_rx) = stop_switch();
    let handle = tokio::spawn(make_loop(store, sink.clone(), stop_rx).run());

    tokio::time::sleep(std::time::Duration::from_secs(5 * 3600)).await;

    let fired = sink.fired();
    assert_eq!(fired.len(), 2);

    assert_eq!(fired[0].channel, Channel::Text);
    assert_eq!(fired[0].direction, Direction::Before);
    assert_eq!(fired[0].fire_at, start - Duration::minutes(20));

    assert_eq!(fired[1].channel, Channel::Push);
    assert_eq!(fired[1].direction, Direction::After);
    assert_eq!(fired[1].fire_at, start + Duration::minutes(62));

    stop_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn editing_the_schedule_moves_pending_notifications() {
    let goal = make_goal("g1");
    let mut settings = NotificationSettings::for_goal("g1");
    settings.push_before = Some(10);

    let original_start = Utc::now() + Duration::minutes(60);
    let event = ExternalEvent::new(
        "Practice",
        Interval::new(original_start, original_start + Duration::minutes(30)).unwrap(),
    )
    .for_goal("g1");
    let mut moved_event = event.clone();
    let moved_start = original_start + Duration::minutes(180);
    moved_event.interval =
        Interval::new(moved_start, moved_start + Duration::minutes(30)).unwrap();

    let store = Arc::new(MemoryScheduleStore::new(ScheduleSnapshot {
        goals: vec![goal.clone()],
        settings: vec![settings.clone()],
        events: vec![event],
    }));
    let sink = RecordingSink::new();
    let (stop_tx, stop_rx) = stop_switch();
    let handle = tokio::spawn(make_loop(store.clone(), sink.clone(), stop_rx).run());

    // Let the loop arm its race, then reschedule the event.
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    store.replace(ScheduleSnapshot {
        goals: vec![goal],
        settings: vec![settings],
        events: vec![moved_event],
    });

    tokio::time::sleep(std::time::Duration::from_secs(6 * 3600)).await;

    // Exactly one fire, at the moved instant; the stale time never fired.
    let fired = sink.fired();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].fire_at, moved_start - Duration::minutes(10));

    stop_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_from_watermark() {
    let goal = make_goal("g1");
    let mut settings = NotificationSettings::for_goal("g1");
    settings.text_before = Some(20);
    settings.push_after = Some(2);

    let start = Utc::now() + Duration::minutes(120);
    let event = ExternalEvent::new(
        "Practice",
        Interval::new(start, start + Duration::minutes(60)).unwrap(),
    )
    .for_goal("g1");
    let snapshot = ScheduleSnapshot {
        goals: vec![goal],
        settings: vec![settings],
        events: vec![event],
    };

    // A previous incarnation already fired the before-notification.
    let state = Arc::new(MemoryLoopStore::new());
    state
        .save_checkpoint(&paceline_core::LoopCheckpoint {
            phase: paceline_core::LoopPhase::AwaitNext,
            last_event_time: Some(start - Duration::minutes(20)),
        })
        .await
        .unwrap();

    struct SharedLoopStore(Arc<MemoryLoopStore>);
    #[async_trait]
    impl LoopStore for SharedLoopStore {
        async fn acquire_lease(&self, key: &str) -> Result<(), CoreError> {
            self.0.acquire_lease(key).await
        }
        async fn release_lease(&self, key: &str) {
            self.0.release_lease(key).await
        }
        async fn save_checkpoint(
            &self,
            checkpoint: &paceline_core::LoopCheckpoint,
        ) -> Result<(), CoreError> {
            self.0.save_checkpoint(checkpoint).await
        }
        async fn load_checkpoint(&self) -> Result<Option<paceline_core::LoopCheckpoint>, CoreError> {
            self.0.load_checkpoint().await
        }
    }

    let store = Arc::new(MemoryScheduleStore::new(snapshot));
    let sink = RecordingSink::new();
    let (stop_tx, stop_rx) = stop_switch();
    let accountability = AccountabilityLoop::new(
        store,
        SharedLoopStore(state),
        Dispatcher::new(sink.clone(), DeliveryConfig::default()),
        SchedulerConfig::default(),
        stop_rx,
    );
    let handle = tokio::spawn(accountability.run());

    tokio::time::sleep(std::time::Duration::from_secs(5 * 3600)).await;

    // Only the after-notification fires; the watermark suppressed the rest.
    let fired = sink.fired();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].direction, Direction::After);

    stop_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
