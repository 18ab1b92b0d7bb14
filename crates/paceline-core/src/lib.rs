//! # Paceline Core Library
//!
//! This library is the temporal scheduling and notification engine behind
//! Paceline: it decides where a user's truly-free time is, how much of it
//! each personal goal deserves, whether a proposed placement is legal, and
//! when to fire accountability notifications.
//!
//! ## Architecture
//!
//! - **Intervals**: per-day free/free-work computation from the user's
//!   wake/sleep/work routine and existing calendar events
//! - **Preferred times**: day-part buckets resolved against the routine and
//!   intersected with free time
//! - **Allocator**: priority-weighted estimation of minutes owed per goal,
//!   in steady-state and catch-up modes
//! - **Validator**: hard-constraint checking of proposed placements,
//!   collecting every violation for one-pass correction
//! - **Notify**: the durable accountability loop plus per-user serialized
//!   delivery
//!
//! Persistence and message delivery live behind collaborator traits
//! ([`ScheduleStore`], [`LoopStore`], [`NotificationSink`]); the engine
//! itself holds no storage.
//!
//! ## Key Components
//!
//! - [`IntervalCalculator`]: free-time table computation
//! - [`CommitmentAllocator`]: target-hours estimation
//! - [`ScheduleValidator`]: placement validation
//! - [`AccountabilityLoop`]: the notification firing loop
//! - [`Planner`]: one-call orchestration for a planning window

pub mod allocator;
pub mod config;
pub mod error;
pub mod event;
pub mod goal;
pub mod intervals;
pub mod notify;
pub mod planner;
pub mod preferred;
pub mod profile;
pub mod validator;

pub use allocator::CommitmentAllocator;
pub use config::{AllocatorConfig, DeliveryConfig, IntervalConfig, SchedulerConfig, TuningConfig};
pub use error::{ConfigError, CoreError, InvariantError, Result};
pub use event::{ExternalEvent, Interval, IntervalKind, TypedInterval, WakeSleepEvent, WakeSleepKind};
pub use goal::{Goal, GoalPriority, GoalTarget, PreferredTime};
pub use intervals::{FreeTimeTable, IntervalCalculator};
pub use notify::dispatch::{Dispatcher, DispatchOutcome, NotificationSink};
pub use notify::scheduler::{
    stop_switch, AccountabilityLoop, LoopCheckpoint, LoopPhase, LoopStore, MemoryLoopStore,
    MemoryScheduleStore, ScheduleSnapshot, ScheduleStore,
};
pub use notify::{fire_times, Channel, Direction, NotificationSettings, PlannedNotification};
pub use planner::{GoalAllocation, PlanMode, Planner, WindowPlan};
pub use preferred::{match_slots, DayPreferredWindows, MatchedSlot, PreferredTimeMatcher};
pub use profile::{DayOfWeek, DayRoutine, LocalSpan, RoutineBlock, UserProfile, WeekRoutine, WorkSchedule};
pub use validator::{ScheduleValidator, ScheduleViolation, ValidationReport};
