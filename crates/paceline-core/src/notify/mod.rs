//! Accountability notifications.
//!
//! - [`NotificationSettings`]: per-goal channel offsets
//! - Fire-time computation for scheduled events
//! - [`scheduler`]: the durable accountability loop
//! - [`dispatch`]: per-user serialized delivery

pub mod dispatch;
pub mod scheduler;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ExternalEvent;
use crate::goal::Goal;

/// Delivery channel for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Push,
    Text,
    Phone,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Push => write!(f, "push"),
            Channel::Text => write!(f, "text"),
            Channel::Phone => write!(f, "phone"),
        }
    }
}

/// Whether a notification fires before the event starts or after it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Before,
    After,
}

/// Every channel-direction pair, in a fixed order.
pub const CHANNEL_DIRECTIONS: [(Channel, Direction); 6] = [
    (Channel::Push, Direction::Before),
    (Channel::Push, Direction::After),
    (Channel::Text, Direction::Before),
    (Channel::Text, Direction::After),
    (Channel::Phone, Direction::Before),
    (Channel::Phone, Direction::After),
];

/// Per-goal notification preferences. Each offset is minutes relative to
/// the event boundary; `None` disables that channel-direction pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub goal_id: String,
    #[serde(default)]
    pub push_before: Option<i64>,
    #[serde(default)]
    pub push_after: Option<i64>,
    #[serde(default)]
    pub text_before: Option<i64>,
    #[serde(default)]
    pub text_after: Option<i64>,
    #[serde(default)]
    pub phone_before: Option<i64>,
    #[serde(default)]
    pub phone_after: Option<i64>,
    /// Whether the after-event text asks for a completion check-in.
    #[serde(default)]
    pub text_check_in: bool,
}

impl NotificationSettings {
    pub fn for_goal(goal_id: impl Into<String>) -> Self {
        Self {
            goal_id: goal_id.into(),
            ..Self::default()
        }
    }

    /// The configured offset for a channel-direction pair, if enabled.
    pub fn offset(&self, channel: Channel, direction: Direction) -> Option<i64> {
        match (channel, direction) {
            (Channel::Push, Direction::Before) => self.push_before,
            (Channel::Push, Direction::After) => self.push_after,
            (Channel::Text, Direction::Before) => self.text_before,
            (Channel::Text, Direction::After) => self.text_after,
            (Channel::Phone, Direction::Before) => self.phone_before,
            (Channel::Phone, Direction::After) => self.phone_after,
        }
    }
}

/// A notification with its computed fire instant, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedNotification {
    pub user_id: String,
    pub goal_id: String,
    pub goal_title: String,
    pub event_id: String,
    pub event_title: String,
    pub channel: Channel,
    pub direction: Direction,
    pub offset_min: i64,
    pub fire_at: DateTime<Utc>,
    /// After-event texts may ask the user to check in on completion.
    #[serde(default)]
    pub check_in: bool,
}

/// Compute every enabled notification time for one scheduled event.
///
/// Before-notifications fire `offset` minutes before the event starts;
/// after-notifications fire `offset` minutes after it ends. Each
/// channel-direction pair is computed independently.
pub fn fire_times(
    event: &ExternalEvent,
    goal: &Goal,
    settings: &NotificationSettings,
) -> Vec<PlannedNotification> {
    CHANNEL_DIRECTIONS
        .iter()
        .filter_map(|&(channel, direction)| {
            let offset = settings.offset(channel, direction)?;
            let fire_at = match direction {
                Direction::Before => event.interval.start - Duration::minutes(offset),
                Direction::After => event.interval.end + Duration::minutes(offset),
            };
            Some(PlannedNotification {
                user_id: goal.user_id.clone(),
                goal_id: goal.id.clone(),
                goal_title: goal.title.clone(),
                event_id: event.id.clone(),
                event_title: event.title.clone(),
                channel,
                direction,
                offset_min: offset,
                fire_at,
                check_in: settings.text_check_in
                    && channel == Channel::Text
                    && direction == Direction::After,
            })
        })
        .collect()
}
