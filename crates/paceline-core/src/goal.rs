//! Goals: what the user wants to spend unscheduled time on.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::profile::LocalSpan;

/// Priority tier of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    High,
    Medium,
    Low,
}

/// What the goal is working toward: a recurring weekly commitment, or a
/// total estimate due by a deadline. Exactly one applies per goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalTarget {
    Weekly { hours_per_week: f64 },
    Deadline {
        estimated_hours: f64,
        deadline: DateTime<Utc>,
    },
}

/// Named day-part bucket a goal prefers to be scheduled in.
///
/// Buckets carry fixed local wall-clock windows; the matcher clips them to
/// the user's actual wake/sleep boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredTime {
    EarlyMorning,
    Morning,
    Midday,
    Afternoon,
    Evening,
    Night,
}

impl PreferredTime {
    pub const ALL: [PreferredTime; 6] = [
        PreferredTime::EarlyMorning,
        PreferredTime::Morning,
        PreferredTime::Midday,
        PreferredTime::Afternoon,
        PreferredTime::Evening,
        PreferredTime::Night,
    ];

    /// The bucket's local wall-clock window.
    pub fn span(&self) -> LocalSpan {
        let (start, end) = match self {
            PreferredTime::EarlyMorning => (5, 8),
            PreferredTime::Morning => (8, 11),
            PreferredTime::Midday => (11, 14),
            PreferredTime::Afternoon => (14, 17),
            PreferredTime::Evening => (17, 20),
            PreferredTime::Night => (20, 23),
        };
        let on_the_hour = |hour| NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
        LocalSpan::new(on_the_hour(start), on_the_hour(end))
    }
}

/// A personal goal owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub priority: GoalPriority,
    pub target: GoalTarget,
    /// Hours already done; increments only via accountability updates.
    #[serde(default)]
    pub completed_hours: f64,
    /// Shortest acceptable scheduled session, in minutes.
    pub min_duration_min: i64,
    /// Longest acceptable scheduled session, in minutes.
    pub max_duration_min: i64,
    #[serde(default)]
    pub allow_multiple_per_day: bool,
    #[serde(default)]
    pub can_do_during_work: bool,
    /// Empty means no preference: every day-part is acceptable.
    #[serde(default)]
    pub preferred_times: Vec<PreferredTime>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Create a goal with sensible session bounds (30-120 minutes).
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        priority: GoalPriority,
        target: GoalTarget,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            priority,
            target,
            completed_hours: 0.0,
            min_duration_min: 30,
            max_duration_min: 120,
            allow_multiple_per_day: false,
            can_do_during_work: false,
            preferred_times: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Hours still owed toward the weekly or total target.
    pub fn outstanding_hours(&self) -> f64 {
        let total = match &self.target {
            GoalTarget::Weekly { hours_per_week } => *hours_per_week,
            GoalTarget::Deadline {
                estimated_hours, ..
            } => *estimated_hours,
        };
        (total - self.completed_hours).max(0.0)
    }

    /// Record completed time from an accountability update.
    pub fn record_progress(&mut self, hours: f64) {
        self.completed_hours += hours.max(0.0);
    }

    /// The day-parts this goal may be scheduled in; an empty preference
    /// set means every bucket is acceptable.
    pub fn effective_preferred_times(&self) -> Vec<PreferredTime> {
        if self.preferred_times.is_empty() {
            PreferredTime::ALL.to_vec()
        } else {
            let mut times = self.preferred_times.clone();
            times.sort_by_key(|bucket| bucket.span().start);
            times.dedup();
            times
        }
    }
}
