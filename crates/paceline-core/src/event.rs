//! Time intervals and calendar events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A half-open time span `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Create an interval; `None` if the range is empty or inverted.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Number of calendar days the span reaches into, rounded up (minimum 1).
    pub fn span_days(&self) -> i64 {
        let minutes = (self.end - self.start).num_minutes();
        ((minutes + 24 * 60 - 1) / (24 * 60)).max(1)
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside this interval.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_instant(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// The overlapping portion of two intervals, if non-empty.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        Interval::new(self.start.max(other.start), self.end.min(other.end))
    }
}

/// Kind of a computed free interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    /// Free time outside declared work hours.
    Free,
    /// Free time inside declared work hours on a work day.
    FreeWork,
}

/// A free interval with its kind and a context-relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypedInterval {
    pub interval: Interval,
    pub kind: IntervalKind,
    /// Longer runs score higher; informational only.
    pub score: f64,
}

impl TypedInterval {
    pub fn new(interval: Interval, kind: IntervalKind) -> Self {
        let score = interval.duration_minutes() as f64 / 60.0;
        Self {
            interval,
            kind,
            score,
        }
    }
}

/// Wake or sleep marker emitted alongside computed intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeSleepKind {
    WakeUp,
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeSleepEvent {
    pub kind: WakeSleepKind,
    pub at: DateTime<Utc>,
}

/// A calendar entry or routine block, represented uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub id: String,
    pub title: String,
    pub interval: Interval,
    /// All-day markers reserve no concrete span.
    #[serde(default)]
    pub all_day: bool,
    /// Planned duration in minutes, when distinct from the interval.
    #[serde(default)]
    pub duration_min: Option<i64>,
    /// The goal this event works toward, if any.
    #[serde(default)]
    pub goal_id: Option<String>,
}

impl ExternalEvent {
    pub fn new(title: impl Into<String>, interval: Interval) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            interval,
            all_day: false,
            duration_min: None,
            goal_id: None,
        }
    }

    pub fn for_goal(mut self, goal_id: impl Into<String>) -> Self {
        self.goal_id = Some(goal_id.into());
        self
    }
}
