//! Free-time computation from routine and calendar events.
//!
//! Walks each day of a window in the profile's timezone, carves existing
//! events out of the wake-to-bed span, and classifies the surviving runs as
//! free or free-during-work time. Gaps too short to be usable are dropped.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::config::IntervalConfig;
use crate::error::InvariantError;
use crate::event::{
    ExternalEvent, Interval, IntervalKind, TypedInterval, WakeSleepEvent, WakeSleepKind,
};
use crate::profile::{local_to_utc, DayOfWeek, UserProfile};

/// Everything the calculator learns about a window.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FreeTimeTable {
    /// Free intervals outside work hours, sorted by start.
    pub free: Vec<TypedInterval>,
    /// Free intervals inside work hours on work days, sorted by start.
    pub free_work: Vec<TypedInterval>,
    /// Wake/sleep markers for each day touched.
    pub wake_sleep: Vec<WakeSleepEvent>,
    /// The merged routine + calendar events, useful as scheduling context.
    pub context: Vec<ExternalEvent>,
}

/// Computes free and free-work intervals for a window.
pub struct IntervalCalculator {
    /// Gaps shorter than this many minutes are dropped as unusable.
    min_block_minutes: i64,
}

impl IntervalCalculator {
    /// Create a calculator with the default 10-minute minimum block.
    pub fn new() -> Self {
        Self {
            min_block_minutes: 10,
        }
    }

    pub fn from_config(config: &IntervalConfig) -> Self {
        Self {
            min_block_minutes: config.min_block_minutes,
        }
    }

    /// Override the minimum usable block size.
    pub fn with_min_block(mut self, minutes: i64) -> Self {
        self.min_block_minutes = minutes;
        self
    }

    /// Compute the free-time table for `window`.
    ///
    /// `events` should contain everything overlapping the window, including
    /// all-day markers. An event spanning midnight is carved on its start
    /// day only. Day 0 may begin mid-day; the final day's bed instant is
    /// capped at the window end.
    pub fn compute(
        &self,
        profile: &UserProfile,
        window: Interval,
        events: &[ExternalEvent],
    ) -> Result<FreeTimeTable, InvariantError> {
        let tz = profile.tz();
        let mut table = FreeTimeTable::default();

        let first_date = window.start.with_timezone(&tz).date_naive();
        let last_date = window.end.with_timezone(&tz).date_naive();

        let mut date = first_date;
        while date <= last_date {
            self.compute_day(profile, window, events, date, &mut table)?;
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        debug!(
            user_id = %profile.user_id,
            free = table.free.len(),
            free_work = table.free_work.len(),
            "computed free-time table"
        );
        Ok(table)
    }

    fn compute_day(
        &self,
        profile: &UserProfile,
        window: Interval,
        events: &[ExternalEvent],
        date: NaiveDate,
        table: &mut FreeTimeTable,
    ) -> Result<(), InvariantError> {
        let tz = profile.tz();
        let (wake, bed) = profile.day_bounds(date)?;

        let day_start = wake.max(window.start);
        let day_end = bed.min(window.end);

        // Routine activities positioned on this date.
        let day = DayOfWeek::of(date);
        let mut day_events: Vec<ExternalEvent> = profile
            .routine
            .day(day)
            .activities
            .iter()
            .filter(|block| !block.skip)
            .filter_map(|block| {
                let start = local_to_utc(tz, date, block.span.start);
                let end_date = if block.span.crosses_midnight() {
                    date + Duration::days(1)
                } else {
                    date
                };
                let end = local_to_utc(tz, end_date, block.span.end);
                Interval::new(start, end).map(|interval| ExternalEvent::new(&block.name, interval))
            })
            .collect();

        // Calendar events starting this date. All-day markers reserve no
        // span but stay visible as context.
        let mut carved: Vec<ExternalEvent> = Vec::new();
        for event in events {
            if event.interval.start.with_timezone(&tz).date_naive() != date {
                continue;
            }
            if !event.all_day {
                carved.push(event.clone());
            }
            table.context.push(event.clone());
        }
        table.context.extend(day_events.iter().cloned());
        day_events.extend(carved);
        day_events.sort_by_key(|event| event.interval.start);

        if day_start >= day_end {
            return Ok(());
        }
        table.wake_sleep.push(WakeSleepEvent {
            kind: WakeSleepKind::WakeUp,
            at: day_start,
        });
        table.wake_sleep.push(WakeSleepEvent {
            kind: WakeSleepKind::Sleep,
            at: day_end,
        });

        // Chronological sweep from wake to bed, carving out event spans.
        let mut runs: Vec<Interval> = Vec::new();
        let mut cursor = day_start;
        for event in &day_events {
            if event.interval.end <= cursor {
                continue;
            }
            if event.interval.start >= day_end {
                break;
            }
            if event.interval.start > cursor {
                self.push_run(&mut runs, cursor, event.interval.start.min(day_end));
            }
            cursor = cursor.max(event.interval.end.min(day_end));
        }
        if cursor < day_end {
            self.push_run(&mut runs, cursor, day_end);
        }

        // Split runs at work-hour boundaries.
        let work_span = profile.work.as_ref().and_then(|work| {
            if work.is_work_day(day) {
                Interval::new(
                    local_to_utc(tz, date, work.span.start),
                    local_to_utc(tz, date, work.span.end),
                )
            } else {
                None
            }
        });

        for run in runs {
            match work_span {
                Some(work) => {
                    if let Some(before) = Interval::new(run.start, run.end.min(work.start)) {
                        table.free.push(TypedInterval::new(before, IntervalKind::Free));
                    }
                    if let Some(during) = run.intersect(&work) {
                        table
                            .free_work
                            .push(TypedInterval::new(during, IntervalKind::FreeWork));
                    }
                    if let Some(after) = Interval::new(run.start.max(work.end), run.end) {
                        table.free.push(TypedInterval::new(after, IntervalKind::Free));
                    }
                }
                None => table.free.push(TypedInterval::new(run, IntervalKind::Free)),
            }
        }
        Ok(())
    }

    fn push_run(&self, runs: &mut Vec<Interval>, start: DateTime<Utc>, end: DateTime<Utc>) {
        if let Some(run) = Interval::new(start, end) {
            if run.duration_minutes() >= self.min_block_minutes {
                runs.push(run);
            }
        }
    }
}

impl Default for IntervalCalculator {
    fn default() -> Self {
        Self::new()
    }
}
