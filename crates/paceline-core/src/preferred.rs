//! Preferred-time resolution and slot matching.
//!
//! Turns a goal's named day-part buckets into concrete per-day windows,
//! clipped to the user's actual wake/sleep boundary, then intersects them
//! with computed free and free-work intervals. The same matching primitive
//! serves both concrete planning (with interval lists) and static estimation
//! (without).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InvariantError;
use crate::event::{Interval, TypedInterval};
use crate::goal::Goal;
use crate::profile::{local_to_utc, UserProfile};

/// Concrete preferred windows for one calendar day, sorted and merged.
#[derive(Debug, Clone, Serialize)]
pub struct DayPreferredWindows {
    pub date: NaiveDate,
    pub windows: Vec<Interval>,
}

/// A preferred window intersected with actual availability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedSlot {
    pub interval: Interval,
    /// Whether the slot falls inside declared work hours.
    pub during_work: bool,
}

/// Resolves day-part buckets against a profile's routine.
pub struct PreferredTimeMatcher;

impl PreferredTimeMatcher {
    /// Resolve a goal's preferred buckets to concrete windows for each day
    /// of `window`, clipping each bucket to the wake/sleep boundary and
    /// merging adjacent or overlapping buckets.
    pub fn resolve(
        goal: &Goal,
        profile: &UserProfile,
        window: Interval,
    ) -> Result<Vec<DayPreferredWindows>, InvariantError> {
        let tz = profile.tz();
        let buckets = goal.effective_preferred_times();

        let first_date = window.start.with_timezone(&tz).date_naive();
        let last_date = window.end.with_timezone(&tz).date_naive();

        let mut days = Vec::new();
        let mut date = first_date;
        while date <= last_date {
            let (wake, bed) = profile.day_bounds(date)?;
            let lo = wake.max(window.start);
            let hi = bed.min(window.end);

            let mut windows: Vec<Interval> = buckets
                .iter()
                .filter_map(|bucket| {
                    let span = bucket.span();
                    let start = local_to_utc(tz, date, span.start);
                    let end = local_to_utc(tz, date, span.end);
                    Interval::new(start.max(lo), end.min(hi))
                })
                .collect();
            windows.sort_by_key(|w| w.start);

            let merged = merge_windows(windows);
            if !merged.is_empty() {
                days.push(DayPreferredWindows {
                    date,
                    windows: merged,
                });
            }

            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(days)
    }
}

/// Merge sorted windows that touch or overlap.
fn merge_windows(windows: Vec<Interval>) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                last.end = last.end.max(window.end);
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Intersect per-day preferred windows with free and free-work intervals.
///
/// Yields every non-empty intersection tagged with a work flag. When both
/// interval lists are `None`, the raw preferred windows are yielded
/// unconditionally (static estimation). Inputs must be sorted by start
/// time; the per-list cursors advance only across day changes, so one day's
/// windows may all touch the same intervals.
pub fn match_slots(
    days: &[DayPreferredWindows],
    free: Option<&[TypedInterval]>,
    free_work: Option<&[TypedInterval]>,
) -> Vec<MatchedSlot> {
    if free.is_none() && free_work.is_none() {
        return days
            .iter()
            .flat_map(|day| day.windows.iter())
            .map(|&interval| MatchedSlot {
                interval,
                during_work: false,
            })
            .collect();
    }

    let mut out = Vec::new();
    let mut free_cursor = 0usize;
    let mut work_cursor = 0usize;
    for day in days {
        let mut day_slots = Vec::new();
        if let Some(list) = free {
            intersect_day(&day.windows, list, &mut free_cursor, false, &mut day_slots);
        }
        if let Some(list) = free_work {
            intersect_day(&day.windows, list, &mut work_cursor, true, &mut day_slots);
        }
        day_slots.sort_by_key(|slot| slot.interval.start);
        out.extend(day_slots);
    }
    out
}

/// Two-pointer sweep of one day's windows against a sorted interval list.
/// The cursor is left at the first interval the next day could still use.
fn intersect_day(
    windows: &[Interval],
    list: &[TypedInterval],
    cursor: &mut usize,
    during_work: bool,
    out: &mut Vec<MatchedSlot>,
) {
    let mut i = *cursor;
    let mut w = 0usize;
    while w < windows.len() && i < list.len() {
        let window = windows[w];
        let candidate = list[i].interval;
        if let Some(interval) = window.intersect(&candidate) {
            out.push(MatchedSlot {
                interval,
                during_work,
            });
        }
        if window.end <= candidate.end {
            w += 1;
        } else {
            i += 1;
        }
    }
    *cursor = i;
}
