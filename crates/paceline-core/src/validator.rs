//! Hard-constraint validation of proposed goal placements.
//!
//! The validator is pure and collects every violation instead of failing
//! fast, so a retrying placer can fix all of them in one pass. Violations
//! are data handed back to the caller, not errors.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

use crate::event::{Interval, TypedInterval};
use crate::goal::Goal;

/// A single broken constraint in a proposed placement.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleViolation {
    #[error("interval {index} lasts {actual} min, outside [{min}, {max}] min")]
    DurationOutOfBounds {
        index: usize,
        actual: i64,
        min: i64,
        max: i64,
    },

    #[error("interval {index} is not fully contained in any free interval")]
    OutsideFreeTime { index: usize },

    #[error("interval {index} falls in work hours but the goal disallows work time")]
    WorkTimeNotAllowed { index: usize },

    #[error("intervals {first} and {second} overlap")]
    OverlappingIntervals { first: usize, second: usize },

    #[error("scheduled total {actual} min does not match target {target} min")]
    TotalMismatch { actual: i64, target: i64 },

    #[error("{count} intervals on {date} but the goal allows one per day")]
    MultiplePerDay { date: NaiveDate, count: usize },
}

/// Outcome of validating a proposed placement.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub violations: Vec<ScheduleViolation>,
}

impl ValidationReport {
    fn from_violations(violations: Vec<ScheduleViolation>) -> Self {
        Self {
            is_valid: violations.is_empty(),
            violations,
        }
    }
}

/// Checks proposed intervals against all hard constraints.
pub struct ScheduleValidator {
    /// Slack allowed between back-to-back sessions, in seconds.
    overlap_tolerance_secs: i64,
}

impl ScheduleValidator {
    pub fn new() -> Self {
        Self {
            overlap_tolerance_secs: 1,
        }
    }

    /// Validate `proposed` for `goal` against the computed free time.
    ///
    /// `target_hours` is the allocator's output the placement must add up
    /// to. `tz` resolves calendar days for the one-per-day check.
    pub fn validate(
        &self,
        goal: &Goal,
        proposed: &[Interval],
        free: &[TypedInterval],
        free_work: &[TypedInterval],
        target_hours: f64,
        tz: Tz,
    ) -> ValidationReport {
        let mut violations = Vec::new();

        for (index, interval) in proposed.iter().enumerate() {
            let actual = interval.duration_minutes();
            if actual < goal.min_duration_min || actual > goal.max_duration_min {
                violations.push(ScheduleViolation::DurationOutOfBounds {
                    index,
                    actual,
                    min: goal.min_duration_min,
                    max: goal.max_duration_min,
                });
            }

            let in_free = free.iter().any(|f| f.interval.contains(interval));
            let in_work = free_work.iter().any(|f| f.interval.contains(interval));
            if !in_free && !in_work {
                violations.push(ScheduleViolation::OutsideFreeTime { index });
            } else if in_work && !in_free && !goal.can_do_during_work {
                violations.push(ScheduleViolation::WorkTimeNotAllowed { index });
            }
        }

        for (first, a) in proposed.iter().enumerate() {
            for (offset, b) in proposed.iter().enumerate().skip(first + 1) {
                let overlap_secs = (a.end.min(b.end) - a.start.max(b.start)).num_seconds();
                if overlap_secs > self.overlap_tolerance_secs {
                    violations.push(ScheduleViolation::OverlappingIntervals {
                        first,
                        second: offset,
                    });
                }
            }
        }

        let actual_total: i64 = proposed.iter().map(|i| i.duration_minutes()).sum();
        let target_min = (target_hours * 60.0).round() as i64;
        if actual_total != target_min {
            violations.push(ScheduleViolation::TotalMismatch {
                actual: actual_total,
                target: target_min,
            });
        }

        if !goal.allow_multiple_per_day {
            let mut dates: Vec<NaiveDate> = proposed
                .iter()
                .map(|i| i.start.with_timezone(&tz).date_naive())
                .collect();
            dates.sort();
            let mut run_start = 0;
            for i in 1..=dates.len() {
                if i == dates.len() || dates[i] != dates[run_start] {
                    let count = i - run_start;
                    if count > 1 {
                        violations.push(ScheduleViolation::MultiplePerDay {
                            date: dates[run_start],
                            count,
                        });
                    }
                    run_start = i;
                }
            }
        }

        ValidationReport::from_violations(violations)
    }
}

impl Default for ScheduleValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::IntervalKind;
    use crate::goal::{GoalPriority, GoalTarget};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, h, m, 0).unwrap()
    }

    fn span(day: u32, sh: u32, sm: u32, eh: u32, em: u32) -> Interval {
        Interval::new(at(day, sh, sm), at(day, eh, em)).unwrap()
    }

    fn free(day: u32, sh: u32, eh: u32) -> TypedInterval {
        TypedInterval::new(span(day, sh, 0, eh, 0), IntervalKind::Free)
    }

    fn free_work(day: u32, sh: u32, eh: u32) -> TypedInterval {
        TypedInterval::new(span(day, sh, 0, eh, 0), IntervalKind::FreeWork)
    }

    fn make_goal() -> Goal {
        let mut goal = Goal::new(
            "u1",
            "Guitar",
            GoalPriority::High,
            GoalTarget::Weekly { hours_per_week: 5.0 },
        );
        goal.min_duration_min = 30;
        goal.max_duration_min = 120;
        goal.allow_multiple_per_day = true;
        goal
    }

    #[test]
    fn valid_placement_passes() {
        let goal = make_goal();
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 10, 0), span(3, 9, 0, 10, 0)],
            &[free(2, 8, 12), free(3, 8, 12)],
            &[],
            2.0,
            chrono_tz::UTC,
        );
        assert!(report.is_valid);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn too_short_interval_flagged() {
        let goal = make_goal();
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 9, 15)],
            &[free(2, 8, 12)],
            &[],
            0.25,
            chrono_tz::UTC,
        );
        assert!(!report.is_valid);
        assert!(report.violations.iter().any(|v| matches!(
            v,
            ScheduleViolation::DurationOutOfBounds { actual: 15, .. }
        )));
    }

    #[test]
    fn partial_overlap_with_free_time_flagged() {
        let goal = make_goal();
        // 11:30-12:30 sticks out of the 08:00-12:00 free interval.
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 11, 30, 12, 30)],
            &[free(2, 8, 12)],
            &[],
            1.0,
            chrono_tz::UTC,
        );
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ScheduleViolation::OutsideFreeTime { index: 0 })));
    }

    #[test]
    fn overlapping_proposals_flagged() {
        let goal = make_goal();
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 10, 0), span(2, 9, 30, 10, 30)],
            &[free(2, 8, 12)],
            &[],
            2.0,
            chrono_tz::UTC,
        );
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ScheduleViolation::OverlappingIntervals { first: 0, second: 1 })));
    }

    #[test]
    fn back_to_back_within_tolerance_allowed() {
        let goal = make_goal();
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 10, 0), span(2, 10, 0, 11, 0)],
            &[free(2, 8, 12)],
            &[],
            2.0,
            chrono_tz::UTC,
        );
        assert!(report.is_valid);
    }

    #[test]
    fn work_time_flagged_when_disallowed() {
        let mut goal = make_goal();
        goal.can_do_during_work = false;
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 10, 0)],
            &[],
            &[free_work(2, 8, 12)],
            1.0,
            chrono_tz::UTC,
        );
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ScheduleViolation::WorkTimeNotAllowed { index: 0 })));

        goal.can_do_during_work = true;
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 10, 0)],
            &[],
            &[free_work(2, 8, 12)],
            1.0,
            chrono_tz::UTC,
        );
        assert!(report.is_valid);
    }

    #[test]
    fn total_mismatch_flagged() {
        let goal = make_goal();
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 10, 0)],
            &[free(2, 8, 12)],
            &[],
            2.0,
            chrono_tz::UTC,
        );
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ScheduleViolation::TotalMismatch { actual: 60, target: 120 })));
    }

    #[test]
    fn multiple_per_day_flagged() {
        let mut goal = make_goal();
        goal.allow_multiple_per_day = false;
        let report = ScheduleValidator::new().validate(
            &goal,
            &[span(2, 9, 0, 10, 0), span(2, 15, 0, 16, 0)],
            &[free(2, 8, 18)],
            &[],
            2.0,
            chrono_tz::UTC,
        );
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ScheduleViolation::MultiplePerDay { count: 2, .. })));
    }

    #[test]
    fn all_violations_collected_in_one_pass() {
        let mut goal = make_goal();
        goal.allow_multiple_per_day = false;
        let report = ScheduleValidator::new().validate(
            &goal,
            &[
                span(2, 9, 0, 9, 10),  // too short
                span(2, 9, 5, 13, 0),  // overlaps, sticks out of free time, too long
            ],
            &[free(2, 8, 12)],
            &[],
            5.0,
            chrono_tz::UTC,
        );
        assert!(!report.is_valid);
        assert!(report.violations.len() >= 4);
    }
}
