//! Commitment allocation: minutes owed to a goal in the current window.
//!
//! Computing exact future free time is unknowable, so both modes estimate.
//! Steady-state discounts the projected free time of the goal's full period
//! by a per-day decay (unseen future events will consume some of it);
//! catch-up ignores the projection and works from the concrete window alone
//! with steeper priority factors. Results are approximate, monotonic, and
//! idempotent given identical inputs.

use tracing::debug;

use crate::config::AllocatorConfig;
use crate::event::Interval;
use crate::goal::{Goal, GoalTarget};
use crate::preferred::MatchedSlot;

/// Estimates target hours per goal per planning window.
pub struct CommitmentAllocator {
    config: AllocatorConfig,
}

impl CommitmentAllocator {
    pub fn new() -> Self {
        Self {
            config: AllocatorConfig::default(),
        }
    }

    pub fn with_config(config: AllocatorConfig) -> Self {
        Self { config }
    }

    /// Steady-state allocation for normal planning.
    ///
    /// `window_slots` are the goal's preferred∩free slots inside the window;
    /// `period_slots` the same computation over the goal's full natural
    /// period (a week, or now until the deadline), limited to the horizon
    /// actually loaded. `period_days` is the length of that period in days.
    /// Returns hours.
    pub fn steady_state(
        &self,
        goal: &Goal,
        window: Interval,
        window_slots: &[MatchedSlot],
        period_slots: &[MatchedSlot],
        period_days: i64,
    ) -> f64 {
        let outstanding_min = goal.outstanding_hours() * 60.0;
        if outstanding_min <= 0.0 {
            return 0.0;
        }

        // A full week of a recurring goal owes exactly the weekly commitment.
        if let GoalTarget::Weekly { hours_per_week } = goal.target {
            if (window.end - window.start).num_days() >= 7 {
                return hours_per_week;
            }
        }

        if !goal.allow_multiple_per_day {
            let cap = self.round(window.span_days() as f64 * goal.max_duration_min as f64);
            let minutes = outstanding_min.min(cap);
            return minutes / 60.0;
        }

        let remaining = usable_minutes(goal, window_slots) as f64;
        let total = usable_minutes(goal, period_slots) as f64;
        let decay = self.config.horizon_decay.powi(period_days.max(1) as i32);
        let projected = total * decay;
        let adjustment = if projected > 0.0 {
            (remaining / projected).min(1.0)
        } else if remaining > 0.0 {
            1.0
        } else {
            0.0
        };

        let factors = match goal.target {
            GoalTarget::Weekly { .. } => self.config.weekly_priority_factors,
            GoalTarget::Deadline { .. } => self.config.deadline_priority_factors,
        };
        let factor = factors.for_priority(goal.priority);

        let mut minutes = self.round(outstanding_min * adjustment * factor);
        if minutes > 0.0 {
            minutes = minutes.max(goal.min_duration_min as f64);
        }

        debug!(
            goal_id = %goal.id,
            remaining,
            projected,
            adjustment,
            minutes,
            "steady-state allocation"
        );
        minutes / 60.0
    }

    /// Catch-up allocation after falling behind: concrete window minutes
    /// scaled by a steeper priority factor, never exceeding the outstanding
    /// amount. Returns hours.
    pub fn catch_up(&self, goal: &Goal, window_slots: &[MatchedSlot]) -> f64 {
        let outstanding_min = goal.outstanding_hours() * 60.0;
        if outstanding_min <= 0.0 {
            return 0.0;
        }

        let concrete = usable_minutes(goal, window_slots) as f64;
        let factor = self.config.catch_up_factors.for_priority(goal.priority);
        let minutes = self.round(concrete * factor).min(outstanding_min);

        debug!(goal_id = %goal.id, concrete, minutes, "catch-up allocation");
        minutes / 60.0
    }

    fn round(&self, minutes: f64) -> f64 {
        let increment = self.config.rounding_minutes.max(1) as f64;
        (minutes / increment).round() * increment
    }
}

impl Default for CommitmentAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Minutes across slots the goal is actually allowed to use.
fn usable_minutes(goal: &Goal, slots: &[MatchedSlot]) -> i64 {
    slots
        .iter()
        .filter(|slot| goal.can_do_during_work || !slot.during_work)
        .map(|slot| slot.interval.duration_minutes())
        .sum()
}
