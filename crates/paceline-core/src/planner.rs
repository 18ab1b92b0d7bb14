//! Window planning: one call from profile + goals + events to allocation
//! targets.
//!
//! Computes the free-time table once, then per goal the preferred slots and
//! the allocator's target hours. The output is what an external placer
//! needs to propose concrete intervals, which `ScheduleValidator` then
//! checks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocator::CommitmentAllocator;
use crate::config::TuningConfig;
use crate::error::Result;
use crate::event::{ExternalEvent, Interval};
use crate::goal::{Goal, GoalTarget};
use crate::intervals::{FreeTimeTable, IntervalCalculator};
use crate::preferred::{match_slots, MatchedSlot, PreferredTimeMatcher};
use crate::profile::UserProfile;

/// Which allocation mode a plan runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Normal forward planning.
    SteadyState,
    /// Re-planning after falling behind pace.
    CatchUp,
}

/// Target hours and usable slots for one goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAllocation {
    pub goal_id: String,
    pub title: String,
    pub target_hours: f64,
    pub slots: Vec<MatchedSlot>,
}

/// A complete plan for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowPlan {
    pub window: Interval,
    pub mode: PlanMode,
    pub table: FreeTimeTable,
    pub allocations: Vec<GoalAllocation>,
}

/// Ties the calculator, matcher, and allocator together.
pub struct Planner {
    calculator: IntervalCalculator,
    allocator: CommitmentAllocator,
}

impl Planner {
    pub fn new() -> Self {
        Self {
            calculator: IntervalCalculator::new(),
            allocator: CommitmentAllocator::new(),
        }
    }

    pub fn with_config(config: &TuningConfig) -> Self {
        Self {
            calculator: IntervalCalculator::from_config(&config.intervals),
            allocator: CommitmentAllocator::with_config(config.allocator.clone()),
        }
    }

    /// Plan `window` for every goal of `profile`'s user.
    ///
    /// `events` should cover the window and as much of each goal's natural
    /// period as is loaded; projections beyond the window are discounted by
    /// the allocator rather than trusted.
    pub fn plan_window(
        &self,
        profile: &UserProfile,
        goals: &[Goal],
        events: &[ExternalEvent],
        window: Interval,
        mode: PlanMode,
    ) -> Result<WindowPlan> {
        let table = self.calculator.compute(profile, window, events)?;

        // The horizon actually loaded: the window, extended by any event
        // reaching past it.
        let horizon_end = events
            .iter()
            .map(|event| event.interval.end)
            .max()
            .unwrap_or(window.end)
            .max(window.end);

        let mut allocations = Vec::new();
        for goal in goals.iter().filter(|g| g.user_id == profile.user_id) {
            let days = PreferredTimeMatcher::resolve(goal, profile, window)?;
            let slots = match_slots(&days, Some(&table.free), Some(&table.free_work));

            let target_hours = match mode {
                PlanMode::CatchUp => self.allocator.catch_up(goal, &slots),
                PlanMode::SteadyState => {
                    let (natural_end, period_days) = match &goal.target {
                        GoalTarget::Weekly { .. } => {
                            (window.start + chrono::Duration::days(7), 7)
                        }
                        GoalTarget::Deadline { deadline, .. } => {
                            // The natural period runs from the goal's creation
                            // to its deadline.
                            let days = Interval::new(goal.created_at, *deadline)
                                .map(|period| period.span_days())
                                .unwrap_or(1);
                            (*deadline, days)
                        }
                    };

                    let period_end = natural_end.min(horizon_end).max(window.end);
                    let period_slots = if period_end == window.end {
                        slots.clone()
                    } else {
                        let period = Interval::new(window.start, period_end)
                            .unwrap_or(window);
                        let period_table = self.calculator.compute(profile, period, events)?;
                        let period_windows =
                            PreferredTimeMatcher::resolve(goal, profile, period)?;
                        match_slots(
                            &period_windows,
                            Some(&period_table.free),
                            Some(&period_table.free_work),
                        )
                    };

                    self.allocator
                        .steady_state(goal, window, &slots, &period_slots, period_days)
                }
            };

            debug!(goal_id = %goal.id, target_hours, "goal allocation computed");
            allocations.push(GoalAllocation {
                goal_id: goal.id.clone(),
                title: goal.title.clone(),
                target_hours,
                slots,
            });
        }

        Ok(WindowPlan {
            window,
            mode,
            table,
            allocations,
        })
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}
