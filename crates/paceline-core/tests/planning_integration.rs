//! Integration tests for the planning pipeline: free-time computation,
//! preferred-time matching, allocation, and placement validation working
//! together the way the external placer consumes them.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use paceline_core::{
    ExternalEvent, Goal, GoalPriority, GoalTarget, Interval, LocalSpan, PlanMode, Planner,
    PreferredTime, ScheduleValidator, UserProfile, WeekRoutine, WorkSchedule,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, h, m, 0).unwrap()
}

fn make_profile() -> UserProfile {
    let mut profile = UserProfile::new("u1", "UTC");
    profile.routine = WeekRoutine::default().with_sleep_all(LocalSpan::new(t(23, 0), t(7, 0)));
    profile
}

fn make_goal() -> Goal {
    let mut goal = Goal::new(
        "u1",
        "Guitar",
        GoalPriority::High,
        GoalTarget::Weekly { hours_per_week: 2.0 },
    );
    goal.allow_multiple_per_day = true;
    goal.min_duration_min = 30;
    goal.max_duration_min = 120;
    goal.preferred_times = vec![PreferredTime::Evening];
    goal
}

#[test]
fn plan_then_validate_accepted_placement() {
    let profile = make_profile();
    let goal = make_goal();
    // Full week: the allocator owes exactly the weekly commitment.
    let window = Interval::new(at(2, 0, 0), at(9, 0, 0)).unwrap();

    let plan = Planner::new()
        .plan_window(&profile, &[goal.clone()], &[], window, PlanMode::SteadyState)
        .unwrap();
    let allocation = &plan.allocations[0];
    assert_eq!(allocation.target_hours, 2.0);

    // A placer fills two evening sessions on different days.
    let proposed = vec![
        Interval::new(at(2, 18, 0), at(2, 19, 0)).unwrap(),
        Interval::new(at(3, 18, 0), at(3, 19, 0)).unwrap(),
    ];
    let report = ScheduleValidator::new().validate(
        &goal,
        &proposed,
        &plan.table.free,
        &plan.table.free_work,
        allocation.target_hours,
        chrono_tz::UTC,
    );
    assert!(report.is_valid, "violations: {:?}", report.violations);
}

#[test]
fn plan_rejects_placement_breaking_constraints() {
    let profile = make_profile();
    let mut goal = make_goal();
    goal.allow_multiple_per_day = false;

    let window = Interval::new(at(2, 0, 0), at(9, 0, 0)).unwrap();
    let plan = Planner::new()
        .plan_window(&profile, &[goal.clone()], &[], window, PlanMode::SteadyState)
        .unwrap();

    // Two sessions on the same day for a one-per-day goal, one of them
    // too short.
    let proposed = vec![
        Interval::new(at(2, 18, 0), at(2, 18, 15)).unwrap(),
        Interval::new(at(2, 19, 0), at(2, 20, 0)).unwrap(),
    ];
    let report = ScheduleValidator::new().validate(
        &goal,
        &proposed,
        &plan.table.free,
        &plan.table.free_work,
        plan.allocations[0].target_hours,
        chrono_tz::UTC,
    );
    assert!(!report.is_valid);
    assert!(report.violations.len() >= 2);
}

#[test]
fn work_day_events_and_routine_shape_the_plan() {
    let mut profile = make_profile();
    profile.work = Some(WorkSchedule {
        days: vec![
            paceline_core::DayOfWeek::Monday,
            paceline_core::DayOfWeek::Tuesday,
        ],
        span: LocalSpan::new(t(9, 0), t(17, 0)),
    });
    profile.routine.monday.activities.push(paceline_core::RoutineBlock {
        name: "lunch".to_string(),
        span: LocalSpan::new(t(12, 0), t(13, 0)),
        skip: false,
    });

    let mut goal = make_goal();
    goal.preferred_times = vec![PreferredTime::Midday]; // 11:00-14:00
    goal.can_do_during_work = false;

    let window = Interval::new(at(2, 0, 0), at(3, 0, 0)).unwrap();
    let events = vec![ExternalEvent::new(
        "standup",
        Interval::new(at(2, 11, 0), at(2, 11, 30)).unwrap(),
    )];

    let plan = Planner::new()
        .plan_window(&profile, &[goal.clone()], &events, window, PlanMode::CatchUp)
        .unwrap();

    // Midday free-work slots exist (11:30-12:00, 13:00-14:00) but the goal
    // cannot use work time, so catch-up owes nothing.
    let allocation = &plan.allocations[0];
    assert!(allocation.slots.iter().all(|slot| slot.during_work));
    assert_eq!(allocation.target_hours, 0.0);

    // The same plan allows the slots once work time is permitted.
    let mut flexible = goal.clone();
    flexible.can_do_during_work = true;
    let plan = Planner::new()
        .plan_window(&profile, &[flexible], &events, window, PlanMode::CatchUp)
        .unwrap();
    assert!(plan.allocations[0].target_hours > 0.0);
}

#[test]
fn five_minute_gap_never_reaches_the_plan() {
    let profile = make_profile();
    let goal = make_goal();
    let window = Interval::new(at(2, 0, 0), at(3, 0, 0)).unwrap();
    // Meetings leaving a 5-minute sliver at 18:00.
    let events = vec![
        ExternalEvent::new("a", Interval::new(at(2, 17, 0), at(2, 18, 0)).unwrap()),
        ExternalEvent::new("b", Interval::new(at(2, 18, 5), at(2, 20, 0)).unwrap()),
    ];

    let plan = Planner::new()
        .plan_window(&profile, &[goal], &events, window, PlanMode::SteadyState)
        .unwrap();

    assert!(plan
        .table
        .free
        .iter()
        .all(|f| f.interval.duration_minutes() >= 10));
    assert!(plan.allocations[0]
        .slots
        .iter()
        .all(|slot| slot.interval.start != at(2, 18, 0)));
}
