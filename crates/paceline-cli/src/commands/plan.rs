use std::error::Error;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use clap::{Args, ValueEnum};
use paceline_core::{ExternalEvent, Goal, Interval, PlanMode, Planner, TuningConfig, UserProfile};

use crate::common::{print_json, read_json};

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    SteadyState,
    CatchUp,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Profile JSON file (routine, work schedule, timezone)
    #[arg(long)]
    profile: PathBuf,
    /// Goals JSON file (array of goals)
    #[arg(long)]
    goals: PathBuf,
    /// Calendar events JSON file (array of events)
    #[arg(long)]
    events: Option<PathBuf>,
    /// Window start (RFC 3339); defaults to now
    #[arg(long)]
    start: Option<DateTime<Utc>>,
    /// Window length in days
    #[arg(long, default_value_t = 7)]
    days: i64,
    /// Allocation mode
    #[arg(long, value_enum, default_value_t = ModeArg::SteadyState)]
    mode: ModeArg,
    /// Tuning config TOML; defaults are used when absent
    #[arg(long)]
    config: Option<PathBuf>,
}

pub fn run(args: PlanArgs) -> Result<(), Box<dyn Error>> {
    let profile: UserProfile = read_json(&args.profile)?;
    let goals: Vec<Goal> = read_json(&args.goals)?;
    let events: Vec<ExternalEvent> = match &args.events {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let start = args.start.unwrap_or_else(Utc::now);
    let window = Interval::new(start, start + Duration::days(args.days.max(1)))
        .ok_or("window must span at least one day")?;

    let planner = match &args.config {
        Some(path) => Planner::with_config(&TuningConfig::load(path)?),
        None => Planner::new(),
    };
    let mode = match args.mode {
        ModeArg::SteadyState => PlanMode::SteadyState,
        ModeArg::CatchUp => PlanMode::CatchUp,
    };

    let plan = planner.plan_window(&profile, &goals, &events, window, mode)?;
    print_json(&plan)
}
