use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use paceline_core::{Goal, Interval, ScheduleValidator, WindowPlan};

use crate::common::{print_json, read_json};

#[derive(Args)]
pub struct ValidateArgs {
    /// Goal JSON file
    #[arg(long)]
    goal: PathBuf,
    /// Proposed intervals JSON file (array of {start, end})
    #[arg(long)]
    proposed: PathBuf,
    /// Plan JSON file, as produced by `plan`
    #[arg(long)]
    plan: PathBuf,
    /// Target hours; defaults to the plan's allocation for the goal
    #[arg(long)]
    target: Option<f64>,
    /// Timezone for the one-session-per-day check
    #[arg(long, default_value = "UTC")]
    timezone: String,
}

pub fn run(args: ValidateArgs) -> Result<(), Box<dyn Error>> {
    let goal: Goal = read_json(&args.goal)?;
    let proposed: Vec<Interval> = read_json(&args.proposed)?;
    let plan: WindowPlan = read_json(&args.plan)?;

    let target_hours = match args.target {
        Some(target) => target,
        None => plan
            .allocations
            .iter()
            .find(|allocation| allocation.goal_id == goal.id)
            .map(|allocation| allocation.target_hours)
            .ok_or_else(|| format!("plan has no allocation for goal '{}'", goal.id))?,
    };

    let tz: chrono_tz::Tz = args
        .timezone
        .parse()
        .map_err(|_| format!("unknown timezone '{}'", args.timezone))?;

    let report = ScheduleValidator::new().validate(
        &goal,
        &proposed,
        &plan.table.free,
        &plan.table.free_work,
        target_hours,
        tz,
    );
    print_json(&report)?;

    if !report.is_valid {
        std::process::exit(2);
    }
    Ok(())
}
