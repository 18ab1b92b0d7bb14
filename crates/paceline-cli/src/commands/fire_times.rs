use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use paceline_core::{fire_times, ExternalEvent, Goal, NotificationSettings};

use crate::common::{print_json, read_json};

#[derive(Args)]
pub struct FireTimesArgs {
    /// Goal JSON file
    #[arg(long)]
    goal: PathBuf,
    /// Notification settings JSON file
    #[arg(long)]
    settings: PathBuf,
    /// Event JSON file
    #[arg(long)]
    event: PathBuf,
}

pub fn run(args: FireTimesArgs) -> Result<(), Box<dyn Error>> {
    let goal: Goal = read_json(&args.goal)?;
    let settings: NotificationSettings = read_json(&args.settings)?;
    let event: ExternalEvent = read_json(&args.event)?;

    let planned = fire_times(&event, &goal, &settings);
    print_json(&planned)
}
