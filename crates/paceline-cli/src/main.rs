use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "paceline-cli", version, about = "Paceline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a window plan from profile, goals, and events
    Plan(commands::plan::PlanArgs),
    /// Validate a proposed placement against a computed plan
    Validate(commands::validate::ValidateArgs),
    /// Print the notification fire times for an event
    FireTimes(commands::fire_times::FireTimesArgs),
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::FireTimes(args) => commands::fire_times::run(args),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "paceline-cli",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
