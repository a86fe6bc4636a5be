mod attendance;
mod cli;
mod dates;
mod db;
mod eligibility;
mod error;
mod fmt;
mod models;
mod pdf;
mod period;
mod pipeline;
mod receipt;
mod reconciler;
mod reports;
mod retry;
mod scan;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RulesCommands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_path();

    let result = match cli.command {
        Commands::Init { data_dir, force } => cli::init::run(config, data_dir, force),
        Commands::Process {
            base,
            month,
            dry_run,
            no_db,
        } => cli::process::run(config, &base, month.as_deref(), dry_run, no_db),
        Commands::Attendance { file } => cli::attendance::run(config, &file),
        Commands::Receipt { file, invoice_type } => cli::receipt::run(config, &file, &invoice_type),
        Commands::Window { month } => cli::window::run(month.as_deref()),
        Commands::Rules { command } => match command {
            RulesCommands::Show => cli::rules::show(config),
            RulesCommands::Set {
                dinner_threshold,
                dinner_amount,
                night_threshold,
                night_amount,
                taxi_threshold,
            } => cli::rules::set(
                config,
                cli::rules::RuleChanges {
                    dinner_threshold,
                    dinner_amount,
                    night_threshold,
                    night_amount,
                    taxi_threshold,
                },
            ),
        },
        Commands::Status { month } => cli::status::run(config, month.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
