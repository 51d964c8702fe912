pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use signoff_core::config::{AppConfig, LoadOptions, LogFormat};

use crate::commands::event_value::EventValueArgs;
use crate::commands::status::StatusArgs;

#[derive(Debug, Parser)]
#[command(
    name = "signoff",
    about = "Signoff operator CLI",
    long_about = "Migrate the approval schema, seed demo data, inspect configuration and resolve data-approval statuses.",
    after_help = "Examples:\n  signoff doctor --json\n  signoff seed\n  signoff status --workflow WfMonthly01 --period 202403 --org-unit OuDistrict1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo org-unit hierarchy, users, workflow and event fixtures")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity and schema migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve approval statuses for a workflow, period and scope as JSON")]
    Status(StatusArgs),
    #[command(about = "Validate and store a single event data value")]
    EventValue(EventValueArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Status(args) => commands::status::run(args),
        Command::EventValue(args) => commands::event_value::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn status_accepts_repeated_scope_flags() {
        let cli = Cli::try_parse_from([
            "signoff",
            "status",
            "--workflow",
            "WfMonthly01",
            "--period",
            "202403",
            "--org-unit",
            "OuFacility1",
            "--org-unit",
            "OuFacility2",
            "--option-combo",
            "CocDonorA01",
        ])
        .expect("parse");

        let Command::Status(args) = cli.command else {
            panic!("expected status command");
        };
        assert_eq!(args.org_units, vec!["OuFacility1", "OuFacility2"]);
        assert_eq!(args.option_combos, vec!["CocDonorA01"]);
        assert_eq!(args.user, "admin");
        assert_eq!(args.level, None);
    }

    #[test]
    fn event_value_requires_a_value() {
        let parsed = Cli::try_parse_from([
            "signoff",
            "event-value",
            "--event",
            "EvVisit0001",
            "--data-element",
            "DeWeight001",
        ]);
        assert!(parsed.is_err());
    }
}
