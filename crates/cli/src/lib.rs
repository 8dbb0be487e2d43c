pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "capquote",
    about = "Capquote operator CLI",
    long_about = "Operate the capquote pricing engine: migrations, demo price tables, config inspection, table validation, and one-off quotes.",
    after_help = "Examples:\n  capquote migrate\n  capquote seed\n  capquote doctor --json\n  capquote quote --spec order.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Replace the price tables with the demo catalog and verify the result")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, and price catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Load the price tables and report every rejected row")]
    ValidateTables,
    #[command(about = "Price a specification file against the configured price tables")]
    Quote {
        #[arg(long, value_name = "FILE", help = "JSON quote specification")]
        spec: PathBuf,
        #[arg(long, help = "Bypass the pricing cache")]
        no_cache: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::ValidateTables => commands::validate_tables::run(),
        Command::Quote { spec, no_cache } => commands::quote::run(&spec, no_cache),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
