pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "aquabot",
    about = "Aquabot operator CLI",
    long_about = "Inspect effective configuration and check collaborator readiness before starting the server.",
    after_help = "Examples:\n  aquabot doctor --json\n  aquabot config\n  aquabot --config config/aquabot.toml doctor"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Path to aquabot.toml (defaults to ./aquabot.toml or ./config/aquabot.toml)"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Validate config, catalog, channels, LLM helpers, CRM and knowledge base")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config { json } => commands::config::run_with(cli.config, json),
        Command::Doctor { json } => commands::doctor::run_with(cli.config, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
