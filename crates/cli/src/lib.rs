pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "sage",
    about = "Sage operator CLI",
    long_about = "Run one-shot agent turns, inspect configuration, and check runtime readiness.",
    after_help = "Examples:\n  sage ask \"write code to reverse a list\"\n  sage doctor --json\n  sage config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Process one query through the full pipeline and print the turn result")]
    Ask {
        query: String,
        #[arg(long, help = "Emit the full turn result as JSON")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with secret redaction")]
    Config,
    #[command(about = "Validate config, memory path, and sandbox interpreter availability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show interaction store and tool registry statistics")]
    Stats,
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { query, json } => commands::ask::run(&query, json).await,
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json).await,
        Command::Stats => commands::stats::run().await,
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
