pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "vocalkart",
    about = "VocalKart operator CLI",
    long_about = "Operate the VocalKart catalog: migrations, demo data, config inspection, \
                  readiness checks and one-off alternative suggestions.",
    after_help = "Examples:\n  vocalkart doctor --json\n  vocalkart seed\n  \
                  vocalkart suggest --product-id <id>"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, generator credentials, DB connectivity and schema")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Suggest domestic alternatives for a stored product")]
    Suggest {
        #[arg(long, help = "Id of the stored product to find alternatives for")]
        product_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Suggest { product_id } => commands::suggest::run(&product_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
