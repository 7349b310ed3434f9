pub mod bootstrap;
pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use concierge_agent::evaluation::DEFAULT_DATASET_PATH;
use concierge_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Hotel concierge agent CLI",
    long_about = "Chat with the concierge, manage the room inventory store, inspect configuration, and run evaluations.",
    after_help = "Examples:\n  concierge seed\n  concierge chat\n  concierge doctor --json\n  concierge eval score --input evaluation_dataset.jsonl"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive concierge session")]
    Chat,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Migrate, load the sample room inventory, and verify it")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, provider readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Generate or score the task-adherence evaluation dataset")]
    Eval(EvalCommand),
}

#[derive(Debug, Subcommand)]
enum EvalCommand {
    #[command(about = "Replay the simulated guest queries and record a JSONL dataset")]
    Generate {
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        output: PathBuf,
    },
    #[command(about = "Grade a JSONL dataset with the judge model; exits 1 on any failure")]
    Score {
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        input: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Commands report config errors themselves; logging waits for a valid config.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        logging::init(&config.logging);
    }

    let result = match cli.command {
        Command::Chat => commands::chat::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Eval(EvalCommand::Generate { output }) => commands::eval::generate(&output),
        Command::Eval(EvalCommand::Score { input }) => commands::eval::score(&input),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
