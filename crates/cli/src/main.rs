//! Stored auction response CLI.
//!
//! This tool provides commands for:
//! - Evaluating whether a bid request skips the auction via a stored response
//! - Validating configuration files

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

mod config;
mod error;
mod evaluate;

use error::CliError;
use evaluate::EvaluateOptions;

#[derive(Parser)]
#[command(name = "sacli")]
#[command(about = "Stored auction response CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stored response bypass for a bid request
    Evaluate {
        /// Path to the bid request JSON file
        #[arg(long, short)]
        request: PathBuf,

        /// Path to the TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Directory of `<id>.json` stored responses
        #[arg(long, short)]
        stored_responses: Option<PathBuf>,

        /// Treat the request as rejected upstream
        #[arg(long)]
        rejected: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config against settings validation
    Validate {
        /// Path to the TOML configuration file
        #[arg(long, short)]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logger(cli.verbose) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Evaluate {
            request,
            config,
            stored_responses,
            rejected,
        } => evaluate::evaluate(
            &EvaluateOptions {
                request,
                config,
                stored_responses,
                rejected,
            },
            cli.verbose,
        ),
        Commands::Config { action } => match action {
            ConfigAction::Validate { file } => config::validate(&file, cli.verbose),
        },
    }
}

fn init_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}
