//! trimbench CLI - discard (TRIM) latency and throughput benchmark.

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]

mod commands;
mod output;
mod profile;
mod signal;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// trimbench: measure how fast a block device discards
#[derive(Parser)]
#[command(name = "trimbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format [default: human]
    #[arg(long, global = true)]
    format: Option<output::OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the discard benchmark (destroys data on the device)
    Run(commands::RunArgs),

    /// Show device geometry
    Info(commands::InfoArgs),
}

/// `RUST_LOG` if set, otherwise warnings and errors.
fn log_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run(args, cli.format),
        Commands::Info(args) => commands::info(&args, cli.format.unwrap_or_default()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
