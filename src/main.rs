//! tmstats - TeslaMate telemetry sync and statistics.
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::process::ExitCode;

use clap::Parser;

use tmstats::cli::{self, Cli, Commands};
use tmstats::core::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(logging::parse_log_level_from_env)
        .unwrap_or_default();
    let log_format = logging::parse_log_format_from_env().unwrap_or_default();
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{}: {e}", e.category());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> tmstats::Result<()> {
    let format = cli.effective_format();
    let pretty = cli.pretty;
    let ctx = cli::AppContext::init(&cli)?;

    match &cli.command {
        Commands::Sync(args) => cli::sync::execute(&ctx, args, format, pretty).await,
        Commands::Stats(args) => cli::stats::execute(&ctx, args, format, pretty).await,
        Commands::Years(args) => cli::stats::execute_years(&ctx, args, format, pretty).await,
        Commands::Progress(args) => cli::stats::execute_progress(&ctx, args, format, pretty).await,
        Commands::Drives(args) => cli::drives::execute(&ctx, args, format, pretty).await,
        Commands::Reset(args) => cli::reset::execute(&ctx, args, format, pretty).await,
    }
}
