//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};

use crate::storage::CliOverrides;

/// tmstats - Sync TeslaMate telemetry and compute drive/charge statistics.
#[derive(Parser, Debug)]
#[command(name = "tmstats")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// TeslaMate API base URL
    #[arg(long, value_name = "URL", global = true)]
    pub server_url: Option<String>,

    /// API key for bearer authentication
    #[arg(long, value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Path to the local SQLite database
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<std::path::PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }

    /// Collect the global flags that override config file and env values.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            server_url: self.server_url.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout,
            db_path: self.db.clone(),
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// Machine-readable JSON
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a sync cycle for a vehicle
    Sync(SyncArgs),

    /// Show statistics for a vehicle
    Stats(StatsArgs),

    /// List calendar years with recorded activity
    Years(CarArgs),

    /// Show sync state and detail-processing progress
    Progress(CarArgs),

    /// List drives between two instants
    Drives(DrivesArgs),

    /// Delete all locally synced data for a vehicle
    Reset(ResetArgs),
}

/// Arguments for the `sync` command.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Vehicle id
    #[arg(long, value_name = "ID")]
    pub car: i64,

    /// Keep syncing on an interval
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Watch interval in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 300)]
    pub interval: u64,
}

/// Arguments for the `stats` command.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Vehicle id
    #[arg(long, value_name = "ID")]
    pub car: i64,

    /// Restrict to one calendar year (all time when omitted)
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,
}

/// Arguments for commands that only need a vehicle id.
#[derive(Parser, Debug)]
pub struct CarArgs {
    /// Vehicle id
    #[arg(long, value_name = "ID")]
    pub car: i64,
}

/// Arguments for the `drives` command.
#[derive(Parser, Debug)]
pub struct DrivesArgs {
    /// Vehicle id
    #[arg(long, value_name = "ID")]
    pub car: i64,

    /// Only drives starting strictly after this instant (ISO 8601)
    #[arg(long, value_name = "DATETIME")]
    pub after: String,

    /// Only drives starting strictly before this instant (ISO 8601)
    #[arg(long, value_name = "DATETIME")]
    pub before: String,
}

/// Arguments for the `reset` command.
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Vehicle id
    #[arg(long, value_name = "ID")]
    pub car: i64,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_args_are_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_overrides_format() {
        let cli = Cli::parse_from(["tmstats", "--json", "stats", "--car", "1"]);
        assert_eq!(cli.effective_format(), OutputFormat::Json);
    }

    #[test]
    fn sync_defaults_interval() {
        let cli = Cli::parse_from(["tmstats", "sync", "--car", "2", "--watch"]);
        match cli.command {
            Commands::Sync(args) => {
                assert!(args.watch);
                assert_eq!(args.interval, 300);
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn global_overrides_collected() {
        let cli = Cli::parse_from([
            "tmstats",
            "--server-url",
            "http://mate.local:4000",
            "--timeout",
            "10",
            "years",
            "--car",
            "1",
        ]);
        let ov = cli.overrides();
        assert_eq!(ov.server_url.as_deref(), Some("http://mate.local:4000"));
        assert_eq!(ov.timeout_secs, Some(10));
        assert!(ov.db_path.is_none());
    }
}
