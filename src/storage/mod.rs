//! Local persistence: SQLite schema, the stats store, config, and paths.

pub mod config;
pub mod paths;
pub mod schema;
pub mod store;

pub use config::{CliOverrides, ConfigFile, ResolvedConfig, DEFAULT_FAST_CHARGER_KW};
pub use paths::AppPaths;
pub use schema::{run_migrations, CURRENT_SCHEMA_VERSION};
pub use store::{
    AcDcSplit, AggregateRecord, ChargeAggregate, ChargeSummary, CountryVisit, DateRange, DayCount,
    DayDistance, DriveAggregate, DriveSummary, EventMoment, StatsStore, SyncPhase, SyncState,
};
