//! tmstats - TeslaMate telemetry sync and statistics.
//!
//! Syncs drive and charge history from a TeslaMate API into a local SQLite
//! database, lazily materializes per-event detail aggregates in the
//! background, and computes quick and deep statistics over them.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod geocode;
pub mod stats;
pub mod storage;
pub mod sync;

pub use error::{ExitCode, Result, TmsError};
