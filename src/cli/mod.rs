//! CLI argument parsing and command dispatch.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::api::TelemetryClient;
use crate::error::Result;
use crate::geocode::Geocoder;
use crate::stats::StatsEngine;
use crate::storage::{ResolvedConfig, StatsStore};
use crate::sync::SyncEngine;

pub mod args;
pub mod drives;
pub mod reset;
pub mod stats;
pub mod sync;

pub use args::{Cli, Commands, OutputFormat};

/// Resolved config plus the handles every command works through.
pub struct AppContext {
    pub config: ResolvedConfig,
    pub store: Arc<AsyncMutex<StatsStore>>,
    pub stats: StatsEngine,
}

impl AppContext {
    /// Resolve configuration and open the local database.
    ///
    /// # Errors
    ///
    /// Fails when the config is invalid or the database cannot be opened.
    pub fn init(cli: &Cli) -> Result<Self> {
        let config = ResolvedConfig::resolve(&cli.overrides())?;
        let store = Arc::new(AsyncMutex::new(StatsStore::open(&config.db_path)?));
        let stats = StatsEngine::new(Arc::clone(&store));
        Ok(Self {
            config,
            store,
            stats,
        })
    }

    /// Build the sync engine from the resolved config.
    ///
    /// # Errors
    ///
    /// Fails when the server URL is invalid.
    pub fn sync_engine(&self) -> Result<SyncEngine> {
        let client = TelemetryClient::new(
            &self.config.server_url,
            self.config.api_key.clone(),
            self.config.timeout_secs,
        )?;
        let geocoder = Arc::new(Geocoder::new(
            &self.config.geocode_url,
            self.config.geocode_cache_capacity,
        )?);
        Ok(SyncEngine::new(
            Arc::clone(&self.store),
            client,
            geocoder,
            self.config.fast_charger_threshold_kw,
        ))
    }
}

/// Serialize a value for `--format json` output.
///
/// # Errors
///
/// Fails when the value cannot be serialized.
pub fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| crate::error::TmsError::ParseResponse(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}
