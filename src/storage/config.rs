//! Configuration loading and resolution.
//!
//! Settings come from, in descending precedence:
//! 1. CLI flags
//! 2. `TMSTATS_*` environment variables
//! 3. `config.toml` under the platform config directory
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `TMSTATS_SERVER_URL`: Base URL of the telemetry API
//! - `TMSTATS_API_KEY`: Bearer token sent with API requests
//! - `TMSTATS_TIMEOUT`: Request timeout in seconds
//! - `TMSTATS_FAST_CHARGER_KW`: AC/DC power threshold in kW
//! - `TMSTATS_GEOCODE_URL`: Base URL of the Nominatim server
//! - `TMSTATS_DB`: Path to the SQLite database file
//! - `TMSTATS_CONFIG`: Override config file path

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::paths::AppPaths;
use crate::error::{Result, TmsError};
use crate::geocode::{DEFAULT_CACHE_CAPACITY, DEFAULT_NOMINATIM_URL};

/// Environment variable for the telemetry server URL.
pub const ENV_SERVER_URL: &str = "TMSTATS_SERVER_URL";
/// Environment variable for the API key.
pub const ENV_API_KEY: &str = "TMSTATS_API_KEY";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "TMSTATS_TIMEOUT";
/// Environment variable for the fast-charger power threshold.
pub const ENV_FAST_CHARGER_KW: &str = "TMSTATS_FAST_CHARGER_KW";
/// Environment variable for the geocoding server URL.
pub const ENV_GEOCODE_URL: &str = "TMSTATS_GEOCODE_URL";
/// Environment variable for the database path.
pub const ENV_DB: &str = "TMSTATS_DB";
/// Environment variable to override the config file path.
pub const ENV_CONFIG: &str = "TMSTATS_CONFIG";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default AC/DC classification threshold. Sessions whose peak power exceeds
/// this are counted as DC fast charging; 22 kW is the ceiling of common
/// three-phase AC hardware.
pub const DEFAULT_FAST_CHARGER_KW: i64 = 22;

/// Raw config file contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub fast_charger_threshold_kw: Option<i64>,
    pub geocode_url: Option<String>,
    pub geocode_cache_capacity: Option<usize>,
    pub db_path: Option<PathBuf>,
}

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub server_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub fast_charger_threshold_kw: i64,
    pub geocode_url: String,
    pub geocode_cache_capacity: usize,
    pub db_path: PathBuf,
}

/// CLI-level overrides, filled in by the argument parser.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub db_path: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Resolve the final configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if no server URL is configured anywhere.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let paths = AppPaths::new();
        let file = load_config_file(&config_file_path(&paths))?;
        Self::merge(cli, &file, &paths)
    }

    fn merge(cli: &CliOverrides, file: &ConfigFile, paths: &AppPaths) -> Result<Self> {
        let server_url = cli
            .server_url
            .clone()
            .or_else(|| env_string(ENV_SERVER_URL))
            .or_else(|| file.server_url.clone())
            .ok_or_else(|| {
                TmsError::Config(format!(
                    "no server URL configured; set {ENV_SERVER_URL} or server_url in {}",
                    config_file_path(paths).display()
                ))
            })?;

        let timeout_secs = cli
            .timeout_secs
            .or_else(|| env_parse(ENV_TIMEOUT))
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(TmsError::Config("timeout must be greater than 0".to_string()));
        }

        let fast_charger_threshold_kw = env_parse(ENV_FAST_CHARGER_KW)
            .or(file.fast_charger_threshold_kw)
            .unwrap_or(DEFAULT_FAST_CHARGER_KW);
        if fast_charger_threshold_kw <= 0 {
            return Err(TmsError::Config(
                "fast charger threshold must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            server_url,
            api_key: cli
                .api_key
                .clone()
                .or_else(|| env_string(ENV_API_KEY))
                .or_else(|| file.api_key.clone()),
            timeout_secs,
            fast_charger_threshold_kw,
            geocode_url: env_string(ENV_GEOCODE_URL)
                .or_else(|| file.geocode_url.clone())
                .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            geocode_cache_capacity: file.geocode_cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            db_path: cli
                .db_path
                .clone()
                .or_else(|| env_string(ENV_DB).map(PathBuf::from))
                .or_else(|| file.db_path.clone())
                .unwrap_or_else(|| paths.db_file()),
        })
    }
}

fn config_file_path(paths: &AppPaths) -> PathBuf {
    env_string(ENV_CONFIG).map_or_else(|| paths.config_file(), PathBuf::from)
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ConfigFile::default());
    }
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents)
        .map_err(|e| TmsError::Config(format!("invalid config file {}: {e}", path.display())))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_beat_file_values() {
        let cli = CliOverrides {
            server_url: Some("http://cli:1".to_string()),
            timeout_secs: Some(5),
            ..CliOverrides::default()
        };
        let file = ConfigFile {
            server_url: Some("http://file:2".to_string()),
            timeout_secs: Some(60),
            ..ConfigFile::default()
        };
        let resolved = ResolvedConfig::merge(&cli, &file, &AppPaths::new()).unwrap();
        assert_eq!(resolved.server_url, "http://cli:1");
        assert_eq!(resolved.timeout_secs, 5);
        assert_eq!(
            resolved.fast_charger_threshold_kw,
            DEFAULT_FAST_CHARGER_KW
        );
    }

    #[test]
    fn missing_server_url_is_an_error() {
        let resolved = ResolvedConfig::merge(
            &CliOverrides::default(),
            &ConfigFile::default(),
            &AppPaths::new(),
        );
        assert!(matches!(resolved, Err(TmsError::Config(_))));
    }

    #[test]
    fn config_file_parses_toml() {
        let file: ConfigFile = toml::from_str(
            r#"
            server_url = "http://teslamate.local:8080"
            fast_charger_threshold_kw = 11
            "#,
        )
        .unwrap();
        assert_eq!(file.server_url.as_deref(), Some("http://teslamate.local:8080"));
        assert_eq!(file.fast_charger_threshold_kw, Some(11));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cli = CliOverrides {
            server_url: Some("http://x".to_string()),
            timeout_secs: Some(0),
            ..CliOverrides::default()
        };
        let resolved = ResolvedConfig::merge(&cli, &ConfigFile::default(), &AppPaths::new());
        assert!(resolved.is_err());
    }
}
