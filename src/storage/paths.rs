//! Application paths for config and data.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Application paths.
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory.
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the tmstats application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("io", "tmstats", "tmstats") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            let home = std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/tmstats"),
                data: home.join(".local/share/tmstats"),
            }
        }
    }

    /// Path to the config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Path to the telemetry database file.
    #[must_use]
    pub fn db_file(&self) -> PathBuf {
        self.data.join("telemetry.sqlite")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
