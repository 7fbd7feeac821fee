//! Configuration management for adsblogger.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flight::{Clock, IdentityField};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "adsblogger";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "adsb-logger.db";

/// Default feed location served by tar1090.
const DEFAULT_FEED_URL: &str = "http://localhost/tar1090/data/aircraft.json";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ADSBLOGGER_`, sections separated
///    by `__`, e.g. `ADSBLOGGER_TRACKING__FLUSH_INTERVAL_SECS=600`)
/// 2. TOML config file at `~/.config/adsblogger/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed configuration.
    pub feed: FeedConfig,
    /// Tracking configuration.
    pub tracking: TrackingConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
}

/// Feed-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// URL or path of `aircraft.json`.
    pub url: String,
    /// Timeout for a single fetch, in seconds.
    pub timeout_secs: u64,
    /// Sleep between loop iterations, in milliseconds.
    pub poll_interval_ms: u64,
}

/// Tracking-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// A tracked flight older than this is finished and gets stored.
    pub uniqueness_window_secs: u64,
    /// Interval between status log lines.
    pub status_interval_secs: u64,
    /// Interval between database flushes.
    pub flush_interval_secs: u64,
    /// Identity fields that always take the newest observed value.
    pub always_overwrite: Vec<IdentityField>,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/adsblogger/adsb-logger.db`
    pub database_path: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            timeout_secs: 3,
            poll_interval_ms: 500,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uniqueness_window_secs: 60 * 60,
            status_interval_secs: 3 * 60,
            flush_interval_secs: 15 * 60,
            always_overwrite: Vec::new(),
        }
    }
}

impl FeedConfig {
    /// Get the fetch timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the main loop sleep as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl TrackingConfig {
    /// Uniqueness window in feed clock units.
    #[must_use]
    pub fn uniqueness_window(&self) -> Clock {
        secs_to_clock(self.uniqueness_window_secs)
    }

    /// Status interval in feed clock units.
    #[must_use]
    pub fn status_interval(&self) -> Clock {
        secs_to_clock(self.status_interval_secs)
    }

    /// Flush interval in feed clock units.
    #[must_use]
    pub fn flush_interval(&self) -> Clock {
        secs_to_clock(self.flush_interval_secs)
    }
}

fn secs_to_clock(secs: u64) -> Clock {
    Clock::try_from(secs).unwrap_or(Clock::MAX)
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `ADSBLOGGER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("ADSBLOGGER_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.feed.url.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "feed url must not be empty".to_string(),
            });
        }

        let intervals = [
            ("feed.timeout_secs", self.feed.timeout_secs),
            ("feed.poll_interval_ms", self.feed.poll_interval_ms),
            (
                "tracking.uniqueness_window_secs",
                self.tracking.uniqueness_window_secs,
            ),
            (
                "tracking.status_interval_secs",
                self.tracking.status_interval_secs,
            ),
            (
                "tracking.flush_interval_secs",
                self.tracking.flush_interval_secs,
            ),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must be greater than 0"),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}
