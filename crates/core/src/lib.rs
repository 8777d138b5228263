//! Weather Pipeline Core Library
//!
//! Shared utilities for the pipeline binary:
//! - Configuration loading (XDG-compliant)
//! - File system utilities
//! - Pipeline-wide defaults

mod config;
pub mod fs;

pub use config::{find_config_file, load_config, ConfigSource};
pub use fs::{ensure_dir_exists, path_exists};

/// Application name used for XDG paths
pub const APP_NAME: &str = "wx-pipeline";

/// Public National Weather Service API
pub const DEFAULT_BASE_URL: &str = "https://api.weather.gov";

/// Default SQLite database file
pub const DEFAULT_DB_PATH: &str = "weather_data.db";

/// Default station list, produced by `pipeline stations select`
pub const DEFAULT_STATIONS_FILE: &str = "selected_stations.csv";

/// Station sample written by `pipeline stations fetch`
pub const STATION_SAMPLE_FILE: &str = "stations_sample.csv";

/// Observation window requested from the API (days back from now)
pub const DEFAULT_LOOKBACK_DAYS: i64 = 21;

/// Per-request HTTP timeout (seconds)
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

/// Retry budget for the HTTP fetch middleware
pub const DEFAULT_MAX_RETRIES: u32 = 3;
