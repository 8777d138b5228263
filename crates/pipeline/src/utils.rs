use anyhow::{anyhow, Error};
use clap::{Parser, Subcommand};
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use slog::{debug, o, Drain, Level, Logger};
use std::{env, time::Duration};
use wx_pipeline_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_API_TIMEOUT_SECS, DEFAULT_BASE_URL,
    DEFAULT_DB_PATH, DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_RETRIES, DEFAULT_STATIONS_FILE,
};

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "Weather Pipeline - Fetches NWS observations into SQLite and reports analytics"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $WX_PIPELINE_CONFIG, ./pipeline.toml,
    /// $XDG_CONFIG_HOME/wx-pipeline/pipeline.toml, /etc/wx-pipeline/pipeline.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "WX_PIPELINE_LEVEL")]
    pub level: Option<String>,

    /// Path to the SQLite database file
    #[arg(short, long, env = "WX_PIPELINE_DB_PATH")]
    pub db_path: Option<String>,

    /// CSV file with the stations to ingest
    #[arg(short, long, env = "WX_PIPELINE_STATIONS_FILE")]
    pub stations_file: Option<String>,

    /// Base URL of the NWS API
    #[arg(short, long, env = "WX_PIPELINE_BASE_URL")]
    pub base_url: Option<String>,

    /// HTTP User-Agent header for NWS API requests
    #[arg(short, long, env = "WX_PIPELINE_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[arg(short, long, env = "WX_PIPELINE_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Maximum retries per request in the fetch middleware
    #[arg(short = 'r', long, env = "WX_PIPELINE_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Observation window requested from the API, in days back from now
    #[arg(long, env = "WX_PIPELINE_LOOKBACK_DAYS")]
    pub lookback_days: Option<i64>,

    #[command(subcommand)]
    #[serde(skip)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Run the full pipeline: ingest, validations, analytics
    Run,
    /// Fetch and store observations only
    Ingest,
    /// Run validations and analytics over already-stored data
    Report,
    /// Station catalog utilities
    Stations {
        #[command(subcommand)]
        action: StationsCommand,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum StationsCommand {
    /// Download a station sample from the NWS API into stations_sample.csv
    Fetch {
        /// Maximum number of stations to keep from the API listing
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Reproducibly select the pipeline stations from stations_sample.csv
    Select {
        /// Number of stations to select
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// RNG seed, fixed so the selection is reproducible
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

impl Cli {
    /// Get the effective configuration value with defaults
    pub fn db_path(&self) -> String {
        self.db_path
            .clone()
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
    }

    pub fn stations_file(&self) -> String {
        self.stations_file
            .clone()
            .unwrap_or_else(|| DEFAULT_STATIONS_FILE.to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| "wx-pipeline/1.0".to_string())
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_API_TIMEOUT_SECS)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn lookback_days(&self) -> i64 {
        self.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS)
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Cli {
    let cli_args = Cli::parse();

    // Determine config file path
    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("WX_PIPELINE_CONFIG", "pipeline.toml")
    };

    // Load from config file
    let file_config: Cli = load_config(&source).unwrap_or_default();

    // CLI args override file config (env vars are handled by clap)
    Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        db_path: cli_args.db_path.or(file_config.db_path),
        stations_file: cli_args.stations_file.or(file_config.stations_file),
        base_url: cli_args.base_url.or(file_config.base_url),
        user_agent: cli_args.user_agent.or(file_config.user_agent),
        timeout_secs: cli_args.timeout_secs.or(file_config.timeout_secs),
        max_retries: cli_args.max_retries.or(file_config.max_retries),
        lookback_days: cli_args.lookback_days.or(file_config.lookback_days),
        command: cli_args.command,
    }
}

pub fn setup_logger(cli: &Cli) -> Logger {
    let level_str = cli
        .level
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_default();
    let log_level = match level_str.to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// Thin HTTP client wrapper for the NWS JSON endpoints.
///
/// The configured retry budget is wired into the middleware's
/// exponential backoff policy; a timeout or exhausted retries surface
/// as a single error the caller treats as a per-station failure.
pub struct JsonFetcher {
    logger: Logger,
    user_agent: String,
    timeout: Duration,
    max_retries: u32,
}

impl JsonFetcher {
    pub fn new(logger: Logger, user_agent: String, timeout_secs: u64, max_retries: u32) -> Self {
        Self {
            logger,
            user_agent,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
        }
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(self.max_retries);
        let client = ClientBuilder::new(Client::builder().user_agent(&self.user_agent).build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        debug!(self.logger, "requesting: {}", url);
        let response = client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!("error sending request: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "error response from {}: {}",
                url,
                response.status()
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| anyhow!("error decoding response body: {}", e))
    }
}
