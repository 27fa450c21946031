//! Configuration management for the leaderlock worker
//!
//! Sources are layered lowest to highest: built-in defaults, the YAML file
//! (`conf/application.yml`, optional), `LEADERLOCK_*` environment variables
//! (`__` separates nested keys, e.g. `LEADERLOCK_BUCKET__TTL_SECS`), then
//! command line flags.

use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use config::{Config, Environment};

use leaderlock_common::{DEFAULT_BUCKET_NAME, DEFAULT_KEY_NAME, LeaderLockError};

use crate::startup::LoggingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const DEFAULT_BUCKET_TTL_SECS: i64 = 60;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: i64 = 20;

pub const BUCKET_NAME_PROPERTY: &str = "bucket.name";
pub const BUCKET_TTL_PROPERTY: &str = "bucket.ttl_secs";
pub const LOCK_KEY_PROPERTY: &str = "lock.key";
pub const RECONCILE_INTERVAL_PROPERTY: &str = "reconcile.interval_secs";
pub const RECONCILE_QUEUE_PROPERTY: &str = "reconcile.queue";
pub const LOG_LEVEL_PROPERTY: &str = "log.level";
pub const STORE_BACKEND_PROPERTY: &str = "store.backend";
pub const NATS_URL_PROPERTY: &str = "nats.url";
pub const NATS_SUBJECT_PROPERTY: &str = "nats.subject";
pub const METRICS_ENABLED_PROPERTY: &str = "metrics.enabled";
pub const METRICS_LISTEN_PROPERTY: &str = "metrics.listen";

pub const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
pub const DEFAULT_METRICS_LISTEN: &str = "0.0.0.0:9464";

/// Key-value backend holding the lock bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store; every worker process leads its own bucket
    Memory,
    /// NATS JetStream key-value, shared by the whole fleet
    Nats,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Nats => "nats",
        }
    }
}

impl Display for StoreBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = LeaderLockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "nats" => Ok(StoreBackend::Nats),
            _ => Err(LeaderLockError::Config(format!("unknown store backend: {}", s))),
        }
    }
}

/// Command line arguments for the worker
#[derive(Debug, Default, Parser)]
#[command(version, about = "Leader-gated reconciliation worker")]
pub struct Cli {
    /// Configuration file
    #[arg(short = 'c', long = "config", env = "LEADERLOCK_CONFIG")]
    pub config_file: Option<String>,
    /// Lock bucket name
    #[arg(short = 'b', long = "bucket")]
    pub bucket: Option<String>,
    /// Lock bucket TTL in seconds
    #[arg(short = 't', long = "ttl")]
    pub ttl_secs: Option<u64>,
    /// Lock key within the bucket
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,
    /// Seconds between leadership checks
    #[arg(short = 'i', long = "interval")]
    pub interval_secs: Option<u64>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
    /// Key-value backend (memory, nats)
    #[arg(short = 's', long = "store")]
    pub store: Option<String>,
    /// NATS server URL
    #[arg(long = "nats-url")]
    pub nats_url: Option<String>,
}

/// Application configuration loaded from defaults, file, environment and flags
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration using the process arguments
    pub fn new() -> anyhow::Result<Self> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let config_file = cli
            .config_file
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = Config::builder()
            .set_default(BUCKET_NAME_PROPERTY, DEFAULT_BUCKET_NAME)?
            .set_default(BUCKET_TTL_PROPERTY, DEFAULT_BUCKET_TTL_SECS)?
            .set_default(LOCK_KEY_PROPERTY, DEFAULT_KEY_NAME)?
            .set_default(RECONCILE_INTERVAL_PROPERTY, DEFAULT_RECONCILE_INTERVAL_SECS)?
            .set_default(LOG_LEVEL_PROPERTY, "info")?
            .set_default(STORE_BACKEND_PROPERTY, StoreBackend::Nats.as_str())?
            .set_default(NATS_URL_PROPERTY, DEFAULT_NATS_URL)?
            .set_default(METRICS_ENABLED_PROPERTY, false)?
            .set_default(METRICS_LISTEN_PROPERTY, DEFAULT_METRICS_LISTEN)?
            .add_source(config::File::with_name(&config_file).required(false))
            .add_source(
                Environment::with_prefix("LEADERLOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = cli.bucket {
            builder = builder.set_override(BUCKET_NAME_PROPERTY, v)?;
        }
        if let Some(v) = cli.ttl_secs {
            builder = builder.set_override(BUCKET_TTL_PROPERTY, v)?;
        }
        if let Some(v) = cli.key {
            builder = builder.set_override(LOCK_KEY_PROPERTY, v)?;
        }
        if let Some(v) = cli.interval_secs {
            builder = builder.set_override(RECONCILE_INTERVAL_PROPERTY, v)?;
        }
        if let Some(v) = cli.log_level {
            builder = builder.set_override(LOG_LEVEL_PROPERTY, v)?;
        }
        if let Some(v) = cli.store {
            builder = builder.set_override(STORE_BACKEND_PROPERTY, v)?;
        }
        if let Some(v) = cli.nats_url {
            builder = builder.set_override(NATS_URL_PROPERTY, v)?;
        }

        let config = builder
            .build()
            .with_context(|| format!("failed to build configuration from {}", config_file))?;

        Ok(Configuration { config })
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn bucket_name(&self) -> String {
        self.config
            .get_string(BUCKET_NAME_PROPERTY)
            .unwrap_or(DEFAULT_BUCKET_NAME.to_string())
    }

    pub fn bucket_ttl(&self) -> Duration {
        let secs = self
            .config
            .get_int(BUCKET_TTL_PROPERTY)
            .unwrap_or(DEFAULT_BUCKET_TTL_SECS);
        Duration::from_secs(secs.max(0) as u64)
    }

    pub fn lock_key(&self) -> String {
        self.config
            .get_string(LOCK_KEY_PROPERTY)
            .unwrap_or(DEFAULT_KEY_NAME.to_string())
    }

    // ========================================================================
    // Reconciler Configuration
    // ========================================================================

    pub fn reconcile_interval(&self) -> Duration {
        let secs = self
            .config
            .get_int(RECONCILE_INTERVAL_PROPERTY)
            .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS);
        Duration::from_secs(secs.max(1) as u64)
    }

    pub fn reconcile_queue(&self) -> Option<String> {
        self.config.get_string(RECONCILE_QUEUE_PROPERTY).ok()
    }

    // ========================================================================
    // Store and Event Bus Configuration
    // ========================================================================

    pub fn store_backend(&self) -> anyhow::Result<StoreBackend> {
        let backend = self
            .config
            .get_string(STORE_BACKEND_PROPERTY)
            .unwrap_or(StoreBackend::Nats.as_str().to_string());
        Ok(backend.parse::<StoreBackend>()?)
    }

    pub fn nats_url(&self) -> String {
        self.config
            .get_string(NATS_URL_PROPERTY)
            .unwrap_or(DEFAULT_NATS_URL.to_string())
    }

    /// Subject carrying create/update/delete events, if the worker consumes any
    pub fn event_subject(&self) -> Option<String> {
        self.config
            .get_string(NATS_SUBJECT_PROPERTY)
            .ok()
            .filter(|s| !s.is_empty())
    }

    // ========================================================================
    // Metrics Configuration
    // ========================================================================

    /// Prometheus listen address, or `None` when the exporter is disabled
    pub fn metrics_listen(&self) -> anyhow::Result<Option<SocketAddr>> {
        if !self.config.get_bool(METRICS_ENABLED_PROPERTY).unwrap_or(false) {
            return Ok(None);
        }

        let listen = self
            .config
            .get_string(METRICS_LISTEN_PROPERTY)
            .unwrap_or(DEFAULT_METRICS_LISTEN.to_string());
        let addr = listen
            .parse()
            .with_context(|| format!("invalid metrics listen address: {}", listen))?;
        Ok(Some(addr))
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string("log.dir").ok(),
            self.config.get_bool("log.console").unwrap_or(true),
            self.config.get_bool("log.file").unwrap_or(false),
            self.config
                .get_string(LOG_LEVEL_PROPERTY)
                .unwrap_or("info".to_string()),
        )
    }
}
