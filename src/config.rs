//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml, --config)
//! 3. Environment variables (override)

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::Role;

/// Actor followed by a follower node when nothing else is configured.
pub const DEFAULT_FOLLOW_TARGET: &str = "http://127.0.0.1:8000/actor";

/// Main node configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub publisher: PublisherConfig,
    pub follower: FollowerConfig,
    pub validation: ValidationConfig,
    pub http: HttpConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address, also used to build the local actor id
    pub host: String,
    /// Publisher port (0 lets the OS pick one)
    pub port: u16,
}

impl ServerConfig {
    /// Base URL of the node, e.g. "http://127.0.0.1:8000"
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Outbound delivery loop
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Seconds between two delivery cycles
    pub interval_seconds: u64,
}

impl PublisherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Follow handshake initiated at startup
#[derive(Debug, Clone, Deserialize)]
pub struct FollowerConfig {
    /// Follower port, so both roles can share one config on one host
    pub port: u16,
    /// Actor URIs to follow
    #[serde(default)]
    pub targets: Vec<String>,
    pub initial_delay_seconds: u64,
    pub retry_delay_seconds: u64,
    /// Attempt budget for connection failures
    pub max_attempts: u32,
}

impl FollowerConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

/// Schema gates
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Validate every Follow/Accept/Reject/Create before sending it
    pub outbound: bool,
    /// Validate inbound activities before processing them
    pub inbound: bool,
}

/// Outbound HTTP client
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// Prometheus endpoint, served on its own listener
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. `extra_file` (if given; must exist)
    /// 5. Environment variables (MINCORE__*)
    pub fn load(extra_file: Option<&Path>) -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("publisher.interval_seconds", 5)?
            .set_default("follower.port", 8001)?
            .set_default("follower.targets", Vec::<String>::new())?
            .set_default("follower.initial_delay_seconds", 2)?
            .set_default("follower.retry_delay_seconds", 2)?
            .set_default("follower.max_attempts", 10000)?
            .set_default("validation.outbound", true)?
            .set_default("validation.inbound", false)?
            .set_default("http.timeout_seconds", 10)?
            .set_default(
                "http.user_agent",
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.host", "127.0.0.1")?
            .set_default("metrics.port", 9100)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("MINCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Port a node of `role` listens on when no flag overrides it.
    pub fn listen_port(&self, role: Role) -> u16 {
        match role {
            Role::Publisher => self.server.port,
            Role::Follower => self.follower.port,
        }
    }

    /// Follow targets, falling back to the well-known local publisher.
    pub fn follow_targets(&self) -> Vec<String> {
        if self.follower.targets.is_empty() {
            vec![DEFAULT_FOLLOW_TARGET.to_string()]
        } else {
            self.follower.targets.clone()
        }
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.publisher.interval_seconds == 0 {
            return Err(AppError::Config(
                "publisher.interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.follower.max_attempts == 0 {
            return Err(AppError::Config(
                "follower.max_attempts must be greater than 0".to_string(),
            ));
        }

        for target in &self.follower.targets {
            if !is_http_url(target) {
                return Err(AppError::Config(format!(
                    "follower target {target} is not an absolute http(s) URL"
                )));
            }
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
