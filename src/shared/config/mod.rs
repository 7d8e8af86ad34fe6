//! Application configuration module
//!
//! Settings are layered: built-in defaults, then an optional TOML file named
//! by `INVENTORY_CONFIG`, then environment variables. The binary loads `.env`
//! before calling [`AppConfig::load`].

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Secret used when `JWT_SECRET` is not provided. Local development only.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Socket address the HTTP server binds
    pub bind_addr: String,
    /// Postgres URL; `None` runs against the in-memory store
    pub database_url: Option<String>,
    /// HMAC secret for access tokens
    pub jwt_secret: String,
    /// Access token lifetime
    pub token_ttl_hours: u64,
    /// Idle time after which a session must log in again
    pub session_idle_timeout_secs: u64,
    /// Fixed local zone used for day-granularity date checks
    pub utc_offset_minutes: i32,
    /// Capacity of the hub's inbound command queue
    pub hub_queue_capacity: usize,
    /// Capacity of each connection's outbound queue
    pub connection_buffer: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            session_idle_timeout_secs: 300,
            utc_offset_minutes: 7 * 60,
            hub_queue_capacity: 1024,
            connection_buffer: 256,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load defaults, then the TOML file from `INVENTORY_CONFIG`, then env
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("INVENTORY_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override fields from environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(addr) = env_value("BIND_ADDR") {
            self.bind_addr = addr;
        } else if let Some(port) = env_value("SERVER_PORT") {
            let port: u16 = parse_value("SERVER_PORT", &port)?;
            self.bind_addr = format!("0.0.0.0:{}", port);
        }
        if let Some(url) = env_value("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(secret) = env_value("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(raw) = env_value("TOKEN_TTL_HOURS") {
            self.token_ttl_hours = parse_value("TOKEN_TTL_HOURS", &raw)?;
        }
        if let Some(raw) = env_value("SESSION_IDLE_TIMEOUT_SECS") {
            self.session_idle_timeout_secs = parse_value("SESSION_IDLE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = env_value("UTC_OFFSET_MINUTES") {
            self.utc_offset_minutes = parse_value("UTC_OFFSET_MINUTES", &raw)?;
        }
        if let Some(raw) = env_value("HUB_QUEUE_CAPACITY") {
            self.hub_queue_capacity = parse_value("HUB_QUEUE_CAPACITY", &raw)?;
        }
        if let Some(raw) = env_value("CONNECTION_BUFFER") {
            self.connection_buffer = parse_value("CONNECTION_BUFFER", &raw)?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.trim().is_empty() {
            return Err(ConfigError::MissingValue("bind_addr"));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("jwt_secret"));
        }
        if self.token_ttl_hours == 0 {
            return Err(ConfigError::Invalid {
                key: "token_ttl_hours",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.session_idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "session_idle_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if !(-14 * 60..=14 * 60).contains(&self.utc_offset_minutes) {
            return Err(ConfigError::Invalid {
                key: "utc_offset_minutes",
                message: "must be within -840..=840".to_string(),
            });
        }
        if self.hub_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "hub_queue_capacity",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.connection_buffer == 0 {
            return Err(ConfigError::Invalid {
                key: "connection_buffer",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        message: format!("cannot parse '{}'", raw),
    })
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = secret.into();
        self
    }

    pub fn token_ttl_hours(mut self, hours: u64) -> Self {
        self.config.token_ttl_hours = hours;
        self
    }

    pub fn session_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.session_idle_timeout_secs = secs;
        self
    }

    pub fn utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.config.utc_offset_minutes = minutes;
        self
    }

    pub fn hub_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.hub_queue_capacity = capacity;
        self
    }

    pub fn connection_buffer(mut self, capacity: usize) -> Self {
        self.config.connection_buffer = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("cannot read config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("cannot parse config file: {0}")]
    Parse(String),
}
