//! Application configuration loaded from environment variables.
//!
//! All configuration is loaded from environment variables with defaults
//! suitable for development. A `.env` file is read when present.
//!
//! # Telemetry
//!
//! - `STATSD_ADDR`: DogStatsD agent (`host:port`); unset disables the sink
//! - `STATSD_NAMESPACE`: prefix for every metric name
//! - `STATSD_TAGS`: comma-separated tags attached to every metric
//! - `HEALTHD_LOG_DIR`: directory for hourly Elastic Beanstalk health logs
//! - `METRICS_PORT`: Prometheus exporter port (default: 9090, 0 = disabled)
//!
//! # Security
//!
//! - `API_KEYS`: `key=name` pairs, comma separated. When set, every route
//!   except `/health` requires `Authorization: <API_PROVIDER> <key>`

use std::env;
use std::net::SocketAddr;

use crate::error::{AppError, AppResult};

/// Output format of the process log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Process log format (default: text)
    pub log_format: LogFormat,

    // =========================================================================
    // Telemetry Configuration
    // =========================================================================
    /// DogStatsD agent address; `None` disables statsd reporting
    pub statsd_addr: Option<String>,

    /// Prefix for every statsd metric name, e.g. "service.logging.live."
    pub statsd_namespace: String,

    /// Static tags attached to every statsd metric
    pub statsd_tags: Vec<String>,

    /// Directory for healthd log files; `None` disables the healthd sink
    pub healthd_log_dir: Option<String>,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Expected first token of the `Authorization` header (default: "Service")
    pub api_provider: String,

    /// Accepted API keys with the client name each one identifies.
    /// Empty disables authentication.
    pub api_keys: Vec<(String, String)>,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any configuration value is invalid
    /// (e.g., non-numeric PORT value, malformed API_KEYS entry).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Text)?,

            // Telemetry
            statsd_addr: Self::optional_env("STATSD_ADDR"),
            statsd_namespace: env::var("STATSD_NAMESPACE").unwrap_or_default(),
            statsd_tags: Self::parse_list(&env::var("STATSD_TAGS").unwrap_or_default()),
            healthd_log_dir: Self::optional_env("HEALTHD_LOG_DIR"),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,

            // Security
            api_provider: env::var("API_PROVIDER").unwrap_or_else(|_| "Service".to_string()),
            api_keys: Self::parse_api_keys(&env::var("API_KEYS").unwrap_or_default())?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        if self.api_provider.is_empty() || self.api_provider.contains(' ') {
            return Err(AppError::ConfigError(format!(
                "API_PROVIDER must be a single non-empty token, got '{}'",
                self.api_provider
            )));
        }

        if let Some(addr) = &self.statsd_addr
            && !addr.contains(':')
        {
            return Err(AppError::ConfigError(format!(
                "STATSD_ADDR must be host:port, got '{addr}'"
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if API key authentication is enabled.
    pub fn auth_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    fn optional_env(name: &str) -> Option<String> {
        env::var(name)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Parse `key=name` pairs.
    ///
    /// Keys may not contain spaces since the `Authorization` header is split
    /// on a single space.
    fn parse_api_keys(raw: &str) -> AppResult<Vec<(String, String)>> {
        Self::parse_list(raw)
            .into_iter()
            .map(|entry| {
                let Some((key, name)) = entry.split_once('=') else {
                    return Err(AppError::ConfigError(
                        "API_KEYS entries must be key=name".to_string(),
                    ));
                };
                let (key, name) = (key.trim(), name.trim());
                if key.is_empty() || name.is_empty() || key.contains(' ') {
                    return Err(AppError::ConfigError(format!(
                        "Invalid API_KEYS entry for client '{name}'"
                    )));
                }
                Ok((key.to_string(), name.to_string()))
            })
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_format: LogFormat::Text,
            statsd_addr: None,
            statsd_namespace: String::new(),
            statsd_tags: Vec::new(),
            healthd_log_dir: None,
            metrics_port: 9090,
            api_provider: "Service".to_string(),
            api_keys: Vec::new(),
        }
    }
}
