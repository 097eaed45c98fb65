//! Configuration management
//!
//! This module handles loading and parsing configuration for the MusicMatch service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Graph store configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Graph store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL or file path
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Upper bound for a single store transaction, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_database_url() -> String {
    "data/musicmatch.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    5
}

/// Session token strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStrategy {
    /// Random token held server-side, presented as a username/token cookie pair
    #[default]
    Opaque,
    /// HMAC-signed claims presented as a bearer token
    Signed,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Which session strategy to use
    #[serde(default)]
    pub strategy: SessionStrategy,
    /// Signing secret for the signed strategy; generated at startup when absent
    #[serde(default)]
    pub secret: Option<String>,
    /// Lifetime of a signed token in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,
    /// Random bytes per opaque token
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy: SessionStrategy::default(),
            secret: None,
            ttl_seconds: default_session_ttl(),
            token_bytes: default_token_bytes(),
        }
    }
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_token_bytes() -> usize {
    32
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - MUSICMATCH_SERVER_HOST
    /// - MUSICMATCH_SERVER_PORT
    /// - MUSICMATCH_DATABASE_URL
    /// - MUSICMATCH_DATABASE_TIMEOUT_SECS
    /// - MUSICMATCH_SESSION_STRATEGY
    /// - MUSICMATCH_SESSION_SECRET
    /// - MUSICMATCH_SESSION_TTL_SECONDS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be non-zero".to_string(),
            ));
        }
        if !(1..=60).contains(&self.database.timeout_secs) {
            return Err(ConfigError::ValidationError(
                "database.timeout_secs must be between 1 and 60".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        if self.session.token_bytes < 32 {
            return Err(ConfigError::ValidationError(
                "session.token_bytes must be at least 32".to_string(),
            ));
        }
        if self.session.ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "session.ttl_seconds must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MUSICMATCH_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("MUSICMATCH_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(url) = std::env::var("MUSICMATCH_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(timeout) = std::env::var("MUSICMATCH_DATABASE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.database.timeout_secs = timeout;
            }
        }

        if let Ok(strategy) = std::env::var("MUSICMATCH_SESSION_STRATEGY") {
            match strategy.to_lowercase().as_str() {
                "opaque" => self.session.strategy = SessionStrategy::Opaque,
                "signed" => self.session.strategy = SessionStrategy::Signed,
                _ => {}
            }
        }
        if let Ok(secret) = std::env::var("MUSICMATCH_SESSION_SECRET") {
            if !secret.is_empty() {
                self.session.secret = Some(secret);
            }
        }
        if let Ok(ttl) = std::env::var("MUSICMATCH_SESSION_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.session.ttl_seconds = ttl;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches MUSICMATCH_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "MUSICMATCH_SERVER_HOST",
    "MUSICMATCH_SERVER_PORT",
    "MUSICMATCH_DATABASE_URL",
    "MUSICMATCH_DATABASE_TIMEOUT_SECS",
    "MUSICMATCH_SESSION_STRATEGY",
    "MUSICMATCH_SESSION_SECRET",
    "MUSICMATCH_SESSION_TTL_SECONDS",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_host_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
                .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
            Just("localhost".to_string()),
            Just("0.0.0.0".to_string()),
            "[a-z][a-z0-9]{0,10}".prop_map(|s| s),
        ]
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            valid_host_strategy(),
            1u16..=65535,
            "[a-z][a-z0-9_/]{0,20}\\.db",
            1u32..=64,
            1u64..=60,
            prop_oneof![Just(SessionStrategy::Opaque), Just(SessionStrategy::Signed)],
            proptest::option::of("[A-Za-z0-9]{8,32}"),
            1u64..=86400,
            32usize..=128,
        )
            .prop_map(
                |(host, port, url, max_connections, timeout_secs, strategy, secret, ttl_seconds, token_bytes)| {
                    Config {
                        server: ServerConfig { host, port },
                        database: DatabaseConfig {
                            url,
                            max_connections,
                            timeout_secs,
                        },
                        session: SessionConfig {
                            strategy,
                            secret,
                            ttl_seconds,
                            token_bytes,
                        },
                    }
                },
            )
    }

    fn malformed_yaml_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("server:\n  port: not_a_number".to_string()),
            Just("server:\n  port: [1, 2, 3]".to_string()),
            Just("server:\n  port: 99999999999999999999".to_string()),
            Just("database:\n  timeout_secs: -1".to_string()),
            Just("database:\n  max_connections: many".to_string()),
            Just("session:\n  strategy: cookie".to_string()),
            Just("session:\n  ttl_seconds: forever".to_string()),
            Just("server: 12345".to_string()),
            Just("session: [opaque]".to_string()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a valid config to YAML and loading it back yields the same values.
        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.database.url, parsed.database.url);
            prop_assert_eq!(config.database.max_connections, parsed.database.max_connections);
            prop_assert_eq!(config.database.timeout_secs, parsed.database.timeout_secs);
            prop_assert_eq!(config.session.strategy, parsed.session.strategy);
            prop_assert_eq!(config.session.secret, parsed.session.secret);
            prop_assert_eq!(config.session.ttl_seconds, parsed.session.ttl_seconds);
            prop_assert_eq!(config.session.token_bytes, parsed.session.token_bytes);
        }

        /// Malformed or mistyped YAML is reported as an error, never silently defaulted.
        #[test]
        fn malformed_config_is_rejected(yaml in malformed_yaml_strategy()) {
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            prop_assert!(Config::load(file.path()).is_err());
        }
    }
}
