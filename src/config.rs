//! # Configuration Management
//!
//! Centralized configuration for the proxy.
//!
//! This module provides structured configuration for a proxy instance: the
//! listen and upstream addresses, the dump-queue depth, and logging options.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - Declared message lengths are bounded (`MAX_MESSAGE_LEN`) before any
//!   allocation happens, so a corrupt length field cannot exhaust memory

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Every top-level LDAP message is framed as a universal, constructed SEQUENCE.
pub const SEQUENCE_TAG: u8 = 0x30;

/// Upper bound on a declared message length (2^23 bytes). Lengths at or above
/// this are rejected while still parsing the header.
pub const MAX_MESSAGE_LEN: usize = 1 << 23;

/// Default depth of the per-session dump queue. When full, dump records are
/// dropped rather than letting the dump path stall forwarding.
pub const DUMP_QUEUE_DEPTH: usize = 256;

/// Main configuration structure for one proxy instance
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Local listen address (e.g., "127.0.0.1:3389")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Upstream LDAP server address (e.g., "127.0.0.1:389")
    #[serde(default = "default_upstream_addr")]
    pub upstream_addr: String,

    /// Maximum number of frames queued for the dump task per session
    #[serde(default = "default_dump_queue_depth")]
    pub dump_queue_depth: usize,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> String {
    String::from("127.0.0.1:3389")
}

fn default_upstream_addr() -> String {
    String::from("127.0.0.1:389")
}

fn default_dump_queue_depth() -> usize {
    DUMP_QUEUE_DEPTH
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_addr: default_upstream_addr(),
            dump_queue_depth: default_dump_queue_depth(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProxyError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProxyError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProxyError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(addr) = std::env::var("LDAP_TAP_LISTEN") {
            config.listen_addr = addr;
        }

        if let Ok(addr) = std::env::var("LDAP_TAP_UPSTREAM") {
            config.upstream_addr = addr;
        }

        if let Ok(depth) = std::env::var("LDAP_TAP_DUMP_QUEUE_DEPTH") {
            if let Ok(val) = depth.parse::<usize>() {
                config.dump_queue_depth = val;
            }
        }

        if let Ok(level) = std::env::var("LDAP_TAP_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        Ok(config)
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.listen_addr.is_empty() {
            errors.push("Listen address cannot be empty".to_string());
        } else if !self.listen_addr.contains(':') {
            errors.push(format!(
                "Invalid listen address format: '{}' (expected format: '0.0.0.0:3389')",
                self.listen_addr
            ));
        }

        if self.upstream_addr.is_empty() {
            errors.push("Upstream address cannot be empty".to_string());
        } else if !self.upstream_addr.contains(':') {
            errors.push(format!(
                "Invalid upstream address format: '{}' (expected format: 'ldap.example.com:389')",
                self.upstream_addr
            ));
        }

        if self.dump_queue_depth == 0 {
            errors.push("Dump queue depth must be greater than 0".to_string());
        } else if self.dump_queue_depth > 1_000_000 {
            errors.push(format!(
                "Dump queue depth too large: {} (max recommended: 1,000,000)",
                self.dump_queue_depth
            ));
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProxyError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde", default = "default_log_level")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> Level {
    Level::INFO
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
