//! Configuration management for the Parley backend.
//!
//! Configuration lives in a single JSON file at `~/.parley/config.json`.
//! Every field has a default, so a missing file is not an error.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PARLEY_BIND_ADDRESS` → server.bind
//! - `PARLEY_PORT` → server.port
//! - `OLLAMA_BASE_URL` → ollama.base_url
//! - `OLLAMA_MODEL` → ollama.model
//! - `PARLEY_LOG_LEVEL` → observability.log_level
//! - `PARLEY_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".parley"),
        |dirs| dirs.home_dir().join(".parley"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "127.0.0.1" (local only).
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3000
}

// ============================================================================
// Ollama Configuration
// ============================================================================

/// Inference backend (Ollama) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Model name to generate with.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout for generation calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_model(),
            timeout_secs: default_request_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "llama2".into()
}

fn default_request_timeout() -> u64 {
    60
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Conversation session retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum turns retained per session; older turns are discarded.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// How often the expiry sweep runs, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Sessions idle longer than this are evicted, in seconds.
    #[serde(default = "default_max_age")]
    pub max_age_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            sweep_interval_secs: default_sweep_interval(),
            max_age_secs: default_max_age(),
        }
    }
}

fn default_max_messages() -> usize {
    20
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_max_age() -> i64 {
    86_400
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Unified configuration for the Parley backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when no config file exists. Environment overrides are applied last.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("PARLEY_BIND_ADDRESS") {
            self.server.bind = bind;
        }

        if let Ok(port) = std::env::var("PARLEY_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }

        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.ollama.model = model;
        }

        if let Ok(level) = std::env::var("PARLEY_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(format) = std::env::var("PARLEY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}
