//! Embedding Server Configuration
//!
//! Loaded from a TOML file when one exists, otherwise from defaults, then
//! overridden from `EMBED_*` environment variables.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::models::config::ModelConfig;
use crate::models::{EmbeddingError, EmbeddingResult};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "EMBED_SERVER_CONFIG";
/// Config file used when `EMBED_SERVER_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub model: ModelConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    /// Listen backlog for the TCP socket
    pub backlog: u32,
    pub http1_keepalive: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            backlog: 1024,
            http1_keepalive: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    /// Log per-request timings at info instead of debug
    pub log_request_timings: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_request_timings: false,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> EmbeddingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> EmbeddingResult<Self> {
        let config: ServerConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Config file path: `EMBED_SERVER_CONFIG` from `lookup`, else `config.toml`
    pub fn config_path<F>(lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(CONFIG_PATH_ENV).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load the process configuration: file at `path` (if present), then
    /// environment overrides, then validation.
    ///
    /// Runs before logging is set up, so it logs nothing itself.
    pub fn load(path: &str) -> EmbeddingResult<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `EMBED_*` overrides from `lookup` (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> EmbeddingResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EMBED_BIND_ADDRESS") {
            self.network.bind_address = v;
        }
        if let Some(v) = lookup("EMBED_MODEL_NAME") {
            self.model.name = v;
        }
        if let Some(v) = lookup("EMBED_MODEL_PATH") {
            self.model.model_path = v;
        }
        if let Some(v) = lookup("EMBED_TOKENIZER_PATH") {
            self.model.tokenizer_path = v;
        }
        if let Some(v) = lookup("EMBED_MODEL_DIMENSION") {
            self.model.embedding_dimension = parse_number("EMBED_MODEL_DIMENSION", &v)?;
        }
        if let Some(v) = lookup("EMBED_BATCH_SIZE") {
            self.model.batch_size = parse_number("EMBED_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("EMBED_NUM_THREADS") {
            self.model.num_threads = parse_number("EMBED_NUM_THREADS", &v)?;
        }
        if let Some(v) = lookup("ORT_DYLIB_PATH") {
            self.model.onnx_runtime_path = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> EmbeddingResult<()> {
        self.bind_addr()?;
        self.model.validate()
    }

    /// Parsed bind address
    pub fn bind_addr(&self) -> EmbeddingResult<SocketAddr> {
        self.network
            .bind_address
            .parse()
            .map_err(|e| EmbeddingError::ConfigError {
                message: format!("Invalid bind_address '{}': {}", self.network.bind_address, e),
            })
    }

    /// Default tracing filter derived from `monitoring.log_level`
    pub fn log_filter(&self) -> String {
        match self.monitoring.log_level.to_lowercase().as_str() {
            "trace" => "embed_server=trace,trace".to_string(),
            "debug" => "embed_server=debug,debug".to_string(),
            "warn" => "embed_server=warn,warn".to_string(),
            "error" => "embed_server=error,error".to_string(),
            _ => "embed_server=info,info".to_string(),
        }
    }
}

fn parse_number(key: &str, value: &str) -> EmbeddingResult<usize> {
    value.trim().parse().map_err(|_| EmbeddingError::ConfigError {
        message: format!("{} must be a positive integer, got '{}'", key, value),
    })
}
