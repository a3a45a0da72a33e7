//! Service configuration: a TOML file with per-field defaults, then environment overrides.
//!
//! The file path comes from `COMPLIANCE_CONFIG` (default `compliance.toml`); a missing file
//! means "all defaults". `BACKEND_ADDR` and `API_KEY` override the `[server]` section.

use crate::cache::validate_ttl;
use crate::cache::DEFAULT_CACHE_TTL_SECS;
use crate::engine::DEFAULT_MAX_BATCH_SIZE;
use crate::settings::PrivacySettings;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zk_circuits::constants::MERKLE_DEPTH;

pub const CONFIG_PATH_ENV: &str = "COMPLIANCE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "compliance.toml";

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_API_KEY: &str = "dev-secret-key";
const MAX_MERKLE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub privacy: PrivacySettings,
    #[serde(default)]
    pub circuits: CircuitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitsConfig {
    #[serde(default = "default_keys_dir")]
    pub keys_dir: PathBuf,
    #[serde(default = "default_merkle_depth")]
    pub merkle_depth: usize,
    /// Generate missing keys with a local single-party setup. Development only.
    #[serde(default)]
    pub dev_setup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr(), api_key: default_api_key(), data_dir: default_data_dir() }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: default_cache_ttl_secs(), max_batch_size: default_max_batch_size() }
    }
}

impl Default for CircuitsConfig {
    fn default() -> Self {
        Self { keys_dir: default_keys_dir(), merkle_depth: default_merkle_depth(), dev_setup: false }
    }
}

fn default_addr() -> String {
    DEFAULT_ADDR.to_string()
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from("data/keys")
}

fn default_merkle_depth() -> usize {
    MERKLE_DEPTH
}

impl Config {
    /// Load from `COMPLIANCE_CONFIG` (or the default path) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse `path`, or return defaults if it does not exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("BACKEND_ADDR") {
            self.server.addr = addr;
        }
        if let Some(key) = lookup("API_KEY") {
            self.server.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .addr
            .parse::<SocketAddr>()
            .map_err(|e| invalid("server.addr", e.to_string()))?;
        if self.server.api_key.is_empty() {
            return Err(invalid("server.api_key", "must not be empty"));
        }
        validate_ttl(self.engine.cache_ttl_secs).map_err(|e| invalid("engine.cache_ttl_secs", e.to_string()))?;
        if !(1..=DEFAULT_MAX_BATCH_SIZE).contains(&self.engine.max_batch_size) {
            return Err(invalid("engine.max_batch_size", format!("must be in 1..={DEFAULT_MAX_BATCH_SIZE}")));
        }
        self.privacy.validate().map_err(|e| invalid("privacy", e.to_string()))?;
        if !(1..=MAX_MERKLE_DEPTH).contains(&self.circuits.merkle_depth) {
            return Err(invalid("circuits.merkle_depth", format!("must be in 1..={MAX_MERKLE_DEPTH}")));
        }
        Ok(())
    }
}
