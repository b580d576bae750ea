use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_HDR_CACHE_SIZE;
use crate::db::OpenOptions;
use crate::policy::{DownloadSettings, RetentionSettings, ThreadingPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub threading: ThreadingPolicy,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Capacity of the MRU header cache
    #[serde(default = "default_header_cache_size")]
    pub header_cache_size: usize,
    /// Keep recently used headers alive between lookups
    #[serde(default = "default_true")]
    pub cache_headers: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            header_cache_size: default_header_cache_size(),
            cache_headers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Log file, appended to. Defaults to `msgdb.log` in the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.file {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_dir()?.join("msgdb.log")),
        }
    }
}

fn default_log_filter() -> String {
    "info,msgdb=debug".to_string()
}

fn default_header_cache_size() -> usize {
    DEFAULT_HDR_CACHE_SIZE
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("msgdb");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load the config file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.database.header_cache_size == 0 {
            anyhow::bail!("database.header_cache_size must be at least 1");
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        let dir = path
            .parent()
            .context("Config path has no parent directory")?;

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Options for opening a folder database with this configuration.
    pub fn open_options(&self, create: bool, leave_invalid: bool) -> OpenOptions {
        OpenOptions {
            create,
            leave_invalid,
            hdr_cache_size: self.database.header_cache_size,
            cache_headers: self.database.cache_headers,
            threading: self.threading.clone(),
            retention: self.retention.clone(),
            download: self.download.clone(),
            folder: None,
            usage: None,
        }
    }
}
