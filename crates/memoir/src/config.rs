//! Configuration management for memoir.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (MEMOIR_DATA_DIR, OPENAI_API_KEY, MEMORY_MODEL, ...)
//! 2. Config file (MEMOIR_CONFIG, or config.toml in the platform data dir)
//! 3. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use memoir_core::{FileMemoryStore, MemoirConfig};
use std::path::{Path, PathBuf};

/// CLI configuration: the core config plus where it came from
#[derive(Debug, Clone)]
pub struct Config {
    pub memoir: MemoirConfig,
    pub source: Option<PathBuf>,
}

fn default_base_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "memoir", "memoir") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".memoir")
    }
}

fn default_data_dir() -> PathBuf {
    default_base_dir().join("clients")
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        config
            .memoir
            .validate()
            .context("Invalid configuration")?;
        Ok(config)
    }

    /// Read a config file; a missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                memoir: MemoirConfig::new(default_data_dir()),
                source: None,
            });
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut memoir: MemoirConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        // Relative data dirs are resolved against the config file
        if memoir.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                memoir.data_dir = parent.join(&memoir.data_dir);
            }
        }

        Ok(Self {
            memoir,
            source: Some(path.to_path_buf()),
        })
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("MEMOIR_DATA_DIR") {
            self.memoir.data_dir = PathBuf::from(dir);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.memoir.reasoning.api_key = Some(key);
        }
        if let Some(base) = var("OPENAI_BASE_URL") {
            self.memoir.reasoning.api_base = base;
        }
        if let Some(model) = var("MEMORY_MODEL") {
            self.memoir.reasoning.model = model;
        }
        if let Some(effort) = var("REASONING_EFFORT") {
            self.memoir.reasoning.reasoning_effort = effort;
        }
        if let Some(verbosity) = var("VERBOSITY") {
            self.memoir.reasoning.verbosity = verbosity;
        }
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MEMOIR_CONFIG") {
            PathBuf::from(path)
        } else {
            default_base_dir().join("config.toml")
        }
    }

    /// Open the file store rooted at the configured data dir.
    pub fn store(&self) -> FileMemoryStore {
        FileMemoryStore::new(&self.memoir.data_dir)
    }
}
