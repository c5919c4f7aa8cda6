//! Barbican CLI configuration
//!
//! Connection settings live in `~/.config/barbican/config.toml`. Every value
//! can be overridden by a command-line flag or environment variable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection settings read from the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarbicanConfig {
    /// Service endpoint, e.g. `http://localhost:9311`
    pub endpoint: Option<String>,

    /// Project the requests are scoped to
    pub project_id: Option<String>,

    /// Pre-issued auth token
    pub auth_token: Option<String>,

    /// API version path segment (default `v1`)
    pub api_version: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl BarbicanConfig {
    /// Get the default config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("barbican")
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Load from a user-supplied path, expanding `~`
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::tilde(path);
        Self::load(Path::new(expanded.as_ref()))
    }

    /// Load the default file, or an empty config if there is none
    pub fn load_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match self.endpoint.as_deref() {
            Some(endpoint) if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {}
            Some(endpoint) => errors.push(format!("Endpoint must be an http(s) URL: {endpoint}")),
            None => {}
        }

        if self.api_version.as_deref().is_some_and(str::is_empty) {
            errors.push("API version must not be empty".to_string());
        }

        if self.timeout_secs == Some(0) {
            errors.push("Timeout must be at least one second".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
