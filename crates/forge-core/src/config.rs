//! Configuration model.
//!
//! Loaded from `config.toml` by the infrastructure `ConfigService`. Every
//! section has defaults, so an empty or missing file yields a working setup.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which persistence backend the session store talks to.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local memory; lost when the process exits.
    Memory,
    /// JSON files in the local data directory.
    #[default]
    Local,
    /// Remote session API over HTTP.
    Remote,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Overrides the platform data directory for the local backend.
    pub data_dir: Option<PathBuf>,
    /// Base URL of the remote session API.
    pub base_url: Option<String>,
    /// Opaque bearer credential for the remote backend.
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: None,
            base_url: None,
            api_token: None,
            request_timeout_secs: 10,
        }
    }
}

impl StorageConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Upper bound on the final save when an editing surface closes.
    pub final_save_timeout_secs: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            final_save_timeout_secs: 5,
        }
    }
}

impl AutosaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn final_save_timeout(&self) -> Duration {
        Duration::from_secs(self.final_save_timeout_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub api_key: Option<String>,
    /// How many past chat messages accompany a request.
    pub history_window: usize,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-exp".to_string(),
            api_key: None,
            history_window: crate::generation::DEFAULT_HISTORY_WINDOW,
            request_timeout_secs: 60,
        }
    }
}

/// Root of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ForgeConfig {
    pub storage: StorageConfig,
    pub autosave: AutosaveConfig,
    pub generation: GenerationConfig,
}

impl ForgeConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ForgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.autosave.interval_secs == 0 {
            return Err(ForgeError::config("autosave.interval_secs must be positive"));
        }
        if self.storage.backend == StorageBackend::Remote
            && self
                .storage
                .base_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err(ForgeError::config(
                "storage.base_url is required for the remote backend",
            ));
        }
        if self.generation.history_window == 0 {
            return Err(ForgeError::config("generation.history_window must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ForgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ForgeConfig::default());
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.autosave.interval(), Duration::from_secs(30));
        assert_eq!(config.generation.history_window, 5);
    }

    #[test]
    fn test_partial_sections() {
        let config = ForgeConfig::from_toml_str(
            r#"
            [storage]
            backend = "remote"
            base_url = "https://forge.example/api"

            [autosave]
            interval_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Remote);
        assert_eq!(config.storage.request_timeout_secs, 10);
        assert_eq!(config.autosave.interval_secs, 10);
        assert!(config.autosave.enabled);
    }

    #[test]
    fn test_remote_without_base_url_is_rejected() {
        let err = ForgeConfig::from_toml_str("[storage]\nbackend = \"remote\"\n").unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = ForgeConfig::from_toml_str("[autosave]\ninterval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_unknown_backend_is_a_parse_error() {
        let err = ForgeConfig::from_toml_str("[storage]\nbackend = \"mongo\"\n").unwrap_err();
        assert!(matches!(err, ForgeError::Serialization { .. }));
    }
}
