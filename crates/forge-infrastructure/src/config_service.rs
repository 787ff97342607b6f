//! Configuration service implementation.
//!
//! Loads `ForgeConfig` from `config.toml` (~/.config/reactforge/config.toml
//! by default), applies environment overrides and caches the result.

use crate::paths::ForgePaths;
use forge_core::config::ForgeConfig;
use forge_core::{ForgeError, Result};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Overrides `storage.api_token`.
pub const API_TOKEN_ENV: &str = "REACTFORGE_API_TOKEN";
/// Overrides `generation.api_key`.
pub const GENERATION_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    /// Explicit config file; the platform config file when `None`.
    path: Option<PathBuf>,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<ForgeConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the platform `config.toml`.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service reading `path` instead of the platform file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::default(),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn get_config(&self) -> Result<ForgeConfig> {
        {
            let cached = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = self.load_config()?;

        let mut cached = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *cached = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut cached = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *cached = None;
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => ForgePaths::config_file(),
        }
    }

    fn load_config(&self) -> Result<ForgeConfig> {
        let path = self.config_path()?;

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                ForgeError::config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            toml::from_str::<ForgeConfig>(&content)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            ForgeConfig::default()
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }
}

/// Applies environment overrides; environment values win over the file.
pub fn apply_env_overrides(config: &mut ForgeConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(token) = non_empty(API_TOKEN_ENV) {
        config.storage.api_token = Some(token);
    }
    if let Some(key) = non_empty(GENERATION_API_KEY_ENV) {
        config.generation.api_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::config::StorageBackend;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(dir.path().join("config.toml"));

        let config = service.get_config().unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.autosave.interval_secs, 30);
    }

    #[test]
    fn test_file_is_loaded_and_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nbackend = \"memory\"\n").unwrap();
        let service = ConfigService::with_path(&path);

        assert_eq!(
            service.get_config().unwrap().storage.backend,
            StorageBackend::Memory
        );

        // Served from cache until invalidated
        std::fs::write(&path, "[storage]\nbackend = \"local\"\n").unwrap();
        assert_eq!(
            service.get_config().unwrap().storage.backend,
            StorageBackend::Memory
        );
        service.invalidate_cache();
        assert_eq!(
            service.get_config().unwrap().storage.backend,
            StorageBackend::Local
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[autosave]\ninterval_secs = 0\n").unwrap();

        let err = ConfigService::with_path(&path).get_config().unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = ForgeConfig::default();
        config.storage.api_token = Some("from-file".into());

        apply_env_overrides(&mut config, |key| match key {
            API_TOKEN_ENV => Some("from-env".into()),
            GENERATION_API_KEY_ENV => Some("   ".into()),
            _ => None,
        });

        assert_eq!(config.storage.api_token.as_deref(), Some("from-env"));
        assert_eq!(config.generation.api_key, None);
    }
}
