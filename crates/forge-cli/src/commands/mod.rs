pub mod chat;
pub mod sessions;

use anyhow::{Context, Result};
use forge_application::EditingSurface;
use forge_core::config::ForgeConfig;
use forge_core::session::{SessionRepository, SessionStore};
use forge_infrastructure::{ConfigService, create_session_repository};
use forge_interaction::GeminiGenerationClient;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration and storage shared by every command.
pub struct CliContext {
    pub config: ForgeConfig,
    pub repository: Arc<dyn SessionRepository>,
}

impl CliContext {
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let service = match config_path {
            Some(path) => ConfigService::with_path(path),
            None => ConfigService::new(),
        };
        let config = service.get_config().context("Failed to load configuration")?;
        let repository = create_session_repository(&config.storage)
            .await
            .context("Failed to open session storage")?;

        tracing::debug!(target: "reactforge", backend = ?config.storage.backend, "Storage ready");
        Ok(Self { config, repository })
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::new(SessionStore::new(Arc::clone(&self.repository)))
    }

    /// Opens an editing surface backed by the configured generation model.
    pub fn editing_surface(&self) -> Result<EditingSurface> {
        let generator = GeminiGenerationClient::from_config(&self.config.generation)
            .context("Generation is not configured")?;
        Ok(EditingSurface::open(
            self.store(),
            Arc::new(generator),
            &self.config,
        ))
    }
}
