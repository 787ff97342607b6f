//! Selects the session persistence backend from configuration.

use crate::{AsyncDirSessionRepository, HttpSessionRepository, InMemorySessionRepository};
use forge_core::config::{StorageBackend, StorageConfig};
use forge_core::session::SessionRepository;
use forge_core::{ForgeError, Result};
use std::sync::Arc;

/// Builds the repository named by `storage.backend`.
///
/// # Errors
///
/// Returns `ForgeError::Config` when the backend cannot be set up (missing
/// base URL, unusable data directory).
pub async fn create_session_repository(
    config: &StorageConfig,
) -> Result<Arc<dyn SessionRepository>> {
    let repository: Arc<dyn SessionRepository> = match config.backend {
        StorageBackend::Memory => Arc::new(InMemorySessionRepository::new()),
        StorageBackend::Local => {
            let repository = match &config.data_dir {
                Some(dir) => AsyncDirSessionRepository::new(dir).await,
                None => AsyncDirSessionRepository::default_location().await,
            }
            .map_err(|e| ForgeError::config(format!("Local session storage unavailable: {:#}", e)))?;
            tracing::info!(
                "Using local session storage at {}",
                repository.sessions_dir().display()
            );
            Arc::new(repository)
        }
        StorageBackend::Remote => {
            let repository = HttpSessionRepository::from_config(config)?;
            tracing::info!("Using remote session storage");
            Arc::new(repository)
        }
    };
    Ok(repository)
}
