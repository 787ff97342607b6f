//! AsyncDirStorage-based SessionRepository implementation
//!
//! One JSON file per session, written through version-migrate so older
//! browser-era records are migrated on read.

use crate::dto::create_session_migrator;
use anyhow::Context;
use async_trait::async_trait;
use forge_core::session::{
    Session, SessionPatch, SessionRepository, SessionSummary, check_revision,
};
use forge_core::{ForgeError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use version_migrate::{
    AppPaths, AsyncDirStorage, DirStorageStrategy, FilenameEncoding, FormatStrategy, PathStrategy,
};

const ENTITY: &str = "session";

/// AsyncDirStorage-based session repository.
///
/// Directory structure:
/// ```text
/// base_dir/
/// └── sessions/
///     ├── session-id-1.json
///     └── my%20session.json
/// ```
pub struct AsyncDirSessionRepository {
    storage: AsyncDirStorage,
    base_dir: PathBuf,
    /// Serializes read-check-write sequences so revision checks are atomic.
    write_lock: Mutex<()>,
}

impl AsyncDirSessionRepository {
    /// Creates a repository at the default location (platform data directory).
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or created.
    pub async fn default_location() -> anyhow::Result<Self> {
        use crate::paths::ForgePaths;
        let base_dir = ForgePaths::data_dir()
            .map_err(|e| anyhow::anyhow!("Failed to get data directory: {}", e))?;
        Self::new(base_dir).await
    }

    /// Creates a new AsyncDirSessionRepository rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Directory creation fails
    /// - AsyncDirStorage initialization fails
    pub async fn new(base_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_dir)
            .await
            .context("Failed to create base directory")?;

        // CustomBase keeps every file under base_dir
        let paths = AppPaths::new(crate::paths::APP_NAME)
            .data_strategy(PathStrategy::CustomBase(base_dir.clone()));

        let migrator = create_session_migrator();

        // Plain ids keep their names; anything else is percent-encoded
        let strategy = DirStorageStrategy::default()
            .with_format(FormatStrategy::Json)
            .with_filename_encoding(FilenameEncoding::UrlEncode);

        let storage = AsyncDirStorage::new(paths, "sessions", migrator, strategy)
            .await
            .context("Failed to create AsyncDirStorage")?;

        Ok(Self {
            storage,
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the actual sessions directory path.
    pub fn sessions_dir(&self) -> &Path {
        self.storage.base_path()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        match self.storage.load::<Session>(ENTITY, session_id).await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("No such file or directory")
                    || error_str.contains("not found")
                    || error_str.contains("cannot find")
                {
                    return Ok(None);
                }
                let err = ForgeError::from(e);
                if err.is_not_found() {
                    return Ok(None);
                }
                tracing::error!("Failed to load session '{}': {}", session_id, err);
                Err(err)
            }
        }
    }

    async fn store(&self, session: &Session) -> Result<()> {
        self.storage
            .save(ENTITY, &session.id, session)
            .await
            .map_err(ForgeError::from)
    }
}

#[async_trait]
impl SessionRepository for AsyncDirSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        self.load(session_id).await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(stored) = self.load(&session.id).await? {
            check_revision(&stored, session.revision)?;
        }
        self.store(session).await?;
        tracing::debug!(
            "Wrote session '{}' at revision {}",
            session.id,
            session.revision
        );
        Ok(())
    }

    async fn patch(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self
            .load(session_id)
            .await?
            .ok_or_else(|| ForgeError::not_found("session", session_id))?;
        check_revision(&stored, patch.revision)?;
        patch.apply_to(&mut stored);
        self.store(&stored).await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.load(session_id).await?.is_none() {
            return Ok(());
        }
        self.storage
            .delete(session_id)
            .await
            .map_err(ForgeError::from)
    }

    async fn list_summaries(&self) -> Result<Vec<SessionSummary>> {
        let all_sessions = self.storage.load_all::<Session>(ENTITY).await?;

        let mut summaries: Vec<SessionSummary> = all_sessions
            .into_iter()
            .map(|(_id, session)| session.summary())
            .collect();

        // Most recent first
        summaries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

        Ok(summaries)
    }
}
