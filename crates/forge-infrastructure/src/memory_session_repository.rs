//! Process-local session repository.
//!
//! Nothing survives the process. Used for `storage.backend = "memory"` and
//! as a fast backend in tests.

use async_trait::async_trait;
use forge_core::session::{
    Session, SessionPatch, SessionRepository, SessionSummary, check_revision,
};
use forge_core::{ForgeError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(stored) = sessions.get(&session.id) {
            check_revision(stored, session.revision)?;
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn patch(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| ForgeError::not_found("session", session_id))?;
        check_revision(stored, patch.revision)?;
        patch.apply_to(stored);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn list_summaries(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(summaries)
    }
}
