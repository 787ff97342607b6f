//! One live editing scope.
//!
//! `EditingSurface` owns the session store together with its autosave timer
//! and unload guard, and runs chat rounds against a [`GenerationClient`].

use crate::session::{AutosaveScheduler, UnloadGuard};
use forge_core::config::ForgeConfig;
use forge_core::generation::{GenerationClient, GenerationRequest, GenerationResponse};
use forge_core::session::{ChatMessage, LoadOutcome, SaveOutcome, SessionStore};
use forge_core::{ForgeError, Result};
use std::sync::Arc;
use std::time::Duration;

pub struct EditingSurface {
    store: Arc<SessionStore>,
    generator: Arc<dyn GenerationClient>,
    autosave: Option<AutosaveScheduler>,
    unload: Arc<UnloadGuard>,
    history_window: usize,
    final_save_timeout: Duration,
}

impl EditingSurface {
    /// Builds the surface around `store`. Nothing is loaded or armed yet.
    pub fn open(
        store: Arc<SessionStore>,
        generator: Arc<dyn GenerationClient>,
        config: &ForgeConfig,
    ) -> Self {
        let autosave = config
            .autosave
            .enabled
            .then(|| AutosaveScheduler::new(Arc::clone(&store), config.autosave.interval()));
        let unload = Arc::new(UnloadGuard::new(Arc::clone(&store)));

        Self {
            store,
            generator,
            autosave,
            unload,
            history_window: config.generation.history_window,
            final_save_timeout: config.autosave.final_save_timeout(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The autosave timer, `None` when autosave is disabled.
    pub fn autosave(&self) -> Option<&AutosaveScheduler> {
        self.autosave.as_ref()
    }

    pub fn unload_guard(&self) -> &Arc<UnloadGuard> {
        &self.unload
    }

    /// Makes `session_id` current and re-arms autosave for it.
    ///
    /// The previous session is not saved; call [`save`](Self::save) first
    /// when switching sessions.
    pub async fn load(&self, session_id: &str) -> Result<LoadOutcome> {
        if let Some(autosave) = &self.autosave {
            autosave.disarm();
        }

        let outcome = self.store.load_session(session_id).await?;
        self.unload.reset();
        if let Some(autosave) = &self.autosave {
            autosave.arm();
        }
        Ok(outcome)
    }

    /// Runs one chat round.
    ///
    /// The user message is appended before the generation call and stays in
    /// the history when the call fails.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `content` is blank (nothing appended)
    /// - `NotReady` / `NoActiveSession` if no session is current
    /// - `Generation` when the client fails
    /// - `Superseded` if the session was cleared or loaded again during the
    ///   call, even under the same id; the reply is dropped
    pub async fn send_chat(&self, content: &str) -> Result<GenerationResponse> {
        if content.trim().is_empty() {
            return Err(ForgeError::invalid_input("message must not be empty"));
        }

        let (token, session) = self
            .store
            .add_chat_message_tracked(ChatMessage::user(content))?;
        let earlier = &session.chat_history[..session.chat_history.len().saturating_sub(1)];
        let request = GenerationRequest::new(
            content,
            earlier,
            session.generated_code.clone(),
            self.history_window,
        );

        let response = match self.generator.generate(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    target: "editing_surface",
                    session_id = %session.id,
                    "Generation failed: {}",
                    e
                );
                return Err(e);
            }
        };

        let applied = self.store.apply_reply(
            &token,
            ChatMessage::assistant(response.response_text.clone()),
            response.code.clone(),
        );
        if let Err(e) = applied {
            tracing::debug!(
                target: "editing_surface",
                session_id = %session.id,
                "Dropping reply for a session that is no longer current"
            );
            return Err(e);
        }

        Ok(response)
    }

    pub async fn rename(&self, name: &str) -> Result<()> {
        self.store.update_session_name(name).await
    }

    /// Manual save. Failures are returned so the host can offer a retry.
    pub async fn save(&self) -> Result<SaveOutcome> {
        self.store.save_session().await
    }

    /// Tears the scope down: stops autosave, makes a bounded final save and
    /// clears the session.
    ///
    /// The session is cleared even when the final save fails or times out;
    /// the save result is returned.
    pub async fn close(&self) -> Result<SaveOutcome> {
        if let Some(autosave) = &self.autosave {
            autosave.disarm();
        }

        let result = match tokio::time::timeout(self.final_save_timeout, self.store.save_if_dirty())
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ForgeError::transient(format!(
                "final save did not finish within {}s",
                self.final_save_timeout.as_secs()
            ))),
        };
        if let Err(e) = &result {
            tracing::warn!(target: "editing_surface", "Final save failed: {}", e);
        }

        self.store.clear_session();
        result
    }
}
