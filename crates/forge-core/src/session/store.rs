//! The session store.
//!
//! `SessionStore` owns the in-memory state of the one session being edited
//! and is the only component that talks to the [`SessionRepository`].
//! Mutations are synchronous and in-memory; persistence is asynchronous and
//! always writes a point-in-time snapshot taken under the state lock.

use super::message::ChatMessage;
use super::model::{GeneratedCode, Session, SessionPatch, next_modified_time};
use super::property::{ComponentProperty, validate_properties};
use super::repository::SessionRepository;
use crate::error::{ForgeError, Result};
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

/// Lifecycle phase of the store.
///
/// Saving is not a phase: saves run while the store stays `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    /// Nothing was loaded yet, or the last load failed.
    Uninitialized,
    /// A `load_session` call is waiting for the repository.
    Loading,
    /// A session is current and accepts mutations.
    Ready,
    /// The current session was dropped with `clear_session`.
    Cleared,
}

/// Result of a successful `load_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The session was hydrated from the repository.
    Restored,
    /// The repository had no record; an empty default session was created.
    Created,
}

/// Result of a successful `save_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The snapshot was written.
    Saved {
        revision: u64,
        last_modified: DateTime<Utc>,
    },
    /// No session was current; nothing to do.
    NoSession,
    /// Nothing changed since the last successful persist.
    Clean,
    /// A newer snapshot of the same session was already written.
    Superseded,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

struct StoreState {
    phase: StorePhase,
    loading_id: Option<String>,
    current: Option<Session>,
    /// Bumped by every load and clear; stale completions compare against it.
    epoch: u64,
    /// Last revision handed out to a snapshot or patch.
    last_revision: u64,
    /// Last `last_modified` handed out to a snapshot or patch.
    last_stamp: DateTime<Utc>,
    /// Number of mutations applied to the current session.
    edit_seq: u64,
    /// `edit_seq` covered by the latest successful full save.
    saved_edit_seq: u64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            phase: StorePhase::Uninitialized,
            loading_id: None,
            current: None,
            epoch: 0,
            last_revision: 0,
            last_stamp: DateTime::<Utc>::MIN_UTC,
            edit_seq: 0,
            saved_edit_seq: 0,
        }
    }

    fn ready_session(&mut self) -> Result<&mut Session> {
        if self.phase == StorePhase::Loading {
            return Err(ForgeError::NotReady(
                self.loading_id.clone().unwrap_or_default(),
            ));
        }
        self.current.as_mut().ok_or(ForgeError::NoActiveSession)
    }

    fn next_revision(&mut self) -> u64 {
        self.last_revision += 1;
        self.last_revision
    }

    fn next_stamp(&mut self) -> DateTime<Utc> {
        self.last_stamp = next_modified_time(self.last_stamp);
        self.last_stamp
    }
}

/// Identifies one load of a session.
///
/// Every load and clear invalidates the previous token, including a reload
/// of the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    session_id: String,
    epoch: u64,
}

impl SessionToken {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Newest revision this store wrote, for the last session it wrote.
///
/// Only one session is tracked; older sessions fall back on the
/// repository's own revision check.
#[derive(Default)]
struct WriteMark {
    session_id: Option<String>,
    revision: u64,
}

impl WriteMark {
    fn covers(&self, session_id: &str, revision: u64) -> bool {
        self.session_id.as_deref() == Some(session_id) && self.revision >= revision
    }

    fn record(&mut self, session_id: &str, revision: u64) {
        if self.session_id.as_deref() == Some(session_id) {
            self.revision = self.revision.max(revision);
        } else {
            self.session_id = Some(session_id.to_string());
            self.revision = revision;
        }
    }
}

/// A coherent copy of the current session, ready to be written.
struct Snapshot {
    session: Session,
    epoch: u64,
    edit_seq: u64,
}

/// Single source of truth for the session being edited.
///
/// Construct one per editing surface and share it as `Arc<SessionStore>`.
/// The in-memory state sits behind a short-lived lock that is never held
/// across an `.await`, so mutations stay possible while a save is in flight.
/// Writes to the repository are serialized through a save gate that also
/// remembers the newest revision written.
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
    state: RwLock<StoreState>,
    save_gate: Mutex<WriteMark>,
}

impl SessionStore {
    /// Creates an empty store backed by `repository`.
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            repository,
            state: RwLock::new(StoreState::new()),
            save_gate: Mutex::new(WriteMark::default()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn phase(&self) -> StorePhase {
        self.read_state().phase
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.read_state().current.as_ref().map(|s| s.id.clone())
    }

    pub fn has_current_session(&self) -> bool {
        let state = self.read_state();
        state.phase == StorePhase::Ready && state.current.is_some()
    }

    /// Returns a copy of the current in-memory session.
    pub fn snapshot(&self) -> Option<Session> {
        self.read_state().current.clone()
    }

    /// Token of the current load, `None` when no session is ready.
    pub fn session_token(&self) -> Option<SessionToken> {
        let state = self.read_state();
        if state.phase != StorePhase::Ready {
            return None;
        }
        state.current.as_ref().map(|session| SessionToken {
            session_id: session.id.clone(),
            epoch: state.epoch,
        })
    }

    /// Whether the current session has changes not covered by a full save.
    pub fn is_dirty(&self) -> bool {
        let state = self.read_state();
        state.current.is_some() && state.edit_seq > state.saved_edit_seq
    }

    // ============================================================================
    // Loading
    // ============================================================================

    /// Makes `session_id` the current session.
    ///
    /// Any previously current session is discarded without saving. If the
    /// repository has no record, an empty default session is synthesized and
    /// becomes current without being persisted.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `session_id` is blank
    /// - `Superseded` if another load or a clear happened while this one was
    ///   waiting for the repository; the newer state is left untouched
    /// - Any repository error; the store is left with no current session
    pub async fn load_session(&self, session_id: &str) -> Result<LoadOutcome> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ForgeError::invalid_input("session id must not be empty"));
        }

        let epoch = {
            let mut state = self.write_state();
            state.epoch += 1;
            state.phase = StorePhase::Loading;
            state.loading_id = Some(session_id.to_string());
            state.current = None;
            state.epoch
        };
        tracing::debug!(target: "session_store", session_id, epoch, "Loading session");

        let result = self.repository.find_by_id(session_id).await;

        let mut state = self.write_state();
        if state.epoch != epoch {
            tracing::debug!(
                target: "session_store",
                session_id,
                "Discarding superseded load result"
            );
            return Err(ForgeError::Superseded(session_id.to_string()));
        }
        state.loading_id = None;

        let (session, outcome) = match result {
            Ok(Some(session)) => (session, LoadOutcome::Restored),
            Ok(None) => (Session::new_default(session_id), LoadOutcome::Created),
            Err(e) => {
                tracing::error!(
                    target: "session_store",
                    session_id,
                    "Failed to load session: {}",
                    e
                );
                state.phase = StorePhase::Uninitialized;
                return Err(e);
            }
        };

        state.last_revision = state.last_revision.max(session.revision);
        state.last_stamp = state.last_stamp.max(session.last_modified);
        state.saved_edit_seq = 0;
        // A synthesized session only exists in memory until the first save.
        state.edit_seq = match outcome {
            LoadOutcome::Restored => 0,
            LoadOutcome::Created => 1,
        };
        state.current = Some(session);
        state.phase = StorePhase::Ready;

        tracing::info!(target: "session_store", session_id, ?outcome, "Session ready");
        Ok(outcome)
    }

    /// Drops the current session from memory without persisting it.
    ///
    /// An in-flight load is cancelled: its result will not become current.
    pub fn clear_session(&self) {
        let mut state = self.write_state();
        state.epoch += 1;
        state.current = None;
        state.loading_id = None;
        state.edit_seq = 0;
        state.saved_edit_seq = 0;
        state.phase = StorePhase::Cleared;
        tracing::debug!(target: "session_store", "Session cleared");
    }

    // ============================================================================
    // In-memory mutations
    // ============================================================================

    fn mutate(&self, apply: impl FnOnce(&mut Session)) -> Result<()> {
        let mut guard = self.write_state();
        let state = &mut *guard;
        apply(state.ready_session()?);
        state.edit_seq += 1;
        Ok(())
    }

    /// Appends a message to the chat history. Does not persist.
    pub fn add_chat_message(&self, message: ChatMessage) -> Result<()> {
        self.mutate(|session| session.chat_history.push(message))
    }

    /// Appends a message and returns the token of the session it went into,
    /// together with a copy of that session including the message.
    pub fn add_chat_message_tracked(&self, message: ChatMessage) -> Result<(SessionToken, Session)> {
        let mut guard = self.write_state();
        let state = &mut *guard;
        let session = state.ready_session()?;
        session.chat_history.push(message);
        let snapshot = session.clone();
        state.edit_seq += 1;
        let token = SessionToken {
            session_id: snapshot.id.clone(),
            epoch: state.epoch,
        };
        Ok((token, snapshot))
    }

    /// Applies a generation reply to the session `token` was issued for.
    ///
    /// The reply is appended and, when it carries code, the code replaces
    /// the current one and an empty property list gets the default panel.
    /// All of it lands in one step. Does not persist.
    ///
    /// # Errors
    ///
    /// `Superseded` if the session was cleared or loaded again since the
    /// token was issued; nothing is applied.
    pub fn apply_reply(
        &self,
        token: &SessionToken,
        reply: ChatMessage,
        code: Option<GeneratedCode>,
    ) -> Result<()> {
        let mut guard = self.write_state();
        let state = &mut *guard;
        if state.epoch != token.epoch || state.phase != StorePhase::Ready {
            return Err(ForgeError::Superseded(token.session_id.clone()));
        }
        let session = state.ready_session()?;
        session.chat_history.push(reply);
        if let Some(code) = code {
            session.generated_code = code;
            if session.component_properties.is_empty() {
                session.component_properties = ComponentProperty::default_panel();
            }
        }
        state.edit_seq += 1;
        Ok(())
    }

    /// Replaces the generated code. Does not persist.
    pub fn update_code(&self, code: GeneratedCode) -> Result<()> {
        self.mutate(|session| session.generated_code = code)
    }

    /// Replaces the component property list. Does not persist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` and leaves the live list untouched if any
    /// property is invalid.
    pub fn update_component_properties(&self, properties: Vec<ComponentProperty>) -> Result<()> {
        validate_properties(&properties)?;
        self.mutate(|session| session.component_properties = properties)
    }

    /// Renames the current session and persists the new name right away.
    ///
    /// The in-memory name is updated before the write. If the write fails
    /// the name stays updated, the session stays dirty, and the error is
    /// returned so the caller can tell the user the remote write failed.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the trimmed name is empty (name unchanged)
    /// - `NotReady` / `NoActiveSession` if no session is current
    /// - Any repository error from the write
    pub async fn update_session_name(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ForgeError::invalid_input("session name must not be empty"));
        }

        let (session_id, epoch, patch) = {
            let mut guard = self.write_state();
            let state = &mut *guard;
            let session = state.ready_session()?;
            session.name = name.to_string();
            let session_id = session.id.clone();
            state.edit_seq += 1;
            let patch = SessionPatch {
                name: Some(name.to_string()),
                last_modified: state.next_stamp(),
                revision: state.next_revision(),
            };
            (session_id, state.epoch, patch)
        };

        let mut written = self.save_gate.lock().await;
        if written.covers(&session_id, patch.revision) {
            return Ok(());
        }

        match self.repository.patch(&session_id, &patch).await {
            Ok(()) => {
                written.record(&session_id, patch.revision);
                drop(written);
                let mut state = self.write_state();
                if state.epoch == epoch
                    && let Some(session) = state.current.as_mut()
                {
                    session.last_modified = session.last_modified.max(patch.last_modified);
                    session.revision = session.revision.max(patch.revision);
                }
                tracing::info!(target: "session_store", session_id, name, "Session renamed");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                // Never persisted yet: the name goes out with a full save.
                drop(written);
                tracing::debug!(
                    target: "session_store",
                    session_id,
                    "Rename target not persisted yet, saving full session"
                );
                self.save_session().await.map(|_| ())
            }
            Err(e) if e.is_conflict() => {
                drop(written);
                tracing::warn!(
                    target: "session_store",
                    session_id,
                    "Discarding stale rename: {}",
                    e
                );
                self.resync_revision(&session_id).await;
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    target: "session_store",
                    session_id,
                    "Failed to persist session name: {}",
                    e
                );
                Err(e)
            }
        }
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    fn take_snapshot(&self) -> Option<Snapshot> {
        let mut guard = self.write_state();
        let state = &mut *guard;
        if state.phase != StorePhase::Ready {
            return None;
        }
        let mut session = state.current.clone()?;
        session.revision = state.next_revision();
        session.last_modified = state.next_stamp();
        Some(Snapshot {
            session,
            epoch: state.epoch,
            edit_seq: state.edit_seq,
        })
    }

    /// Persists the full current state.
    ///
    /// The state is copied under the lock at call time; mutations made while
    /// the write is in flight are not part of it and leave the session dirty.
    /// Concurrent calls are serialized, and a snapshot older than one already
    /// written is skipped, so the persisted record never moves backwards.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the repository holds a newer record; the stale write is
    ///   discarded and the in-memory state kept for a later retry
    /// - Any other repository error; the state stays unsaved in memory
    pub async fn save_session(&self) -> Result<SaveOutcome> {
        let Some(snapshot) = self.take_snapshot() else {
            return Ok(SaveOutcome::NoSession);
        };
        self.write_snapshot(snapshot).await
    }

    /// Like [`save_session`](Self::save_session) but returns `Clean` without
    /// touching the repository when nothing changed since the last save.
    pub async fn save_if_dirty(&self) -> Result<SaveOutcome> {
        if !self.has_current_session() {
            return Ok(SaveOutcome::NoSession);
        }
        if !self.is_dirty() {
            return Ok(SaveOutcome::Clean);
        }
        self.save_session().await
    }

    async fn write_snapshot(&self, snapshot: Snapshot) -> Result<SaveOutcome> {
        let Snapshot {
            session,
            epoch,
            edit_seq,
        } = snapshot;

        let mut written = self.save_gate.lock().await;
        if written.covers(&session.id, session.revision) {
            tracing::debug!(
                target: "session_store",
                session_id = %session.id,
                revision = session.revision,
                "Skipping superseded snapshot"
            );
            return Ok(SaveOutcome::Superseded);
        }

        match self.repository.save(&session).await {
            Ok(()) => {
                written.record(&session.id, session.revision);
                drop(written);
                self.mark_persisted(&session, epoch, edit_seq);
                tracing::info!(
                    target: "session_store",
                    session_id = %session.id,
                    revision = session.revision,
                    messages = session.chat_history.len(),
                    "Session saved"
                );
                Ok(SaveOutcome::Saved {
                    revision: session.revision,
                    last_modified: session.last_modified,
                })
            }
            Err(e) if e.is_conflict() => {
                drop(written);
                tracing::warn!(
                    target: "session_store",
                    session_id = %session.id,
                    revision = session.revision,
                    "Discarding stale write: {}",
                    e
                );
                self.resync_revision(&session.id).await;
                Err(e)
            }
            Err(e) => {
                tracing::error!(
                    target: "session_store",
                    session_id = %session.id,
                    "Failed to save session: {}",
                    e
                );
                Err(e)
            }
        }
    }

    fn mark_persisted(&self, saved: &Session, epoch: u64, edit_seq: u64) {
        let mut guard = self.write_state();
        let state = &mut *guard;
        if state.epoch != epoch {
            return;
        }
        if let Some(session) = state.current.as_mut() {
            session.last_modified = session.last_modified.max(saved.last_modified);
            session.revision = session.revision.max(saved.revision);
            state.saved_edit_seq = state.saved_edit_seq.max(edit_seq);
        }
    }

    /// After a conflict, moves the revision counter past the stored record so
    /// that a user-initiated retry can win.
    async fn resync_revision(&self, session_id: &str) {
        match self.repository.find_by_id(session_id).await {
            Ok(Some(stored)) => {
                let mut state = self.write_state();
                state.last_revision = state.last_revision.max(stored.revision);
                state.last_stamp = state.last_stamp.max(stored.last_modified);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(
                    target: "session_store",
                    session_id,
                    "Could not read stored revision after conflict: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::SessionSummary;
    use std::collections::HashMap;
    use crate::session::property::PropertyValue;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    // Mock SessionRepository with revision checks, fault injection and an
    // optional gate that holds writes until the test releases them.
    #[derive(Default)]
    struct MockSessionRepository {
        records: StdMutex<HashMap<String, Session>>,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
        write_gate: Option<Arc<Semaphore>>,
        pending_writes: AtomicUsize,
        save_calls: AtomicUsize,
    }

    impl MockSessionRepository {
        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                write_gate: Some(gate),
                ..Default::default()
            }
        }

        fn stored(&self, id: &str) -> Option<Session> {
            self.records.lock().unwrap().get(id).cloned()
        }

        fn insert(&self, session: Session) {
            self.records
                .lock()
                .unwrap()
                .insert(session.id.clone(), session);
        }

        async fn pass_gate(&self) {
            if let Some(gate) = &self.write_gate {
                self.pending_writes.fetch_add(1, Ordering::SeqCst);
                gate.acquire().await.unwrap().forget();
                self.pending_writes.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl SessionRepository for MockSessionRepository {
        async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(ForgeError::transient("network unreachable"));
            }
            Ok(self.stored(session_id))
        }

        async fn save(&self, session: &Session) -> Result<()> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            self.pass_gate().await;
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ForgeError::transient("network unreachable"));
            }
            let mut records = self.records.lock().unwrap();
            if let Some(existing) = records.get(&session.id)
                && existing.revision >= session.revision
            {
                return Err(ForgeError::conflict(&session.id, "stale revision"));
            }
            records.insert(session.id.clone(), session.clone());
            Ok(())
        }

        async fn patch(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
            self.pass_gate().await;
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ForgeError::transient("network unreachable"));
            }
            let mut records = self.records.lock().unwrap();
            let existing = records
                .get_mut(session_id)
                .ok_or_else(|| ForgeError::not_found("Session", session_id))?;
            if existing.revision >= patch.revision {
                return Err(ForgeError::conflict(session_id, "stale revision"));
            }
            patch.apply_to(existing);
            Ok(())
        }

        async fn delete(&self, session_id: &str) -> Result<()> {
            self.records.lock().unwrap().remove(session_id);
            Ok(())
        }

        async fn list_summaries(&self) -> Result<Vec<SessionSummary>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .values()
                .map(Session::summary)
                .collect())
        }
    }

    fn store_with(repo: Arc<MockSessionRepository>) -> Arc<SessionStore> {
        Arc::new(SessionStore::new(repo))
    }

    async fn wait_for_pending_write(repo: &MockSessionRepository) {
        while repo.pending_writes.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_load_unknown_session_creates_default() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());

        let outcome = store.load_session("s1").await.unwrap();

        assert_eq!(outcome, LoadOutcome::Created);
        assert_eq!(store.phase(), StorePhase::Ready);
        let session = store.snapshot().unwrap();
        assert_eq!(session.id, "s1");
        assert_eq!(session.name, "New Session");
        assert!(session.chat_history.is_empty());
        assert_eq!(session.generated_code, GeneratedCode::new("", ""));
        // not persisted by loading
        assert!(repo.stored("s1").is_none());
    }

    #[tokio::test]
    async fn test_load_existing_session_hydrates_state() {
        let repo = Arc::new(MockSessionRepository::default());
        let mut persisted = Session::new_default("s2");
        persisted.name = "Saved Card".to_string();
        persisted.chat_history.push(ChatMessage::user("make a card"));
        persisted.revision = 4;
        repo.insert(persisted.clone());
        let store = store_with(repo);

        assert_eq!(store.load_session("s2").await.unwrap(), LoadOutcome::Restored);
        assert_eq!(store.snapshot().unwrap(), persisted);
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_load_failure_leaves_no_current_session() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();

        repo.fail_reads.store(true, Ordering::SeqCst);
        let err = store.load_session("s2").await.unwrap_err();

        assert!(matches!(err, ForgeError::TransientIo { .. }));
        assert_eq!(store.phase(), StorePhase::Uninitialized);
        assert!(store.snapshot().is_none());
        assert_eq!(store.save_session().await.unwrap(), SaveOutcome::NoSession);
    }

    #[tokio::test]
    async fn test_blank_session_id_rejected() {
        let store = store_with(Arc::new(MockSessionRepository::default()));
        assert!(store.load_session("  ").await.unwrap_err().is_invalid_input());
        assert_eq!(store.phase(), StorePhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_chat_history_keeps_call_order() {
        let store = store_with(Arc::new(MockSessionRepository::default()));
        store.load_session("s1").await.unwrap();

        let contents: Vec<String> = (0..20).map(|i| format!("message {i}")).collect();
        for (i, content) in contents.iter().enumerate() {
            let message = if i % 2 == 0 {
                ChatMessage::user(content)
            } else {
                ChatMessage::assistant(content)
            };
            store.add_chat_message(message).unwrap();
        }

        let history: Vec<String> = store
            .snapshot()
            .unwrap()
            .chat_history
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(history, contents);
    }

    #[tokio::test]
    async fn test_mutations_without_session_are_rejected() {
        let store = store_with(Arc::new(MockSessionRepository::default()));
        assert_eq!(
            store.add_chat_message(ChatMessage::user("hi")),
            Err(ForgeError::NoActiveSession)
        );
        assert_eq!(
            store.update_code(GeneratedCode::new("<div/>", "")),
            Err(ForgeError::NoActiveSession)
        );
        assert_eq!(store.save_session().await.unwrap(), SaveOutcome::NoSession);
    }

    #[tokio::test]
    async fn test_mutations_during_loading_are_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(SessionStore::new(Arc::new(SlowReadRepository {
            inner: Arc::new(MockSessionRepository::default()),
            gate: gate.clone(),
        })));
        let loader = {
            let store = store.clone();
            tokio::spawn(async move { store.load_session("s1").await })
        };
        while store.phase() != StorePhase::Loading {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            store.add_chat_message(ChatMessage::user("too early")),
            Err(ForgeError::NotReady("s1".to_string()))
        );

        gate.add_permits(1);
        assert_eq!(loader.await.unwrap().unwrap(), LoadOutcome::Created);
        assert!(store.snapshot().unwrap().chat_history.is_empty());
    }

    // Holds every read until the test hands out a permit.
    struct SlowReadRepository {
        inner: Arc<MockSessionRepository>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl SessionRepository for SlowReadRepository {
        async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
            self.gate.acquire().await.unwrap().forget();
            self.inner.find_by_id(session_id).await
        }
        async fn save(&self, session: &Session) -> Result<()> {
            self.inner.save(session).await
        }
        async fn patch(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
            self.inner.patch(session_id, patch).await
        }
        async fn delete(&self, session_id: &str) -> Result<()> {
            self.inner.delete(session_id).await
        }
        async fn list_summaries(&self) -> Result<Vec<SessionSummary>> {
            self.inner.list_summaries().await
        }
    }

    #[tokio::test]
    async fn test_superseded_load_never_becomes_current() {
        let gate = Arc::new(Semaphore::new(0));
        let inner = Arc::new(MockSessionRepository::default());
        let store = Arc::new(SessionStore::new(Arc::new(SlowReadRepository {
            inner,
            gate: gate.clone(),
        })));

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.load_session("first").await })
        };
        while store.phase() != StorePhase::Loading {
            tokio::task::yield_now().await;
        }
        store.clear_session();

        gate.add_permits(1);
        let err = first.await.unwrap().unwrap_err();

        assert_eq!(err, ForgeError::Superseded("first".to_string()));
        assert_eq!(store.phase(), StorePhase::Cleared);
        assert!(store.current_session_id().is_none());
    }

    #[tokio::test]
    async fn test_button_scenario_persists_message_and_code() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());

        store.load_session("s1").await.unwrap();
        let before = store.snapshot().unwrap().last_modified;
        store
            .add_chat_message(ChatMessage::new("user", "make a button").unwrap())
            .unwrap();
        assert_eq!(store.snapshot().unwrap().chat_history.len(), 1);
        store
            .update_code(GeneratedCode::new("<button/>", ""))
            .unwrap();
        assert_eq!(store.snapshot().unwrap().generated_code.markup, "<button/>");

        let outcome = store.save_session().await.unwrap();

        assert!(outcome.is_saved());
        let persisted = repo.stored("s1").unwrap();
        assert_eq!(persisted.chat_history.len(), 1);
        assert_eq!(persisted.generated_code.markup, "<button/>");
        assert!(persisted.last_modified > before);
        assert_eq!(store.snapshot().unwrap().last_modified, persisted.last_modified);
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_last_modified_increases_on_every_save() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();

        let mut previous = store.snapshot().unwrap().last_modified;
        for _ in 0..5 {
            store.save_session().await.unwrap();
            let current = repo.stored("s1").unwrap().last_modified;
            assert!(current > previous);
            previous = current;
        }
    }

    #[tokio::test]
    async fn test_concurrent_saves_persist_call_time_state() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.add_chat_message(ChatMessage::user("hello")).unwrap();
        store
            .update_code(GeneratedCode::new("<p>hi</p>", "p { color: red; }"))
            .unwrap();
        let expected = store.snapshot().unwrap();

        let (a, b) = tokio::join!(store.save_session(), store.save_session());

        assert!(a.is_ok() && b.is_ok());
        let persisted = repo.stored("s1").unwrap();
        assert_eq!(persisted.chat_history, expected.chat_history);
        assert_eq!(persisted.generated_code, expected.generated_code);
        assert_eq!(persisted.name, expected.name);
    }

    #[tokio::test]
    async fn test_mutation_during_save_is_not_partially_written() {
        let gate = Arc::new(Semaphore::new(0));
        let repo = Arc::new(MockSessionRepository::gated(gate.clone()));
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.add_chat_message(ChatMessage::user("first")).unwrap();

        let save = {
            let store = store.clone();
            tokio::spawn(async move { store.save_session().await })
        };
        wait_for_pending_write(&repo).await;

        // The store stays usable while the write is in flight.
        store.add_chat_message(ChatMessage::assistant("second")).unwrap();
        store
            .update_code(GeneratedCode::new("<b/>", ""))
            .unwrap();

        gate.add_permits(1);
        assert!(save.await.unwrap().unwrap().is_saved());

        let persisted = repo.stored("s1").unwrap();
        assert_eq!(persisted.chat_history.len(), 1);
        assert_eq!(persisted.generated_code.markup, "");
        assert!(store.is_dirty());

        gate.add_permits(1);
        store.save_session().await.unwrap();
        assert_eq!(repo.stored("s1").unwrap().chat_history.len(), 2);
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_newer_snapshot_is_never_overwritten_by_older_one() {
        let gate = Arc::new(Semaphore::new(0));
        let repo = Arc::new(MockSessionRepository::gated(gate.clone()));
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.add_chat_message(ChatMessage::user("one")).unwrap();

        let older = {
            let store = store.clone();
            tokio::spawn(async move { store.save_session().await })
        };
        wait_for_pending_write(&repo).await;
        store.add_chat_message(ChatMessage::user("two")).unwrap();
        let newer = {
            let store = store.clone();
            tokio::spawn(async move { store.save_session().await })
        };
        tokio::task::yield_now().await;

        gate.add_permits(2);
        older.await.unwrap().unwrap();
        newer.await.unwrap().unwrap();

        let persisted = repo.stored("s1").unwrap();
        assert_eq!(persisted.chat_history.len(), 2);
    }

    #[tokio::test]
    async fn test_conflict_keeps_in_memory_state_and_retry_wins() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.add_chat_message(ChatMessage::user("mine")).unwrap();

        // Another client wrote a much newer record in the meantime.
        let mut theirs = Session::new_default("s1");
        theirs.name = "Theirs".to_string();
        theirs.revision = 100;
        repo.insert(theirs);

        let err = store.save_session().await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.stored("s1").unwrap().name, "Theirs");
        assert_eq!(store.snapshot().unwrap().chat_history.len(), 1);
        assert!(store.is_dirty());

        assert!(store.save_session().await.unwrap().is_saved());
        assert_eq!(repo.stored("s1").unwrap().chat_history.len(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_state_dirty() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.add_chat_message(ChatMessage::user("keep")).unwrap();

        repo.fail_writes.store(true, Ordering::SeqCst);
        let err = store.save_session().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.is_dirty());
        assert_eq!(store.snapshot().unwrap().chat_history.len(), 1);

        repo.fail_writes.store(false, Ordering::SeqCst);
        assert!(store.save_session().await.unwrap().is_saved());
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_save_if_dirty_skips_clean_session() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();

        // A synthesized session counts as unsaved.
        assert!(store.save_if_dirty().await.unwrap().is_saved());
        assert_eq!(store.save_if_dirty().await.unwrap(), SaveOutcome::Clean);
        assert_eq!(repo.save_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rename_rejects_blank_name() {
        let store = store_with(Arc::new(MockSessionRepository::default()));
        store.load_session("s1").await.unwrap();

        for name in ["", "   ", "\t\n"] {
            let err = store.update_session_name(name).await.unwrap_err();
            assert!(err.is_invalid_input());
        }
        assert_eq!(store.snapshot().unwrap().name, "New Session");
    }

    #[tokio::test]
    async fn test_rename_persists_immediately() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.save_session().await.unwrap();

        store.update_session_name("  My Button  ").await.unwrap();

        assert_eq!(store.snapshot().unwrap().name, "My Button");
        assert_eq!(repo.stored("s1").unwrap().name, "My Button");
    }

    #[tokio::test]
    async fn test_rename_of_unpersisted_session_falls_back_to_full_save() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("fresh").await.unwrap();
        store.add_chat_message(ChatMessage::user("hi")).unwrap();

        store.update_session_name("Fresh Name").await.unwrap();

        let persisted = repo.stored("fresh").unwrap();
        assert_eq!(persisted.name, "Fresh Name");
        assert_eq!(persisted.chat_history.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_during_network_failure_then_retry() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.save_session().await.unwrap();

        repo.fail_writes.store(true, Ordering::SeqCst);
        let err = store.update_session_name("My Button").await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.snapshot().unwrap().name, "My Button");
        assert_eq!(repo.stored("s1").unwrap().name, "New Session");

        repo.fail_writes.store(false, Ordering::SeqCst);
        assert!(store.save_session().await.unwrap().is_saved());
        assert_eq!(repo.stored("s1").unwrap().name, "My Button");
    }

    #[tokio::test]
    async fn test_invalid_properties_are_not_applied() {
        let store = store_with(Arc::new(MockSessionRepository::default()));
        store.load_session("s1").await.unwrap();
        store
            .update_component_properties(ComponentProperty::default_panel())
            .unwrap();

        let bad = vec![ComponentProperty::new(
            "",
            PropertyValue::Text {
                value: "nameless".into(),
            },
        )];
        assert!(store.update_component_properties(bad).unwrap_err().is_invalid_input());
        assert_eq!(store.snapshot().unwrap().component_properties.len(), 6);
    }

    #[tokio::test]
    async fn test_clear_discards_without_saving() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.add_chat_message(ChatMessage::user("bye")).unwrap();

        store.clear_session();

        assert_eq!(store.phase(), StorePhase::Cleared);
        assert!(!store.has_current_session());
        assert_eq!(repo.save_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_session().await.unwrap(), SaveOutcome::NoSession);
    }

    #[tokio::test]
    async fn test_save_started_before_clear_still_completes() {
        let gate = Arc::new(Semaphore::new(0));
        let repo = Arc::new(MockSessionRepository::gated(gate.clone()));
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.add_chat_message(ChatMessage::user("last words")).unwrap();

        let save = {
            let store = store.clone();
            tokio::spawn(async move { store.save_session().await })
        };
        wait_for_pending_write(&repo).await;
        store.clear_session();
        gate.add_permits(1);

        assert!(save.await.unwrap().unwrap().is_saved());
        assert_eq!(repo.stored("s1").unwrap().chat_history.len(), 1);
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_rename_conflict_resyncs_so_next_rename_wins() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());
        store.load_session("s1").await.unwrap();
        store.save_session().await.unwrap();

        let mut theirs = Session::new_default("s1");
        theirs.name = "Theirs".to_string();
        theirs.revision = 50;
        repo.insert(theirs);

        let err = store.update_session_name("Mine").await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.stored("s1").unwrap().name, "Theirs");

        store.update_session_name("Mine").await.unwrap();
        let stored = repo.stored("s1").unwrap();
        assert_eq!(stored.name, "Mine");
        assert!(stored.revision > 50);
    }

    #[tokio::test]
    async fn test_write_mark_tracks_only_last_written_session() {
        let repo = Arc::new(MockSessionRepository::default());
        let store = store_with(repo.clone());

        for id in ["s1", "s2", "s3"] {
            store.load_session(id).await.unwrap();
            assert!(store.save_session().await.unwrap().is_saved());
        }

        let mark = store.save_gate.lock().await;
        assert_eq!(mark.session_id.as_deref(), Some("s3"));
        assert!(!mark.covers("s1", 1));
    }

    #[tokio::test]
    async fn test_reply_applies_code_and_default_panel() {
        let store = store_with(Arc::new(MockSessionRepository::default()));
        store.load_session("s1").await.unwrap();

        let (token, session) = store
            .add_chat_message_tracked(ChatMessage::user("make a button"))
            .unwrap();
        assert_eq!(token.session_id(), "s1");
        assert_eq!(session.chat_history.len(), 1);

        store
            .apply_reply(
                &token,
                ChatMessage::assistant("done"),
                Some(GeneratedCode::new("<button/>", "")),
            )
            .unwrap();

        let current = store.snapshot().unwrap();
        assert_eq!(current.chat_history.len(), 2);
        assert_eq!(current.generated_code.markup, "<button/>");
        assert_eq!(
            current.component_properties,
            ComponentProperty::default_panel()
        );
    }

    #[tokio::test]
    async fn test_reload_of_same_id_invalidates_token() {
        let store = store_with(Arc::new(MockSessionRepository::default()));
        store.load_session("s1").await.unwrap();
        let (token, _) = store
            .add_chat_message_tracked(ChatMessage::user("make a button"))
            .unwrap();

        store.load_session("s1").await.unwrap();
        assert_ne!(store.session_token(), Some(token.clone()));

        let err = store
            .apply_reply(
                &token,
                ChatMessage::assistant("done"),
                Some(GeneratedCode::new("<button/>", "")),
            )
            .unwrap_err();
        assert_eq!(err, ForgeError::Superseded("s1".to_string()));

        let current = store.snapshot().unwrap();
        assert!(current.chat_history.is_empty());
        assert!(current.generated_code.is_empty());
    }
}
