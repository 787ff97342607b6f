//! Best-effort save when the editing surface goes away.

use forge_core::Result;
use forge_core::session::{SaveOutcome, SessionStore};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// Fires one fire-and-forget save when the host is about to exit.
///
/// There is no completion guarantee: the process may be gone before the
/// spawned save finishes. Callers that can wait should await the returned
/// handle.
pub struct UnloadGuard {
    store: Arc<SessionStore>,
    triggered: AtomicBool,
}

impl UnloadGuard {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            triggered: AtomicBool::new(false),
        }
    }

    /// Spawns the save. Only the first call does anything.
    pub fn trigger(&self) -> Option<JoinHandle<Result<SaveOutcome>>> {
        if self.triggered.swap(true, Ordering::SeqCst) {
            tracing::debug!(target: "unload", "Unload save already triggered");
            return None;
        }

        let store = Arc::clone(&self.store);
        Some(tokio::spawn(async move {
            let result = store.save_session().await;
            match &result {
                Ok(outcome) => tracing::info!(target: "unload", "Unload save: {:?}", outcome),
                Err(e) => tracing::warn!(target: "unload", "Unload save failed: {}", e),
            }
            result
        }))
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Re-enables the guard for a newly loaded session.
    pub fn reset(&self) {
        self.triggered.store(false, Ordering::SeqCst);
    }

    /// Triggers on Ctrl-C and waits for the save to finish.
    pub fn listen_for_ctrl_c(self: &Arc<Self>) -> JoinHandle<()> {
        self.listen_for(tokio::signal::ctrl_c())
    }

    /// Triggers once `signal` resolves and waits for the save to finish.
    ///
    /// If the signal cannot be installed the returned handle never
    /// completes, so a caller selecting on it keeps running.
    pub fn listen_for<F>(self: &Arc<Self>, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = signal.await {
                tracing::warn!(target: "unload", "Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!(target: "unload", "Interrupted, saving current session");
            if let Some(handle) = guard.trigger() {
                let _ = handle.await;
            }
        })
    }
}
