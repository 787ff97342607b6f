//! Periodic autosave of the current session.

use chrono::{DateTime, Utc};
use forge_core::ForgeError;
use forge_core::session::{SaveOutcome, SessionStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Callback invoked when an autosave attempt fails.
pub type AutosaveErrorCallback = Arc<dyn Fn(&ForgeError) + Send + Sync>;

/// Passive indicator of the last autosave attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AutosaveStatus {
    /// No attempt has written anything yet.
    Idle,
    /// The last attempt persisted the session.
    Saved {
        revision: u64,
        at: DateTime<Utc>,
    },
    /// The last attempt failed; the session stays dirty for the next tick.
    Failed { message: String, retryable: bool },
}

struct ActiveTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveTimer {
    fn stop(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// State shared with the timer task.
struct TimerContext {
    store: Arc<SessionStore>,
    fired: Arc<AtomicU64>,
    status: Arc<watch::Sender<AutosaveStatus>>,
    on_error: Option<AutosaveErrorCallback>,
}

/// Saves the current session at a fixed interval while armed.
///
/// At most one timer is active: arming again replaces the running timer.
/// The first save happens one full interval after arming. Ticks that were
/// missed (slow save, suspended process) are skipped, never replayed.
pub struct AutosaveScheduler {
    store: Arc<SessionStore>,
    interval: Duration,
    timer: Mutex<Option<ActiveTimer>>,
    fired: Arc<AtomicU64>,
    status: Arc<watch::Sender<AutosaveStatus>>,
    on_error: Option<AutosaveErrorCallback>,
}

impl AutosaveScheduler {
    pub fn new(store: Arc<SessionStore>, interval: Duration) -> Self {
        let (status, _) = watch::channel(AutosaveStatus::Idle);
        Self {
            store,
            interval,
            timer: Mutex::new(None),
            fired: Arc::new(AtomicU64::new(0)),
            status: Arc::new(status),
            on_error: None,
        }
    }

    /// Registers a callback run on every failed attempt.
    pub fn with_error_callback(mut self, callback: AutosaveErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the timer, cancelling any previous one first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.take() {
            previous.stop();
        }

        let token = CancellationToken::new();
        let context = TimerContext {
            store: Arc::clone(&self.store),
            fired: Arc::clone(&self.fired),
            status: Arc::clone(&self.status),
            on_error: self.on_error.clone(),
        };
        let handle = tokio::spawn(run_timer(context, self.interval, token.clone()));
        *timer = Some(ActiveTimer { token, handle });

        tracing::info!(
            target: "autosave",
            "Autosave armed ({}s interval)",
            self.interval.as_secs()
        );
    }

    /// Stops the timer. No save starts after this returns.
    pub fn disarm(&self) {
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.stop();
            tracing::info!(target: "autosave", "Autosave disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.handle.is_finished())
    }

    /// Number of ticks that ran a save attempt.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    /// Subscribes to the status indicator.
    pub fn status(&self) -> watch::Receiver<AutosaveStatus> {
        self.status.subscribe()
    }

    /// Returns the current status without subscribing.
    pub fn current_status(&self) -> AutosaveStatus {
        self.status.borrow().clone()
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn run_timer(context: TimerContext, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !context.store.has_current_session() {
            tracing::debug!(target: "autosave", "Tick skipped, no current session");
            continue;
        }

        context.fired.fetch_add(1, Ordering::SeqCst);
        match context.store.save_if_dirty().await {
            Ok(SaveOutcome::Saved {
                revision,
                last_modified,
            }) => {
                context.status.send_replace(AutosaveStatus::Saved {
                    revision,
                    at: last_modified,
                });
            }
            Ok(outcome) => {
                tracing::debug!(target: "autosave", "Nothing written: {:?}", outcome);
            }
            Err(e) => {
                tracing::warn!(target: "autosave", "Autosave failed: {}", e);
                context.status.send_replace(AutosaveStatus::Failed {
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                });
                if let Some(callback) = &context.on_error {
                    callback(&e);
                }
            }
        }
    }

    tracing::debug!(target: "autosave", "Timer stopped");
}
