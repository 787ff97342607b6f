//! Session lifecycle services.
//!
//! Two independent callers of the store's idempotent save:
//!
//! - `autosave`: periodic saves while a session is current (`AutosaveScheduler`)
//! - `unload_guard`: one best-effort save when the host exits (`UnloadGuard`)

mod autosave;
mod unload_guard;

pub use autosave::{AutosaveErrorCallback, AutosaveScheduler, AutosaveStatus};
pub use unload_guard::UnloadGuard;
