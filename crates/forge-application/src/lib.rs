//! Application layer for ReactForge.
//!
//! This crate wires the session store to its background savers and to the
//! generation client, forming one live editing scope.

pub mod editing_surface;
pub mod session;

pub use editing_surface::EditingSurface;
pub use session::{AutosaveScheduler, AutosaveStatus, UnloadGuard};
