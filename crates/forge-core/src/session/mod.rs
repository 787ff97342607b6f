//! Session domain module.
//!
//! This module contains all session-related domain models, the repository
//! interface and the session store.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `GeneratedCode`, `SessionPatch`)
//! - `message`: Chat message types (`MessageRole`, `ChatMessage`)
//! - `property`: Editable component properties (`ComponentProperty`, `PropertyValue`)
//! - `repository`: Repository trait for session persistence
//! - `store`: In-memory session state and its persistence lifecycle (`SessionStore`)
//!
//! # Usage
//!
//! ```ignore
//! use forge_core::session::{SessionStore, SessionRepository};
//! use forge_core::session::{ChatMessage, GeneratedCode};
//! ```

mod message;
mod model;
mod property;
mod repository;
mod store;

// Re-export public API
pub use message::{ChatMessage, MessageRole};
pub use model::{
    DEFAULT_SESSION_NAME, GeneratedCode, Session, SessionPatch, SessionSummary,
    next_modified_time,
};
pub use property::{ComponentProperty, PropertyKind, PropertyValue, validate_properties};
pub use repository::{SessionRepository, check_revision};
pub use store::{LoadOutcome, SaveOutcome, SessionStore, SessionToken, StorePhase};
