//! Session domain model.
//!
//! This module contains the core Session entity that represents one editing
//! context in the application's domain layer.

use super::message::ChatMessage;
use super::property::ComponentProperty;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Display name given to sessions that were never renamed.
pub const DEFAULT_SESSION_NAME: &str = "New Session";

/// The latest AI-produced artifact of a session.
///
/// Replaced wholesale on every update, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    /// Component markup (JSX).
    pub markup: String,
    /// Additional stylesheet.
    pub style: String,
}

impl GeneratedCode {
    pub fn new(markup: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markup.is_empty() && self.style.is_empty()
    }
}

/// Represents one editing session in the application's domain layer.
///
/// A session contains:
/// - The chat history with the generation client, in insertion order
/// - The latest generated code
/// - The editable component properties
/// - Persistence bookkeeping (`last_modified`, `revision`)
///
/// This is the "pure" domain model that the session store operates on,
/// independent of any specific storage format or version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier, never changes after creation
    pub id: String,
    /// Human-readable session name
    pub name: String,
    /// Chat history, append-only while editing
    pub chat_history: Vec<ChatMessage>,
    /// Latest generated code
    pub generated_code: GeneratedCode,
    /// Editable component properties
    pub component_properties: Vec<ComponentProperty>,
    /// When the session was first materialized
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last successful persist
    pub last_modified: DateTime<Utc>,
    /// Snapshot sequence number of the last persist (0 = never persisted)
    #[serde(default)]
    pub revision: u64,
}

impl Session {
    /// Synthesizes the empty default session for an id unknown to the backend.
    pub fn new_default(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: DEFAULT_SESSION_NAME.to_string(),
            chat_history: Vec::new(),
            generated_code: GeneratedCode::default(),
            component_properties: Vec::new(),
            created_at: now,
            last_modified: now,
            revision: 0,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            last_modified: self.last_modified,
            message_count: self.chat_history.len(),
        }
    }
}

/// Returns a persist timestamp strictly later than `previous`.
///
/// Wall clocks can stand still or step backwards between two saves; the
/// persisted `last_modified` must still increase.
pub fn next_modified_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

/// Partial update sent to a repository.
///
/// Only `Some` fields are written. `revision` and `last_modified` always
/// travel with the patch so the backend can order it against full saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub revision: u64,
}

impl SessionPatch {
    /// Applies the patch to a stored record.
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(name) = &self.name {
            session.name = name.clone();
        }
        session.last_modified = self.last_modified;
        session.revision = self.revision;
    }
}

/// Lightweight listing entry for the session dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub last_modified: DateTime<Utc>,
    pub message_count: usize,
}
