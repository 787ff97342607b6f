//! Chat message types.
//!
//! This module contains the types for one entry in a session's chat history.

use crate::error::{ForgeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Represents the author of a chat message.
///
/// Only the two roles the chat surface produces are valid; anything else is
/// rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Reply produced by the generation client.
    Assistant,
}

/// A single message in a session's chat history.
///
/// Messages are immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author of the message.
    pub role: MessageRole,
    /// The message text.
    pub content: String,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a message from a textual role, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `role` is neither `user` nor `assistant`.
    pub fn new(role: &str, content: impl Into<String>) -> Result<Self> {
        let role = role
            .trim()
            .parse::<MessageRole>()
            .map_err(|_| ForgeError::invalid_input(format!("unknown message role '{}'", role)))?;
        Ok(Self::with_role(role, content))
    }

    /// Creates a message with an already validated role.
    pub fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Shorthand for an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }
}
