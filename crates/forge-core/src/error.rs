//! Error types for ReactForge.

use thiserror::Error;

/// A shared error type for the whole ReactForge workspace.
///
/// Every failure crossing the session store boundary is one of these
/// variants. Persistence adapters map their backend-specific errors onto
/// them so the store can decide what is retryable, what is a stale write
/// and what is the caller's fault.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForgeError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Network or storage failure. Retryable.
    #[error("Transient I/O error: {message}")]
    TransientIo { message: String },

    /// Malformed input rejected before any mutation was applied.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backend holds a newer record than the one being written.
    #[error("Conflict on session '{id}': {message}")]
    Conflict { id: String, message: String },

    /// A session is still loading; the mutation was rejected.
    #[error("Session '{0}' is still loading")]
    NotReady(String),

    /// No session is current.
    #[error("No active session")]
    NoActiveSession,

    /// A newer load or clear replaced the operation's target session.
    #[error("Operation superseded for session '{0}'")]
    Superseded(String),

    /// The backend refused the supplied credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chat/generation client failure
    #[error("Generation error: {message}")]
    Generation { message: String, retryable: bool },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ForgeError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a TransientIo error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientIo {
            message: message.into(),
        }
    }

    /// Creates an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a Conflict error
    pub fn conflict(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Generation error
    pub fn generation(message: impl Into<String>, retryable: bool) -> Self {
        Self::Generation {
            message: message.into(),
            retryable,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a Conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this is an InvalidInput error
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Conflicts count as retryable: a retry snapshots the newer in-memory
    /// state and gets a fresh revision.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransientIo { .. } | Self::Conflict { .. } => true,
            Self::Generation { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ForgeError {
    fn from(err: std::io::Error) -> Self {
        Self::TransientIo {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ForgeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ForgeError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<minijinja::Error> for ForgeError {
    fn from(err: minijinja::Error) -> Self {
        Self::Internal(format!("Template error: {}", err))
    }
}

impl From<version_migrate::MigrationError> for ForgeError {
    fn from(err: version_migrate::MigrationError) -> Self {
        use version_migrate::MigrationError;

        match err {
            MigrationError::EntityNotFound(id) => Self::not_found("entity", id),
            MigrationError::DeserializationError(_) | MigrationError::SerializationError(_) => {
                Self::Serialization {
                    format: "migration".to_string(),
                    message: err.to_string(),
                }
            }
            MigrationError::IoError { .. } => Self::TransientIo {
                message: err.to_string(),
            },
            _ => Self::Internal(err.to_string()),
        }
    }
}

/// Conversion from anyhow::Error, used where adapters build errors with context
impl From<anyhow::Error> for ForgeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

/// A type alias for `Result<T, ForgeError>`.
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ForgeError::transient("timeout").is_retryable());
        assert!(ForgeError::conflict("s1", "stale").is_retryable());
        assert!(ForgeError::generation("rate limited", true).is_retryable());
        assert!(!ForgeError::generation("bad request", false).is_retryable());
        assert!(!ForgeError::invalid_input("empty name").is_retryable());
        assert!(!ForgeError::NoActiveSession.is_retryable());
    }

    #[test]
    fn test_io_error_maps_to_transient() {
        let err: ForgeError =
            std::io::Error::new(std::io::ErrorKind::TimedOut, "disk went away").into();
        assert!(matches!(err, ForgeError::TransientIo { .. }));
        assert!(err.to_string().contains("disk went away"));
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ForgeError = parse_err.into();
        match err {
            ForgeError::Serialization { format, .. } => assert_eq!(format, "JSON"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
