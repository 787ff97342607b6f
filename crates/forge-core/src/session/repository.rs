//! Session repository trait.
//!
//! Defines the interface for session persistence operations.

use super::model::{Session, SessionPatch, SessionSummary};
use crate::error::{ForgeError, Result};
use async_trait::async_trait;

/// An abstract repository for session persistence.
///
/// This trait is the persistence adapter contract of the session store. It
/// decouples the store from the specific storage mechanism (process memory,
/// local files, remote API). Implementations map their wire naming onto the
/// canonical [`Session`] fields; the store never sees backend field names.
///
/// # Ordering
///
/// Every record carries a `revision`. Implementations must reject a `save`
/// or `patch` whose revision is not newer than the stored record's revision
/// with [`ForgeError::Conflict`](crate::ForgeError::Conflict), so that an
/// earlier-issued but slower write never replaces newer persisted data.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Writes the full session record (put).
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Session saved successfully
    /// - `Err(ForgeError::Conflict)`: A record with an equal or newer revision is stored
    /// - `Err(_)`: Error occurred during save
    async fn save(&self, session: &Session) -> Result<()>;

    /// Writes only the fields set in `patch`.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Patch applied
    /// - `Err(ForgeError::NotFound)`: No record exists for `session_id`
    /// - `Err(ForgeError::Conflict)`: A record with an equal or newer revision is stored
    /// - `Err(_)`: Error occurred during the write
    async fn patch(&self, session_id: &str, patch: &SessionPatch) -> Result<()>;

    /// Deletes a session from storage.
    ///
    /// Deleting a session that does not exist is not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Lists stored sessions, most recently modified first.
    async fn list_summaries(&self) -> Result<Vec<SessionSummary>>;
}

/// Enforces the ordering contract: `incoming_revision` must be newer than
/// the stored record's revision.
pub fn check_revision(stored: &Session, incoming_revision: u64) -> Result<()> {
    if stored.revision >= incoming_revision {
        return Err(ForgeError::conflict(
            &stored.id,
            format!(
                "stored revision {} is not older than {}",
                stored.revision, incoming_revision
            ),
        ));
    }
    Ok(())
}
