//! Session repository trait.

use super::model::GameSession;
use crate::error::Result;
use crate::repository::Versioned;
use async_trait::async_trait;

/// Persistence contract for [`GameSession`] documents.
///
/// The engine holds no in-memory state between actions, so every inbound
/// action loads the session through this trait and writes it back with
/// [`compare_and_swap`](SessionRepository::compare_and_swap). Implementations
/// must guarantee that a swap only succeeds when the document has not changed
/// since the versioned read, or serialize writes per document; without that,
/// concurrent submissions can corrupt card cursors and vote budgets.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Loads a session with its version.
    ///
    /// # Errors
    ///
    /// `NotFound` when no session with the id exists; `Storage` on
    /// repository failure.
    async fn load(&self, session_id: &str) -> Result<Versioned<GameSession>>;

    /// Looks a session up by join code.
    async fn find_by_code(&self, join_code: &str) -> Result<Versioned<GameSession>>;

    /// Stores a freshly created session at version 0.
    async fn insert(&self, session: &GameSession) -> Result<()>;

    /// Replaces the session if its stored version still equals
    /// `expected_version`.
    ///
    /// # Errors
    ///
    /// `VersionConflict` when the document changed since the read; the
    /// caller must retry the whole action from a fresh load.
    async fn compare_and_swap(&self, expected_version: u64, session: &GameSession) -> Result<()>;

    /// Allocates a fresh unique session id.
    async fn allocate_session_id(&self) -> Result<String>;

    /// The lexicographically highest join code handed out so far, if any.
    async fn latest_join_code(&self) -> Result<Option<String>>;
}
