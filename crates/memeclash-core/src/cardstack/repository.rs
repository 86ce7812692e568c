//! Card stack repository trait.

use super::model::{CardStack, CardStackKind};
use crate::error::Result;
use crate::repository::Versioned;
use async_trait::async_trait;

/// Persistence contract for [`CardStack`] documents, keyed per session and
/// kind.
///
/// The same compare-and-swap discipline as for sessions applies: a stack
/// write must fail with `VersionConflict` when the document moved under the
/// writer, since a blind overwrite of the cursor double-allocates cards.
#[async_trait]
pub trait CardStackRepository: Send + Sync {
    /// Loads the session's stack of the given kind with its version.
    async fn load(&self, session_id: &str, kind: CardStackKind) -> Result<Versioned<CardStack>>;

    /// Creates or replaces the stack at version 0. Used at game start only.
    async fn insert(&self, session_id: &str, stack: &CardStack) -> Result<()>;

    /// Replaces the stack if its stored version still equals
    /// `expected_version`.
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        stack: &CardStack,
    ) -> Result<()>;
}
