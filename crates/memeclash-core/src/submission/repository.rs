//! Submission repository trait.

use super::model::Submission;
use crate::error::Result;
use crate::repository::Versioned;
use async_trait::async_trait;

/// Persistence contract for round-scoped [`Submission`] documents.
///
/// A session's submissions form one versioned log: listing returns the log
/// version alongside the round's entries, and every write carries the
/// expected version back. Vote budgets, the single-judge-vote rule and the
/// winner tally are all computed over a listing, so a log that changed
/// underneath the writer must fail the write and force a fresh read.
/// Implementations must return round listings in submission order, since the
/// round winner tie-break is first-by-submission-order.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// All submissions of the given round, in submission order, with the
    /// log's current version. An empty log lists at version 0.
    async fn list_round(
        &self,
        session_id: &str,
        round: u32,
    ) -> Result<Versioned<Vec<Submission>>>;

    /// Appends a new submission if the log version still matches.
    ///
    /// # Errors
    ///
    /// `VersionConflict` when the log changed since the versioned read.
    async fn append(
        &self,
        session_id: &str,
        expected_version: u64,
        submission: &Submission,
    ) -> Result<()>;

    /// Replaces an existing submission (vote appends) if the log version
    /// still matches.
    ///
    /// # Errors
    ///
    /// `NotFound` when no submission with the id exists; `VersionConflict`
    /// when the log changed since the versioned read.
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        submission: &Submission,
    ) -> Result<()>;
}
