//! Submission domain model.
//!
//! A submission is one caption entered into the current round. Submissions
//! are anonymous by design: no submitter field exists, and ownership is
//! resolved through the caption stack's dealt entries when it matters
//! (self-vote checks, round resolution). Vote budgets are always recomputed
//! from the vote log rather than cached, so they cannot drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point-weighted vote on a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: String,
    pub amount: u64,
    pub voted_at: DateTime<Utc>,
}

/// A caption submitted for the current round.
///
/// Immutable once the round it belongs to is closed; stale rounds are kept
/// as an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    /// The submitted caption resource.
    pub caption_id: String,
    /// Round this submission belongs to.
    pub round: u32,
    pub submitted_at: DateTime<Utc>,
    /// Votes in arrival order.
    pub votes: Vec<Vote>,
}

impl Submission {
    /// Creates a submission with an empty vote list.
    pub fn new(
        id: impl Into<String>,
        caption_id: impl Into<String>,
        round: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            caption_id: caption_id.into(),
            round,
            submitted_at: now,
            votes: Vec::new(),
        }
    }

    /// Appends a vote.
    pub fn add_vote(&mut self, voter_id: impl Into<String>, amount: u64, now: DateTime<Utc>) {
        self.votes.push(Vote {
            voter_id: voter_id.into(),
            amount,
            voted_at: now,
        });
    }

    /// Sum of all vote amounts on this submission.
    pub fn total_points(&self) -> u64 {
        self.votes.iter().map(|v| v.amount).sum()
    }

    /// Sum of `voter_id`'s votes on this submission.
    pub fn points_from(&self, voter_id: &str) -> u64 {
        self.votes
            .iter()
            .filter(|v| v.voter_id == voter_id)
            .map(|v| v.amount)
            .sum()
    }
}

/// Total points `voter_id` has spent across all submissions of a round.
pub fn points_spent_by(submissions: &[Submission], voter_id: &str) -> u64 {
    submissions.iter().map(|s| s.points_from(voter_id)).sum()
}

/// Whether `voter_id` has cast any vote across the round's submissions.
pub fn has_voted(submissions: &[Submission], voter_id: &str) -> bool {
    submissions
        .iter()
        .any(|s| s.votes.iter().any(|v| v.voter_id == voter_id))
}

/// The round winner: the first submission, in submission order, holding the
/// maximum vote total.
///
/// First-in-order is the deliberate tie-break; callers must pass submissions
/// in submission order.
pub fn winning_submission(submissions: &[Submission]) -> Option<&Submission> {
    let best = submissions.iter().map(Submission::total_points).max()?;
    submissions.iter().find(|s| s.total_points() == best)
}
