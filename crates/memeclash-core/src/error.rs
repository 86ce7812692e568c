//! Error types for the Memeclash game engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole engine.
///
/// Validation failures are surfaced verbatim to the caller and never retried.
/// `VersionConflict` signals that a document changed between read and write;
/// the action layer re-runs the whole action against a fresh read. `Storage`
/// propagates repository failures unchanged.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameError {
    /// A document the action depends on does not exist
    #[error("{entity} not found: '{id}'")]
    NotFound { entity: String, id: String },

    /// The caller is not in the session's participant roster
    #[error("user '{user_id}' is not a participant in this game")]
    NotParticipant { user_id: String },

    /// The caller's role does not permit the action
    #[error("this action requires the {required} role")]
    WrongRole { required: String },

    /// The session is not in the phase the action requires
    #[error("game must be in the {required} phase, but is {actual}")]
    WrongPhase { required: String, actual: String },

    /// Too few participants to start the game
    #[error("at least {required} participants are needed to start, only {actual} joined")]
    NotEnoughParticipants { required: usize, actual: usize },

    /// The caption is not among the caller's active cards
    #[error("caption '{caption_id}' is not among the caller's active cards")]
    CardNotActive { caption_id: String },

    /// The caption, or another caption of the same caller, was already
    /// submitted this round
    #[error("caption '{caption_id}' has already been submitted this round")]
    AlreadySubmitted { caption_id: String },

    /// The vote amount is zero, negative or not a multiple of the increment
    #[error("vote amount {amount} must be a positive multiple of {increment}")]
    InvalidPointAmount { amount: u64, increment: u64 },

    /// The vote would overrun the voter's remaining round budget
    #[error("vote of {amount} exceeds the remaining budget of {remaining}")]
    BudgetExceeded { amount: u64, remaining: u64 },

    /// Participants cannot vote for their own submission
    #[error("participants cannot vote for their own submission")]
    SelfVoteForbidden,

    /// The judge casts exactly one vote per round
    #[error("the judge has already cast their vote this round")]
    AlreadyVoted,

    /// No entry left at the stack cursor. For the image stack this is the
    /// game-ending condition, not a retryable failure.
    #[error("the card deck is exhausted")]
    DeckExhausted,

    /// The resource pool is too small to allocate a stack
    #[error("not enough resources available: {required} needed, {available} found")]
    InsufficientResources { required: usize, available: usize },

    /// The session is in the terminal `Ended` state
    #[error("the game has ended")]
    GameEnded,

    /// Another discard currently holds the caption stack's advisory lock
    #[error("the card stack is locked by another discard in progress")]
    StackLocked,

    /// An operation was attempted against the wrong card stack kind
    #[error("operation requires the {expected} card stack")]
    WrongStackKind { expected: String },

    /// A compare-and-swap write lost the race against a concurrent writer
    #[error("document was modified concurrently")]
    VersionConflict,

    /// The repository collaborator failed; no local recovery is attempted
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl GameError {
    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a NotParticipant error.
    pub fn not_participant(user_id: impl Into<String>) -> Self {
        Self::NotParticipant {
            user_id: user_id.into(),
        }
    }

    /// Creates a WrongRole error.
    pub fn wrong_role(required: impl Into<String>) -> Self {
        Self::WrongRole {
            required: required.into(),
        }
    }

    /// Creates a WrongPhase error.
    pub fn wrong_phase(required: impl Into<String>, actual: impl ToString) -> Self {
        Self::WrongPhase {
            required: required.into(),
            actual: actual.to_string(),
        }
    }

    /// Creates a Storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a concurrency conflict that the action layer may
    /// retry from a fresh read.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict)
    }

    /// Check if this error is fatal to the session rather than to the single
    /// action that triggered it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameEnded)
    }
}

/// A type alias for `Result<T, GameError>`.
pub type Result<T> = std::result::Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = GameError::not_found("session", "abc");
        assert_eq!(err.to_string(), "session not found: 'abc'");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_conflict_predicate() {
        assert!(GameError::VersionConflict.is_conflict());
        assert!(!GameError::AlreadyVoted.is_conflict());
    }

    #[test]
    fn test_errors_round_trip_through_json() {
        let err = GameError::BudgetExceeded {
            amount: 1100,
            remaining: 1000,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: GameError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
