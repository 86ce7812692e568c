//! Memeclash core: domain models and rules for the game session engine.
//!
//! One participant is judge each round; the others submit caption cards for
//! the revealed image and the judge's vote closes the round. This crate holds
//! the aggregates (sessions, card stacks, submissions), the lifecycle state
//! machine, the voting budget rules and the repository contracts the engine
//! is driven through. It performs no I/O of its own: every inbound action is
//! a transaction against externally persisted state, mediated by the traits
//! in [`repository`].

pub mod assets;
pub mod cardstack;
pub mod config;
pub mod error;
pub mod join_code;
pub mod repository;
pub mod session;
pub mod submission;

// Re-export the common surface
pub use assets::AssetCatalog;
pub use cardstack::{CaptionCard, CardStack, CardStackKind, CardStackRepository, CardStatus};
pub use config::GameConfig;
pub use error::{GameError, Result};
pub use repository::Versioned;
pub use session::{GameSession, GameStatus, Participant, Role, SessionRepository, WinRecord};
pub use submission::{Submission, SubmissionRepository, Vote};
