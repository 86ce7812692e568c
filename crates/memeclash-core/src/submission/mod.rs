//! Submission domain module.
//!
//! # Module Structure
//!
//! - `model`: round-scoped submissions, votes and the round-winner rules
//! - `repository`: persistence trait for submission documents

mod model;
mod repository;

pub use model::{has_voted, points_spent_by, winning_submission, Submission, Vote};
pub use repository::SubmissionRepository;
