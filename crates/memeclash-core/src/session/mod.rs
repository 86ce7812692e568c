//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: the session aggregate (`GameSession`), roster types and the
//!   lifecycle state machine
//! - `repository`: persistence trait for session documents

mod model;
mod repository;

pub use model::{GameSession, GameStatus, Participant, Role, WinRecord};
pub use repository::SessionRepository;
