//! Card stack domain module.
//!
//! # Module Structure
//!
//! - `model`: the pre-shuffled allocation deck (`CardStack`) and its entry
//!   types
//! - `repository`: persistence trait for card stack documents

mod model;
mod repository;

pub use model::{CaptionCard, CardStack, CardStackKind, CardStatus};
pub use repository::CardStackRepository;
