//! Memeclash application layer.
//!
//! Exposes [`GameUseCase`], the engine's inbound action surface. Transport
//! adapters (HTTP handlers, bots, test drivers) resolve the caller's identity
//! and map one endpoint onto each usecase method; all game rules live below,
//! in `memeclash-core`.

mod game_usecase;

pub use game_usecase::{CreatedGame, GameUseCase, SubmittedCaption};
