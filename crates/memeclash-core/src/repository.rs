//! Repository contracts and shared persistence types.
//!
//! This module provides centralized access to the repository traits the
//! engine consumes, plus the [`Versioned`] wrapper all versioned loads
//! return.

use serde::{Deserialize, Serialize};

pub use crate::assets::AssetCatalog;
pub use crate::cardstack::CardStackRepository;
pub use crate::session::SessionRepository;
pub use crate::submission::SubmissionRepository;

/// A document paired with the storage version it was read at.
///
/// The version is opaque to the engine; it only travels back into the
/// matching `compare_and_swap` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}
