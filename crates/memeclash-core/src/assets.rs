//! Asset catalog boundary.
//!
//! Caption and image resources are authored and ingested by an external
//! collaborator; the engine only allocates and consumes them. This trait is
//! the read side of that boundary.

use crate::error::Result;
use async_trait::async_trait;

/// Read access to the available caption and image resources.
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Ids of all caption resources available for allocation.
    async fn caption_ids(&self) -> Result<Vec<String>>;

    /// Ids of all image resources available for allocation.
    async fn image_ids(&self) -> Result<Vec<String>>;
}
