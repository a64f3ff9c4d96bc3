pub mod client;

pub use client::MarketplaceClient;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{Partition, Review};

/// The marketplace verbs the responder depends on
#[async_trait]
pub trait ReviewCatalog: Send + Sync {
    /// One page of a partition's listing
    async fn list_reviews(
        &self,
        partition: Partition,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Review>, RemoteError>;

    /// Publish a reply. Not idempotent on the remote side.
    async fn submit_reply(&self, review_id: &str, text: &str) -> Result<(), RemoteError>;
}
