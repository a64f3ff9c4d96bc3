pub mod memory;

pub use memory::MemoryLedger;

use crate::models::Review;

/// Record of which reviews have been answered.
///
/// The ledger, not the remote `answered` flag, decides whether a review may
/// be sent to the marketplace again.
pub trait Ledger: Send + Sync {
    /// True if a reply was submitted in this process or the review was
    /// collected from the answered partition
    fn is_answered(&self, id: &str) -> bool;

    /// Record a confirmed submission; calling it again is a no-op
    fn mark_answered(&self, id: &str);

    /// Take the `answered` hints from a fresh collection
    fn observe(&self, reviews: &[Review]);

    /// Ids with a confirmed submission
    fn submitted_ids(&self) -> Vec<String>;
}
