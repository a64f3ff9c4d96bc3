use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::CollectorConfig;
use crate::context::RunContext;
use crate::marketplace::ReviewCatalog;
use crate::models::{Partition, Review};

const ENDPOINT: &str = "collector";

/// Partitions in scan order. On a duplicate id the first partition wins, so an
/// answered review is never flipped back to unanswered.
const SCAN_ORDER: [Partition; 2] = [Partition::Answered, Partition::Unanswered];

/// Fetches both review partitions into one deduplicated working set
pub struct ReviewCollector {
    catalog: Arc<dyn ReviewCatalog>,
    page_size: usize,
    max_pages: usize,
}

impl ReviewCollector {
    pub fn new(catalog: Arc<dyn ReviewCatalog>, config: &CollectorConfig) -> Self {
        Self {
            catalog,
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        }
    }

    /// Collect reviews, newest first, unique by id.
    ///
    /// A failed page stops that partition only; what was fetched so far is kept.
    pub async fn collect(&self, ctx: &RunContext) -> Vec<Review> {
        let mut seen = HashSet::new();
        let mut reviews = Vec::new();

        for partition in SCAN_ORDER {
            let fetched = self.collect_partition(partition, ctx).await;
            let fetched_count = fetched.len();
            let mut duplicates = 0;

            for mut review in fetched {
                if !seen.insert(review.id.clone()) {
                    duplicates += 1;
                    continue;
                }
                review.answered = partition == Partition::Answered;
                reviews.push(review);
            }

            info!(
                partition = ?partition,
                fetched = fetched_count,
                duplicates,
                "Partition collected"
            );
        }

        reviews.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        ctx.events.info(
            ENDPOINT,
            format!(
                "Collected {} reviews ({} unanswered)",
                reviews.len(),
                reviews.iter().filter(|r| !r.answered).count()
            ),
        );

        reviews
    }

    async fn collect_partition(&self, partition: Partition, ctx: &RunContext) -> Vec<Review> {
        let mut items = Vec::new();

        for page in 0..self.max_pages {
            let offset = page * self.page_size;

            match self
                .catalog
                .list_reviews(partition, offset, self.page_size)
                .await
            {
                Ok(batch) => {
                    let short_page = batch.len() < self.page_size;
                    items.extend(batch);
                    if short_page {
                        return items;
                    }
                }
                Err(e) => {
                    warn!(partition = ?partition, offset, error = %e, "Review page fetch failed");
                    ctx.events.error(
                        ENDPOINT,
                        format!(
                            "{} partition stopped at offset {}: {}",
                            partition.remote_status(),
                            offset,
                            e
                        ),
                    );
                    return items;
                }
            }
        }

        warn!(partition = ?partition, max_pages = self.max_pages, "Page ceiling reached");
        ctx.events.info(
            ENDPOINT,
            format!(
                "{} partition truncated at {} pages",
                partition.remote_status(),
                self.max_pages
            ),
        );

        items
    }
}
