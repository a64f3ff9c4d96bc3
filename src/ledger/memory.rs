use std::collections::HashSet;
use std::sync::RwLock;

use tracing::debug;

use super::Ledger;
use crate::models::Review;

/// In-process ledger; lives as long as the service that owns it
#[derive(Debug, Default)]
pub struct MemoryLedger {
    submitted: RwLock<HashSet<String>>,
    hinted: RwLock<HashSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for MemoryLedger {
    fn is_answered(&self, id: &str) -> bool {
        let submitted = self.submitted.read().unwrap_or_else(|e| e.into_inner());
        if submitted.contains(id) {
            return true;
        }
        drop(submitted);

        self.hinted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    fn mark_answered(&self, id: &str) {
        let inserted = self
            .submitted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string());

        debug!(review_id = %id, inserted, "Marked review as answered");
    }

    fn observe(&self, reviews: &[Review]) {
        let hints: HashSet<String> = reviews
            .iter()
            .filter(|r| r.answered)
            .map(|r| r.id.clone())
            .collect();

        debug!(answered = hints.len(), total = reviews.len(), "Ledger observed collection");

        *self.hinted.write().unwrap_or_else(|e| e.into_inner()) = hints;
    }

    fn submitted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .submitted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
