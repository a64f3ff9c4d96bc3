use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer review as fetched from the marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub rating: u8,
    pub text: String,
    pub product: Product,
    pub published_at: DateTime<Utc>,
    /// Partition hint taken at collection time; the ledger is authoritative
    pub answered: bool,
}

/// Product a review refers to (informational only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub sku: Option<u64>,
}

/// Knowledge-base entry used for classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub triggers: Vec<String>,
    pub problem: String,
    pub solution: String,
}

/// One of the two remote review listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Answered,
    Unanswered,
}

impl Partition {
    /// Status filter understood by the marketplace listing endpoint
    pub fn remote_status(self) -> &'static str {
        match self {
            Partition::Answered => "PROCESSED",
            Partition::Unanswered => "UNPROCESSED",
        }
    }
}

/// Lifecycle of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Cancelled)
    }
}

/// Progress snapshot for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub submitted: usize,
    pub failed: usize,
    pub state: BatchState,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationReason {
    /// Every eligible review was processed
    Exhausted,
    /// The candidate cap was reached with eligible reviews left over
    Cap,
    Cancelled,
}

/// Final report of a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub candidates: usize,
    pub submitted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub termination: TerminationReason,
    /// Index of the first candidate left untouched by cancellation
    pub cancelled_at: Option<usize>,
}

impl RunSummary {
    /// Summary for a run that never got past setup or had nothing to do
    pub fn empty() -> Self {
        Self {
            candidates: 0,
            submitted: 0,
            failed: 0,
            skipped: 0,
            termination: TerminationReason::Exhausted,
            cancelled_at: None,
        }
    }

    pub fn final_state(&self) -> BatchState {
        match self.termination {
            TerminationReason::Cancelled => BatchState::Cancelled,
            _ => BatchState::Completed,
        }
    }
}
