pub mod adapters;
pub mod collector;
pub mod composer;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod ledger;
pub mod marketplace;
pub mod models;
pub mod notifications;
pub mod orchestrator;
pub mod rules;
pub mod service;

pub use adapters::{build_generator, ClaudeAdapter, DisabledGenerator, OpenAiAdapter, ReplyGenerator};
pub use collector::ReviewCollector;
pub use composer::ReplyComposer;
pub use config::Config;
pub use context::RunContext;
pub use error::RemoteError;
pub use events::{EventLevel, EventLog, LogEntry};
pub use ledger::{Ledger, MemoryLedger};
pub use marketplace::{MarketplaceClient, ReviewCatalog};
pub use models::*;
pub use notifications::NotificationService;
pub use orchestrator::{render_summary, BatchLimits, Orchestrator};
pub use rules::KnowledgeBase;
pub use service::{ResponderService, RunHandle};
