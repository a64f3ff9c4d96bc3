use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::adapters::build_generator;
use crate::collector::ReviewCollector;
use crate::composer::ReplyComposer;
use crate::config::{BatchConfig, Config};
use crate::context::RunContext;
use crate::events::{EventLog, LogEntry};
use crate::ledger::{Ledger, MemoryLedger};
use crate::marketplace::{MarketplaceClient, ReviewCatalog};
use crate::models::{BatchState, Progress, Rule, RunSummary};
use crate::orchestrator::{BatchLimits, Orchestrator};
use crate::rules::KnowledgeBase;

/// Identifies a batch run started through [`ResponderService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunHandle(Uuid);

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct RunSlot {
    ctx: RunContext,
    task: Option<JoinHandle<RunSummary>>,
}

/// Entry point for callers: start, cancel and observe batch runs.
///
/// Owns the ledger and event log for the lifetime of the process; at most one
/// run is active at a time.
pub struct ResponderService {
    collector: Arc<ReviewCollector>,
    orchestrator: Arc<Orchestrator>,
    knowledge_base: Arc<KnowledgeBase>,
    ledger: Arc<dyn Ledger>,
    events: Arc<EventLog>,
    defaults: BatchConfig,
    runs: Mutex<HashMap<RunHandle, RunSlot>>,
}

impl ResponderService {
    /// Wire up the marketplace client, generator and knowledge base.
    ///
    /// Fails when the marketplace credentials are missing; a missing
    /// generation key is not fatal.
    pub fn from_config(config: &Config) -> Result<Self> {
        let events = Arc::new(EventLog::new(config.events.capacity));
        let knowledge_base = Arc::new(
            KnowledgeBase::from_config(config).context("Invalid knowledge base")?,
        );

        let catalog: Arc<dyn ReviewCatalog> =
            Arc::new(MarketplaceClient::new(&config.marketplace, events.clone())?);
        let generator = build_generator(&config.generation)?;

        let collector = ReviewCollector::new(catalog.clone(), &config.collector);
        let orchestrator = Orchestrator::new(
            knowledge_base.clone(),
            ReplyComposer::new(config.generation.reply_language.clone()),
            generator,
            catalog,
        );

        info!(rules = knowledge_base.len(), "Responder service ready");

        Ok(Self::new(collector, orchestrator, knowledge_base, events, config))
    }

    pub fn new(
        collector: ReviewCollector,
        orchestrator: Orchestrator,
        knowledge_base: Arc<KnowledgeBase>,
        events: Arc<EventLog>,
        config: &Config,
    ) -> Self {
        Self {
            collector: Arc::new(collector),
            orchestrator: Arc::new(orchestrator),
            knowledge_base,
            ledger: Arc::new(MemoryLedger::new()),
            events,
            defaults: config.batch.clone(),
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Collect reviews and process them in the background.
    ///
    /// `None` arguments fall back to the configured batch defaults. Starting a
    /// run forgets earlier finished runs, so their handles stop resolving.
    pub fn start_batch(
        &self,
        max_items: Option<usize>,
        inter_item_delay: Option<Duration>,
    ) -> Result<RunHandle> {
        let limits = BatchLimits {
            max_items: max_items.unwrap_or(self.defaults.max_items),
            inter_item_delay: inter_item_delay.unwrap_or_else(|| self.defaults.inter_item_delay()),
        };

        let mut runs = self.lock_runs();

        if runs.values().any(|slot| !slot.ctx.progress().state.is_terminal()) {
            anyhow::bail!("A batch run is already in progress");
        }
        runs.clear();

        let handle = RunHandle(Uuid::new_v4());
        let ctx = RunContext::new(self.ledger.clone(), self.events.clone());
        ctx.report(Progress {
            state: BatchState::Running,
            ..Progress::default()
        });

        let collector = self.collector.clone();
        let orchestrator = self.orchestrator.clone();
        let task_ctx = ctx.clone();

        let task = tokio::spawn(async move {
            let reviews = collector.collect(&task_ctx).await;
            task_ctx.ledger.observe(&reviews);
            orchestrator.run(&reviews, &task_ctx, limits).await
        });

        info!(run = %handle, max_items = limits.max_items, "Batch run started");

        runs.insert(
            handle,
            RunSlot {
                ctx,
                task: Some(task),
            },
        );

        Ok(handle)
    }

    /// Request cancellation; returns false for an unknown handle
    pub fn cancel_batch(&self, handle: RunHandle) -> bool {
        match self.lock_runs().get(&handle) {
            Some(slot) => {
                info!(run = %handle, "Cancellation requested");
                slot.ctx.cancel();
                true
            }
            None => false,
        }
    }

    pub fn progress(&self, handle: RunHandle) -> Option<Progress> {
        self.lock_runs().get(&handle).map(|slot| slot.ctx.progress())
    }

    /// Wait for a run to finish and return its summary
    pub async fn wait(&self, handle: RunHandle) -> Result<RunSummary> {
        let task = self
            .lock_runs()
            .get_mut(&handle)
            .with_context(|| format!("Unknown run {}", handle))?
            .task
            .take()
            .with_context(|| format!("Run {} is already being awaited", handle))?;

        task.await.context("Batch run task failed")
    }

    /// Progress receiver for live display
    pub fn subscribe(&self, handle: RunHandle) -> Option<tokio::sync::watch::Receiver<Progress>> {
        self.lock_runs().get(&handle).map(|slot| slot.ctx.subscribe())
    }

    pub fn knowledge_base(&self) -> &[Rule] {
        self.knowledge_base.rules()
    }

    pub fn events(&self) -> Vec<LogEntry> {
        self.events.snapshot()
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    fn lock_runs(&self) -> std::sync::MutexGuard<'_, HashMap<RunHandle, RunSlot>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
