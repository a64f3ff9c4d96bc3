use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::adapters::ReplyGenerator;
use crate::composer::ReplyComposer;
use crate::context::RunContext;
use crate::marketplace::ReviewCatalog;
use crate::models::{BatchState, Progress, Review, RunSummary, TerminationReason};
use crate::rules::KnowledgeBase;

const ENDPOINT: &str = "batch";

/// Per-run limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_items: usize,
    pub inter_item_delay: Duration,
}

/// Outcome of one review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Submitted,
    Failed,
}

/// Drives reviews one at a time through classify, compose, generate, submit
pub struct Orchestrator {
    knowledge_base: Arc<KnowledgeBase>,
    composer: ReplyComposer,
    generator: Arc<dyn ReplyGenerator>,
    catalog: Arc<dyn ReviewCatalog>,
    last_item_at: Mutex<Option<Instant>>,
}

impl Orchestrator {
    pub fn new(
        knowledge_base: Arc<KnowledgeBase>,
        composer: ReplyComposer,
        generator: Arc<dyn ReplyGenerator>,
        catalog: Arc<dyn ReviewCatalog>,
    ) -> Self {
        Self {
            knowledge_base,
            composer,
            generator,
            catalog,
            last_item_at: Mutex::new(None),
        }
    }

    /// Reviews the ledger still considers unanswered, in collection order
    pub fn candidates(&self, reviews: &[Review], ctx: &RunContext) -> Vec<Review> {
        reviews
            .iter()
            .filter(|r| !ctx.ledger.is_answered(&r.id))
            .cloned()
            .collect()
    }

    /// Run the batch.
    ///
    /// Cancellation is checked before each item only; the current item always
    /// finishes, and the inter-item delay is honoured even after a cancel.
    /// The delay also separates the last item of the previous run on this
    /// orchestrator from the first item of this one.
    pub async fn run(&self, reviews: &[Review], ctx: &RunContext, limits: BatchLimits) -> RunSummary {
        let mut candidates = self.candidates(reviews, ctx);
        let eligible = candidates.len();
        candidates.truncate(limits.max_items);
        let total = candidates.len();

        info!(eligible, total, max_items = limits.max_items, "Starting batch run");
        ctx.events.info(
            ENDPOINT,
            format!("Run started: {} of {} eligible reviews", total, eligible),
        );

        let mut progress = Progress {
            processed: 0,
            total,
            submitted: 0,
            failed: 0,
            state: BatchState::Running,
        };
        ctx.report(progress);

        if total > 0 {
            self.pace_after_previous_run(limits.inter_item_delay).await;
        }

        let mut cursor = 0;
        while cursor < total && !ctx.is_cancelled() {
            let review = &candidates[cursor];

            match self.process(review, ctx).await {
                ItemOutcome::Submitted => progress.submitted += 1,
                ItemOutcome::Failed => progress.failed += 1,
            }
            *self.lock_last_item() = Some(Instant::now());

            cursor += 1;
            progress.processed = cursor;
            ctx.report(progress);

            info!(
                processed = cursor,
                total,
                submitted = progress.submitted,
                failed = progress.failed,
                "Batch progress"
            );

            if cursor < total && !limits.inter_item_delay.is_zero() {
                tokio::time::sleep(limits.inter_item_delay).await;
            }
        }

        let cancelled = cursor < total;
        let termination = if cancelled {
            TerminationReason::Cancelled
        } else if eligible > total {
            TerminationReason::Cap
        } else {
            TerminationReason::Exhausted
        };

        let summary = RunSummary {
            candidates: total,
            submitted: progress.submitted,
            failed: progress.failed,
            skipped: total - cursor,
            termination,
            cancelled_at: cancelled.then_some(cursor),
        };

        progress.state = summary.final_state();
        ctx.report(progress);

        info!(
            submitted = summary.submitted,
            failed = summary.failed,
            skipped = summary.skipped,
            termination = ?summary.termination,
            "Batch run finished"
        );
        ctx.events.info(ENDPOINT, render_summary(&summary));

        summary
    }

    async fn pace_after_previous_run(&self, delay: Duration) {
        let last = *self.lock_last_item();
        if let Some(last) = last {
            tokio::time::sleep_until(last + delay).await;
        }
    }

    fn lock_last_item(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.last_item_at.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn process(&self, review: &Review, ctx: &RunContext) -> ItemOutcome {
        // Re-check right before the remote calls; the ledger may have moved on
        // since candidates were built.
        if ctx.ledger.is_answered(&review.id) {
            warn!(review_id = %review.id, "Review already answered, not submitting again");
            ctx.events
                .error(ENDPOINT, format!("{}: already answered, skipped", review.id));
            return ItemOutcome::Failed;
        }

        let rule = self.knowledge_base.classify(&review.text);
        let prompt = self.composer.compose(review, rule);

        info!(
            review_id = %review.id,
            rating = review.rating,
            rule = rule.map(|r| r.id.as_str()).unwrap_or("-"),
            "Processing review"
        );

        let reply = match self.generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(review_id = %review.id, error = %e, "Reply generation failed");
                ctx.events.error(
                    "generate",
                    format!("{} ({}): {}", review.id, self.generator.provider_name(), e),
                );
                return ItemOutcome::Failed;
            }
        };

        match self.catalog.submit_reply(&review.id, &reply).await {
            Ok(()) => {
                ctx.ledger.mark_answered(&review.id);
                ctx.events
                    .success(ENDPOINT, format!("{}: reply submitted", review.id));
                ItemOutcome::Submitted
            }
            Err(e) => {
                warn!(review_id = %review.id, error = %e, "Reply submission failed");
                ctx.events
                    .error(ENDPOINT, format!("{}: submission failed: {}", review.id, e));
                ItemOutcome::Failed
            }
        }
    }
}

/// One-line human-readable run summary
pub fn render_summary(summary: &RunSummary) -> String {
    let mut line = format!(
        "Submitted {}, failed {}, skipped {} of {} candidates",
        summary.submitted, summary.failed, summary.skipped, summary.candidates
    );

    match (summary.termination, summary.cancelled_at) {
        (TerminationReason::Cancelled, Some(at)) => {
            line.push_str(&format!(" (cancelled at item {})", at + 1))
        }
        (TerminationReason::Cap, _) => line.push_str(" (stopped at the item cap)"),
        _ => {}
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::events::EventLog;
    use crate::ledger::MemoryLedger;
    use crate::models::{Partition, Product, Rule};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;

    fn review(id: &str, rating: u8, text: &str) -> Review {
        Review {
            id: id.to_string(),
            rating,
            text: text.to_string(),
            product: Product {
                name: "Весы".to_string(),
                sku: None,
            },
            published_at: Utc::now(),
            answered: false,
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        fail_on: HashSet<String>,
        prompts: Mutex<Vec<String>>,
        cancel_on_call: Option<RunContext>,
    }

    #[async_trait]
    impl ReplyGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, RemoteError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(ctx) = &self.cancel_on_call {
                ctx.cancel();
            }
            if self.fail_on.iter().any(|marker| prompt.contains(marker.as_str())) {
                return Err(RemoteError::NotConfigured("OPENAI_API_KEY"));
            }
            Ok("Спасибо!".to_string())
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    #[derive(Default)]
    struct FakeCatalog {
        reject: HashSet<String>,
        submitted: Mutex<Vec<String>>,
        submitted_at: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl ReviewCatalog for FakeCatalog {
        async fn list_reviews(
            &self,
            _partition: Partition,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<Review>, RemoteError> {
            Ok(Vec::new())
        }

        async fn submit_reply(&self, review_id: &str, _text: &str) -> Result<(), RemoteError> {
            self.submitted.lock().unwrap().push(review_id.to_string());
            self.submitted_at.lock().unwrap().push(Instant::now());
            if self.reject.contains(review_id) {
                return Err(RemoteError::Http {
                    status: 400,
                    body: "rejected".to_string(),
                });
            }
            Ok(())
        }
    }

    fn kb() -> Arc<KnowledgeBase> {
        Arc::new(
            KnowledgeBase::new(vec![Rule {
                id: "display".to_string(),
                triggers: vec!["синий".to_string()],
                problem: "Blue screen".to_string(),
                solution: "Синяя подсветка штатная.".to_string(),
            }])
            .unwrap(),
        )
    }

    fn ctx() -> RunContext {
        RunContext::new(Arc::new(MemoryLedger::new()), Arc::new(EventLog::default()))
    }

    fn limits(max_items: usize) -> BatchLimits {
        BatchLimits {
            max_items,
            inter_item_delay: Duration::ZERO,
        }
    }

    fn orchestrator(generator: Arc<FakeGenerator>, catalog: Arc<FakeCatalog>) -> Orchestrator {
        Orchestrator::new(kb(), ReplyComposer::default(), generator, catalog)
    }

    #[tokio::test]
    async fn test_blue_screen_scenario() {
        let generator = Arc::new(FakeGenerator::default());
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(generator.clone(), catalog.clone());
        let ctx = ctx();

        let reviews = vec![review("r1", 5, "весы — синий экран, это нормально?")];
        let summary = orch.run(&reviews, &ctx, limits(10)).await;

        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.termination, TerminationReason::Exhausted);
        assert!(ctx.ledger.is_answered("r1"));

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Thank the buyer"));
        assert!(prompts[0].contains("Синяя подсветка штатная."));
        assert_eq!(ctx.progress().state, BatchState::Completed);
    }

    #[tokio::test]
    async fn test_generation_failure_counts_and_leaves_unanswered() {
        let generator = Arc::new(FakeGenerator {
            fail_on: HashSet::from(["сломались".to_string()]),
            ..Default::default()
        });
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(generator, catalog.clone());
        let ctx = ctx();

        let reviews = vec![review("bad", 1, "сломались"), review("good", 5, "отлично")];
        let summary = orch.run(&reviews, &ctx, limits(10)).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.submitted, 1);
        assert!(!ctx.ledger.is_answered("bad"));
        assert_eq!(*catalog.submitted.lock().unwrap(), vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn test_submission_failure_is_retryable() {
        let generator = Arc::new(FakeGenerator::default());
        let catalog = Arc::new(FakeCatalog {
            reject: HashSet::from(["r1".to_string()]),
            ..Default::default()
        });
        let orch = orchestrator(generator, catalog.clone());
        let ctx = ctx();
        let reviews = vec![review("r1", 2, "плохо")];

        let first = orch.run(&reviews, &ctx, limits(10)).await;
        assert_eq!(first.failed, 1);
        assert!(!ctx.ledger.is_answered("r1"));

        let second = orch.run(&reviews, &ctx, limits(10)).await;
        assert_eq!(second.candidates, 1);
        assert_eq!(catalog.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_duplicate_submission_across_passes() {
        let generator = Arc::new(FakeGenerator::default());
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(generator.clone(), catalog.clone());
        let ctx = ctx();
        let reviews = vec![review("r1", 5, "ok"), review("r2", 5, "ok")];

        orch.run(&reviews, &ctx, limits(10)).await;
        ctx.ledger.mark_answered("r1");
        let second = orch.run(&reviews, &ctx, limits(10)).await;

        assert_eq!(second.candidates, 0);
        assert_eq!(catalog.submitted.lock().unwrap().len(), 2);
        assert_eq!(generator.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_answered_hint_excluded() {
        let generator = Arc::new(FakeGenerator::default());
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(generator, catalog.clone());
        let ctx = ctx();

        let mut answered = review("old", 5, "ok");
        answered.answered = true;
        let reviews = vec![answered, review("new", 5, "ok")];
        ctx.ledger.observe(&reviews);

        let summary = orch.run(&reviews, &ctx, limits(10)).await;
        assert_eq!(summary.candidates, 1);
        assert_eq!(*catalog.submitted.lock().unwrap(), vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_cap_respected() {
        let generator = Arc::new(FakeGenerator::default());
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(generator.clone(), catalog);
        let ctx = ctx();

        let reviews: Vec<Review> = (0..10).map(|i| review(&format!("r{i}"), 5, "ok")).collect();
        let summary = orch.run(&reviews, &ctx, limits(3)).await;

        assert_eq!(generator.prompts.lock().unwrap().len(), 3);
        assert_eq!(summary.candidates, 3);
        assert_eq!(summary.termination, TerminationReason::Cap);
        assert!(render_summary(&summary).contains("item cap"));
    }

    #[tokio::test]
    async fn test_cancel_finishes_current_item_only() {
        let ctx = ctx();
        let generator = Arc::new(FakeGenerator {
            cancel_on_call: Some(ctx.clone()),
            ..Default::default()
        });
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(generator, catalog.clone());

        let reviews: Vec<Review> = (0..4).map(|i| review(&format!("r{i}"), 5, "ok")).collect();
        let summary = orch
            .run(
                &reviews,
                &ctx,
                BatchLimits {
                    max_items: 10,
                    inter_item_delay: Duration::from_millis(5),
                },
            )
            .await;

        assert_eq!(*catalog.submitted.lock().unwrap(), vec!["r0".to_string()]);
        assert_eq!(summary.termination, TerminationReason::Cancelled);
        assert_eq!(summary.cancelled_at, Some(1));
        assert_eq!(summary.submitted + summary.failed + summary.skipped, summary.candidates);
        assert_eq!(summary.skipped, 3);
        assert_eq!(ctx.progress().state, BatchState::Cancelled);
        assert!(render_summary(&summary).contains("cancelled at item 2"));
    }

    fn delayed(delay: Duration) -> BatchLimits {
        BatchLimits {
            max_items: 10,
            inter_item_delay: delay,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_item_delay_spaces_submissions() {
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(Arc::new(FakeGenerator::default()), catalog.clone());
        let reviews: Vec<Review> = (0..3).map(|i| review(&format!("r{i}"), 5, "ok")).collect();
        let delay = Duration::from_millis(300);

        let started = Instant::now();
        let summary = orch.run(&reviews, &ctx(), delayed(delay)).await;

        assert_eq!(summary.submitted, 3);
        let times = catalog.submitted_at.lock().unwrap();
        assert_eq!(times.len(), 3);
        assert!(times.windows(2).all(|w| w[1] - w[0] >= delay));
        // No wait after the last item
        assert!(started.elapsed() < delay * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_waits_out_delay() {
        let ctx = ctx();
        let generator = Arc::new(FakeGenerator {
            cancel_on_call: Some(ctx.clone()),
            ..Default::default()
        });
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(generator, catalog.clone());
        let reviews: Vec<Review> = (0..3).map(|i| review(&format!("r{i}"), 5, "ok")).collect();
        let delay = Duration::from_millis(300);

        let started = Instant::now();
        let summary = orch.run(&reviews, &ctx, delayed(delay)).await;

        assert!(started.elapsed() >= delay);
        assert_eq!(catalog.submitted.lock().unwrap().len(), 1);
        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.termination, TerminationReason::Cancelled);
        assert_eq!(summary.cancelled_at, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_holds_across_back_to_back_runs() {
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(Arc::new(FakeGenerator::default()), catalog.clone());
        let ctx = ctx();
        let delay = Duration::from_millis(300);

        orch.run(&[review("r1", 5, "ok")], &ctx, delayed(delay)).await;
        orch.run(&[review("r2", 5, "ok")], &ctx, delayed(delay)).await;

        let times = catalog.submitted_at.lock().unwrap();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= delay);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let orch = orchestrator(
            Arc::new(FakeGenerator::default()),
            Arc::new(FakeCatalog::default()),
        );
        let summary = orch.run(&[], &ctx(), limits(10)).await;
        assert_eq!(summary, RunSummary::empty());
    }
}
