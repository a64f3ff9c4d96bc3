use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use review_responder::{
    render_summary, Config, KnowledgeBase, NotificationService, Product, ReplyComposer,
    ResponderService, Review,
};

#[derive(Parser)]
#[command(name = "review-responder")]
#[command(about = "Answer marketplace customer reviews in a throttled batch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = ".review-responder/config.yml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect reviews and reply to the unanswered ones
    Run {
        /// Maximum number of reviews to process in this run
        #[arg(long)]
        max_items: Option<usize>,

        /// Delay between reviews in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Print the knowledge base
    Rules,

    /// Classify a review text and show the prompt that would be sent
    Classify {
        /// Review text
        text: String,

        /// Review rating (1-5)
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("review_responder=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?.with_env_credentials();

    match cli.command {
        Commands::Run {
            max_items,
            delay_ms,
        } => {
            run_batch(&config, max_items, delay_ms.map(Duration::from_millis)).await?;
        }
        Commands::Rules => {
            list_rules(&config)?;
        }
        Commands::Classify { text, rating } => {
            classify(&config, text, rating)?;
        }
    }

    Ok(())
}

async fn run_batch(
    config: &Config,
    max_items: Option<usize>,
    delay: Option<Duration>,
) -> Result<()> {
    let service = Arc::new(ResponderService::from_config(config)?);
    let handle = service.start_batch(max_items, delay)?;

    let mut progress = service
        .subscribe(handle)
        .context("Run disappeared right after start")?;

    // Ctrl-C only requests cancellation; progress keeps printing until the
    // run reaches a terminal state.
    let cancel_on_ctrl_c = tokio::spawn({
        let service = service.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, stopping after the current review");
                service.cancel_batch(handle);
            }
        }
    });

    loop {
        let p = *progress.borrow_and_update();
        if p.total > 0 {
            println!(
                "[{}/{}] submitted {}, failed {} ({:?})",
                p.processed, p.total, p.submitted, p.failed, p.state
            );
        }
        if p.state.is_terminal() || progress.changed().await.is_err() {
            break;
        }
    }
    cancel_on_ctrl_c.abort();

    let summary = service.wait(handle).await?;

    println!("\nRecent events:");
    for entry in service.events().iter().take(20).rev() {
        println!(
            "  {} {:<8} {:<24} {}",
            entry.time.format("%H:%M:%S"),
            entry.level,
            entry.endpoint,
            entry.message
        );
    }

    println!("\n{}", render_summary(&summary));

    let notifications = NotificationService::new(&config.notifications.slack);
    if notifications.is_enabled() {
        if let Err(e) = notifications.notify_run_complete(&summary).await {
            warn!(error = %e, "Failed to send run notification");
        }
    }

    info!(
        submitted = summary.submitted,
        failed = summary.failed,
        "Run complete"
    );

    Ok(())
}

fn list_rules(config: &Config) -> Result<()> {
    let kb = KnowledgeBase::from_config(config)?;

    println!("Knowledge base ({} rules):\n", kb.len());
    for rule in kb.rules() {
        println!("  [{}] {}", rule.id, rule.problem);
        println!("    Triggers: {}", rule.triggers.join(", "));
        println!("    Solution: {}", rule.solution);
        println!();
    }

    Ok(())
}

fn classify(config: &Config, text: String, rating: u8) -> Result<()> {
    let kb = KnowledgeBase::from_config(config)?;
    let composer = ReplyComposer::new(config.generation.reply_language.clone());

    let review = Review {
        id: "dry-run".to_string(),
        rating,
        text,
        product: Product::default(),
        published_at: chrono::Utc::now(),
        answered: false,
    };

    let rule = kb.classify(&review.text);
    match rule {
        Some(rule) => println!("Matched rule: [{}] {}\n", rule.id, rule.problem),
        None => println!("No rule matched\n"),
    }

    println!("{}", composer.compose(&review, rule));

    Ok(())
}
