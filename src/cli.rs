//! Command-line interface for relaycast.
//!
//! Provides commands for checking the feed, processing queued items,
//! applying reviewer decisions, and running the unattended watcher loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    CaptionTranscriber, ClaudeGenerator, TelegramApproval, TelegramConfig, ThreadsPublisher,
    YoutubeFeed,
};
use crate::adapters::transcriber::extract_video_id;
use crate::config::{AppConfig, Credentials};
use crate::domain::{Item, ItemStatus};
use crate::guardrails::Moderator;
use crate::pipeline::{Orchestrator, Outcome};
use crate::store::Store;

/// relaycast - feed-to-social crossposting pipeline
#[derive(Parser, Debug)]
#[command(name = "relaycast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (searches cwd and parents for relaycast.yaml if omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the feed for new items and queue them
    Check {
        /// Lookback window in hours (overrides config)
        #[arg(short, long)]
        window: Option<f64>,
    },

    /// Process all queued items through the pipeline
    Process {
        /// Process a single video by URL instead of the queue
        #[arg(long)]
        url: Option<String>,
    },

    /// List items waiting on a reviewer decision
    Pending,

    /// Poll the approval channel and apply reviewer decisions
    Decisions,

    /// Show item counts per pipeline status
    Stats,

    /// Run the unattended watcher loop
    Auto {
        /// Seconds between cycles (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show resolved configuration (debug)
    Config,

    /// Delete terminal items older than the given number of days
    Cleanup {
        /// Retention in days
        #[arg(short, long, default_value = "90")]
        days: u32,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => AppConfig::load_from(path)?,
            None => AppConfig::load()?,
        };

        match self.command {
            Commands::Check { window } => check_feed(&config, window).await,
            Commands::Process { url } => process(&config, url).await,
            Commands::Pending => list_pending(&config).await,
            Commands::Decisions => apply_decisions(&config).await,
            Commands::Stats => show_stats(&config).await,
            Commands::Auto { interval } => run_auto(&config, interval).await,
            Commands::Config => show_config(&config),
            Commands::Cleanup { days } => cleanup(&config, days).await,
        }
    }
}

/// Wire the orchestrator from config and environment credentials
fn build_orchestrator(config: &AppConfig) -> Result<(Arc<Store>, Orchestrator)> {
    let creds = Credentials::from_env()?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = Arc::new(Store::open(&config.database_path)?);

    let feed = Arc::new(YoutubeFeed::new(&config.channel_id)?);
    let transcriber = Arc::new(CaptionTranscriber::new(&config.transcript_service)?);
    let mut generator =
        ClaudeGenerator::new(creds.anthropic_api_key, "claude-sonnet-4-20250514")?;
    if let Some(dir) = &config.prompts_dir {
        generator = generator.with_prompts_dir(dir);
    }
    let publisher = Arc::new(ThreadsPublisher::new(
        creds.threads_access_token,
        &creds.threads_user_id,
    )?);
    let approval = Arc::new(TelegramApproval::new(TelegramConfig {
        bot_token: creds.telegram_bot_token,
        chat_id: creds.telegram_chat_id,
    })?);

    let moderator = Moderator::new(config.load_rules());

    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        feed,
        transcriber,
        Arc::new(generator),
        publisher,
        approval,
        moderator,
        config.retry.clone(),
    )
    .with_languages(config.pipeline.languages.clone())
    .with_publish_retry(config.publish_retry.clone());

    Ok((store, orchestrator))
}

async fn check_feed(config: &AppConfig, window: Option<f64>) -> Result<()> {
    let (_, orchestrator) = build_orchestrator(config)?;
    let window = window.unwrap_or(config.pipeline.window_hours);

    let new_items = orchestrator.check_for_new_items(window).await?;
    if new_items.is_empty() {
        println!("No new items in the last {} hours", window);
        return Ok(());
    }

    println!("Queued {} new item(s):", new_items.len());
    for item in &new_items {
        println!("  [{}] {}", item.source_id, item.title);
    }
    Ok(())
}

async fn process(config: &AppConfig, url: Option<String>) -> Result<()> {
    let (store, orchestrator) = build_orchestrator(config)?;

    let items = match url {
        Some(url) => {
            // Single-URL mode bypasses the feed entirely
            let video_id = extract_video_id(&url)?;
            let item = match store.get_item_by_source_id(&video_id)? {
                Some(existing) => existing,
                None => store.upsert_item(&Item::new(
                    video_id.clone(),
                    format!("Manual: {}", video_id),
                    url,
                    chrono::Utc::now(),
                ))?,
            };
            vec![item]
        }
        None => store.list_items_by_status(ItemStatus::New)?,
    };

    if items.is_empty() {
        println!("Nothing to process");
        return Ok(());
    }

    for item in items {
        let outcome = orchestrator.process_item(&item).await?;
        println!("[{}] {} -> {}", item.source_id, item.title, describe(outcome));
    }
    Ok(())
}

async fn list_pending(config: &AppConfig) -> Result<()> {
    let store = Arc::new(Store::open(&config.database_path)?);
    let pending = store.list_items_by_status(ItemStatus::PostsGenerated)?;

    if pending.is_empty() {
        println!("No items awaiting approval");
        return Ok(());
    }

    println!("{:<6} {:<14} {:<50}", "ID", "SOURCE", "TITLE");
    println!("{}", "-".repeat(72));
    for item in &pending {
        let title = if item.title.chars().count() > 47 {
            let cut: String = item.title.chars().take(47).collect();
            format!("{}...", cut)
        } else {
            item.title.clone()
        };
        println!("{:<6} {:<14} {:<50}", item.id, item.source_id, title);
    }
    println!("\nTotal: {} item(s)", pending.len());
    Ok(())
}

async fn apply_decisions(config: &AppConfig) -> Result<()> {
    let (_, orchestrator) = build_orchestrator(config)?;

    let outcomes = orchestrator.poll_decisions().await?;
    if outcomes.is_empty() {
        println!("No decisions waiting");
        return Ok(());
    }

    for (item_id, outcome) in outcomes {
        println!("item {} -> {}", item_id, describe(outcome));
    }
    Ok(())
}

async fn show_stats(config: &AppConfig) -> Result<()> {
    let store = Store::open(&config.database_path)?;
    let stats = store.statistics()?;

    let order = [
        ItemStatus::New,
        ItemStatus::Transcribed,
        ItemStatus::PostsGenerated,
        ItemStatus::Approved,
        ItemStatus::Published,
        ItemStatus::Rejected,
        ItemStatus::Failed,
    ];

    println!("{:<18} {:>6}", "STATUS", "COUNT");
    println!("{}", "-".repeat(25));
    let mut total = 0;
    for status in order {
        let count = stats.get(status.as_str()).copied().unwrap_or(0);
        total += count;
        println!("{:<18} {:>6}", status.as_str(), count);
    }
    println!("{}", "-".repeat(25));
    println!("{:<18} {:>6}", "total", total);
    Ok(())
}

/// The watcher loop: check the feed, process the queue, apply decisions,
/// reload guardrail rules, sleep. Ctrl-C stops between cycles.
async fn run_auto(config: &AppConfig, interval: Option<u64>) -> Result<()> {
    let (_, mut orchestrator) = build_orchestrator(config)?;
    let interval = std::time::Duration::from_secs(
        interval.unwrap_or(config.pipeline.poll_interval_secs),
    );

    eprintln!(
        "Watching channel {} every {}s (Ctrl-C to stop)",
        config.channel_id,
        interval.as_secs()
    );

    loop {
        orchestrator.set_moderator(Moderator::new(config.load_rules()));

        if let Err(e) = orchestrator
            .check_for_new_items(config.pipeline.window_hours)
            .await
        {
            tracing::error!(error = %e, "Feed check failed, will retry next cycle");
        }

        match orchestrator.process_pending().await {
            Ok(results) => {
                for (item, outcome) in results {
                    tracing::info!(
                        source_id = %item.source_id,
                        outcome = describe(outcome),
                        "Processed item"
                    );
                }
            }
            Err(e) => tracing::error!(error = %e, "Processing failed"),
        }

        if let Err(e) = orchestrator.poll_decisions().await {
            tracing::error!(error = %e, "Decision poll failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Shutting down");
                return Ok(());
            }
        }
    }
}

fn show_config(config: &AppConfig) -> Result<()> {
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("Channel: {}", config.channel_id);
    println!("Transcript service: {}", config.transcript_service);
    println!("Window: {} hours", config.pipeline.window_hours);
    println!("Languages: {}", config.pipeline.languages.join(", "));
    println!("Poll interval: {}s", config.pipeline.poll_interval_secs);
    println!("Database: {}", config.database_path.display());
    println!(
        "Guardrails: {}",
        config
            .guardrails_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in defaults)".to_string())
    );
    println!(
        "Prompts: {}",
        config
            .prompts_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in template)".to_string())
    );
    println!(
        "Retry: {} attempts, base {}ms, cap {}ms",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    );
    println!(
        "Publish retry: {} attempts, base {}ms, cap {}ms",
        config.publish_retry.max_attempts,
        config.publish_retry.base_delay_ms,
        config.publish_retry.max_delay_ms
    );
    Ok(())
}

async fn cleanup(config: &AppConfig, days: u32) -> Result<()> {
    let store = Store::open(&config.database_path)?;
    let removed = store.delete_items_older_than(i64::from(days))?;
    println!("Removed {} item(s) older than {} days", removed, days);
    Ok(())
}

fn describe(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "published",
        Outcome::BlockedByGuardrails => "blocked by guardrails",
        Outcome::Failed => "failed",
        Outcome::PendingApproval => "awaiting approval",
        Outcome::Rejected => "rejected",
    }
}
