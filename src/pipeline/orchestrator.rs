//! The pipeline orchestrator.
//!
//! Coordinates ingestion, transcription, moderation, generation, approval
//! and publishing for each Item. Two rules hold everywhere:
//!
//! 1. Status changes only go through `ItemStatus::next`, so the transition
//!    table stays the single source of truth.
//! 2. Every transition is persisted before the next stage runs, and any
//!    stage error is converted to a `Failed` status in exactly one place.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use crate::adapters::{
    ApprovalChannel, Decision, FeedSource, PostGenerator, Publisher, Transcriber,
};
use crate::domain::{Item, ItemStatus, PipelineEvent, Platform, Post, PostStatus};
use crate::error::PipelineError;
use crate::guardrails::{ModerationResult, Moderator};
use crate::retry::{with_retry, RetryPolicy};
use crate::store::Store;

/// Outcome of one orchestration pass over an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Published to the destination platform
    Success,

    /// A guardrail rejected the transcript or the post
    BlockedByGuardrails,

    /// Unrecoverable stage failure
    Failed,

    /// Draft sent to the approval channel; waiting on a human
    PendingApproval,

    /// A human rejected the draft
    Rejected,
}

/// Drives Items through the pipeline state machine
pub struct Orchestrator {
    store: Arc<Store>,
    feed: Arc<dyn FeedSource>,
    transcriber: Arc<dyn Transcriber>,
    fallback_transcriber: Option<Arc<dyn Transcriber>>,
    generator: Arc<dyn PostGenerator>,
    publisher: Arc<dyn Publisher>,
    approval: Arc<dyn ApprovalChannel>,
    moderator: Moderator,
    retry: RetryPolicy,
    publish_retry: RetryPolicy,
    languages: Vec<String>,
    platform: Platform,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        feed: Arc<dyn FeedSource>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn PostGenerator>,
        publisher: Arc<dyn Publisher>,
        approval: Arc<dyn ApprovalChannel>,
        moderator: Moderator,
        retry: RetryPolicy,
    ) -> Self {
        let publish_retry = RetryPolicy {
            max_attempts: 5,
            ..retry.clone()
        };
        Self {
            store,
            feed,
            transcriber,
            fallback_transcriber: None,
            generator,
            publisher,
            approval,
            moderator,
            retry,
            publish_retry,
            languages: vec!["ru".to_string(), "en".to_string()],
            platform: Platform::Threads,
        }
    }

    /// Secondary transcriber tried when the primary reports not-available
    pub fn with_fallback_transcriber(mut self, fallback: Arc<dyn Transcriber>) -> Self {
        self.fallback_transcriber = Some(fallback);
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_publish_retry(mut self, policy: RetryPolicy) -> Self {
        self.publish_retry = policy;
        self
    }

    /// Swap in a moderator rebuilt from freshly loaded rules (hot reload)
    pub fn set_moderator(&mut self, moderator: Moderator) {
        self.moderator = moderator;
    }

    // ---- ingestion ----

    /// Poll the feed and register unseen items as `New`.
    ///
    /// Idempotent: items whose `source_id` is already in the store are
    /// skipped silently, so re-polling an unchanged feed adds nothing.
    #[instrument(skip(self))]
    pub async fn check_for_new_items(&self, window_hours: f64) -> Result<Vec<Item>> {
        let candidates = with_retry(&self.retry, "feed_fetch", || {
            self.feed.fetch_candidates(window_hours)
        })
        .await
        .context("Feed fetch failed")?;

        let mut new_items = Vec::new();
        for entry in candidates {
            if self
                .store
                .get_item_by_source_id(&entry.source_id)?
                .is_some()
            {
                continue;
            }

            let mut item = Item::new(
                entry.source_id.clone(),
                entry.title,
                entry.url,
                entry.published_at,
            );
            item.description = entry.description;
            item.thumbnail_url = entry.thumbnail_url;

            let stored = self.store.upsert_item(&item)?;
            info!(source_id = %stored.source_id, title = %stored.title, "New item queued");
            new_items.push(stored);
        }

        Ok(new_items)
    }

    // ---- the per-item state machine ----

    /// Run an item forward until it publishes, blocks, fails, or parks on
    /// human approval. Each stage persists its transition before the next
    /// stage starts.
    #[instrument(skip(self, item), fields(source_id = %item.source_id))]
    pub async fn process_item(&self, item: &Item) -> Result<Outcome> {
        let mut item = item.clone();

        if item.status == ItemStatus::New {
            match self.transcribe_stage(&item).await {
                Ok(transcript) => {
                    self.store.set_transcript(item.id, &transcript)?;
                    item.transcript = Some(transcript);
                    self.advance(&mut item, PipelineEvent::TranscriptionSucceeded, None)?;
                }
                Err(e) => return self.fail_item(&mut item, e),
            }
        }

        if item.status == ItemStatus::Transcribed {
            let transcript = item
                .transcript
                .clone()
                .context("Transcribed item is missing its transcript")?;

            let moderation = self.moderator.evaluate_transcript(&transcript);
            if !moderation.is_safe {
                return self.reject_by_guardrail(&mut item, &moderation, "transcript");
            }

            let content = match with_retry(&self.retry, "generate_post", || {
                self.generator.generate(&transcript, self.platform, &item)
            })
            .await
            {
                Ok(content) => content,
                Err(e) => return self.fail_item(&mut item, e),
            };

            // Repairable issues (whitespace, overlength) are fixed before
            // scoring; spam/hashtag/emoji problems still reject below.
            let content = self.moderator.auto_fix(&content, self.platform);
            let post = self
                .store
                .insert_post(&Post::draft(item.id, self.platform, content))?;
            self.advance(&mut item, PipelineEvent::TranscriptGuardrailPassed, None)?;

            return self.moderate_and_request_approval(&mut item, &post).await;
        }

        if item.status == ItemStatus::PostsGenerated {
            // Re-entry after a restart: the draft exists, approval may not
            // have been requested or answered yet.
            let post = self
                .latest_draft(item.id)?
                .context("Item awaiting approval has no draft post")?;
            return self.moderate_and_request_approval(&mut item, &post).await;
        }

        match item.status {
            ItemStatus::Published => Ok(Outcome::Success),
            ItemStatus::Rejected => Ok(Outcome::Rejected),
            ItemStatus::Failed => Ok(Outcome::Failed),
            ItemStatus::Approved => self.publish_stage(&mut item).await,
            _ => Ok(Outcome::PendingApproval),
        }
    }

    /// Apply a recorded human decision to an item parked on approval.
    #[instrument(skip(self, decision))]
    pub async fn handle_decision(&self, item_id: i64, decision: Decision) -> Result<Outcome> {
        let mut item = self
            .store
            .get_item(item_id)?
            .with_context(|| format!("Unknown item {}", item_id))?;

        if item.status != ItemStatus::PostsGenerated {
            warn!(item_id, status = ?item.status, "Decision for item not awaiting approval, ignoring");
            return Ok(self.outcome_for_status(item.status));
        }

        let post = self
            .latest_draft(item.id)?
            .context("Item awaiting approval has no draft post")?;

        match decision {
            Decision::Approve => {
                self.store.update_post_status(post.id, PostStatus::Approved)?;
                self.advance(&mut item, PipelineEvent::HumanApproved, None)?;
                self.publish_stage(&mut item).await
            }
            Decision::Reject => {
                self.store.update_post_status(post.id, PostStatus::Rejected)?;
                self.advance(
                    &mut item,
                    PipelineEvent::HumanRejected,
                    Some("Rejected by reviewer"),
                )?;
                info!(item_id, "Draft rejected by reviewer");
                Ok(Outcome::Rejected)
            }
            Decision::Edit(new_text) => {
                // The edit re-enters at the post guardrail; it must pass
                // before another approval round.
                let fixed = self.moderator.auto_fix(&new_text, self.platform);
                self.store.update_post_content(post.id, &fixed)?;

                let mut edited = post;
                edited.content = fixed;

                let moderation = self.moderator.evaluate_post(&edited.content, self.platform);
                if !moderation.is_safe {
                    return self.reject_by_guardrail(&mut item, &moderation, "edited post");
                }

                self.approval
                    .request_approval(&item, &edited)
                    .await
                    .context("Failed to send edited draft for approval")?;
                Ok(Outcome::PendingApproval)
            }
        }
    }

    /// Poll the approval channel and apply every decision found
    pub async fn poll_decisions(&self) -> Result<Vec<(i64, Outcome)>> {
        let decisions = self
            .approval
            .poll_decisions()
            .await
            .context("Failed to poll approval channel")?;

        let mut outcomes = Vec::new();
        for decision in decisions {
            let item_id = decision.item_id;
            match self.handle_decision(item_id, decision.decision).await {
                Ok(outcome) => outcomes.push((item_id, outcome)),
                Err(e) => error!(item_id, error = %e, "Failed to apply decision"),
            }
        }
        Ok(outcomes)
    }

    /// Process every item currently queued as `New`
    pub async fn process_pending(&self) -> Result<Vec<(Item, Outcome)>> {
        let pending = self.store.list_items_by_status(ItemStatus::New)?;
        let mut results = Vec::new();

        for item in pending {
            let outcome = self.process_item(&item).await?;
            results.push((item, outcome));
        }

        Ok(results)
    }

    // ---- stages ----

    async fn transcribe_stage(&self, item: &Item) -> Result<String, PipelineError> {
        let primary = with_retry(&self.retry, "transcribe", || {
            self.transcriber.transcribe(&item.source_id, &self.languages)
        })
        .await;

        let transcript = match primary {
            Err(PipelineError::TranscriptNotAvailable(reason)) => {
                let Some(fallback) = &self.fallback_transcriber else {
                    return Err(PipelineError::TranscriptNotAvailable(reason));
                };
                warn!(source_id = %item.source_id, %reason, "Primary transcript unavailable, trying fallback");
                with_retry(&self.retry, "transcribe_fallback", || {
                    fallback.transcribe(&item.source_id, &self.languages)
                })
                .await?
            }
            other => other?,
        };

        info!(
            source_id = %item.source_id,
            language = %transcript.language,
            words = transcript.word_count,
            "Transcript obtained"
        );
        Ok(transcript.text)
    }

    async fn moderate_and_request_approval(
        &self,
        item: &mut Item,
        post: &Post,
    ) -> Result<Outcome> {
        let moderation = self.moderator.evaluate_post(&post.content, self.platform);
        if !moderation.is_safe {
            // The draft stays in the store for audit; only the item moves.
            return self.reject_by_guardrail(item, &moderation, "post");
        }

        self.approval
            .request_approval(item, post)
            .await
            .context("Failed to send draft for approval")?;
        info!(item_id = item.id, "Draft sent for approval");
        Ok(Outcome::PendingApproval)
    }

    async fn publish_stage(&self, item: &mut Item) -> Result<Outcome> {
        let post = self
            .store
            .get_posts_for_item(item.id)?
            .into_iter()
            .find(|p| p.status == PostStatus::Approved)
            .context("Approved item has no approved post")?;

        let publish_result = with_retry(&self.publish_retry, "publish", || {
            self.publisher.publish(&post.content)
        })
        .await;

        match publish_result {
            Ok(result) if result.success => {
                let url = result
                    .post_url
                    .or(result.post_id)
                    .unwrap_or_default();
                self.store.mark_post_published(post.id, &url)?;
                self.advance(item, PipelineEvent::PublishSucceeded, None)?;
                info!(item_id = item.id, %url, "Item published");
                Ok(Outcome::Success)
            }
            Ok(result) => {
                // The API rejected the content; distinct from transport
                // failure but equally terminal for this run.
                let reason = result
                    .error_message
                    .unwrap_or_else(|| "Publish rejected by API".to_string());
                self.store.update_post_status(post.id, PostStatus::Failed)?;
                self.advance(item, PipelineEvent::StageFailed, Some(&reason))?;
                error!(item_id = item.id, %reason, "Publish rejected");
                Ok(Outcome::Failed)
            }
            Err(e) => {
                self.store.update_post_status(post.id, PostStatus::Failed)?;
                self.fail_item(item, e)
            }
        }
    }

    // ---- transitions and failure handling ----

    /// The only place a status change is written
    fn advance(
        &self,
        item: &mut Item,
        event: PipelineEvent,
        reason: Option<&str>,
    ) -> Result<()> {
        let next = item.status.next(event).with_context(|| {
            format!(
                "Illegal transition from {:?} on {:?} for item {}",
                item.status, event, item.id
            )
        })?;
        self.store.update_item_status(item.id, next, reason)?;
        item.status = next;
        Ok(())
    }

    /// The single conversion point from a stage error to a Failed status
    fn fail_item(&self, item: &mut Item, err: PipelineError) -> Result<Outcome> {
        let reason = err.to_string();
        error!(item_id = item.id, %reason, "Stage failed");
        self.advance(item, PipelineEvent::StageFailed, Some(&reason))?;
        Ok(Outcome::Failed)
    }

    fn reject_by_guardrail(
        &self,
        item: &mut Item,
        moderation: &ModerationResult,
        what: &str,
    ) -> Result<Outcome> {
        warn!(
            item_id = item.id,
            what,
            violations = moderation.violations.len(),
            reason = %moderation.reason,
            "Guardrail rejection"
        );
        self.advance(
            item,
            PipelineEvent::GuardrailRejected,
            Some(&moderation.reason),
        )?;
        Ok(Outcome::BlockedByGuardrails)
    }

    fn latest_draft(&self, item_id: i64) -> Result<Option<Post>> {
        Ok(self
            .store
            .get_posts_for_item(item_id)?
            .into_iter()
            .rev()
            .find(|p| p.status == PostStatus::Draft))
    }

    fn outcome_for_status(&self, status: ItemStatus) -> Outcome {
        match status {
            ItemStatus::Published => Outcome::Success,
            ItemStatus::Rejected => Outcome::Rejected,
            ItemStatus::Failed => Outcome::Failed,
            _ => Outcome::PendingApproval,
        }
    }
}
