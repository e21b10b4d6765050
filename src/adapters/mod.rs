//! External collaborator interfaces.
//!
//! Each collaborator the pipeline depends on sits behind a narrow async
//! trait: the feed, the transcript service, the post generator, the publish
//! API and the human approval channel. The orchestrator only sees the
//! traits, so tests swap in scripted fakes.

pub mod feed;
pub mod generator;
pub mod telegram;
pub mod threads;
pub mod transcriber;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Item, Platform, Post};
use crate::error::PipelineError;

pub use feed::YoutubeFeed;
pub use generator::ClaudeGenerator;
pub use telegram::{TelegramApproval, TelegramConfig};
pub use threads::ThreadsPublisher;
pub use transcriber::{extract_video_id, CaptionTranscriber};

/// One candidate item from the content feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Stable external identifier (e.g. YouTube video id)
    pub source_id: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub thumbnail_url: Option<String>,
}

/// Transcript returned by a transcript service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: String,
    pub word_count: usize,
}

/// Result of a publish call.
///
/// `success: false` means the API accepted the request but rejected the
/// content; transport-level failures are raised as `PipelineError` instead.
/// Callers must treat the two differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub error_message: Option<String>,
}

impl PublishResult {
    pub fn published(post_id: String, post_url: String) -> Self {
        Self {
            success: true,
            post_id: Some(post_id),
            post_url: Some(post_url),
            error_message: None,
        }
    }

    pub fn rejected(message: String) -> Self {
        Self {
            success: false,
            post_id: None,
            post_url: None,
            error_message: Some(message),
        }
    }
}

/// A human decision on a draft post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
    /// Replace the draft content; the edit re-enters moderation
    Edit(String),
}

/// A decision keyed to the item it concerns
#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub item_id: i64,
    pub decision: Decision,
}

/// Content feed: lists candidate items published within a rolling window
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_candidates(&self, window_hours: f64) -> Result<Vec<FeedEntry>, PipelineError>;
}

/// Transcript service: text for a source item, or a distinguishable
/// not-available error
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        source_id: &str,
        preferred_languages: &[String],
    ) -> Result<Transcript, PipelineError>;
}

/// Post generation service: transcript in, platform-shaped post text out
#[async_trait]
pub trait PostGenerator: Send + Sync {
    async fn generate(
        &self,
        transcript: &str,
        platform: Platform,
        item: &Item,
    ) -> Result<String, PipelineError>;
}

/// Destination platform publish API
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, content: &str) -> Result<PublishResult, PipelineError>;
}

/// Human approval channel: presents a draft and asynchronously collects
/// decisions. Requesting approval never blocks on the human.
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    async fn request_approval(&self, item: &Item, post: &Post) -> Result<(), PipelineError>;

    /// Collect decisions made since the last poll
    async fn poll_decisions(&self) -> Result<Vec<ApprovalDecision>, PipelineError>;
}
