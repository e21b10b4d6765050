//! Items and the per-item status state machine.
//!
//! An Item is created when the feed watcher first observes a piece of source
//! content. Every pipeline stage mutates it through `ItemStatus::next`, which
//! encodes the full transition table in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of source content moving through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Database row id (0 until persisted)
    pub id: i64,

    /// Stable external identifier from the feed (globally unique)
    pub source_id: String,

    /// Title as published by the source
    pub title: String,

    /// Canonical URL of the source content
    pub url: String,

    /// Description from the feed entry
    pub description: Option<String>,

    /// Thumbnail URL from the feed entry
    pub thumbnail_url: Option<String>,

    /// When the source published this item
    pub published_at: DateTime<Utc>,

    /// Transcript text, set once transcription completes
    pub transcript: Option<String>,

    /// Current pipeline status
    pub status: ItemStatus,

    /// Reason recorded on Failed or Rejected
    pub failure_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create a fresh item in the initial status
    pub fn new(
        source_id: String,
        title: String,
        url: String,
        published_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            source_id,
            title,
            url,
            description: None,
            thumbnail_url: None,
            published_at,
            transcript: None,
            status: ItemStatus::New,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once the item can no longer advance in this pipeline run
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Pipeline status of an Item.
///
/// `New` is initial; `Published`, `Rejected` and `Failed` are terminal for
/// the item's pipeline run. A manual retry collaborator may reset an item to
/// `New`, which starts a new run rather than being a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    New,
    Transcribed,
    PostsGenerated,
    Approved,
    Published,
    Rejected,
    Failed,
}

/// Events that drive an Item through the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    TranscriptionSucceeded,
    TranscriptGuardrailPassed,
    GuardrailRejected,
    HumanApproved,
    HumanRejected,
    PublishSucceeded,
    StageFailed,
}

impl ItemStatus {
    /// The transition table. Returns the next status for an event, or `None`
    /// when the event is not legal from the current status.
    ///
    /// The orchestrator must route every status change through this function
    /// so the table stays the single source of truth.
    pub fn next(self, event: PipelineEvent) -> Option<ItemStatus> {
        use ItemStatus::*;
        use PipelineEvent::*;

        match (self, event) {
            (New, TranscriptionSucceeded) => Some(Transcribed),
            (New, StageFailed) => Some(Failed),

            (Transcribed, TranscriptGuardrailPassed) => Some(PostsGenerated),
            (Transcribed, GuardrailRejected) => Some(Rejected),
            (Transcribed, StageFailed) => Some(Failed),

            (PostsGenerated, GuardrailRejected) => Some(Rejected),
            (PostsGenerated, HumanApproved) => Some(Approved),
            (PostsGenerated, HumanRejected) => Some(Rejected),
            (PostsGenerated, StageFailed) => Some(Failed),

            (Approved, PublishSucceeded) => Some(Published),
            (Approved, StageFailed) => Some(Failed),

            // Terminal states accept nothing
            _ => None,
        }
    }

    /// True for statuses that end the pipeline run
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemStatus::Published | ItemStatus::Rejected | ItemStatus::Failed
        )
    }

    /// Stable string form used in the persistence store
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::New => "new",
            ItemStatus::Transcribed => "transcribed",
            ItemStatus::PostsGenerated => "posts_generated",
            ItemStatus::Approved => "approved",
            ItemStatus::Published => "published",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Failed => "failed",
        }
    }

    /// Parse the stored string form
    pub fn parse(s: &str) -> Option<ItemStatus> {
        match s {
            "new" => Some(ItemStatus::New),
            "transcribed" => Some(ItemStatus::Transcribed),
            "posts_generated" => Some(ItemStatus::PostsGenerated),
            "approved" => Some(ItemStatus::Approved),
            "published" => Some(ItemStatus::Published),
            "rejected" => Some(ItemStatus::Rejected),
            "failed" => Some(ItemStatus::Failed),
            _ => None,
        }
    }
}
