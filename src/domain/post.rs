//! Posts derived from Items.
//!
//! A Post is one platform-specific rendering of an Item's content. Each Item
//! may own several Posts (one per target platform); a Post belongs to exactly
//! one Item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Target publishing platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Threads,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Threads => "threads",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "threads" => Some(Platform::Threads),
            _ => None,
        }
    }
}

/// Publishing status of a Post.
///
/// `Published`, `Rejected` and `Failed` are terminal. A Post transitions to
/// `Published` at most once, and `published_url` is set iff the status is
/// `Published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Approved,
    Rejected,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Approved => "approved",
            PostStatus::Rejected => "rejected",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<PostStatus> {
        match s {
            "draft" => Some(PostStatus::Draft),
            "approved" => Some(PostStatus::Approved),
            "rejected" => Some(PostStatus::Rejected),
            "published" => Some(PostStatus::Published),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PostStatus::Published | PostStatus::Rejected | PostStatus::Failed
        )
    }
}

/// A platform-specific rendering of an Item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Database row id (0 until persisted)
    pub id: i64,

    /// Owning Item's row id
    pub item_id: i64,

    pub platform: Platform,

    /// Post body text
    pub content: String,

    pub status: PostStatus,

    /// Public URL, set only when status is Published
    pub published_url: Option<String>,

    /// When the post went live
    pub published_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new draft for an item
    pub fn draft(item_id: i64, platform: Platform, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            item_id,
            platform,
            content,
            status: PostStatus::Draft,
            published_url: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the published-state invariant: `published_url` is present iff
    /// the post is `Published`.
    pub fn invariant_holds(&self) -> bool {
        match self.status {
            PostStatus::Published => self.published_url.is_some(),
            _ => self.published_url.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_invariant() {
        let post = Post::draft(1, Platform::Threads, "hello".to_string());
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.invariant_holds());
    }

    #[test]
    fn test_published_requires_url() {
        let mut post = Post::draft(1, Platform::Threads, "hello".to_string());
        post.status = PostStatus::Published;
        assert!(!post.invariant_holds());

        post.published_url = Some("https://threads.net/p/abc".to_string());
        assert!(post.invariant_holds());
    }

    #[test]
    fn test_post_serialization() {
        let post = Post::draft(7, Platform::Threads, "content".to_string());
        let json = serde_json::to_string(&post).unwrap();
        let parsed: Post = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.item_id, 7);
        assert_eq!(parsed.platform, Platform::Threads);
        assert_eq!(parsed.status, PostStatus::Draft);
    }
}
