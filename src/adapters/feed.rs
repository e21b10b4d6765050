//! YouTube channel feed source.
//!
//! Reads the channel's Atom feed and maps entries to `FeedEntry` values.
//! Malformed entries are skipped rather than failing the whole poll.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, warn};

use crate::error::PipelineError;

use super::{FeedEntry, FeedSource};

const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// Feed source backed by a YouTube channel's RSS/Atom feed
pub struct YoutubeFeed {
    feed_url: String,
    client: reqwest::Client,
}

impl YoutubeFeed {
    /// Create a feed source for a channel id
    pub fn new(channel_id: &str) -> Result<Self, PipelineError> {
        if channel_id.trim().is_empty() {
            return Err(PipelineError::Validation(
                "Channel ID cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            feed_url: format!(
                "https://www.youtube.com/feeds/videos.xml?channel_id={}",
                channel_id
            ),
            client: reqwest::Client::builder()
                .timeout(FEED_TIMEOUT)
                .build()
                .map_err(|e| PipelineError::Api(e.to_string()))?,
        })
    }

    /// Override the feed URL (used by tests against a local server)
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    async fn fetch_feed_xml(&self) -> Result<Vec<u8>, PipelineError> {
        let response = self.client.get(&self.feed_url).send().await?;

        if !response.status().is_success() {
            return Err(PipelineError::Transient(format!(
                "Feed fetch returned HTTP {}",
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Parse feed XML into entries, skipping ones missing required fields
    pub fn parse_entries(feed_xml: &[u8]) -> Result<Vec<FeedEntry>, PipelineError> {
        let feed = feed_rs::parser::parse(feed_xml)
            .map_err(|e| PipelineError::Transient(format!("Failed to parse feed: {}", e)))?;

        let mut entries = Vec::new();
        for entry in feed.entries {
            // YouTube Atom ids look like "yt:video:VIDEO_ID"
            let source_id = entry
                .id
                .rsplit(':')
                .next()
                .unwrap_or_default()
                .to_string();

            let title = entry.title.as_ref().map(|t| t.content.clone());
            let url = entry.links.first().map(|l| l.href.clone());
            let published = entry.published.or(entry.updated);

            let (title, url, published) = match (title, url, published) {
                (Some(t), Some(u), Some(p)) if !source_id.is_empty() => (t, u, p),
                _ => {
                    warn!(entry_id = %entry.id, "Skipping malformed feed entry");
                    continue;
                }
            };

            let media = entry.media.first();
            let description = media
                .and_then(|m| m.description.as_ref().map(|d| d.content.clone()))
                .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()));
            let thumbnail_url = media
                .and_then(|m| m.thumbnails.first())
                .map(|t| t.image.uri.clone());

            entries.push(FeedEntry {
                source_id,
                title,
                url,
                description,
                published_at: published,
                thumbnail_url,
            });
        }

        Ok(entries)
    }

    /// Keep only entries published at or after the window cutoff
    pub fn filter_window(
        entries: Vec<FeedEntry>,
        window_hours: f64,
        now: DateTime<Utc>,
    ) -> Vec<FeedEntry> {
        let cutoff = now - ChronoDuration::seconds((window_hours * 3600.0) as i64);
        entries
            .into_iter()
            .filter(|e| e.published_at >= cutoff)
            .collect()
    }
}

#[async_trait]
impl FeedSource for YoutubeFeed {
    async fn fetch_candidates(&self, window_hours: f64) -> Result<Vec<FeedEntry>, PipelineError> {
        let xml = self.fetch_feed_xml().await?;
        let entries = Self::parse_entries(&xml)?;
        let recent = Self::filter_window(entries, window_hours, Utc::now());
        debug!(count = recent.len(), window_hours, "Feed candidates fetched");
        Ok(recent)
    }
}
