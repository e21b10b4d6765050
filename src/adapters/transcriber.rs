//! Caption-service transcriber.
//!
//! Talks to a captions endpoint that serves transcripts for feed items.
//! "No transcript exists" is a distinguishable error (`TranscriptNotAvailable`)
//! so the orchestrator can decide between a fallback transcriber and a
//! terminal failure; everything transport-shaped stays retryable.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::PipelineError;
use crate::guardrails::stats;

use super::{Transcriber, Transcript};

const TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extract a video id from the common YouTube URL shapes
pub fn extract_video_id(url: &str) -> Result<String, PipelineError> {
    let candidate = if let Some(rest) = url.split("watch?v=").nth(1) {
        rest.split(&['&', '#'][..]).next()
    } else if let Some(rest) = url.split("youtu.be/").nth(1) {
        rest.split(&['?', '&', '#'][..]).next()
    } else if let Some(rest) = url.split("/shorts/").nth(1) {
        rest.split(&['?', '&', '#'][..]).next()
    } else if let Some(rest) = url.split("/embed/").nth(1) {
        rest.split(&['?', '&', '#'][..]).next()
    } else {
        None
    };

    match candidate {
        Some(id) if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') => {
            Ok(id.to_string())
        }
        _ => Err(PipelineError::Validation(format!(
            "Invalid YouTube URL: {}",
            url
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    text: String,
    language: Option<String>,
}

/// Transcriber backed by an HTTP captions service
pub struct CaptionTranscriber {
    base_url: String,
    client: reqwest::Client,
}

impl CaptionTranscriber {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PipelineError> {
        Ok(Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(TRANSCRIPT_TIMEOUT)
                .build()
                .map_err(|e| PipelineError::Api(e.to_string()))?,
        })
    }

    async fn fetch(&self, source_id: &str, language: &str) -> Result<Transcript, PipelineError> {
        let url = format!(
            "{}/transcripts/{}?lang={}",
            self.base_url.trim_end_matches('/'),
            source_id,
            language
        );

        let response = self.client.get(&url).send().await?;

        match response.status().as_u16() {
            200 => {
                let body: TranscriptResponse = response
                    .json()
                    .await
                    .map_err(|e| PipelineError::Api(format!("Bad transcript payload: {}", e)))?;

                if body.text.trim().is_empty() {
                    return Err(PipelineError::TranscriptNotAvailable(format!(
                        "Empty transcript for {}",
                        source_id
                    )));
                }

                let word_count = stats::word_count(&body.text);
                // Some caption backends omit the language field; sniff it
                // from the text instead of assuming the requested one.
                let language = body
                    .language
                    .unwrap_or_else(|| stats::detect_language(&body.text).to_string());
                Ok(Transcript {
                    language,
                    word_count,
                    text: body.text,
                })
            }
            404 => Err(PipelineError::TranscriptNotAvailable(format!(
                "No transcript for {} in '{}'",
                source_id, language
            ))),
            401 | 403 => Err(PipelineError::Auth(format!(
                "Transcript service rejected credentials (HTTP {})",
                response.status()
            ))),
            429 => Err(PipelineError::RateLimit(
                "Transcript service rate limit".to_string(),
            )),
            _ => Err(PipelineError::Transient(format!(
                "Transcript service returned HTTP {}",
                response.status()
            ))),
        }
    }
}

#[async_trait]
impl Transcriber for CaptionTranscriber {
    /// Try each preferred language in order; only report not-available after
    /// all of them miss.
    async fn transcribe(
        &self,
        source_id: &str,
        preferred_languages: &[String],
    ) -> Result<Transcript, PipelineError> {
        let languages: Vec<String> = if preferred_languages.is_empty() {
            vec!["ru".to_string(), "en".to_string()]
        } else {
            preferred_languages.to_vec()
        };

        let mut last_missing = None;
        for language in &languages {
            match self.fetch(source_id, language).await {
                Ok(transcript) => {
                    debug!(source_id, language = %transcript.language, words = transcript.word_count, "Transcript fetched");
                    return Ok(transcript);
                }
                Err(PipelineError::TranscriptNotAvailable(msg)) => {
                    last_missing = Some(msg);
                }
                Err(other) => return Err(other),
            }
        }

        Err(PipelineError::TranscriptNotAvailable(
            last_missing.unwrap_or_else(|| format!("No transcript for {}", source_id)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=30s",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1",
        ] {
            assert_eq!(extract_video_id(url).unwrap(), "dQw4w9WgXcQ", "url: {}", url);
        }
    }

    #[test]
    fn test_extract_video_id_invalid() {
        assert!(extract_video_id("https://example.com/page").is_err());
        assert!(extract_video_id("not a url").is_err());
        assert!(extract_video_id("https://www.youtube.com/watch?v=").is_err());
    }
}
