//! Post generation via the Anthropic messages API.
//!
//! Prompt templates are plain files under a prompts directory, one per
//! platform, with `{title}`, `{url}` and `{transcript}` placeholders. A
//! built-in template is used when no file exists for the platform.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::{Item, Platform};
use crate::error::PipelineError;

use super::PostGenerator;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_TEMPLATE: &str = "Write a short social media post (under 450 characters) \
summarizing the key idea of this video for the {platform} platform. \
Plain conversational tone, at most two hashtags, no more than one emoji.\n\n\
Title: {title}\nURL: {url}\n\nTranscript:\n{transcript}";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Generator backed by the Anthropic messages API
pub struct ClaudeGenerator {
    api_key: String,
    model: String,
    prompts_dir: Option<PathBuf>,
    api_url: String,
    client: reqwest::Client,
}

impl ClaudeGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, PipelineError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(PipelineError::Validation(
                "Generation API key is required".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            model: model.into(),
            prompts_dir: None,
            api_url: API_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(GENERATION_TIMEOUT)
                .build()
                .map_err(|e| PipelineError::Api(e.to_string()))?,
        })
    }

    /// Load prompt templates from `<dir>/<platform>.txt`
    pub fn with_prompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompts_dir = Some(dir.into());
        self
    }

    /// Override the API endpoint (used by tests against a local server)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn template_for(&self, platform: Platform) -> String {
        if let Some(dir) = &self.prompts_dir {
            let path = dir.join(format!("{}.txt", platform.as_str()));
            if let Ok(template) = std::fs::read_to_string(&path) {
                return template;
            }
        }
        DEFAULT_TEMPLATE.to_string()
    }

    fn render_prompt(&self, transcript: &str, platform: Platform, item: &Item) -> String {
        self.template_for(platform)
            .replace("{platform}", platform.as_str())
            .replace("{title}", &item.title)
            .replace("{url}", &item.url)
            .replace("{transcript}", transcript)
    }
}

#[async_trait]
impl PostGenerator for ClaudeGenerator {
    async fn generate(
        &self,
        transcript: &str,
        platform: Platform,
        item: &Item,
    ) -> Result<String, PipelineError> {
        if transcript.trim().is_empty() {
            return Err(PipelineError::Validation(
                "Transcript cannot be empty".to_string(),
            ));
        }

        let prompt = self.render_prompt(transcript, platform, item);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {
                let body: MessagesResponse = response
                    .json()
                    .await
                    .map_err(|e| PipelineError::Api(format!("Bad generation payload: {}", e)))?;

                let text = body
                    .content
                    .first()
                    .and_then(|b| b.text.clone())
                    .ok_or_else(|| {
                        PipelineError::Api("Generation response had no text block".to_string())
                    })?;

                debug!(platform = platform.as_str(), chars = text.chars().count(), "Post generated");
                Ok(text)
            }
            401 | 403 => Err(PipelineError::Auth(
                "Generation API rejected credentials".to_string(),
            )),
            429 => Err(PipelineError::RateLimit(
                "Generation API rate limit".to_string(),
            )),
            status => Err(PipelineError::Transient(format!(
                "Generation API returned HTTP {}",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_item() -> Item {
        Item::new(
            "vid01".to_string(),
            "How pipelines fail".to_string(),
            "https://youtube.com/watch?v=vid01".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(ClaudeGenerator::new("", "claude-3-haiku-20240307").is_err());
    }

    #[test]
    fn test_prompt_rendering() {
        let generator = ClaudeGenerator::new("key", "model").unwrap();
        let prompt = generator.render_prompt("the transcript", Platform::Threads, &test_item());

        assert!(prompt.contains("How pipelines fail"));
        assert!(prompt.contains("the transcript"));
        assert!(prompt.contains("threads"));
        assert!(!prompt.contains("{title}"));
    }

    #[test]
    fn test_prompt_file_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("threads.txt"), "Custom: {transcript}").unwrap();

        let generator = ClaudeGenerator::new("key", "model")
            .unwrap()
            .with_prompts_dir(dir.path());
        let prompt = generator.render_prompt("body", Platform::Threads, &test_item());

        assert_eq!(prompt, "Custom: body");
    }
}
