//! Threads publish client.
//!
//! Response mapping, per the publish-step contract:
//! - 2xx: `PublishResult` with the public id and URL
//! - 401: `Auth` (terminal, never retried)
//! - 429: `RateLimit` (terminal, never retried)
//! - other non-2xx: `Ok(PublishResult { success: false, .. })` — the API
//!   rejected the content, which is a business outcome, not a transport error
//! - timeout/transport: `Transient`
//!
//! Pre-flight validation happens before any network call.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::PipelineError;

use super::{PublishResult, Publisher};

const BASE_URL: &str = "https://graph.threads.net/v1.0";
const MAX_POST_LENGTH: usize = 500;
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ThreadsPostResponse {
    id: Option<String>,
    permalink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadsErrorEnvelope {
    error: Option<ThreadsErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ThreadsErrorBody {
    message: Option<String>,
}

/// Client for the Threads publishing API
pub struct ThreadsPublisher {
    access_token: String,
    user_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl ThreadsPublisher {
    pub fn new(access_token: impl Into<String>, user_id: &str) -> Result<Self, PipelineError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(PipelineError::Validation(
                "Access token is required".to_string(),
            ));
        }
        if user_id.is_empty() {
            return Err(PipelineError::Validation("User ID is required".to_string()));
        }

        Ok(Self {
            access_token,
            user_id: user_id.to_string(),
            base_url: BASE_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(PUBLISH_TIMEOUT)
                .build()
                .map_err(|e| PipelineError::Api(e.to_string()))?,
        })
    }

    /// Override the API base URL (used by tests against a local server)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Content checks made before any network call
    pub fn validate_content(content: &str) -> Result<(), PipelineError> {
        if content.trim().is_empty() {
            return Err(PipelineError::Validation(
                "Content cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_POST_LENGTH {
            return Err(PipelineError::Validation(format!(
                "Content exceeds maximum length of {} characters",
                MAX_POST_LENGTH
            )));
        }
        Ok(())
    }

    async fn parse_error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ThreadsErrorEnvelope>().await {
            Ok(envelope) => envelope
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status)),
            Err(_) => format!("HTTP {}", status),
        }
    }
}

#[async_trait]
impl Publisher for ThreadsPublisher {
    async fn publish(&self, content: &str) -> Result<PublishResult, PipelineError> {
        Self::validate_content(content)?;

        let url = format!("{}/{}/threads", self.base_url, self.user_id);
        debug!(chars = content.chars().count(), "Publishing post");

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "media_type": "TEXT",
                "text": content,
                "access_token": self.access_token,
            }))
            .send()
            .await?;

        match response.status().as_u16() {
            200 | 201 => {
                let body: ThreadsPostResponse = response
                    .json()
                    .await
                    .map_err(|e| PipelineError::Api(format!("Bad publish payload: {}", e)))?;

                let post_id = body.id.ok_or_else(|| {
                    PipelineError::Api("Publish response had no post id".to_string())
                })?;
                let post_url = body
                    .permalink
                    .unwrap_or_else(|| format!("https://threads.net/t/{}", post_id));

                info!(%post_id, "Post published");
                Ok(PublishResult::published(post_id, post_url))
            }
            401 => {
                let msg = Self::parse_error_message(response).await;
                Err(PipelineError::Auth(msg))
            }
            429 => {
                let msg = Self::parse_error_message(response).await;
                Err(PipelineError::RateLimit(msg))
            }
            _ => {
                let msg = Self::parse_error_message(response).await;
                Ok(PublishResult::rejected(format!("API error: {}", msg)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_rejected() {
        assert!(ThreadsPublisher::new("", "user").is_err());
        assert!(ThreadsPublisher::new("token", "").is_err());
    }

    #[test]
    fn test_preflight_empty_content() {
        let result = ThreadsPublisher::validate_content("   ");
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_preflight_length() {
        assert!(ThreadsPublisher::validate_content(&"x".repeat(500)).is_ok());
        assert!(matches!(
            ThreadsPublisher::validate_content(&"x".repeat(501)),
            Err(PipelineError::Validation(_))
        ));
    }
}
