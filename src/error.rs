//! Error taxonomy for pipeline stages.
//!
//! Stage functions return rich result values for expected business outcomes
//! (ModerationResult, PublishResult) and use `PipelineError` only for truly
//! exceptional conditions. The orchestrator is the single place that turns
//! an uncaught stage error into a `Failed` status.

use thiserror::Error;

/// Errors raised by pipeline stages and external collaborators
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad input to a pure function (empty transcript, oversized post).
    /// Surfaced synchronously, never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Transient network failure (timeout, connection reset)
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Authentication rejected by a collaborator
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Explicit rate-limit signal from a collaborator
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// The transcript service has no transcript for this item.
    /// Terminal unless a fallback transcriber is configured.
    #[error("Transcript not available: {0}")]
    TranscriptNotAvailable(String),

    /// Any other API-level failure
    #[error("API error: {0}")]
    Api(String),
}

/// Whether a failed operation is worth attempting again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; the retry policy may attempt the operation again
    Retryable,

    /// Retrying is useless or actively harmful (auth, rate limit)
    Terminal,
}

impl PipelineError {
    /// Classify this error for the retry policy.
    ///
    /// Auth failures and rate-limit signals must never be retried: repeating
    /// an auth failure or hammering a rate-limited endpoint makes things
    /// worse, not better.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transient(_) => ErrorClass::Retryable,
            Self::Validation(_)
            | Self::Auth(_)
            | Self::RateLimit(_)
            | Self::TranscriptNotAvailable(_)
            | Self::Api(_) => ErrorClass::Terminal,
        }
    }

    /// Convenience check used at call sites that branch on retryability
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient(format!("Request timeout: {}", err))
        } else if err.is_connect() || err.is_request() {
            Self::Transient(format!("Network error: {}", err))
        } else {
            Self::Api(err.to_string())
        }
    }
}
