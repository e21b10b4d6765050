//! relaycast - feed-to-social crossposting pipeline
//!
//! Watches a YouTube channel feed, transcribes new videos, drafts a
//! Threads post with Claude, runs the draft through content guardrails,
//! parks it on Telegram for human approval, and publishes on approve.
//!
//! # Architecture
//!
//! Every item moves through a persisted state machine:
//!
//! ```text
//! NEW -> TRANSCRIBED -> POSTS_GENERATED -> APPROVED -> PUBLISHED
//!                    \-> REJECTED (guardrail or reviewer)
//!  any stage error   \-> FAILED
//! ```
//!
//! Transitions only happen through the table in `domain::ItemStatus::next`,
//! and each one is written to SQLite before the next stage runs, so a
//! restart picks up exactly where the pipeline left off. Publishing is
//! guarded twice: an item publishes at most once, and only after both
//! guardrail stages and an explicit human approval.
//!
//! # Modules
//!
//! - `adapters`: external collaborators (feed, transcripts, Claude,
//!   Threads, Telegram) behind async traits
//! - `domain`: items, posts and the status transition table
//! - `guardrails`: transcript and post moderation rules
//! - `pipeline`: the orchestrator driving items through the machine
//! - `store`: SQLite persistence
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Queue new videos from the configured channel
//! relaycast check
//!
//! # Process the queue up to the approval gate
//! relaycast process
//!
//! # Apply reviewer decisions from Telegram
//! relaycast decisions
//!
//! # Run everything on a loop
//! relaycast auto
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod guardrails;
pub mod pipeline;
pub mod retry;
pub mod store;

// Re-export main types at crate root for convenience
pub use domain::{Item, ItemStatus, PipelineEvent, Platform, Post, PostStatus};
pub use error::{ErrorClass, PipelineError};
pub use guardrails::{GuardrailRules, ModerationResult, Moderator, SafetyLevel};
pub use pipeline::{Orchestrator, Outcome};
pub use retry::RetryPolicy;
pub use store::Store;
