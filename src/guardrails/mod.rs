//! Guardrail engine: deterministic quality scoring of text.
//!
//! A second, independent line of defense after generation. The orchestrator
//! never skips moderation even when the generation service claims its own
//! filtering, because generated output quality is not guaranteed across calls
//! or providers.
//!
//! The engine is a pure function of (text, rule set, content type): it never
//! mutates external state. Rules are data loaded from configuration and can
//! be reloaded without a restart.

pub mod moderator;
pub mod rules;
pub mod stats;

pub use moderator::{ModerationResult, Moderator, SafetyLevel, Violation};
pub use rules::{GuardrailRules, PlatformLimits, TranscriptRules};
pub use stats::TextStats;
