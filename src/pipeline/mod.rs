//! Pipeline orchestration.
//!
//! The orchestrator drives each Item through the status state machine,
//! applying guardrails between stages and persisting every transition so a
//! crash always leaves a resumable record.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, Outcome};
