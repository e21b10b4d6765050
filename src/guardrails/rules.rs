//! Guardrail rule configuration.
//!
//! Thresholds, per-platform limits and spam patterns are data, not code.
//! They live in a YAML file and can be reloaded while the process runs; the
//! orchestrator rebuilds its `Moderator` from a fresh load at each poll cycle.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::Platform;

/// Quality thresholds for transcripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRules {
    /// Minimum transcript length in chars (default: 100)
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Maximum transcript length in chars (default: 50000)
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Minimum word count (default: 20)
    #[serde(default = "default_min_word_count")]
    pub min_word_count: usize,

    /// Maximum word count (default: 10000)
    #[serde(default = "default_max_word_count")]
    pub max_word_count: usize,

    /// Repetition ratio above which content is flagged (default: 0.5)
    #[serde(default = "default_max_repetition_ratio")]
    pub max_repetition_ratio: f64,

    /// Alphabetic-density floor (default: 0.5)
    #[serde(default = "default_min_alpha_ratio")]
    pub min_alpha_ratio: f64,
}

fn default_min_length() -> usize {
    100
}
fn default_max_length() -> usize {
    50_000
}
fn default_min_word_count() -> usize {
    20
}
fn default_max_word_count() -> usize {
    10_000
}
fn default_max_repetition_ratio() -> f64 {
    0.5
}
fn default_min_alpha_ratio() -> f64 {
    0.5
}

impl Default for TranscriptRules {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            min_word_count: default_min_word_count(),
            max_word_count: default_max_word_count(),
            max_repetition_ratio: default_max_repetition_ratio(),
            min_alpha_ratio: default_min_alpha_ratio(),
        }
    }
}

/// Content limits for one publishing platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformLimits {
    /// Minimum post length in chars (default: 20)
    #[serde(default = "default_post_min_length")]
    pub min_length: usize,

    /// Maximum post length in chars (default: 500)
    #[serde(default = "default_post_max_length")]
    pub max_length: usize,

    /// Hashtags above this count are a violation (default: 5)
    #[serde(default = "default_max_hashtags")]
    pub max_hashtags: usize,

    /// Emoji sequences at or above this count are a violation (default: 10)
    #[serde(default = "default_max_emojis")]
    pub max_emojis: usize,
}

fn default_post_min_length() -> usize {
    20
}
fn default_post_max_length() -> usize {
    500
}
fn default_max_hashtags() -> usize {
    5
}
fn default_max_emojis() -> usize {
    10
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            min_length: default_post_min_length(),
            max_length: default_post_max_length(),
            max_hashtags: default_max_hashtags(),
            max_emojis: default_max_emojis(),
        }
    }
}

/// The complete guardrail rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailRules {
    #[serde(default)]
    pub transcript: TranscriptRules,

    /// Per-platform limits, keyed by platform name
    #[serde(default = "default_platforms")]
    pub platforms: HashMap<String, PlatformLimits>,

    /// Regex patterns; any match anywhere in a post is a spam violation
    #[serde(default = "default_spam_patterns")]
    pub spam_patterns: Vec<String>,

    /// Up to this many violations is Warning; more is Unsafe (default: 2)
    #[serde(default = "default_warning_max_violations")]
    pub warning_max_violations: usize,
}

fn default_platforms() -> HashMap<String, PlatformLimits> {
    let mut map = HashMap::new();
    map.insert("threads".to_string(), PlatformLimits::default());
    map
}

fn default_spam_patterns() -> Vec<String> {
    vec![
        r"!{3,}".to_string(),
        r"[A-ZА-Я]{20,}".to_string(),
        r"(?i)(free money|click here|subscribe now)".to_string(),
    ]
}

fn default_warning_max_violations() -> usize {
    2
}

impl Default for GuardrailRules {
    fn default() -> Self {
        Self {
            transcript: TranscriptRules::default(),
            platforms: default_platforms(),
            spam_patterns: default_spam_patterns(),
            warning_max_violations: default_warning_max_violations(),
        }
    }
}

impl GuardrailRules {
    /// Load rules from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read guardrail rules: {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse rules from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse guardrail rules YAML")
    }

    /// Limits for a platform, falling back to defaults for unknown names
    pub fn limits_for(&self, platform: Platform) -> PlatformLimits {
        self.platforms
            .get(platform.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Compile the spam pattern set, skipping patterns that fail to compile.
    ///
    /// Patterns arrive from a hot-reloadable config file, so a bad pattern
    /// must not take the whole rule set down.
    pub fn compile_spam_patterns(&self) -> Vec<Regex> {
        self.spam_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Skipping invalid spam pattern");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let rules = GuardrailRules::default();
        assert_eq!(rules.transcript.min_length, 100);
        assert_eq!(rules.transcript.max_word_count, 10_000);
        assert_eq!(rules.warning_max_violations, 2);

        let limits = rules.limits_for(Platform::Threads);
        assert_eq!(limits.max_length, 500);
        assert_eq!(limits.max_hashtags, 5);
        assert_eq!(limits.max_emojis, 10);
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
transcript:
  min_length: 50
platforms:
  threads:
    max_length: 280
    max_hashtags: 3
spam_patterns:
  - '\d{10,}'
warning_max_violations: 1
"#;
        let rules = GuardrailRules::from_yaml(yaml).unwrap();
        assert_eq!(rules.transcript.min_length, 50);
        // Unset fields keep their defaults
        assert_eq!(rules.transcript.max_length, 50_000);
        assert_eq!(rules.limits_for(Platform::Threads).max_length, 280);
        assert_eq!(rules.spam_patterns.len(), 1);
        assert_eq!(rules.warning_max_violations, 1);
    }

    #[test]
    fn test_invalid_pattern_skipped() {
        let rules = GuardrailRules {
            spam_patterns: vec!["[unclosed".to_string(), "!{3,}".to_string()],
            ..Default::default()
        };
        let compiled = rules.compile_spam_patterns();
        assert_eq!(compiled.len(), 1);
    }

    #[test]
    fn test_default_patterns_compile() {
        let rules = GuardrailRules::default();
        assert_eq!(
            rules.compile_spam_patterns().len(),
            rules.spam_patterns.len()
        );
    }
}
