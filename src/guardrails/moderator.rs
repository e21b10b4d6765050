//! Moderation scoring for transcripts and posts.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::Platform;

use super::rules::GuardrailRules;
use super::stats;

/// Safety level of a scored text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Safe,
    Warning,
    Unsafe,
}

/// One failed check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Machine-readable kind, e.g. "excessive_hashtags"
    pub kind: String,

    /// Human-readable explanation
    pub message: String,

    /// Weight used in severity scoring (1-10)
    pub severity: u8,
}

impl Violation {
    fn new(kind: &str, message: String) -> Self {
        let severity = match kind {
            "spam_detected" => 9,
            "too_short" => 8,
            "repetitive_content" => 7,
            "insufficient_alpha" => 6,
            "too_long" | "length_exceeded" => 5,
            _ => 5,
        };
        Self {
            kind: kind.to_string(),
            message,
            severity,
        }
    }
}

/// Outcome of scoring one text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    /// True iff the violation list is empty
    pub is_safe: bool,

    pub safety_level: SafetyLevel,

    /// Failed checks, in evaluation order
    pub violations: Vec<Violation>,

    /// Whether the char-length bounds held
    pub length_valid: bool,

    pub word_count: usize,

    /// Joined violation summary for logs and audit records
    pub reason: String,
}

impl ModerationResult {
    fn build(
        violations: Vec<Violation>,
        length_valid: bool,
        word_count: usize,
        warning_max: usize,
    ) -> Self {
        let is_safe = violations.is_empty();
        let safety_level = if is_safe {
            SafetyLevel::Safe
        } else if violations.len() <= warning_max {
            SafetyLevel::Warning
        } else {
            SafetyLevel::Unsafe
        };
        let reason = if is_safe {
            "Content is valid".to_string()
        } else {
            violations
                .iter()
                .map(|v| v.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };

        Self {
            is_safe,
            safety_level,
            violations,
            length_valid,
            word_count,
            reason,
        }
    }

    /// Sum of violation severities
    pub fn severity_score(&self) -> u32 {
        self.violations.iter().map(|v| v.severity as u32).sum()
    }
}

fn space_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" +").unwrap())
}

/// Scores text against a rule set. Pure: no external state is touched.
pub struct Moderator {
    rules: GuardrailRules,
    spam_patterns: Vec<Regex>,
}

impl Default for Moderator {
    fn default() -> Self {
        Self::new(GuardrailRules::default())
    }
}

impl Moderator {
    /// Build a moderator, compiling the rule set's spam patterns once
    pub fn new(rules: GuardrailRules) -> Self {
        let spam_patterns = rules.compile_spam_patterns();
        Self {
            rules,
            spam_patterns,
        }
    }

    pub fn rules(&self) -> &GuardrailRules {
        &self.rules
    }

    /// Score a transcript: length bounds, word-count bounds, repetition,
    /// alphabetic density.
    pub fn evaluate_transcript(&self, text: &str) -> ModerationResult {
        let rules = &self.rules.transcript;
        let mut violations = Vec::new();

        let char_count = text.chars().count();
        if char_count < rules.min_length {
            violations.push(Violation::new("too_short", "Transcript too short".to_string()));
        }
        if char_count > rules.max_length {
            violations.push(Violation::new("too_long", "Transcript too long".to_string()));
        }

        let words = stats::word_count(text);
        if words < rules.min_word_count {
            violations.push(Violation::new(
                "too_short",
                format!(
                    "Insufficient word count: {} (min: {})",
                    words, rules.min_word_count
                ),
            ));
        }
        if words > rules.max_word_count {
            violations.push(Violation::new(
                "too_long",
                format!(
                    "Excessive word count: {} (max: {})",
                    words, rules.max_word_count
                ),
            ));
        }

        if self.is_repetitive(text) {
            violations.push(Violation::new(
                "repetitive_content",
                "Content is too repetitive".to_string(),
            ));
        }

        let alpha = stats::alpha_ratio(text);
        if alpha < rules.min_alpha_ratio {
            violations.push(Violation::new(
                "insufficient_alpha",
                format!("Insufficient letter content (alpha ratio: {:.2})", alpha),
            ));
        }

        let length_valid = char_count >= rules.min_length && char_count <= rules.max_length;
        ModerationResult::build(
            violations,
            length_valid,
            words,
            self.rules.warning_max_violations,
        )
    }

    /// Score a post against its platform limits: length bounds, spam
    /// patterns, hashtags, emoji.
    pub fn evaluate_post(&self, text: &str, platform: Platform) -> ModerationResult {
        let limits = self.rules.limits_for(platform);
        let mut violations = Vec::new();

        let char_count = text.chars().count();
        if char_count < limits.min_length {
            violations.push(Violation::new(
                "too_short",
                format!(
                    "Post too short: {} chars (min: {})",
                    char_count, limits.min_length
                ),
            ));
        }
        if char_count > limits.max_length {
            violations.push(Violation::new(
                "length_exceeded",
                format!(
                    "Post too long: {} chars (max: {})",
                    char_count, limits.max_length
                ),
            ));
        }

        if self.matches_spam(text) {
            violations.push(Violation::new(
                "spam_detected",
                "Spam pattern detected".to_string(),
            ));
        }

        let hashtags = stats::hashtag_count(text);
        if hashtags > limits.max_hashtags {
            violations.push(Violation::new(
                "excessive_hashtags",
                format!(
                    "Too many hashtags: {} (max: {})",
                    hashtags, limits.max_hashtags
                ),
            ));
        }

        // Deliberately `>=`, unlike the `>` bound for hashtags and length.
        // Platform behavior was observed to flag at exactly the limit, so a
        // post with exactly max_emojis sequences is rejected.
        let emojis = stats::emoji_count(text);
        if emojis >= limits.max_emojis {
            violations.push(Violation::new(
                "excessive_emojis",
                format!("Too many emojis: {} (max: {})", emojis, limits.max_emojis),
            ));
        }

        let length_valid = char_count >= limits.min_length && char_count <= limits.max_length;
        ModerationResult::build(
            violations,
            length_valid,
            stats::word_count(text),
            self.rules.warning_max_violations,
        )
    }

    /// Best-effort repair of fixable issues: collapse repeated spaces, trim,
    /// truncate with a "..." suffix when over the platform max.
    ///
    /// Spam, hashtag and emoji violations are never repaired; those cause
    /// rejection instead.
    pub fn auto_fix(&self, text: &str, platform: Platform) -> String {
        let limits = self.rules.limits_for(platform);

        let collapsed = space_run_regex().replace_all(text, " ");
        let trimmed = collapsed.trim();

        if trimmed.chars().count() > limits.max_length {
            let head: String = trimmed.chars().take(limits.max_length - 3).collect();
            format!("{}...", head)
        } else {
            trimmed.to_string()
        }
    }

    /// Repetition check, gated: texts under 50 chars or 10 words are
    /// non-repetitive by definition.
    fn is_repetitive(&self, text: &str) -> bool {
        if text.chars().count() < 50 || stats::word_count(text) < 10 {
            return false;
        }
        stats::repetition_ratio(text) > self.rules.transcript.max_repetition_ratio
    }

    fn matches_spam(&self, text: &str) -> bool {
        self.spam_patterns.iter().any(|re| re.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_clean_transcript_is_safe() {
        let moderator = Moderator::default();
        let result = moderator.evaluate_transcript(&make_words(150));

        assert!(result.is_safe);
        assert_eq!(result.safety_level, SafetyLevel::Safe);
        assert_eq!(result.word_count, 150);
        assert_eq!(result.reason, "Content is valid");
    }

    #[test]
    fn test_repetitive_transcript_warns() {
        let moderator = Moderator::default();
        // 100 words, 1 unique -> repetition ratio 0.99
        let text = "repeat ".repeat(100);
        let result = moderator.evaluate_transcript(&text);

        assert!(!result.is_safe);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].kind, "repetitive_content");
        assert_eq!(result.safety_level, SafetyLevel::Warning);
    }

    #[test]
    fn test_short_text_not_repetitive() {
        let moderator = Moderator::default();
        // 9 words, under the repetition gate
        let result = moderator.evaluate_transcript("go go go go go go go go go");
        assert!(!result
            .violations
            .iter()
            .any(|v| v.kind == "repetitive_content"));
    }

    #[test]
    fn test_post_length_exceeded() {
        let moderator = Moderator::default();
        let long_post = "x".repeat(600);
        let result = moderator.evaluate_post(&long_post, Platform::Threads);

        assert!(result
            .violations
            .iter()
            .any(|v| v.kind == "length_exceeded"));
        assert!(!result.length_valid);
    }

    #[test]
    fn test_auto_fix_truncates_to_exact_limit() {
        let moderator = Moderator::default();
        let long_post = "a".repeat(600);
        let fixed = moderator.auto_fix(&long_post, Platform::Threads);

        assert_eq!(fixed.chars().count(), 500);
        assert!(fixed.ends_with("..."));
    }

    #[test]
    fn test_auto_fix_whitespace() {
        let moderator = Moderator::default();
        let fixed = moderator.auto_fix("  hello    world  ", Platform::Threads);
        assert_eq!(fixed, "hello world");
    }

    #[test]
    fn test_hashtag_boundary() {
        let moderator = Moderator::default();
        let base = "An interesting update about the release. ";

        // Exactly max_hashtags (5) is accepted
        let at_limit = format!("{}#a #b #c #d #e", base);
        let result = moderator.evaluate_post(&at_limit, Platform::Threads);
        assert!(!result.violations.iter().any(|v| v.kind == "excessive_hashtags"));

        // One over is rejected
        let over = format!("{}#a #b #c #d #e #f", base);
        let result = moderator.evaluate_post(&over, Platform::Threads);
        assert!(result.violations.iter().any(|v| v.kind == "excessive_hashtags"));
    }

    #[test]
    fn test_emoji_boundary_is_inclusive() {
        let moderator = Moderator::default();
        let base = "An interesting update about the release. ";

        // max_emojis - 1 (9) separate sequences: accepted
        let under = format!("{}{}", base, "🚀 ".repeat(9));
        let result = moderator.evaluate_post(&under, Platform::Threads);
        assert!(!result.violations.iter().any(|v| v.kind == "excessive_emojis"));

        // Exactly max_emojis (10): rejected, the bound is `>=`
        let at_limit = format!("{}{}", base, "🚀 ".repeat(10));
        let result = moderator.evaluate_post(&at_limit, Platform::Threads);
        assert!(result.violations.iter().any(|v| v.kind == "excessive_emojis"));
    }

    #[test]
    fn test_spam_pattern_detected() {
        let moderator = Moderator::default();
        let post = "Watch this right now!!!! It will change everything for you";
        let result = moderator.evaluate_post(post, Platform::Threads);
        assert!(result.violations.iter().any(|v| v.kind == "spam_detected"));
    }

    #[test]
    fn test_severity_score() {
        let moderator = Moderator::default();
        let result = moderator.evaluate_transcript("x");
        // too_short on chars and on words, severity 8 each; alpha ratio of
        // "x" is 1.0 so no alpha violation
        assert_eq!(result.severity_score(), 16);
    }
}
