//! Primitive text statistics.
//!
//! The scoring checks in `moderator` are composed from these small functions
//! so each statistic is separately testable and usable for reporting.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Unicode code-point ranges counted as emoji, inclusive.
///
/// This table is fixed and mirrors what the publishing platforms count;
/// changing it shifts the emoji guardrail boundary.
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F600, 0x1F64F), // emoticons
    (0x1F300, 0x1F5FF), // symbols & pictographs
    (0x1F680, 0x1F6FF), // transport & map
    (0x1F1E0, 0x1F1FF), // regional indicators (flags)
    (0x2702, 0x27B0),   // dingbats
    (0x24C2, 0x1F251),  // enclosed characters
];

fn hashtag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\w+").unwrap())
}

/// Whitespace-delimited word count
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Ratio of alphabetic characters to total characters, 0.0 for empty text
pub fn alpha_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count();
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    alpha as f64 / total as f64
}

/// Share of words that are repeats: `1 - unique / total`.
///
/// Words are compared case-insensitively. Returns 0.0 for empty text.
pub fn repetition_ratio(text: &str) -> f64 {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let unique: std::collections::HashSet<&str> =
        words.iter().map(|w| w.as_str()).collect();
    1.0 - (unique.len() as f64 / words.len() as f64)
}

/// Number of `#word` hashtags in the text
pub fn hashtag_count(text: &str) -> usize {
    hashtag_regex().find_iter(text).count()
}

/// The hashtags themselves, in order of appearance
pub fn extract_hashtags(text: &str) -> Vec<String> {
    hashtag_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    EMOJI_RANGES.iter().any(|&(lo, hi)| cp >= lo && cp <= hi)
}

/// Count emoji sequences in the text.
///
/// A maximal run of consecutive emoji code points counts once, so "🔥🔥🔥"
/// is one sequence while "🔥 and 🚀" is two.
pub fn emoji_count(text: &str) -> usize {
    let mut count = 0;
    let mut in_run = false;
    for c in text.chars() {
        if is_emoji(c) {
            if !in_run {
                count += 1;
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }
    count
}

/// Crude language sniff based on script: "ru", "en" or "unknown"
pub fn detect_language(text: &str) -> &'static str {
    let cyrillic = text
        .chars()
        .filter(|&c| ('\u{0400}'..='\u{04FF}').contains(&c))
        .count();
    let latin = text
        .chars()
        .filter(|&c| c.is_alphabetic() && !('\u{0400}'..='\u{04FF}').contains(&c))
        .count();

    if cyrillic > latin {
        "ru"
    } else if latin > cyrillic {
        "en"
    } else {
        "unknown"
    }
}

/// Summary statistics for a piece of text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStats {
    pub char_count: usize,
    pub word_count: usize,
    pub alpha_ratio: f64,
    pub line_count: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        Self {
            char_count: text.chars().count(),
            word_count: word_count(text),
            alpha_ratio: alpha_ratio(text),
            line_count: if text.is_empty() {
                0
            } else {
                text.matches('\n').count() + 1
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("one two  three"), 3);
        assert_eq!(word_count("  leading and trailing  "), 3);
    }

    #[test]
    fn test_alpha_ratio() {
        assert_eq!(alpha_ratio(""), 0.0);
        assert_eq!(alpha_ratio("abcd"), 1.0);
        assert!((alpha_ratio("ab12") - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_repetition_ratio() {
        assert_eq!(repetition_ratio(""), 0.0);
        assert_eq!(repetition_ratio("all words here are unique"), 0.0);
        // 4 words, 1 unique -> 0.75
        assert!((repetition_ratio("go go go go") - 0.75).abs() < 1e-9);
        // Case-insensitive comparison
        assert!((repetition_ratio("Go go GO go") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_hashtag_count() {
        assert_eq!(hashtag_count("no tags here"), 0);
        assert_eq!(hashtag_count("#one #two and #three"), 3);
        assert_eq!(extract_hashtags("#rust is #fast"), vec!["#rust", "#fast"]);
    }

    #[test]
    fn test_emoji_runs_count_once() {
        assert_eq!(emoji_count("plain text"), 0);
        assert_eq!(emoji_count("🔥🔥🔥"), 1);
        assert_eq!(emoji_count("🔥 and 🚀"), 2);
        assert_eq!(emoji_count("a 😀 b 😀 c 😀"), 3);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("hello world"), "en");
        assert_eq!(detect_language("привет мир"), "ru");
        assert_eq!(detect_language("12345"), "unknown");
    }

    #[test]
    fn test_text_stats() {
        let stats = TextStats::of("hello world\nsecond line");
        assert_eq!(stats.word_count, 4);
        assert_eq!(stats.line_count, 2);
        assert_eq!(TextStats::of("").line_count, 0);
    }
}
