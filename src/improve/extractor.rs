//! Best-effort extraction of a structured reply from free-form model text.
//!
//! Models asked for JSON return it fenced, bare, buried in prose, or not at
//! all. Extraction tries a fenced code block first, then the widest brace
//! span, and finally falls back to heuristic line segmentation. It never
//! fails — the worst case is the whole text as the `improved` field.

use log::warn;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Minimum length for a heuristically-extracted alternative line; anything
/// shorter is list-marker noise.
const MIN_ALTERNATIVE_LEN: usize = 10;

/// Fallback truncation limit when the whole text becomes `improved`.
const IMPROVED_TRUNCATE_LEN: usize = 200;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
});

// ============================================================================
// Types
// ============================================================================

/// The typed result recovered from a model's reply. Absent fields are empty,
/// never null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredReply {
    pub improved: String,
    /// At most three entries, trimmed and non-empty.
    pub alternatives: Vec<String>,
    pub adaptations: Adaptations,
}

/// Task-specific rewrites keyed by a fixed set: code, analysis, creative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Adaptations {
    pub code: String,
    pub analysis: String,
    pub creative: String,
}

impl Adaptations {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.analysis.is_empty() && self.creative.is_empty()
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Recovers a [`StructuredReply`] from raw reply text.
///
/// Order, first success wins: fenced JSON block → first-`{`-to-last-`}`
/// substring → line-based segmentation. Pure function; calling it twice on
/// the same text yields identical output.
pub fn extract(raw_text: &str) -> StructuredReply {
    if let Some(captures) = FENCED_JSON.captures(raw_text) {
        match serde_json::from_str::<Value>(&captures[1]) {
            Ok(value) => {
                if let Some(reply) = validate(&value) {
                    return reply;
                }
            }
            Err(e) => warn!("Failed to parse JSON from fenced block: {e}"),
        }
    }

    if let (Some(start), Some(end)) = (raw_text.find('{'), raw_text.rfind('}')) {
        if end > start {
            match serde_json::from_str::<Value>(&raw_text[start..=end]) {
                Ok(value) => {
                    if let Some(reply) = validate(&value) {
                        return reply;
                    }
                }
                Err(e) => warn!("Failed to parse bare JSON span: {e}"),
            }
        }
    }

    segment_plain_text(raw_text)
}

/// Normalizes a parsed JSON value into a reply. Returns None when the value
/// is not an object at all.
fn validate(value: &Value) -> Option<StructuredReply> {
    let object = value.as_object()?;

    let improved = object
        .get("improved")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let alternatives = object
        .get("alternatives")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|alt| match alt {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .take(3)
                .collect()
        })
        .unwrap_or_default();

    let mut adaptations = Adaptations::default();
    if let Some(map) = object.get("adaptations").and_then(Value::as_object) {
        // Only the three recognized keys survive validation
        for (key, slot) in [
            ("code", &mut adaptations.code),
            ("analysis", &mut adaptations.analysis),
            ("creative", &mut adaptations.creative),
        ] {
            if let Some(text) = map.get(key).and_then(Value::as_str) {
                let text = text.trim();
                if !text.is_empty() {
                    *slot = text.to_string();
                }
            }
        }
    }

    Some(StructuredReply {
        improved,
        alternatives,
        adaptations,
    })
}

// ============================================================================
// Plain-Text Fallback
// ============================================================================

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Improved,
    Alternatives,
    Adaptations,
}

// Keyword sets are bilingual (English/Russian) because the reply language
// follows the prompt language.
const IMPROVED_KEYWORDS: &[&str] = &["improved", "улучшен", "лучший вариант", "рекомендуем"];
const ALTERNATIVE_KEYWORDS: &[&str] = &["alternative", "альтернатив", "вариант", "другой"];
const ADAPTATION_KEYWORDS: &[&str] = &["adaptation", "адаптац"];
const CODE_KEYWORDS: &[&str] = &["code", "код", "programming", "программирован"];
const ANALYSIS_KEYWORDS: &[&str] = &["analysis", "анализ", "аналитик"];
const CREATIVE_KEYWORDS: &[&str] = &["creative", "креатив", "творческ"];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Text after the first colon of a header line, if any.
fn after_colon(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, rest)| rest.trim())
}

/// Heuristic segmentation for replies with no parsable JSON: scan lines,
/// switch the active section on keyword headers, accumulate the rest.
fn segment_plain_text(text: &str) -> StructuredReply {
    let mut improved = String::new();
    let mut improved_extra: Vec<&str> = Vec::new();
    let mut alternatives: Vec<String> = Vec::new();
    let mut adaptations = Adaptations::default();
    let mut section = Section::None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();

        if contains_any(&lower, IMPROVED_KEYWORDS) {
            section = Section::Improved;
            if let Some(rest) = after_colon(line) {
                if !rest.is_empty() {
                    improved = rest.to_string();
                }
            }
            continue;
        }
        if contains_any(&lower, ALTERNATIVE_KEYWORDS) {
            section = Section::Alternatives;
            continue;
        }
        if contains_any(&lower, ADAPTATION_KEYWORDS) {
            section = Section::Adaptations;
            continue;
        }
        if contains_any(&lower, CODE_KEYWORDS) {
            if let Some(rest) = after_colon(line) {
                adaptations.code = rest.to_string();
            }
            section = Section::Adaptations;
            continue;
        }
        if contains_any(&lower, ANALYSIS_KEYWORDS) {
            if let Some(rest) = after_colon(line) {
                adaptations.analysis = rest.to_string();
            }
            section = Section::Adaptations;
            continue;
        }
        if contains_any(&lower, CREATIVE_KEYWORDS) {
            if let Some(rest) = after_colon(line) {
                adaptations.creative = rest.to_string();
            }
            section = Section::Adaptations;
            continue;
        }

        match section {
            Section::Improved => {
                if improved.is_empty() {
                    improved = line.to_string();
                } else {
                    improved_extra.push(line);
                }
            }
            Section::Alternatives => {
                let clean = line.trim_start_matches(['-', '*', '•', ' ']).trim();
                if clean.chars().count() > MIN_ALTERNATIVE_LEN {
                    alternatives.push(clean.to_string());
                }
            }
            Section::Adaptations | Section::None => {}
        }
    }

    if !improved_extra.is_empty() {
        improved = format!("{} {}", improved, improved_extra.join(" "));
    }
    alternatives.truncate(3);

    // No structure at all: the whole text becomes the improved field
    if improved.is_empty() {
        improved = text.trim().to_string();
        if improved.chars().count() > IMPROVED_TRUNCATE_LEN {
            improved = improved.chars().take(IMPROVED_TRUNCATE_LEN).collect();
            improved.push_str("...");
        }
    }

    StructuredReply {
        improved: improved.trim().to_string(),
        alternatives,
        adaptations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_with_surrounding_prose() {
        let text = "prefix ```json\n{\"improved\":\"X\",\"alternatives\":[\"a\",\"b\"]}\n``` suffix";
        let reply = extract(text);
        assert_eq!(reply.improved, "X");
        assert_eq!(reply.alternatives, vec!["a", "b"]);
        assert!(reply.adaptations.is_empty());
    }

    #[test]
    fn test_fence_without_json_marker() {
        let text = "```\n{\"improved\": \"Better prompt\"}\n```";
        let reply = extract(text);
        assert_eq!(reply.improved, "Better prompt");
    }

    #[test]
    fn test_bare_json_between_prose() {
        let text = "Here is my suggestion:\n{\"improved\": \"Y\", \"adaptations\": {\"code\": \"for coding\"}}\nHope it helps!";
        let reply = extract(text);
        assert_eq!(reply.improved, "Y");
        assert_eq!(reply.adaptations.code, "for coding");
        assert_eq!(reply.adaptations.analysis, "");
    }

    #[test]
    fn test_alternatives_capped_and_cleaned() {
        let text = r#"{"improved":"Z","alternatives":["  one padded  ", "", null, 42, "two", "three", "four"]}"#;
        let reply = extract(text);
        // null and empty dropped, number coerced, capped at 3
        assert_eq!(reply.alternatives, vec!["one padded", "42", "two"]);
    }

    #[test]
    fn test_unrecognized_adaptation_keys_dropped() {
        let text = r#"{"improved":"Z","adaptations":{"code":"c","poetry":"p","analysis":"a"}}"#;
        let reply = extract(text);
        assert_eq!(reply.adaptations.code, "c");
        assert_eq!(reply.adaptations.analysis, "a");
        assert_eq!(reply.adaptations.creative, "");
    }

    #[test]
    fn test_heuristic_sections() {
        let text = "\
Improved: Write a detailed technical explanation of X
Alternatives:
- Explain X as if teaching a beginner
- Compare X with other approaches in depth
Adaptations
code: Implement X in a short program
analysis: Evaluate the trade-offs of X
";
        let reply = extract(text);
        assert_eq!(
            reply.improved,
            "Write a detailed technical explanation of X"
        );
        assert_eq!(reply.alternatives.len(), 2);
        assert_eq!(reply.alternatives[0], "Explain X as if teaching a beginner");
        assert_eq!(reply.adaptations.code, "Implement X in a short program");
        assert_eq!(reply.adaptations.analysis, "Evaluate the trade-offs of X");
    }

    #[test]
    fn test_heuristic_short_alternatives_discarded() {
        let text = "Alternatives:\n- tiny\n- this one is long enough to keep";
        let reply = extract(text);
        assert_eq!(reply.alternatives, vec!["this one is long enough to keep"]);
    }

    #[test]
    fn test_unstructured_prose_truncated_to_200_chars() {
        let text = "x".repeat(250);
        let reply = extract(&text);
        assert_eq!(reply.improved.chars().count(), 203);
        assert!(reply.improved.ends_with("..."));
        assert_eq!(&reply.improved[..200], &text[..200]);
        assert!(reply.alternatives.is_empty());
        assert!(reply.adaptations.is_empty());
    }

    #[test]
    fn test_short_unstructured_prose_kept_whole() {
        let reply = extract("just a short remark");
        assert_eq!(reply.improved, "just a short remark");
    }

    #[test]
    fn test_extract_is_idempotent() {
        let text = "Improved: better\nAlternatives:\n- a much longer alternative line";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_malformed_fence_falls_through() {
        // Fenced block and brace span both unparsable, no section keywords:
        // the whole text becomes the improved field
        let text = "```json\n{broken}\n```";
        let reply = extract(text);
        assert_eq!(reply.improved, text.trim());
    }

    #[test]
    fn test_non_object_json_falls_back() {
        let reply = extract("[1, 2, 3]");
        assert_eq!(reply.improved, "[1, 2, 3]");
    }
}
