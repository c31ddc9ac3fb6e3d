//! Wake-phrase matching and question extraction

use std::sync::LazyLock;

use regex::Regex;

use super::Segment;

/// Default wake-phrase pattern: optional greeting word, an assistant name,
/// optional trailing punctuation
const DEFAULT_PATTERN: &str =
    r"(?i)(?:\b(?:hey|hi|hello|ok|okay)[\s,]+)?\b(?:pendant|assistant)\b[\s,.!?:;]*";

static DEFAULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_PATTERN).expect("valid regex"));

/// A matched activation within a segment batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    /// Index of the segment containing the wake phrase
    pub segment_index: usize,
    /// Question text following the wake phrase, possibly empty
    pub question: String,
}

/// Compiled wake-phrase pattern
///
/// Built once per resolved preference set; a malformed custom source never
/// reaches the pipeline (it degrades to the default pattern with a warning).
#[derive(Debug, Clone)]
pub struct ActivationPattern {
    regex: Regex,
}

impl Default for ActivationPattern {
    fn default() -> Self {
        Self {
            regex: DEFAULT_REGEX.clone(),
        }
    }
}

impl ActivationPattern {
    /// Build a pattern from an optional custom source
    ///
    /// Custom sources compile case-insensitively. Compilation failure falls
    /// back to the default pattern silently (logged, never fatal).
    #[must_use]
    pub fn build(custom: Option<&str>) -> Self {
        if let Some(source) = custom {
            match Regex::new(&format!("(?i){source}")) {
                Ok(regex) => return Self { regex },
                Err(e) => {
                    tracing::warn!(error = %e, pattern = %source, "invalid custom activation pattern, using default");
                }
            }
        }
        Self::default()
    }

    /// Whether any segment in the batch contains the wake phrase
    #[must_use]
    pub fn matches_any(&self, segments: &[Segment]) -> bool {
        segments.iter().any(|s| self.regex.is_match(&s.text))
    }

    /// Find the first activation in a segment batch
    ///
    /// Scans segments in order; the first segment whose text matches wins.
    /// The question is everything after the match within that segment; when
    /// that is empty, the texts of all subsequent segments are joined.
    #[must_use]
    pub fn find_activation(&self, segments: &[Segment]) -> Option<Activation> {
        for (segment_index, segment) in segments.iter().enumerate() {
            let Some(found) = self.regex.find(&segment.text) else {
                continue;
            };

            let mut question = segment.text[found.end()..].trim().to_string();
            if question.is_empty() {
                question = segments[segment_index + 1..]
                    .iter()
                    .map(|s| s.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
            }

            tracing::debug!(segment_index, question = %question, "activation matched");
            return Some(Activation {
                segment_index,
                question,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::text_segment;

    #[test]
    fn default_pattern_matches_greeting_and_name() {
        let pattern = ActivationPattern::default();
        let segments = vec![text_segment("hey pendant, what time is it?")];

        let activation = pattern.find_activation(&segments).unwrap();
        assert_eq!(activation.segment_index, 0);
        assert_eq!(activation.question, "what time is it?");
    }

    #[test]
    fn name_alone_matches_without_greeting() {
        let pattern = ActivationPattern::default();
        let segments = vec![text_segment("Assistant! turn off the lights")];

        let activation = pattern.find_activation(&segments).unwrap();
        assert_eq!(activation.question, "turn off the lights");
    }

    #[test]
    fn no_wake_phrase_means_no_activation() {
        let pattern = ActivationPattern::default();
        let segments = vec![text_segment("the weather is nice today")];

        assert!(pattern.find_activation(&segments).is_none());
    }

    #[test]
    fn first_matching_segment_wins() {
        let pattern = ActivationPattern::default();
        let segments = vec![
            text_segment("so anyway"),
            text_segment("hey pendant what's for dinner"),
            text_segment("okay pendant never mind"),
        ];

        let activation = pattern.find_activation(&segments).unwrap();
        assert_eq!(activation.segment_index, 1);
        assert_eq!(activation.question, "what's for dinner");
    }

    #[test]
    fn empty_remainder_pulls_following_segments() {
        let pattern = ActivationPattern::default();
        let segments = vec![
            text_segment("hey pendant"),
            text_segment("what is the capital"),
            text_segment("of france?"),
        ];

        let activation = pattern.find_activation(&segments).unwrap();
        assert_eq!(activation.segment_index, 0);
        assert_eq!(activation.question, "what is the capital of france?");
    }

    #[test]
    fn trailing_activation_with_no_following_text_yields_empty_question() {
        let pattern = ActivationPattern::default();
        let segments = vec![text_segment("ok assistant")];

        let activation = pattern.find_activation(&segments).unwrap();
        assert!(activation.question.is_empty());
    }

    #[test]
    fn custom_pattern_is_case_insensitive() {
        let pattern = ActivationPattern::build(Some(r"\bjarvis\b"));
        let segments = vec![text_segment("JARVIS open the garage")];

        let activation = pattern.find_activation(&segments).unwrap();
        assert_eq!(activation.question, "open the garage");
    }

    #[test]
    fn malformed_custom_pattern_falls_back_to_default() {
        let pattern = ActivationPattern::build(Some("[unclosed"));
        let segments = vec![text_segment("hey pendant hello there")];

        assert!(pattern.find_activation(&segments).is_some());
    }
}
