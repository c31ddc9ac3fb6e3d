//! Text normalization and similarity scoring
//!
//! Backs duplicate-question suppression in the activation pipeline.

/// Similarity at or above this counts as a near-duplicate
const DUPLICATE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Minimum length ratio for the substring-containment shortcut
const CONTAINMENT_LENGTH_RATIO: f64 = 0.9;

/// Normalize text for comparison: lowercase, strip punctuation, collapse whitespace
#[must_use]
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between two strings in `[0, 1]`
///
/// `1 - edit_distance(a, b) / max(len(a), len(b))`; 1.0 for two empty strings.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Whether two texts are close enough to treat as the same question
///
/// True when normalized similarity reaches the threshold, or when one
/// normalized string contains the other and their lengths are within 10%.
/// Empty strings are never duplicates of anything.
#[must_use]
pub fn is_near_duplicate(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() || b.is_empty() {
        return false;
    }

    if a == b {
        return true;
    }

    if similarity(&a, &b) >= DUPLICATE_SIMILARITY_THRESHOLD {
        return true;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    #[allow(clippy::cast_precision_loss)]
    let length_ratio = shorter.len() as f64 / longer.len() as f64;

    longer.contains(shorter.as_str()) && length_ratio >= CONTAINMENT_LENGTH_RATIO
}
