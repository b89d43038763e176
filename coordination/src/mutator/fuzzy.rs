//! Fuzzy line locator for stale line numbers.
//!
//! Scores every line against the target with a character-level similarity
//! ratio (`2 * matches / total_len`) after trimming both sides. Nothing is
//! applied here; callers decide whether a match is good enough to act on.

use similar::TextDiff;

/// Minimum ratio accepted by [`fuzzy_find`] callers that have no opinion.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.6;

/// Best-matching line for `target` in `content`.
///
/// Returns `(line, ratio)` with `line` 1-indexed, or `(0, best_ratio)` when
/// no line reaches `threshold`. The first line wins ties.
pub fn fuzzy_find(content: &str, target: &str, threshold: f64) -> (usize, f64) {
    let target = target.trim();
    if target.is_empty() {
        return (0, 0.0);
    }

    let mut best_line = 0;
    let mut best_ratio = 0.0_f64;
    for (i, line) in content.split('\n').enumerate() {
        let ratio = similarity(line.trim(), target);
        if ratio > best_ratio {
            best_ratio = ratio;
            best_line = i + 1;
        }
    }

    if best_ratio >= threshold {
        (best_line, best_ratio)
    } else {
        (0, best_ratio)
    }
}

/// Character similarity in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(a, b).ratio())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "import json\n\nDEFAULT_SCORE = 0.50\n\ndef get_trust(agent):\n    return DEFAULT_SCORE\n";

    #[test]
    fn test_exact_match_scores_one() {
        let (line, ratio) = fuzzy_find(SOURCE, "def get_trust(agent):", DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(line, 5);
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_indentation_is_ignored() {
        let (line, ratio) = fuzzy_find(SOURCE, "return DEFAULT_SCORE", DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(line, 6);
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_token_difference_is_close() {
        let (line, ratio) = fuzzy_find(SOURCE, "DEFAULT_SCORE = 0.85", DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(line, 3);
        assert!(ratio >= 0.8, "ratio was {ratio}");
    }

    #[test]
    fn test_unrelated_text_returns_zero() {
        let (line, ratio) = fuzzy_find(SOURCE, "zzqqxxv kkwwpp", DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(line, 0);
        assert!(ratio < DEFAULT_FUZZY_THRESHOLD);
    }

    #[test]
    fn test_empty_target() {
        assert_eq!(fuzzy_find(SOURCE, "   ", 0.6), (0, 0.0));
    }

    #[test]
    fn test_first_line_wins_ties() {
        let (line, _) = fuzzy_find("x = 1\nx = 1\n", "x = 1", 0.6);
        assert_eq!(line, 1);
    }
}
