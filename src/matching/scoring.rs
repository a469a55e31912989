//! Pairwise term similarity scoring.
//!
//! Classifies how well a requirement term matches a capability term. Rules are
//! applied in order and the first applicable one wins:
//!
//! | Rule | Quality | Confidence |
//! |------|---------|------------|
//! | Byte-for-byte equal | `perfect` | 1.0 |
//! | Equal after trimming and case folding | `case_difference` | 0.95 |
//! | Levenshtein distance ≤ 2 after normalization | `near_miss` | 0.8 |
//! | Otherwise | `no_match` | 0.0 |

use crate::core::types::{
    MatchClassification, MatchDetail, MatchExplanation, MatchLayerKind, MatchQuality,
};

pub const PERFECT_CONFIDENCE: f64 = 1.0;
pub const CASE_DIFFERENCE_CONFIDENCE: f64 = 0.95;
pub const NEAR_MISS_CONFIDENCE: f64 = 0.8;

/// Default maximum edit distance for a near miss
pub const DEFAULT_NEAR_MISS_DISTANCE: usize = 2;

/// Trim surrounding whitespace and lower-case a term
#[must_use]
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Compare two terms with the default near-miss distance.
///
/// ```
/// use supply_solver::matching::scoring::score_terms;
/// use supply_solver::MatchQuality;
///
/// let result = score_terms("CNC Machining", "CNC Machinng");
/// assert_eq!(result.quality, MatchQuality::NearMiss);
/// assert_eq!(result.edit_distance(), Some(1));
/// ```
#[must_use]
pub fn score_terms(requirement: &str, capability: &str) -> MatchClassification {
    TermScorer::default().score(requirement, capability)
}

/// Pure, stateless term comparator
#[derive(Debug, Clone, Copy)]
pub struct TermScorer {
    max_distance: usize,
}

impl Default for TermScorer {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_NEAR_MISS_DISTANCE,
        }
    }
}

impl TermScorer {
    pub fn new(max_distance: usize) -> Self {
        Self { max_distance }
    }

    /// Classify a requirement term against a capability term
    #[must_use]
    pub fn score(&self, requirement: &str, capability: &str) -> MatchClassification {
        if requirement == capability {
            return direct(MatchQuality::Perfect, PERFECT_CONFIDENCE, MatchDetail::Exact);
        }

        let req_norm = normalize_term(requirement);
        let cap_norm = normalize_term(capability);

        // Empty only matches empty, and that case was the byte-equality check
        if req_norm.is_empty() || cap_norm.is_empty() {
            return MatchClassification::no_match(MatchLayerKind::Direct);
        }

        if req_norm == cap_norm {
            return direct(
                MatchQuality::CaseDifference,
                CASE_DIFFERENCE_CONFIDENCE,
                MatchDetail::CaseInsensitive,
            );
        }

        let distance = levenshtein(&req_norm, &cap_norm);
        if distance <= self.max_distance {
            return direct(
                MatchQuality::NearMiss,
                NEAR_MISS_CONFIDENCE,
                MatchDetail::EditDistance { distance },
            );
        }

        MatchClassification::no_match(MatchLayerKind::Direct)
    }

    /// Exact or case-insensitive equality only, no edit distance
    #[must_use]
    pub fn equivalent(requirement: &str, capability: &str) -> bool {
        requirement == capability || {
            let req_norm = normalize_term(requirement);
            !req_norm.is_empty() && req_norm == normalize_term(capability)
        }
    }
}

fn direct(quality: MatchQuality, confidence: f64, detail: MatchDetail) -> MatchClassification {
    MatchClassification::new(
        quality,
        confidence,
        MatchExplanation {
            layer: MatchLayerKind::Direct,
            detail,
        },
    )
}

/// Levenshtein edit distance over Unicode scalar values.
///
/// Uses the two-row dynamic programming formulation, O(n·m) time and O(m) space.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            let insertion = curr[j] + 1;
            let deletion = prev[j + 1] + 1;
            curr[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_confidence(result: &MatchClassification, expected: f64) {
        assert!(
            (result.confidence - expected).abs() < 1e-9,
            "expected confidence {expected}, got {}",
            result.confidence
        );
    }

    #[test]
    fn test_equal_strings_are_perfect() {
        for term in ["CNC Machining", "welding", "", "  padded  ", "Sauté"] {
            let result = score_terms(term, term);
            assert_eq!(result.quality, MatchQuality::Perfect, "term {term:?}");
            assert_confidence(&result, 1.0);
        }
    }

    #[test]
    fn test_upper_case_is_case_difference() {
        for term in ["cnc machining", "Laser Cutting", "weld", "3d printing"] {
            let upper = term.to_uppercase();
            assert_ne!(term, upper);
            let result = score_terms(term, &upper);
            assert_eq!(result.quality, MatchQuality::CaseDifference, "term {term:?}");
            assert_confidence(&result, 0.95);
        }
    }

    #[test]
    fn test_whitespace_is_ignored_for_case_difference() {
        let result = score_terms("  CNC Machining ", "cnc machining");
        assert_eq!(result.quality, MatchQuality::CaseDifference);
    }

    #[test]
    fn test_near_miss_records_distance() {
        let result = score_terms("CNC Machining", "CNC Machinng");
        assert_eq!(result.quality, MatchQuality::NearMiss);
        assert_confidence(&result, 0.8);
        assert_eq!(result.edit_distance(), Some(1));
        assert_eq!(result.explanation.layer, MatchLayerKind::Direct);
    }

    #[test]
    fn test_near_miss_is_case_insensitive() {
        let result = score_terms("LASER CUTING", "laser cutting");
        assert_eq!(result.quality, MatchQuality::NearMiss);
        assert_eq!(result.edit_distance(), Some(1));
    }

    #[test]
    fn test_no_match() {
        let result = score_terms("CNC", "3D Printing");
        assert_eq!(result.quality, MatchQuality::NoMatch);
        assert_confidence(&result, 0.0);
        assert_eq!(result.explanation.detail, MatchDetail::None);
    }

    #[test]
    fn test_empty_only_matches_empty() {
        assert_eq!(score_terms("", "ab").quality, MatchQuality::NoMatch);
        assert_eq!(score_terms("ab", "").quality, MatchQuality::NoMatch);
        assert_eq!(score_terms("  ", "").quality, MatchQuality::NoMatch);
        assert_eq!(score_terms("", "").quality, MatchQuality::Perfect);
    }

    #[test]
    fn test_custom_distance() {
        let strict = TermScorer::new(0);
        assert_eq!(
            strict.score("CNC Machining", "CNC Machinng").quality,
            MatchQuality::NoMatch
        );
        let loose = TermScorer::new(3);
        assert_eq!(loose.score("milling", "miling").quality, MatchQuality::NearMiss);
    }

    #[test]
    fn test_equivalent() {
        assert!(TermScorer::equivalent("Milling", "milling "));
        assert!(!TermScorer::equivalent("Milling", "Miling"));
        assert!(TermScorer::equivalent("", ""));
        assert!(!TermScorer::equivalent(" ", ""));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("sauté", "saute"), 1);
        assert_eq!(levenshtein("same", "same"), 0);
    }
}
