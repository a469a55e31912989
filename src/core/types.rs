use serde::{Deserialize, Serialize};

use crate::utils::validation::clamp_confidence;

/// Unique identifier for a provider (facility, kitchen, ...) in the catalog
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quality of a match between a requirement term and a capability term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    /// Byte-for-byte identical
    Perfect,
    /// Identical after trimming and case folding
    CaseDifference,
    /// Within a small edit distance after normalization
    NearMiss,
    /// Related through a synonym or abbreviation rule
    Heuristic,
    /// No relation found
    NoMatch,
}

impl MatchQuality {
    pub fn is_match(self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

impl std::fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Perfect => write!(f, "perfect"),
            Self::CaseDifference => write!(f, "case_difference"),
            Self::NearMiss => write!(f, "near_miss"),
            Self::Heuristic => write!(f, "heuristic"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

/// Which pipeline layer produced a classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLayerKind {
    Direct,
    Heuristic,
    Custom(String),
}

impl std::fmt::Display for MatchLayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Heuristic => write!(f, "heuristic"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Layer-specific detail attached to a classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchDetail {
    /// Terms were byte-identical
    Exact,
    /// Terms were equal after trimming and lower-casing
    CaseInsensitive,
    /// Raw Levenshtein distance between the normalized terms
    EditDistance { distance: usize },
    /// A heuristic rule related the requirement term to the candidate
    Rule { rule_id: String, expansion: String },
    /// Free-form detail from an appended layer
    Custom { description: String },
    /// Nothing matched
    None,
}

/// Structured explanation of how a classification was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchExplanation {
    pub layer: MatchLayerKind,
    pub detail: MatchDetail,
}

/// Classified match between one requirement term and one capability term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClassification {
    pub quality: MatchQuality,

    /// Always within [0.0, 1.0]
    pub confidence: f64,

    pub explanation: MatchExplanation,
}

impl MatchClassification {
    /// Build a classification, clamping the confidence into [0.0, 1.0]
    #[must_use]
    pub fn new(quality: MatchQuality, confidence: f64, explanation: MatchExplanation) -> Self {
        Self {
            quality,
            confidence: clamp_confidence(confidence),
            explanation,
        }
    }

    /// The canonical "nothing matched" classification
    #[must_use]
    pub fn no_match(layer: MatchLayerKind) -> Self {
        Self {
            quality: MatchQuality::NoMatch,
            confidence: 0.0,
            explanation: MatchExplanation {
                layer,
                detail: MatchDetail::None,
            },
        }
    }

    pub fn is_match(&self) -> bool {
        self.quality.is_match()
    }

    pub fn edit_distance(&self) -> Option<usize> {
        match self.explanation.detail {
            MatchDetail::EditDistance { distance } => Some(distance),
            _ => None,
        }
    }
}

/// Coarse confidence level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
    Exact,
}

impl ConfidenceLevel {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 1.0 {
            Self::Exact
        } else if score >= 0.9 {
            Self::High
        } else if score >= 0.75 {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_level_from_score() {
        assert_eq!(ConfidenceLevel::from_score(1.0), ConfidenceLevel::Exact);
        assert_eq!(ConfidenceLevel::from_score(0.95), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.3), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::None);
    }

    #[test]
    fn test_classification_clamps_confidence() {
        let explanation = MatchExplanation {
            layer: MatchLayerKind::Custom("semantic".to_string()),
            detail: MatchDetail::None,
        };
        let high = MatchClassification::new(MatchQuality::Heuristic, 1.7, explanation.clone());
        assert!((high.confidence - 1.0).abs() < f64::EPSILON);

        let nan = MatchClassification::new(MatchQuality::Heuristic, f64::NAN, explanation);
        assert!(nan.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_quality_serializes_snake_case() {
        let json = serde_json::to_string(&MatchQuality::CaseDifference).unwrap();
        assert_eq!(json, "\"case_difference\"");
    }
}
