use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::requirement::Capability;
use crate::core::types::{
    MatchClassification, MatchDetail, MatchExplanation, MatchLayerKind, MatchQuality,
};
use crate::matching::heuristics::{default_rules, RuleTable};
use crate::matching::scoring::{TermScorer, DEFAULT_NEAR_MISS_DISTANCE};
use crate::utils::validation::{clamp_confidence, validate_depth_limit, ValidationError};

/// Default maximum decomposition depth
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default minimum score for a solution to be reported
pub const DEFAULT_MIN_SCORE: f64 = 0.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Configuration for matching and decomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum recursion depth of the component resolver
    pub max_depth: usize,
    /// Maximum Levenshtein distance accepted as a near miss
    pub near_miss_max_distance: usize,
    /// Treat a repeated external reference on one resolution path as a cycle
    pub track_visited_references: bool,
    /// Minimum score threshold for including solutions in results
    pub min_score: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            near_miss_max_distance: DEFAULT_NEAR_MISS_DISTANCE,
            track_visited_references: true,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl MatchingConfig {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    /// Check limits and clamp the score threshold
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        validate_depth_limit(self.max_depth)?;
        self.min_score = clamp_confidence(self.min_score);
        Ok(self)
    }
}

/// Winning candidate of a single layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMatch {
    /// Position of the winning candidate in the candidate list
    pub candidate_index: usize,
    pub classification: MatchClassification,
}

/// One stage of the match pipeline.
///
/// A layer inspects every candidate and returns its best match, or `None` when
/// nothing matched. Layers must be pure: the same input always yields the same
/// output.
pub trait MatchLayer: Send + Sync {
    fn kind(&self) -> MatchLayerKind;

    fn evaluate(&self, requirement: &str, candidates: &[&str]) -> Option<LayerMatch>;
}

/// Exact, case-insensitive and edit-distance comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectLayer {
    scorer: TermScorer,
}

impl DirectLayer {
    pub fn new(scorer: TermScorer) -> Self {
        Self { scorer }
    }
}

impl MatchLayer for DirectLayer {
    fn kind(&self) -> MatchLayerKind {
        MatchLayerKind::Direct
    }

    fn evaluate(&self, requirement: &str, candidates: &[&str]) -> Option<LayerMatch> {
        let mut best: Option<LayerMatch> = None;
        for (candidate_index, candidate) in candidates.iter().enumerate() {
            let classification = self.scorer.score(requirement, candidate);
            if !classification.is_match() {
                continue;
            }
            // Strictly greater keeps the earliest candidate on ties
            if best
                .as_ref()
                .map_or(true, |b| classification.confidence > b.classification.confidence)
            {
                best = Some(LayerMatch {
                    candidate_index,
                    classification,
                });
            }
        }
        best
    }
}

/// Synonym and abbreviation expansion through a [`RuleTable`]
#[derive(Debug, Clone, Default)]
pub struct HeuristicLayer {
    rules: Option<Arc<RuleTable>>,
}

impl HeuristicLayer {
    /// Use a custom table instead of the process-wide default
    pub fn with_rules(rules: Arc<RuleTable>) -> Self {
        Self { rules: Some(rules) }
    }

    fn table(&self) -> &RuleTable {
        match &self.rules {
            Some(rules) => rules.as_ref(),
            None => default_rules(),
        }
    }
}

impl MatchLayer for HeuristicLayer {
    fn kind(&self) -> MatchLayerKind {
        MatchLayerKind::Heuristic
    }

    fn evaluate(&self, requirement: &str, candidates: &[&str]) -> Option<LayerMatch> {
        let expansions = self.table().expand(requirement);
        if expansions.is_empty() {
            return None;
        }

        let mut best: Option<LayerMatch> = None;
        for (candidate_index, candidate) in candidates.iter().enumerate() {
            for expansion in &expansions {
                if !TermScorer::equivalent(&expansion.term, candidate) {
                    continue;
                }
                if best
                    .as_ref()
                    .map_or(true, |b| expansion.confidence > b.classification.confidence)
                {
                    best = Some(LayerMatch {
                        candidate_index,
                        classification: MatchClassification::new(
                            MatchQuality::Heuristic,
                            expansion.confidence,
                            MatchExplanation {
                                layer: MatchLayerKind::Heuristic,
                                detail: MatchDetail::Rule {
                                    rule_id: expansion.rule_id.clone(),
                                    expansion: expansion.term.clone(),
                                },
                            },
                        ),
                    });
                }
            }
        }
        best
    }
}

/// Best match of a requirement term across all candidates
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineMatch {
    pub classification: MatchClassification,

    /// Position of the selected candidate, `None` when nothing matched
    pub candidate_index: Option<usize>,

    /// Layer that produced the result, `None` when nothing matched
    pub layer: Option<MatchLayerKind>,
}

impl PipelineMatch {
    fn none() -> Self {
        Self {
            classification: MatchClassification::no_match(MatchLayerKind::Direct),
            candidate_index: None,
            layer: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.candidate_index.is_some()
    }

    pub fn confidence(&self) -> f64 {
        self.classification.confidence
    }
}

/// Ordered match layers; the first layer to match any candidate wins.
///
/// The default pipeline runs the direct layer then the heuristic layer. Further
/// layers are appended with [`MatchPipeline::with_layer`] and run after those.
pub struct MatchPipeline {
    layers: Vec<Box<dyn MatchLayer>>,
}

impl std::fmt::Debug for MatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchPipeline")
            .field("layers", &self.layer_kinds())
            .finish()
    }
}

impl Default for MatchPipeline {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl MatchPipeline {
    /// A pipeline with no layers; everything is a no match
    pub fn empty() -> Self {
        Self { layers: Vec::new() }
    }

    /// Direct and heuristic layers configured from `config`
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::empty()
            .with_layer(DirectLayer::new(TermScorer::new(config.near_miss_max_distance)))
            .with_layer(HeuristicLayer::default())
    }

    /// Append a layer after the existing ones
    #[must_use]
    pub fn with_layer(mut self, layer: impl MatchLayer + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn layer_kinds(&self) -> Vec<MatchLayerKind> {
        self.layers.iter().map(|l| l.kind()).collect()
    }

    /// Find the best candidate for `requirement`
    pub fn match_term(&self, requirement: &str, candidates: &[&str]) -> PipelineMatch {
        for layer in &self.layers {
            let Some(found) = layer.evaluate(requirement, candidates) else {
                continue;
            };
            // Appended layers are external code; keep their output in range
            if found.candidate_index >= candidates.len() || !found.classification.is_match() {
                tracing::warn!(
                    layer = %layer.kind(),
                    "Layer returned an invalid match for '{requirement}', ignoring"
                );
                continue;
            }
            let mut classification = found.classification;
            classification.confidence = clamp_confidence(classification.confidence);

            tracing::debug!(
                layer = %layer.kind(),
                quality = %classification.quality,
                confidence = classification.confidence,
                "Matched '{}' to '{}'",
                requirement,
                candidates[found.candidate_index]
            );
            return PipelineMatch {
                classification,
                candidate_index: Some(found.candidate_index),
                layer: Some(layer.kind()),
            };
        }

        tracing::debug!("No layer matched '{requirement}'");
        PipelineMatch::none()
    }

    /// Match against capability names
    pub fn match_capabilities(&self, requirement: &str, capabilities: &[Capability]) -> PipelineMatch {
        let names: Vec<&str> = capabilities.iter().map(|c| c.name.as_str()).collect();
        self.match_term(requirement, &names)
    }
}
