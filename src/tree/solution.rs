//! Scored supply trees and their ranking.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::core::types::{ConfidenceLevel, ProviderId};
use crate::tree::supply_tree::SupplyTree;
use crate::utils::validation::clamp_confidence;

/// Summary figures for a solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolutionMetrics {
    /// Distinct providers supplying capabilities
    pub facility_count: usize,
    /// Distinct requirements satisfied by nodes
    pub requirement_count: usize,
    /// Distinct capabilities used
    pub capability_count: usize,
    pub workflow_count: usize,
    pub node_count: usize,
    /// Nodes on the longest dependency chain
    pub estimated_stages: usize,
    /// Deepest decomposition level (0 when everything matched directly)
    pub resolution_depth: usize,
}

impl SolutionMetrics {
    pub fn from_tree(tree: &SupplyTree) -> Self {
        let mut facilities = HashSet::new();
        let mut requirements = HashSet::new();
        let mut capabilities = HashSet::new();
        let mut depth = 0;

        for node in tree.nodes() {
            requirements.insert(node.requirement_ref.without_fragment());
            depth = depth.max(node.requirement_ref.path.len().saturating_sub(1));
            if let Some(capability) = &node.capability_ref {
                facilities.insert(capability.identifier.clone());
                capabilities.insert(capability.without_fragment());
            }
        }

        Self {
            facility_count: facilities.len(),
            requirement_count: requirements.len(),
            capability_count: capabilities.len(),
            workflow_count: tree.workflows().len(),
            node_count: tree.node_count(),
            estimated_stages: tree.longest_chain(),
            resolution_depth: depth,
        }
    }
}

/// A supply tree with its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyTreeSolution {
    pub tree: SupplyTree,
    pub score: f64,
    pub metrics: SolutionMetrics,
}

impl SupplyTreeSolution {
    /// Score the tree by its confidence
    pub fn new(tree: SupplyTree) -> Self {
        let score = tree.calculate_confidence();
        let metrics = SolutionMetrics::from_tree(&tree);
        Self { tree, score, metrics }
    }

    /// Override the score; clamped to [0, 1]
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = clamp_confidence(score);
        self
    }

    pub fn provider(&self) -> Option<&ProviderId> {
        self.tree.primary_provider.as_ref()
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Provider(ProviderId),
    Tree(Uuid),
}

impl DedupKey {
    fn of(solution: &SupplyTreeSolution) -> Self {
        match solution.provider() {
            Some(provider) => Self::Provider(provider.clone()),
            None => Self::Tree(solution.tree.id),
        }
    }
}

/// Deduplicates and orders solutions
#[derive(Debug, Clone, Copy, Default)]
pub struct SolutionRanker {
    limit: Option<usize>,
}

impl SolutionRanker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` solutions
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Wrap trees as solutions scored by confidence, then rank them
    pub fn rank_trees(&self, trees: Vec<SupplyTree>) -> Vec<SupplyTreeSolution> {
        self.rank(trees.into_iter().map(SupplyTreeSolution::new).collect())
    }

    /// Keep the best solution per provider and sort by descending score.
    ///
    /// Ties are broken by provider id; solutions without a provider sort after
    /// those with one, by tree id.
    pub fn rank(&self, solutions: Vec<SupplyTreeSolution>) -> Vec<SupplyTreeSolution> {
        let mut best: HashMap<DedupKey, SupplyTreeSolution> = HashMap::new();
        for solution in solutions {
            let key = DedupKey::of(&solution);
            match best.get(&key) {
                Some(existing) if existing.score >= solution.score => {
                    tracing::debug!(
                        "Dropping duplicate solution for {:?} (score {:.3})",
                        key,
                        solution.score
                    );
                }
                _ => {
                    best.insert(key, solution);
                }
            }
        }

        let mut ranked: Vec<SupplyTreeSolution> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| match (a.provider(), b.provider()) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.tree.id.cmp(&b.tree.id),
                })
        });

        if let Some(limit) = self.limit {
            ranked.truncate(limit);
        }
        ranked
    }
}
