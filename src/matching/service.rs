//! Matching a requirement set against every provider in a catalog.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::store::{Provider, ProviderCatalog};
use crate::core::requirement::RequirementSet;
use crate::core::types::ProviderId;
use crate::matching::engine::{MatchPipeline, MatchingConfig};
use crate::matching::resolver::{
    ComponentMatchResult, ComponentResolver, InMemoryReferenceResolver, ReferenceResolver,
    ResolutionOutcome,
};
use crate::tree::builder::TreeBuilder;
use crate::tree::solution::{SolutionRanker, SupplyTreeSolution};

/// A requirement a provider could not satisfy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnsatisfiedRequirement {
    pub requirement: String,
    pub outcome: ResolutionOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Why a provider produced no solution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RejectionReason {
    /// At least one requirement did not resolve
    Unsatisfied { requirements: Vec<UnsatisfiedRequirement> },
    /// The supply tree violated a structural invariant
    TreeConstruction { message: String },
    /// The solution scored below the configured minimum
    BelowMinScore { score: f64, min_score: f64 },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsatisfied { requirements } => {
                let names: Vec<String> = requirements
                    .iter()
                    .map(|r| format!("{} ({})", r.requirement, r.outcome))
                    .collect();
                write!(f, "unsatisfied: {}", names.join(", "))
            }
            Self::TreeConstruction { message } => write!(f, "invalid supply tree: {message}"),
            Self::BelowMinScore { score, min_score } => {
                write!(f, "score {score:.3} below minimum {min_score:.3}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRejection {
    pub provider: ProviderId,
    pub reason: RejectionReason,
}

/// Ranked solutions plus the reason every other provider was left out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
    pub requirement_set: String,
    pub providers_considered: usize,
    pub solutions: Vec<SupplyTreeSolution>,
    pub rejections: Vec<ProviderRejection>,
}

impl SolveReport {
    pub fn is_solved(&self) -> bool {
        !self.solutions.is_empty()
    }
}

enum ProviderOutcome {
    Solved(SupplyTreeSolution),
    Rejected(ProviderRejection),
}

/// Resolves requirement sets against provider catalogs and ranks the results
pub struct MatchingService {
    config: MatchingConfig,
    pipeline: MatchPipeline,
    references: Option<Arc<dyn ReferenceResolver>>,
    limit: Option<usize>,
}

impl Default for MatchingService {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingService {
    /// Create a service with default configuration
    pub fn new() -> Self {
        Self::with_config(MatchingConfig::default())
    }

    /// Create a service with custom configuration
    pub fn with_config(config: MatchingConfig) -> Self {
        Self {
            pipeline: MatchPipeline::from_config(&config),
            config,
            references: None,
            limit: None,
        }
    }

    /// Replace the match pipeline, e.g. to append custom layers
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: MatchPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Resolve external references through `references` instead of the set's own library
    #[must_use]
    pub fn with_reference_resolver(mut self, references: Arc<dyn ReferenceResolver>) -> Self {
        self.references = Some(references);
        self
    }

    /// Report at most `limit` solutions
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &MatchPipeline {
        &self.pipeline
    }

    /// Resolve every requirement of `set` against one provider
    pub fn resolve_provider(&self, set: &RequirementSet, provider: &Provider) -> Vec<ComponentMatchResult> {
        let library = InMemoryReferenceResolver::from_requirement_set(set);
        let resolver = self.component_resolver(&library, !set.library.is_empty());
        resolver.resolve_all(&set.requirements, &provider.capabilities)
    }

    /// Match `set` against every provider in `catalog`.
    ///
    /// Providers are resolved in parallel; each one either yields a supply tree
    /// or a rejection. Solutions are filtered by `min_score` and ranked.
    pub fn solve(&self, set: &RequirementSet, catalog: &ProviderCatalog) -> SolveReport {
        if set.requirements.is_empty() {
            tracing::warn!("Requirement set '{}' has no requirements", set.id);
            return SolveReport {
                requirement_set: set.id.clone(),
                providers_considered: catalog.len(),
                solutions: Vec::new(),
                rejections: Vec::new(),
            };
        }

        let library = InMemoryReferenceResolver::from_requirement_set(set);
        let resolver = self.component_resolver(&library, !set.library.is_empty());

        tracing::info!(
            "Matching '{}' ({} requirements) against {} providers",
            set.id,
            set.total_requirements(),
            catalog.len()
        );

        let outcomes: Vec<ProviderOutcome> = catalog
            .providers
            .par_iter()
            .map(|provider| self.solve_provider(&resolver, set, provider))
            .collect();

        let mut solutions = Vec::new();
        let mut rejections = Vec::new();
        for outcome in outcomes {
            match outcome {
                ProviderOutcome::Solved(solution) if solution.score >= self.config.min_score => {
                    solutions.push(solution);
                }
                ProviderOutcome::Solved(solution) => {
                    if let Some(provider) = solution.provider().cloned() {
                        rejections.push(ProviderRejection {
                            provider,
                            reason: RejectionReason::BelowMinScore {
                                score: solution.score,
                                min_score: self.config.min_score,
                            },
                        });
                    }
                }
                ProviderOutcome::Rejected(rejection) => rejections.push(rejection),
            }
        }

        let mut ranker = SolutionRanker::new();
        if let Some(limit) = self.limit {
            ranker = ranker.with_limit(limit);
        }
        let solutions = ranker.rank(solutions);

        tracing::info!(
            "Found {} solution(s), {} provider(s) rejected",
            solutions.len(),
            rejections.len()
        );

        SolveReport {
            requirement_set: set.id.clone(),
            providers_considered: catalog.len(),
            solutions,
            rejections,
        }
    }

    fn component_resolver<'a>(
        &'a self,
        library: &'a InMemoryReferenceResolver,
        has_library: bool,
    ) -> ComponentResolver<'a> {
        let resolver = ComponentResolver::with_config(&self.pipeline, &self.config);
        match &self.references {
            Some(references) => resolver.with_reference_resolver(references.as_ref()),
            None if has_library => resolver.with_reference_resolver(library),
            None => resolver,
        }
    }

    fn solve_provider(
        &self,
        resolver: &ComponentResolver<'_>,
        set: &RequirementSet,
        provider: &Provider,
    ) -> ProviderOutcome {
        let results = resolver.resolve_all(&set.requirements, &provider.capabilities);

        let unsatisfied: Vec<UnsatisfiedRequirement> = results
            .iter()
            .filter(|r| !r.is_resolved())
            .map(|r| UnsatisfiedRequirement {
                requirement: r.requirement.id.clone(),
                outcome: r.outcome,
                errors: r.errors().iter().map(ToString::to_string).collect(),
            })
            .collect();
        if !unsatisfied.is_empty() {
            tracing::debug!(
                provider = %provider.id,
                "{} of {} requirement(s) unsatisfied",
                unsatisfied.len(),
                results.len()
            );
            return ProviderOutcome::Rejected(ProviderRejection {
                provider: provider.id.clone(),
                reason: RejectionReason::Unsatisfied {
                    requirements: unsatisfied,
                },
            });
        }

        let mut builder = TreeBuilder::new(&set.id, provider.id.clone());
        for result in &results {
            if let Err(e) = builder.add_result(result) {
                tracing::warn!(provider = %provider.id, "Supply tree construction failed: {e}");
                return ProviderOutcome::Rejected(ProviderRejection {
                    provider: provider.id.clone(),
                    reason: RejectionReason::TreeConstruction {
                        message: e.to_string(),
                    },
                });
            }
        }

        let mut tree = builder.build();
        tree.metadata
            .insert("requirement_set".to_string(), set.id.clone().into());
        tree.metadata
            .insert("provider_name".to_string(), provider.name.clone().into());
        if let Some(domain) = &provider.domain {
            tree.metadata.insert("domain".to_string(), domain.clone().into());
        }
        for (key, value) in &provider.metadata {
            tree.metadata.insert(format!("provider.{key}"), value.clone());
        }

        let solution = SupplyTreeSolution::new(tree);
        tracing::debug!(provider = %provider.id, score = solution.score, "Provider satisfies all requirements");
        ProviderOutcome::Solved(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::requirement::{Capability, ExternalReference, Requirement};

    fn catalog() -> ProviderCatalog {
        ProviderCatalog::from_providers([
            Provider::new("fab-lab", "Fab Lab").with_capabilities([
                Capability::new("cnc machining"),
                Capability::new("welding"),
            ]),
            Provider::new("print-shop", "Print Shop")
                .with_capability(Capability::new("3D Printing"))
                .with_metadata("location", "Lyon"),
            Provider::new("machine-shop", "Machine Shop")
                .with_capability(Capability::new("CNC Machining")),
        ])
        .unwrap()
    }

    #[test]
    fn test_solve_ranks_providers() {
        let set = RequirementSet::new("bracket", vec![Requirement::new("CNC Machining")]);
        let report = MatchingService::new().solve(&set, &catalog());

        assert_eq!(report.providers_considered, 3);
        assert_eq!(report.solutions.len(), 2);
        assert_eq!(report.solutions[0].provider().unwrap().as_str(), "machine-shop");
        assert!((report.solutions[0].score - 1.0).abs() < 1e-9);
        assert!((report.solutions[1].score - 0.95).abs() < 1e-9);

        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].provider.as_str(), "print-shop");
        assert!(matches!(
            report.rejections[0].reason,
            RejectionReason::Unsatisfied { .. }
        ));
    }

    #[test]
    fn test_no_satisfiable_provider_is_not_an_error() {
        let set = RequirementSet::new("quilt", vec![Requirement::new("Quilting")]);
        let report = MatchingService::new().solve(&set, &catalog());
        assert!(!report.is_solved());
        assert_eq!(report.rejections.len(), 3);
    }

    #[test]
    fn test_min_score_filters() {
        let config = MatchingConfig {
            min_score: 0.99,
            ..MatchingConfig::default()
        };
        let set = RequirementSet::new("bracket", vec![Requirement::new("CNC Machining")]);
        let report = MatchingService::with_config(config).solve(&set, &catalog());
        assert_eq!(report.solutions.len(), 1);
        assert!(report
            .rejections
            .iter()
            .any(|r| matches!(r.reason, RejectionReason::BelowMinScore { .. })));
    }

    #[test]
    fn test_limit() {
        let set = RequirementSet::new("bracket", vec![Requirement::new("CNC Machining")]);
        let report = MatchingService::new().with_limit(1).solve(&set, &catalog());
        assert_eq!(report.solutions.len(), 1);
    }

    #[test]
    fn test_library_references_resolved() {
        let set = RequirementSet::new(
            "frame",
            vec![Requirement::new("Frame").with_reference(ExternalReference::new("part", "frame"))],
        )
        .with_library_entry(
            ExternalReference::new("part", "frame"),
            Requirement::new("Frame Parts")
                .with_component(Requirement::new("Welding"))
                .with_component(Requirement::new("CNC Machining")),
        );
        let report = MatchingService::new().solve(&set, &catalog());
        assert_eq!(report.solutions.len(), 1);
        let solution = &report.solutions[0];
        assert_eq!(solution.provider().unwrap().as_str(), "fab-lab");
        assert_eq!(solution.metrics.resolution_depth, 2);
    }

    #[test]
    fn test_tree_metadata_records_provider() {
        let set = RequirementSet::new("part", vec![Requirement::new("3d printing")]);
        let report = MatchingService::new().solve(&set, &catalog());
        let tree = &report.solutions[0].tree;
        assert_eq!(tree.metadata["provider_name"], "Print Shop");
        assert_eq!(tree.metadata["provider.location"], "Lyon");
        assert_eq!(tree.metadata["requirement_set"], "part");
    }

    #[test]
    fn test_empty_requirement_set() {
        let set = RequirementSet::new("empty", vec![]);
        let report = MatchingService::new().solve(&set, &catalog());
        assert!(report.solutions.is_empty());
        assert!(report.rejections.is_empty());
    }
}
