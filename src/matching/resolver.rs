//! Recursive component resolution.
//!
//! A requirement is first matched directly against the capability list. Only when
//! that fails is it decomposed: into its own components, or into the requirement
//! its external reference points to. Recursion is bounded by a maximum depth, and
//! external references already being resolved on the current path are treated as
//! unsatisfiable, so resolution always terminates.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::core::requirement::{Capability, ExternalReference, Requirement, RequirementSet};
use crate::core::types::MatchClassification;
use crate::matching::engine::{MatchPipeline, MatchingConfig, DEFAULT_MAX_DEPTH};
use crate::utils::validation::count_to_f64;

/// Why a branch failed to resolve
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionError {
    #[error("Requirement '{requirement}' references {reference} but no reference resolver is configured")]
    MissingResolver {
        requirement: String,
        reference: ExternalReference,
    },

    #[error("Reference {reference} not found")]
    ReferenceNotFound { reference: ExternalReference },

    #[error("Resolving reference {reference} failed: {message}")]
    ResolverFailed {
        reference: ExternalReference,
        message: String,
    },

    #[error("Reference {reference} is already being resolved on this path")]
    ReferenceCycle { reference: ExternalReference },
}

/// Looks up requirements defined outside the document being matched
pub trait ReferenceResolver: Send + Sync {
    /// Return the referenced requirement, or an error when it cannot be found
    fn resolve(&self, reference: &ExternalReference) -> Result<Requirement, ResolutionError>;
}

/// Reference resolver over an in-memory library of requirements
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceResolver {
    entries: HashMap<ExternalReference, Requirement>,
}

impl InMemoryReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the library of a requirement set
    pub fn from_requirement_set(set: &RequirementSet) -> Self {
        let mut resolver = Self::new();
        for entry in &set.library {
            resolver.insert(entry.reference.clone(), entry.requirement.clone());
        }
        resolver
    }

    pub fn insert(&mut self, reference: ExternalReference, requirement: Requirement) {
        self.entries.insert(reference, requirement);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReferenceResolver for InMemoryReferenceResolver {
    fn resolve(&self, reference: &ExternalReference) -> Result<Requirement, ResolutionError> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| ResolutionError::ReferenceNotFound {
                reference: reference.clone(),
            })
    }
}

/// Outcome of resolving one requirement node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// A capability matched the requirement itself
    DirectMatch,
    /// Every component (or the referenced requirement) resolved
    DecomposedMatch,
    /// Not satisfiable with the given capabilities
    NoMatch,
    /// Decomposition stopped at the depth limit; a deeper search might succeed
    DepthLimitReached,
}

impl ResolutionOutcome {
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::DirectMatch | Self::DecomposedMatch)
    }
}

impl std::fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectMatch => write!(f, "direct_match"),
            Self::DecomposedMatch => write!(f, "decomposed_match"),
            Self::NoMatch => write!(f, "no_match"),
            Self::DepthLimitReached => write!(f, "depth_limit_reached"),
        }
    }
}

/// Result of resolving one requirement node, with its decomposition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentMatchResult {
    pub outcome: ResolutionOutcome,

    /// The requirement this result is for
    pub requirement: Requirement,

    /// Matched capability (direct matches only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,

    /// Pipeline classification (direct matches only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<MatchClassification>,

    /// Results for components, or for the referenced requirement
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentMatchResult>,

    /// Pipeline confidence, or mean of children for decomposed matches
    pub confidence: f64,

    /// Recursion depth this result was produced at (root = 0)
    pub depth: usize,

    /// Failure reason on this node, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResolutionError>,
}

impl ComponentMatchResult {
    fn unresolved(requirement: &Requirement, outcome: ResolutionOutcome, depth: usize) -> Self {
        Self {
            outcome,
            requirement: requirement.clone(),
            capability: None,
            classification: None,
            children: Vec::new(),
            confidence: 0.0,
            depth,
            error: None,
        }
    }

    fn failed(requirement: &Requirement, depth: usize, error: ResolutionError) -> Self {
        Self {
            error: Some(error),
            ..Self::unresolved(requirement, ResolutionOutcome::NoMatch, depth)
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_resolved()
    }

    /// All failure reasons in this subtree, depth first
    pub fn errors(&self) -> Vec<&ResolutionError> {
        let mut errors: Vec<&ResolutionError> = self.error.iter().collect();
        for child in &self.children {
            errors.extend(child.errors());
        }
        errors
    }

    /// Capabilities used by direct matches in this subtree
    pub fn capabilities_used(&self) -> Vec<&Capability> {
        let mut used: Vec<&Capability> = self.capability.iter().collect();
        for child in &self.children {
            used.extend(child.capabilities_used());
        }
        used
    }

    /// Number of result nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Deepest depth reached in this subtree
    pub fn max_depth(&self) -> usize {
        self.children
            .iter()
            .map(Self::max_depth)
            .max()
            .unwrap_or(self.depth)
            .max(self.depth)
    }
}

/// Resolves requirements against a capability list, decomposing when needed
pub struct ComponentResolver<'a> {
    pipeline: &'a MatchPipeline,
    references: Option<&'a dyn ReferenceResolver>,
    max_depth: usize,
    track_visited: bool,
}

impl<'a> ComponentResolver<'a> {
    /// Create a resolver with the default depth limit and no reference resolver
    pub fn new(pipeline: &'a MatchPipeline) -> Self {
        Self {
            pipeline,
            references: None,
            max_depth: DEFAULT_MAX_DEPTH,
            track_visited: true,
        }
    }

    /// Create a resolver using the depth and cycle settings of `config`
    pub fn with_config(pipeline: &'a MatchPipeline, config: &MatchingConfig) -> Self {
        Self {
            pipeline,
            references: None,
            max_depth: config.max_depth,
            track_visited: config.track_visited_references,
        }
    }

    #[must_use]
    pub fn with_reference_resolver(mut self, references: &'a dyn ReferenceResolver) -> Self {
        self.references = Some(references);
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve one requirement
    pub fn resolve(&self, requirement: &Requirement, capabilities: &[Capability]) -> ComponentMatchResult {
        let mut path = Vec::new();
        self.resolve_at(requirement, capabilities, 0, &mut path)
    }

    /// Resolve each requirement independently; one failure never affects another
    pub fn resolve_all(
        &self,
        requirements: &[Requirement],
        capabilities: &[Capability],
    ) -> Vec<ComponentMatchResult> {
        requirements
            .iter()
            .map(|requirement| self.resolve(requirement, capabilities))
            .collect()
    }

    fn resolve_at(
        &self,
        requirement: &Requirement,
        capabilities: &[Capability],
        depth: usize,
        path: &mut Vec<ExternalReference>,
    ) -> ComponentMatchResult {
        // Step 1: direct match; a direct match is never decomposed
        let matched = self.pipeline.match_capabilities(&requirement.name, capabilities);
        if let Some(index) = matched.candidate_index {
            return ComponentMatchResult {
                outcome: ResolutionOutcome::DirectMatch,
                requirement: requirement.clone(),
                capability: Some(capabilities[index].clone()),
                confidence: matched.classification.confidence,
                classification: Some(matched.classification),
                children: Vec::new(),
                depth,
                error: None,
            };
        }

        // Step 2: depth bound; a plain leaf has nothing deeper to search
        if depth >= self.max_depth && (requirement.is_compound() || requirement.reference.is_some()) {
            tracing::debug!(depth, "Depth limit reached resolving '{}'", requirement.name);
            return ComponentMatchResult::unresolved(
                requirement,
                ResolutionOutcome::DepthLimitReached,
                depth,
            );
        }

        // A reference nobody can follow is malformed input, whether or not
        // the requirement also lists components
        if let (Some(reference), None) = (&requirement.reference, self.references) {
            let error = ResolutionError::MissingResolver {
                requirement: requirement.id.clone(),
                reference: reference.clone(),
            };
            tracing::warn!("{error}");
            return ComponentMatchResult::failed(requirement, depth, error);
        }

        // Step 3: decompose into components
        if requirement.is_compound() {
            let children: Vec<ComponentMatchResult> = requirement
                .components
                .iter()
                .map(|component| self.resolve_at(component, capabilities, depth + 1, path))
                .collect();
            return aggregate(requirement, depth, children);
        }

        // Step 4: follow the external reference
        if let (Some(reference), Some(references)) = (&requirement.reference, self.references) {
            if self.track_visited && path.contains(reference) {
                let error = ResolutionError::ReferenceCycle {
                    reference: reference.clone(),
                };
                tracing::warn!("{error}");
                return ComponentMatchResult::failed(requirement, depth, error);
            }

            let target = match references.resolve(reference) {
                Ok(target) => target,
                Err(error) => {
                    tracing::warn!("Could not resolve '{}': {error}", requirement.name);
                    return ComponentMatchResult::failed(requirement, depth, error);
                }
            };

            path.push(reference.clone());
            let child = self.resolve_at(&target, capabilities, depth + 1, path);
            path.pop();
            return aggregate(requirement, depth, vec![child]);
        }

        // Step 5: nothing left to try
        ComponentMatchResult::unresolved(requirement, ResolutionOutcome::NoMatch, depth)
    }
}

/// Combine child results into the parent's result.
///
/// All children resolved → decomposed match with the mean confidence. Otherwise
/// the parent is unresolved: depth-limited when every failing child only hit the
/// depth limit, no match when any child is genuinely unsatisfiable.
fn aggregate(
    requirement: &Requirement,
    depth: usize,
    children: Vec<ComponentMatchResult>,
) -> ComponentMatchResult {
    let (outcome, confidence) = if children.iter().all(ComponentMatchResult::is_resolved) {
        let total: f64 = children.iter().map(|c| c.confidence).sum();
        (
            ResolutionOutcome::DecomposedMatch,
            total / count_to_f64(children.len()),
        )
    } else if children
        .iter()
        .filter(|c| !c.is_resolved())
        .all(|c| c.outcome == ResolutionOutcome::DepthLimitReached)
    {
        (ResolutionOutcome::DepthLimitReached, 0.0)
    } else {
        (ResolutionOutcome::NoMatch, 0.0)
    };

    tracing::debug!(
        depth,
        %outcome,
        confidence,
        "Decomposed '{}' into {} part(s)",
        requirement.name,
        children.len()
    );

    ComponentMatchResult {
        outcome,
        requirement: requirement.clone(),
        capability: None,
        classification: None,
        children,
        confidence,
        depth,
        error: None,
    }
}
