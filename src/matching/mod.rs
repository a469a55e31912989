//! Requirement-to-capability matching and decomposition.
//!
//! This module provides the core matching functionality:
//!
//! - [`scoring`]: pairwise term classification (exact, case difference, near miss)
//! - [`heuristics`]: the synonym and abbreviation rule table
//! - [`engine`]: the layered [`engine::MatchPipeline`] and [`engine::MatchingConfig`]
//! - [`resolver`]: recursive component resolution with a depth bound
//! - [`service`]: the [`service::MatchingService`] that runs everything per provider
//!
//! ## Matching Algorithm
//!
//! A requirement term is compared against a provider's capability terms by an
//! ordered list of layers; the first layer that matches any candidate wins:
//!
//! 1. **Direct**: byte equality (1.0), case-insensitive equality (0.95), or a
//!    Levenshtein distance of at most 2 (0.8)
//! 2. **Heuristic**: the term is expanded through the rule table and each
//!    expansion compared exactly against the candidates; the rule's confidence
//!    is used
//! 3. **Custom**: any appended [`engine::MatchLayer`]
//!
//! A requirement with no direct match is decomposed into its components (or the
//! requirement its external reference points to), and succeeds only when every
//! part resolves. The decomposed confidence is the mean of the parts.
//!
//! ## Example
//!
//! ```rust
//! use supply_solver::matching::engine::MatchPipeline;
//! use supply_solver::matching::resolver::{ComponentResolver, ResolutionOutcome};
//! use supply_solver::core::requirement::{Capability, Requirement};
//!
//! let pipeline = MatchPipeline::default();
//! let resolver = ComponentResolver::new(&pipeline);
//!
//! let table = Requirement::new("Table")
//!     .with_component(Requirement::new("Sanding"))
//!     .with_component(Requirement::new("Varnishing"));
//! let capabilities = vec![Capability::new("sanding"), Capability::new("varnishing")];
//!
//! let result = resolver.resolve(&table, &capabilities);
//! assert_eq!(result.outcome, ResolutionOutcome::DecomposedMatch);
//! assert!((result.confidence - 0.95).abs() < 1e-9);
//! ```

pub mod engine;
pub mod heuristics;
pub mod resolver;
pub mod scoring;
pub mod service;
