//! # supply-solver
//!
//! A library for deciding whether a set of providers can satisfy a set of
//! requirements, and for producing a traceable plan when they can.
//!
//! A design needs processes and parts; a fabrication facility offers processes
//! and equipment. A recipe needs techniques and ingredients; a kitchen offers
//! appliances and skills. The vocabulary on both sides rarely lines up exactly,
//! and requirements are often compound. `supply-solver` bridges that gap and
//! records every decision in a *supply tree*.
//!
//! ## Features
//!
//! - **Layered term matching**: exact, case-insensitive and near-miss comparison,
//!   then synonym and abbreviation rules, then any custom layer
//! - **Recursive decomposition**: compound requirements and library references are
//!   resolved component by component, with a depth bound and cycle detection
//! - **Supply trees**: acyclic workflows of steps, each tied to the requirement
//!   it satisfies and the capability used, with checksummed snapshots
//! - **Re-validation**: saved trees can be checked against their snapshots or
//!   against live provider data
//! - **Ranking**: one solution per provider, ordered by confidence
//!
//! ## Example
//!
//! ```rust
//! use supply_solver::{Capability, MatchingService, Provider, ProviderCatalog, Requirement, RequirementSet};
//!
//! let set = RequirementSet::new("bracket", vec![Requirement::new("CNC Machining")]);
//! let catalog = ProviderCatalog::from_providers([
//!     Provider::new("machine-shop", "Machine Shop").with_capability(Capability::new("cnc machining")),
//!     Provider::new("print-shop", "Print Shop").with_capability(Capability::new("3D Printing")),
//! ])
//! .unwrap();
//!
//! let report = MatchingService::new().solve(&set, &catalog);
//! assert_eq!(report.solutions.len(), 1);
//! assert_eq!(report.solutions[0].provider().unwrap().as_str(), "machine-shop");
//! assert_eq!(report.rejections.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Provider catalog storage
//! - [`core`]: Requirements, capabilities, references and match classifications
//! - [`domain`]: Extraction of requirements and providers from domain documents
//! - [`matching`]: Match pipeline, component resolution and the matching service
//! - [`tree`]: Workflows, supply trees, tree construction and ranking
//! - [`cli`]: Command-line interface implementation

pub mod catalog;
pub mod cli;
pub mod core;
pub mod domain;
pub mod matching;
pub mod tree;
pub mod utils;

// Re-export commonly used types for convenience
pub use catalog::store::{Provider, ProviderCatalog};
pub use core::reference::{ResourceReference, ResourceSnapshot};
pub use core::requirement::{Capability, ExternalReference, Requirement, RequirementSet};
pub use core::types::*;
pub use matching::engine::{MatchPipeline, MatchingConfig};
pub use matching::resolver::{ComponentMatchResult, ComponentResolver, ResolutionOutcome};
pub use matching::service::{MatchingService, SolveReport};
pub use tree::solution::{SolutionRanker, SupplyTreeSolution};
pub use tree::supply_tree::SupplyTree;
pub use tree::workflow::{Workflow, WorkflowNode};
