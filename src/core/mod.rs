//! Core data types for requirement/capability matching.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Requirement`](requirement::Requirement): What must be produced, possibly compound
//! - [`Capability`](requirement::Capability): What a provider can produce
//! - [`RequirementSet`](requirement::RequirementSet): A batch of requirements plus a
//!   library of referenceable requirements
//! - [`ResourceReference`](reference::ResourceReference), [`ResourceSnapshot`](reference::ResourceSnapshot):
//!   Traceable addresses into source documents and captured copies of their content
//! - [`MatchQuality`](types::MatchQuality), [`MatchClassification`](types::MatchClassification):
//!   Result classification types
//!
//! ## Terms
//!
//! Requirements and capabilities are matched on their `name` term only. Parameters
//! are carried through to workflow nodes for traceability but do not influence
//! the match.

pub mod reference;
pub mod requirement;
pub mod types;
