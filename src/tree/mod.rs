//! Supply tree graph model.
//!
//! Resolver output is turned into [`workflow::Workflow`] DAGs by the
//! [`builder`], aggregated into a [`supply_tree::SupplyTree`] per provider, and
//! ranked as [`solution::SupplyTreeSolution`]s.

pub mod builder;
pub mod solution;
pub mod supply_tree;
pub mod workflow;
