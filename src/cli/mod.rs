//! Command-line interface for supply-solver.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **solve**: Match a requirement set against a provider catalog and rank supply trees
//! - **score**: Classify a single term against candidate capability terms
//! - **validate**: Re-check a saved supply tree against its snapshots or live data
//! - **rules**: List heuristic rules or show the expansions of a term
//!
//! ## Usage
//!
//! ```text
//! # Solve a normalized requirement set against a catalog
//! supply-solver solve requirements.json providers.json
//!
//! # Solve raw domain documents and keep the best tree
//! supply-solver solve design.json facilities.json --domain manufacturing --output tree.json
//!
//! # JSON output for scripting
//! supply-solver solve requirements.json providers.json --format json
//!
//! # Why does a term match (or not)?
//! supply-solver score "CNC Machining" "Milling" "cnc machinng"
//!
//! # Check a saved tree against the catalog it was built from
//! supply-solver validate tree.json --providers providers.json --requirements requirements.json
//! ```

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

pub mod rules;
pub mod score;
pub mod solve;
pub mod validate;

#[derive(Parser)]
#[command(name = "supply-solver")]
#[command(version)]
#[command(about = "Match requirement sets against provider capabilities")]
#[command(
    long_about = "supply-solver decides whether a set of providers can satisfy a set of requirements.\n\nEach requirement is matched directly (exact, case-insensitive or near-miss), through heuristic synonym rules, or by decomposing it into components. Every provider that satisfies the whole set yields a supply tree:\n- A workflow of the steps involved, with the capability used at each step\n- Snapshots of the source data for later re-validation\n- A confidence score used for ranking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match requirements against providers and rank supply trees
    Solve(solve::SolveArgs),

    /// Classify a term against candidate capability terms
    Score(score::ScoreArgs),

    /// Validate a saved supply tree
    Validate(validate::ValidateArgs),

    /// Inspect the heuristic rule table
    Rules(rules::RulesArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Read and deserialize a JSON input file
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
