//! Validate command - re-check a saved supply tree.
//!
//! Without data sources the tree is checked against its own snapshots. With
//! `--providers` (and optionally `--requirements`) it is checked against the
//! current state of its primary provider instead.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;

use crate::catalog::store::ProviderCatalog;
use crate::cli::solve::load_documents;
use crate::cli::{read_json, OutputFormat};
use crate::core::requirement::{Capability, RequirementSet};
use crate::domain::handler_for;
use crate::matching::engine::MatchPipeline;
use crate::tree::supply_tree::{SupplyTree, TreeIssue};

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// Supply tree JSON, as written by `solve --output`
    #[arg(required = true)]
    pub tree: PathBuf,

    /// Validate against this provider catalog instead of the stored snapshots
    #[arg(long)]
    pub providers: Option<PathBuf>,

    /// Requirement set that every requirement must still be claimed from (requires --providers)
    #[arg(long, requires = "providers")]
    pub requirements: Option<PathBuf>,

    /// Read raw documents of this domain for --providers and --requirements
    #[arg(short, long, requires = "requirements")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Snapshot,
    Live,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Live => "live",
        }
    }
}

/// Execute the validate command
///
/// # Errors
///
/// Returns an error if inputs cannot be read, or if the tree fails validation.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: ValidateArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let tree: SupplyTree = read_json(&args.tree)?;
    let pipeline = MatchPipeline::default();

    if verbose {
        eprintln!(
            "Tree {}: {} workflows, {} nodes, {} snapshots",
            tree.id,
            tree.workflows().len(),
            tree.node_count(),
            tree.snapshots().len()
        );
    }

    let (mode, issues) = match &args.providers {
        None => (Mode::Snapshot, tree.snapshot_issues(&pipeline)),
        Some(providers) => {
            let (set, catalog) = load_live_data(&args, providers)?;
            let capabilities = provider_capabilities(&tree, &catalog);
            let requirements = set.as_ref().map_or(&[][..], |s| s.requirements.as_slice());
            (Mode::Live, tree.live_issues(&pipeline, requirements, &capabilities))
        }
    };

    match format {
        OutputFormat::Text => print_text(&tree, mode, &issues),
        OutputFormat::Json => print_json(&tree, mode, &issues)?,
        OutputFormat::Tsv => print_tsv(mode, &issues),
    }

    if !issues.is_empty() {
        bail!("Supply tree failed {} validation with {} issue(s)", mode.as_str(), issues.len());
    }
    Ok(())
}

fn load_live_data(
    args: &ValidateArgs,
    providers: &Path,
) -> anyhow::Result<(Option<RequirementSet>, ProviderCatalog)> {
    match (&args.domain, &args.requirements) {
        (Some(domain), Some(requirements)) => {
            let handler = handler_for(domain).with_context(|| format!("Unknown domain '{domain}'"))?;
            let (set, catalog) = load_documents(handler.as_ref(), requirements, providers)?;
            Ok((Some(set), catalog))
        }
        (_, requirements) => {
            let catalog = ProviderCatalog::load_from_file(providers)
                .with_context(|| format!("Failed to load catalog {}", providers.display()))?;
            let set = requirements.as_deref().map(read_json::<RequirementSet>).transpose()?;
            Ok((set, catalog))
        }
    }
}

/// Capabilities of the tree's primary provider; empty when it left the catalog
fn provider_capabilities(tree: &SupplyTree, catalog: &ProviderCatalog) -> Vec<Capability> {
    let Some(provider_id) = &tree.primary_provider else {
        tracing::warn!("Tree {} has no primary provider; checking against all providers", tree.id);
        return catalog
            .providers
            .iter()
            .flat_map(|p| p.capabilities.iter().cloned())
            .collect();
    };
    match catalog.get(provider_id) {
        Some(provider) => provider.capabilities.clone(),
        None => {
            tracing::warn!("Provider '{provider_id}' is not in the catalog");
            Vec::new()
        }
    }
}

fn print_text(tree: &SupplyTree, mode: Mode, issues: &[TreeIssue]) {
    println!("\nSupply tree {} ({} validation)", tree.id, mode.as_str());
    if let Some(provider) = &tree.primary_provider {
        println!("   Provider: {provider}");
    }
    println!("   Confidence: {:.1}%", tree.calculate_confidence() * 100.0);

    if issues.is_empty() {
        println!("\n   Valid: no issues found");
    } else {
        println!("\n   {} issue(s):", issues.len());
        for issue in issues {
            println!("     - {issue}");
        }
    }
}

fn print_json(tree: &SupplyTree, mode: Mode, issues: &[TreeIssue]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "tree": tree.id,
        "provider": tree.primary_provider,
        "mode": mode.as_str(),
        "confidence": tree.calculate_confidence(),
        "valid": issues.is_empty(),
        "issues": issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv(mode: Mode, issues: &[TreeIssue]) {
    println!("mode\tissue");
    for issue in issues {
        println!("{}\t{issue}", mode.as_str());
    }
}
