//! Solve command - match a requirement set against every provider in a catalog.
//!
//! Inputs are either the normalized JSON forms (a requirement set and a provider
//! catalog) or, with `--domain`, the raw documents of that domain: one design or
//! recipe, and one facility or kitchen document (or an array of them).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use serde_json::Value;

use crate::catalog::store::ProviderCatalog;
use crate::cli::{read_json, OutputFormat};
use crate::core::requirement::RequirementSet;
use crate::domain::{handler_for, DomainHandler, DOMAINS};
use crate::matching::engine::MatchingConfig;
use crate::matching::service::{MatchingService, SolveReport};
use crate::utils::validation::validate_requirement_set;

/// Arguments for the solve command
#[derive(Args)]
pub struct SolveArgs {
    /// Requirement set JSON (or a domain requirement document with --domain)
    #[arg(required = true)]
    pub requirements: PathBuf,

    /// Provider catalog JSON (or domain provider documents with --domain)
    #[arg(required = true)]
    pub providers: PathBuf,

    /// Read raw documents of this domain (manufacturing, cooking)
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Matching configuration JSON; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum decomposition depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Drop solutions scoring below this value (0.0-1.0)
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Number of solutions to show
    #[arg(short = 'n', long, default_value = "5")]
    pub limit: usize,

    /// Write the best supply tree as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the solve command
///
/// # Errors
///
/// Returns an error if inputs cannot be read or parsed, or the configuration is invalid.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: SolveArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    let handler = match args.domain.as_deref() {
        Some(name) => Some(handler_for(name).with_context(|| {
            format!("Unknown domain '{name}' (expected one of: {})", DOMAINS.join(", "))
        })?),
        None => None,
    };

    let (set, catalog) = match &handler {
        Some(handler) => load_documents(handler.as_ref(), &args.requirements, &args.providers)?,
        None => (
            read_json::<RequirementSet>(&args.requirements)?,
            ProviderCatalog::load_from_file(&args.providers)
                .with_context(|| format!("Failed to load catalog {}", args.providers.display()))?,
        ),
    };
    validate_requirement_set(&set)?;

    if verbose {
        eprintln!(
            "Requirement set '{}': {} requirements ({} library entries)",
            set.id,
            set.total_requirements(),
            set.library.len()
        );
        eprintln!(
            "Catalog: {} providers, {} capabilities",
            catalog.len(),
            catalog.capability_count()
        );
        eprintln!(
            "Max depth {}, min score {:.2}",
            config.max_depth, config.min_score
        );
    }

    let service = build_service(handler.as_deref(), config, args.limit);
    let report = service.solve(&set, &catalog);

    let warnings: Vec<String> = match (&handler, report.solutions.first()) {
        (Some(handler), Some(best)) => handler.validate(&best.tree),
        _ => Vec::new(),
    };

    if let Some(path) = &args.output {
        match report.solutions.first() {
            Some(best) => {
                std::fs::write(path, best.tree.to_json()?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if verbose {
                    eprintln!("Wrote best supply tree to {}", path.display());
                }
            }
            None => tracing::warn!("No solution found; {} not written", path.display()),
        }
    }

    match format {
        OutputFormat::Text => print_text(&report, &warnings, verbose),
        OutputFormat::Json => print_json(&report, &warnings)?,
        OutputFormat::Tsv => print_tsv(&report),
    }

    Ok(())
}

fn load_config(args: &SolveArgs) -> anyhow::Result<MatchingConfig> {
    let mut config = match &args.config {
        Some(path) => MatchingConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MatchingConfig::default(),
    };
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }
    if let Some(min_score) = args.min_score {
        if !(0.0..=1.0).contains(&min_score) {
            bail!("--min-score must be between 0.0 and 1.0, got {min_score}");
        }
        config.min_score = min_score;
    }
    Ok(config.validated()?)
}

/// Extract a requirement set and provider catalog from raw domain documents
pub(crate) fn load_documents(
    handler: &dyn DomainHandler,
    requirements: &Path,
    providers: &Path,
) -> anyhow::Result<(RequirementSet, ProviderCatalog)> {
    let document: Value = read_json(requirements)?;
    let set = handler
        .extract_requirements(&document)
        .with_context(|| format!("Invalid {} document {}", handler.name(), requirements.display()))?;

    let documents = match read_json::<Value>(providers)? {
        Value::Array(items) => items,
        single => vec![single],
    };
    let providers = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            handler
                .extract_provider(doc)
                .with_context(|| format!("Invalid provider #{} in {}", i + 1, providers.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok((set, ProviderCatalog::from_providers(providers)?))
}

fn print_text(report: &SolveReport, warnings: &[String], verbose: bool) {
    println!(
        "\nRequirement set: {} ({} providers considered)",
        report.requirement_set, report.providers_considered
    );

    if report.solutions.is_empty() {
        println!("\nNo provider satisfies every requirement.");
    }

    for (i, solution) in report.solutions.iter().enumerate() {
        let name = solution
            .tree
            .metadata
            .get("provider_name")
            .and_then(Value::as_str)
            .unwrap_or("(unnamed)");
        let provider = solution.provider().map_or("-", |p| p.as_str());
        println!(
            "\n#{} {} [{}]  score {:.1}% ({:?})",
            i + 1,
            name,
            provider,
            solution.score * 100.0,
            solution.confidence_level()
        );
        let m = &solution.metrics;
        println!(
            "   {} nodes in {} workflow(s), {} capabilities, {} stages, depth {}",
            m.node_count, m.workflow_count, m.capability_count, m.estimated_stages, m.resolution_depth
        );

        if verbose {
            for node in solution.tree.nodes() {
                let capability = node
                    .capability_ref
                    .as_ref()
                    .map_or_else(|| "(decomposed)".to_string(), ToString::to_string);
                println!("     - {} -> {} ({:.2})", node.name, capability, node.confidence);
            }
        }
    }

    if !report.rejections.is_empty() {
        println!("\nRejected providers:");
        for rejection in &report.rejections {
            println!("   {}: {}", rejection.provider, rejection.reason);
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in warnings {
            println!("   {warning}");
        }
    }
}

fn print_json(report: &SolveReport, warnings: &[String]) -> anyhow::Result<()> {
    let solutions: Vec<_> = report
        .solutions
        .iter()
        .map(|s| {
            serde_json::json!({
                "provider": s.provider(),
                "score": s.score,
                "confidence": format!("{:?}", s.confidence_level()),
                "metrics": s.metrics,
                "tree": s.tree,
            })
        })
        .collect();

    let output = serde_json::json!({
        "requirement_set": report.requirement_set,
        "providers_considered": report.providers_considered,
        "solutions": solutions,
        "rejections": report.rejections,
        "warnings": warnings,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Matching service for the run; a domain handler supplies its own pipeline
pub(crate) fn build_service(
    handler: Option<&dyn DomainHandler>,
    config: MatchingConfig,
    limit: usize,
) -> MatchingService {
    let pipeline = handler.map(|h| h.pipeline(&config));
    let service = MatchingService::with_config(config).with_limit(limit);
    match pipeline {
        Some(pipeline) => service.with_pipeline(pipeline),
        None => service,
    }
}

fn print_tsv(report: &SolveReport) {
    println!("rank\tprovider\tscore\tconfidence\tnodes\tworkflows\tstages\tdepth");
    for (i, s) in report.solutions.iter().enumerate() {
        println!(
            "{}\t{}\t{:.4}\t{:?}\t{}\t{}\t{}\t{}",
            i + 1,
            s.provider().map_or("-", |p| p.as_str()),
            s.score,
            s.confidence_level(),
            s.metrics.node_count,
            s.metrics.workflow_count,
            s.metrics.estimated_stages,
            s.metrics.resolution_depth
        );
    }
}
