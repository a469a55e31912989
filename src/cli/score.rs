//! Score command - classify one requirement term against candidate capability terms.
//!
//! Runs the same layered pipeline used by `solve`, without a catalog, and shows
//! both the winning candidate and how every candidate scores on its own.

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::types::MatchClassification;
use crate::matching::engine::{DirectLayer, MatchPipeline, MatchingConfig, PipelineMatch};
use crate::matching::scoring::TermScorer;

/// Arguments for the score command
#[derive(Args)]
pub struct ScoreArgs {
    /// Requirement term
    #[arg(required = true)]
    pub requirement: String,

    /// Candidate capability terms
    #[arg(required = true, num_args = 1..)]
    pub candidates: Vec<String>,

    /// Maximum edit distance accepted as a near miss
    #[arg(long, default_value = "2")]
    pub max_distance: usize,

    /// Disable the heuristic rule layer
    #[arg(long)]
    pub no_heuristics: bool,
}

/// Execute the score command
///
/// # Errors
///
/// Returns an error if JSON output cannot be serialized.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: ScoreArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&args);
    if verbose {
        eprintln!("Pipeline layers: {:?}", pipeline.layer_kinds());
    }

    let candidates: Vec<&str> = args.candidates.iter().map(String::as_str).collect();
    let best = pipeline.match_term(&args.requirement, &candidates);

    let scorer = TermScorer::new(args.max_distance);
    let direct: Vec<MatchClassification> = candidates
        .iter()
        .map(|c| scorer.score(&args.requirement, c))
        .collect();

    match format {
        OutputFormat::Text => print_text(&args, &best, &direct),
        OutputFormat::Json => print_json(&args, &best, &direct)?,
        OutputFormat::Tsv => print_tsv(&args, &best, &direct),
    }

    Ok(())
}

fn build_pipeline(args: &ScoreArgs) -> MatchPipeline {
    let config = MatchingConfig {
        near_miss_max_distance: args.max_distance,
        ..MatchingConfig::default()
    };
    if args.no_heuristics {
        MatchPipeline::empty().with_layer(DirectLayer::new(TermScorer::new(config.near_miss_max_distance)))
    } else {
        MatchPipeline::from_config(&config)
    }
}

fn print_text(args: &ScoreArgs, best: &PipelineMatch, direct: &[MatchClassification]) {
    println!("\nRequirement: {}", args.requirement);

    match best.candidate_index {
        Some(index) => println!(
            "   Best match: {} ({}, confidence {:.2}, {} layer)",
            args.candidates[index],
            best.classification.quality,
            best.classification.confidence,
            best.layer.as_ref().map_or_else(|| "-".to_string(), ToString::to_string)
        ),
        None => println!("   No candidate matches"),
    }

    println!("\n   Direct comparison:");
    for (candidate, classification) in args.candidates.iter().zip(direct) {
        let distance = classification
            .edit_distance()
            .map(|d| format!(", distance {d}"))
            .unwrap_or_default();
        println!(
            "     {candidate}: {} ({:.2}{distance})",
            classification.quality, classification.confidence
        );
    }
}

fn print_json(args: &ScoreArgs, best: &PipelineMatch, direct: &[MatchClassification]) -> anyhow::Result<()> {
    let candidates: Vec<_> = args
        .candidates
        .iter()
        .zip(direct)
        .map(|(candidate, classification)| {
            serde_json::json!({
                "candidate": candidate,
                "classification": classification,
            })
        })
        .collect();

    let output = serde_json::json!({
        "requirement": args.requirement,
        "best": {
            "candidate": best.candidate_index.map(|i| &args.candidates[i]),
            "layer": best.layer,
            "classification": best.classification,
        },
        "candidates": candidates,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv(args: &ScoreArgs, best: &PipelineMatch, direct: &[MatchClassification]) {
    println!("requirement\tcandidate\tquality\tconfidence\tbest");
    for (i, (candidate, classification)) in args.candidates.iter().zip(direct).enumerate() {
        println!(
            "{}\t{}\t{}\t{:.4}\t{}",
            args.requirement,
            candidate,
            classification.quality,
            classification.confidence,
            best.candidate_index == Some(i)
        );
    }
}
