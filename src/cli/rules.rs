//! Rules command - list heuristic rules or expand a term through them.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::cli::OutputFormat;
use crate::matching::heuristics::{default_rules, Expansion, HeuristicRule, RuleTable};

/// Arguments for the rules command
#[derive(Args)]
pub struct RulesArgs {
    /// Show the expansions of this term instead of listing rules
    #[arg(short, long)]
    pub term: Option<String>,

    /// Use a custom rule table instead of the built-in one
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Only list rules of this category (abbreviation, process, material)
    #[arg(long)]
    pub category: Option<String>,
}

/// Execute the rules command
///
/// # Errors
///
/// Returns an error if a custom rule table cannot be loaded.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: RulesArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let custom = match &args.rules {
        Some(path) => Some(
            RuleTable::load_from_file(path)
                .with_context(|| format!("Failed to load rules {}", path.display()))?,
        ),
        None => None,
    };
    let table = match &custom {
        Some(table) => table,
        None => default_rules(),
    };

    if verbose {
        eprintln!("Rule table: {} rules", table.len());
    }

    if let Some(term) = &args.term {
        let expansions = table.expand(term);
        match format {
            OutputFormat::Text => print_expansions_text(term, &expansions),
            OutputFormat::Json => print_json(&serde_json::json!({
                "term": term,
                "expansions": expansions,
            }))?,
            OutputFormat::Tsv => print_expansions_tsv(term, &expansions),
        }
        return Ok(());
    }

    let rules: Vec<&HeuristicRule> = table
        .rules()
        .iter()
        .filter(|r| {
            args.category
                .as_deref()
                .map_or(true, |c| r.category.to_string().eq_ignore_ascii_case(c))
        })
        .collect();

    match format {
        OutputFormat::Text => print_rules_text(&rules),
        OutputFormat::Json => print_json(&serde_json::json!({ "rules": rules }))?,
        OutputFormat::Tsv => print_rules_tsv(&rules),
    }
    Ok(())
}

fn print_rules_text(rules: &[&HeuristicRule]) {
    println!("\n{:<24} {:<14} {:<6} {:<24} ALTERNATES", "ID", "CATEGORY", "CONF", "CANONICAL");
    println!("{}", "-".repeat(100));
    for rule in rules {
        println!(
            "{:<24} {:<14} {:<6.2} {:<24} {}",
            rule.id,
            rule.category.to_string(),
            rule.confidence(),
            rule.canonical,
            rule.alternates.join(", ")
        );
    }
    println!("\nTotal: {} rules", rules.len());
}

fn print_rules_tsv(rules: &[&HeuristicRule]) {
    println!("id\tcategory\tconfidence\tcanonical\talternates");
    for rule in rules {
        println!(
            "{}\t{}\t{:.2}\t{}\t{}",
            rule.id,
            rule.category,
            rule.confidence(),
            rule.canonical,
            rule.alternates.join(",")
        );
    }
}

fn print_expansions_text(term: &str, expansions: &[Expansion]) {
    if expansions.is_empty() {
        println!("\nNo rule applies to '{term}'");
        return;
    }
    println!("\nExpansions of '{term}':");
    for expansion in expansions {
        println!(
            "   {} ({:.2}, {}, {:?})",
            expansion.term, expansion.confidence, expansion.rule_id, expansion.direction
        );
    }
}

fn print_expansions_tsv(term: &str, expansions: &[Expansion]) {
    println!("term\texpansion\tconfidence\trule\tdirection");
    for expansion in expansions {
        println!(
            "{term}\t{}\t{:.2}\t{}\t{:?}",
            expansion.term, expansion.confidence, expansion.rule_id, expansion.direction
        );
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
