//! Heuristic synonym and abbreviation rules.
//!
//! The default table is embedded at compile time from `rules/heuristic_rules.json`
//! (validated by `build.rs`) and parsed on first use. After that it is only ever
//! read, so concurrent matchers share it without synchronization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::matching::scoring::normalize_term;

/// Rule table version for compatibility checking
pub const RULES_VERSION: &str = "1.0.0";

const EMBEDDED_RULES: &str = include_str!("../../rules/heuristic_rules.json");

static DEFAULT_RULES: OnceLock<RuleTable> = OnceLock::new();

#[derive(Error, Debug)]
pub enum RuleTableError {
    #[error("Failed to read rule table: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse rule table: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Rule '{rule_id}' has confidence {confidence} outside [0.0, 1.0]")]
    InvalidConfidence { rule_id: String, confidence: f64 },

    #[error("Rule '{0}' has an empty canonical term or no alternates")]
    EmptyRule(String),

    #[error("Duplicate rule id '{0}'")]
    DuplicateId(String),
}

/// Kind of relation a rule expresses; sets its default confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Abbreviation,
    Process,
    Material,
}

impl RuleCategory {
    pub fn default_confidence(self) -> f64 {
        match self {
            Self::Abbreviation => 0.95,
            Self::Process => 0.9,
            Self::Material => 0.85,
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abbreviation => write!(f, "abbreviation"),
            Self::Process => write!(f, "process"),
            Self::Material => write!(f, "material"),
        }
    }
}

/// One canonical term and the alternate spellings it is known by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicRule {
    pub id: String,
    pub category: RuleCategory,
    pub canonical: String,
    pub alternates: Vec<String>,

    /// Overrides the category default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl HeuristicRule {
    pub fn confidence(&self) -> f64 {
        self.confidence
            .unwrap_or_else(|| self.category.default_confidence())
    }
}

/// Which way a rule was applied to produce an expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionDirection {
    /// canonical → alternate
    Forward,
    /// alternate → canonical
    Reverse,
    /// abbreviation replaced inside a longer phrase
    Phrase,
}

/// An alternate term a requirement term may correspond to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expansion {
    pub term: String,
    pub rule_id: String,
    pub confidence: f64,
    pub direction: ExpansionDirection,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    version: String,
    rules: Vec<HeuristicRule>,
}

/// Lookup table over heuristic rules, indexed both ways
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: Vec<HeuristicRule>,

    /// Index: normalized canonical term -> rule indices
    by_canonical: HashMap<String, Vec<usize>>,

    /// Index: normalized alternate term -> rule indices
    by_alternate: HashMap<String, Vec<usize>>,
}

/// The process-wide default rule table
pub fn default_rules() -> &'static RuleTable {
    DEFAULT_RULES.get_or_init(|| {
        RuleTable::from_json(EMBEDDED_RULES).unwrap_or_else(|e| {
            tracing::error!("Embedded heuristic rules are invalid, heuristics disabled: {e}");
            RuleTable::default()
        })
    })
}

impl RuleTable {
    /// Parse a rule table from its JSON form
    pub fn from_json(json: &str) -> Result<Self, RuleTableError> {
        let data: RuleFile = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if data.version != RULES_VERSION {
            tracing::warn!(
                "Rule table version mismatch (expected {}, found {})",
                RULES_VERSION,
                data.version
            );
        }

        Self::from_rules(data.rules)
    }

    /// Load a rule table from a JSON file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, RuleTableError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Build a table from rules, normalizing their terms
    pub fn from_rules(rules: Vec<HeuristicRule>) -> Result<Self, RuleTableError> {
        let mut table = Self::default();
        for rule in rules {
            table.add_rule(rule)?;
        }
        Ok(table)
    }

    fn add_rule(&mut self, mut rule: HeuristicRule) -> Result<(), RuleTableError> {
        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(RuleTableError::DuplicateId(rule.id));
        }
        let confidence = rule.confidence();
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RuleTableError::InvalidConfidence {
                rule_id: rule.id,
                confidence,
            });
        }

        rule.canonical = normalize_term(&rule.canonical);
        rule.alternates = rule
            .alternates
            .iter()
            .map(|a| normalize_term(a))
            .filter(|a| !a.is_empty() && *a != rule.canonical)
            .collect();
        if rule.canonical.is_empty() || rule.alternates.is_empty() {
            return Err(RuleTableError::EmptyRule(rule.id));
        }

        let index = self.rules.len();
        self.by_canonical
            .entry(rule.canonical.clone())
            .or_default()
            .push(index);
        for alternate in &rule.alternates {
            self.by_alternate
                .entry(alternate.clone())
                .or_default()
                .push(index);
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&HeuristicRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Canonical keys the given alternate spelling belongs to
    pub fn canonical_for(&self, alternate: &str) -> Vec<&str> {
        self.by_alternate
            .get(&normalize_term(alternate))
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| self.rules[i].canonical.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All terms `term` might correspond to, in rule order.
    ///
    /// Forward lookups (canonical → alternates) come first, then reverse lookups
    /// (alternate → canonical and sibling alternates), then abbreviation
    /// substitutions inside longer phrases. Each term appears once, with the
    /// highest confidence that produced it.
    pub fn expand(&self, term: &str) -> Vec<Expansion> {
        let norm = normalize_term(term);
        if norm.is_empty() {
            return Vec::new();
        }

        let mut expansions: Vec<Expansion> = Vec::new();

        for &index in self.by_canonical.get(&norm).into_iter().flatten() {
            let rule = &self.rules[index];
            for alternate in &rule.alternates {
                push_expansion(&mut expansions, alternate.clone(), rule, ExpansionDirection::Forward);
            }
        }

        for &index in self.by_alternate.get(&norm).into_iter().flatten() {
            let rule = &self.rules[index];
            push_expansion(&mut expansions, rule.canonical.clone(), rule, ExpansionDirection::Reverse);
            for sibling in rule.alternates.iter().filter(|a| **a != norm) {
                push_expansion(&mut expansions, sibling.clone(), rule, ExpansionDirection::Reverse);
            }
        }

        let tokens: Vec<&str> = norm.split_whitespace().collect();
        if tokens.len() > 1 {
            for rule in self
                .rules
                .iter()
                .filter(|r| r.category == RuleCategory::Abbreviation)
            {
                for alternate in &rule.alternates {
                    let substitutions = [
                        replace_phrase(&tokens, &rule.canonical, alternate),
                        replace_phrase(&tokens, alternate, &rule.canonical),
                    ];
                    for replaced in substitutions.into_iter().flatten() {
                        push_expansion(&mut expansions, replaced, rule, ExpansionDirection::Phrase);
                    }
                }
            }
        }

        expansions
    }
}

fn push_expansion(
    expansions: &mut Vec<Expansion>,
    term: String,
    rule: &HeuristicRule,
    direction: ExpansionDirection,
) {
    let confidence = rule.confidence();
    if let Some(existing) = expansions.iter_mut().find(|e| e.term == term) {
        if confidence > existing.confidence {
            existing.confidence = confidence;
            existing.rule_id.clone_from(&rule.id);
            existing.direction = direction;
        }
        return;
    }
    expansions.push(Expansion {
        term,
        rule_id: rule.id.clone(),
        confidence,
        direction,
    });
}

/// Replace the first whole-word occurrence of `from` in `tokens` with `to`
fn replace_phrase(tokens: &[&str], from: &str, to: &str) -> Option<String> {
    let needle: Vec<&str> = from.split_whitespace().collect();
    if needle.is_empty() || needle.len() >= tokens.len() {
        return None;
    }
    let start = tokens
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;

    let mut out: Vec<&str> = Vec::with_capacity(tokens.len());
    out.extend_from_slice(&tokens[..start]);
    out.push(to);
    out.extend_from_slice(&tokens[start + needle.len()..]);
    Some(out.join(" "))
}
