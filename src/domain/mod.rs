//! Domain-specific document extraction.
//!
//! The matching core only sees normalized requirements and [`Capability`] records.
//! A [`DomainHandler`] turns the raw JSON documents of one domain (design
//! manifests and facility descriptions, recipes and kitchens, ...) into those
//! records, chooses the match pipeline for its vocabulary, and may add
//! domain-specific warnings to a finished supply tree.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::store::Provider;
use crate::core::requirement::{Capability, Parameters, RequirementSet};
use crate::matching::engine::{MatchPipeline, MatchingConfig};
use crate::tree::supply_tree::SupplyTree;
use crate::utils::validation::{check_capability_limit, slugify};

pub mod cooking;
pub mod manufacturing;

pub use cooking::CookingHandler;
pub use manufacturing::ManufacturingHandler;

/// Names accepted by [`handler_for`]
pub const DOMAINS: &[&str] = &["manufacturing", "cooking"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{field}' must be {expected}")]
    InvalidField { field: String, expected: &'static str },

    #[error("{0}")]
    TooManyCapabilities(String),
}

/// Per-domain extraction, matching and validation
pub trait DomainHandler: Send + Sync {
    /// Domain name, as accepted by [`handler_for`]
    fn name(&self) -> &'static str;

    /// Normalize a requirement document (design, recipe, ...)
    fn extract_requirements(&self, document: &Value) -> Result<RequirementSet, ExtractError>;

    /// Normalize a provider document (facility, kitchen, ...)
    fn extract_provider(&self, document: &Value) -> Result<Provider, ExtractError>;

    /// Pipeline used to match this domain's terms
    fn pipeline(&self, config: &MatchingConfig) -> MatchPipeline {
        MatchPipeline::from_config(config)
    }

    /// Domain-specific warnings about a supply tree; empty when nothing stands out
    fn validate(&self, _tree: &SupplyTree) -> Vec<String> {
        Vec::new()
    }
}

/// Select a handler by domain name
pub fn handler_for(name: &str) -> Option<Box<dyn DomainHandler>> {
    match name.trim().to_lowercase().as_str() {
        "manufacturing" => Some(Box::new(ManufacturingHandler)),
        "cooking" => Some(Box::new(CookingHandler)),
        _ => None,
    }
}

pub(crate) fn as_object(document: &Value) -> Result<&Map<String, Value>, ExtractError> {
    document.as_object().ok_or(ExtractError::NotAnObject)
}

/// First present string field among `fields`
pub(crate) fn string_field<'a>(object: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| object.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The document id, or a slug of its title when no id is given
pub(crate) fn document_id(object: &Map<String, Value>, title_fields: &[&str]) -> Result<String, ExtractError> {
    if let Some(id) = string_field(object, &["id"]) {
        return Ok(id.to_string());
    }
    string_field(object, title_fields)
        .map(slugify)
        .ok_or_else(|| ExtractError::MissingField(title_fields.first().copied().unwrap_or("id").to_string()))
}

/// Optional array field; absent means empty
pub(crate) fn array_field<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a [Value], ExtractError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ExtractError::InvalidField {
            field: field.to_string(),
            expected: "an array",
        }),
    }
}

/// A list entry that is either a bare term or an object with a name and parameters.
///
/// For objects, `name_fields` are tried in order; an explicit `parameters` object
/// is used as-is, otherwise every other scalar field becomes a parameter.
pub(crate) fn named_entry(
    entry: &Value,
    field: &str,
    name_fields: &[&str],
) -> Result<(String, Parameters), ExtractError> {
    match entry {
        Value::String(name) if !name.trim().is_empty() => Ok((name.trim().to_string(), Parameters::new())),
        Value::Object(object) => {
            let name = string_field(object, name_fields).ok_or_else(|| ExtractError::InvalidField {
                field: field.to_string(),
                expected: "entries with a name",
            })?;
            let parameters = match object.get("parameters") {
                Some(Value::Object(parameters)) => parameters.clone().into_iter().collect(),
                _ => object
                    .iter()
                    .filter(|(key, value)| !name_fields.contains(&key.as_str()) && !value.is_array() && !value.is_object())
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            };
            Ok((name.to_string(), parameters))
        }
        _ => Err(ExtractError::InvalidField {
            field: field.to_string(),
            expected: "a list of names or objects",
        }),
    }
}

/// Append a capability unless one with the same id is already present
pub(crate) fn push_capability(capabilities: &mut Vec<Capability>, capability: Capability) -> Result<(), ExtractError> {
    if capabilities.iter().any(|c| c.id == capability.id) {
        return Ok(());
    }
    if let Some(message) = check_capability_limit(capabilities.len()) {
        return Err(ExtractError::TooManyCapabilities(message));
    }
    capabilities.push(capability);
    Ok(())
}

/// Copy the listed scalar fields into provider metadata
pub(crate) fn copy_metadata(provider: &mut Provider, object: &Map<String, Value>, fields: &[&str]) {
    for field in fields {
        if let Some(value) = object.get(*field).filter(|v| !v.is_null()) {
            provider.metadata.insert((*field).to_string(), value.clone());
        }
    }
}
