use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::validation::slugify;

/// Parameter name → value mapping carried by requirements and capabilities
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Pointer to a requirement defined in another document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalReference {
    /// Kind of document the reference points into (e.g. "part", "design")
    pub kind: String,

    /// Identifier of the referenced requirement within that kind
    pub id: String,
}

impl ExternalReference {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A normalized statement of what must be produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Stable identifier, unique among siblings
    pub id: String,

    /// The process or component term to be matched
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Parameters,

    /// Sub-requirements of a compound (bill-of-materials) item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Requirement>,

    /// Requirement defined elsewhere that this one stands for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ExternalReference>,
}

impl Requirement {
    /// Create a requirement whose id is derived from its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            parameters: Parameters::new(),
            components: Vec::new(),
            reference: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_component(mut self, component: Requirement) -> Self {
        self.components.push(component);
        self
    }

    #[must_use]
    pub fn with_components(mut self, components: impl IntoIterator<Item = Requirement>) -> Self {
        self.components.extend(components);
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: ExternalReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn is_compound(&self) -> bool {
        !self.components.is_empty()
    }

    /// Number of requirements in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self.components.iter().map(Requirement::subtree_len).sum::<usize>()
    }
}

/// A normalized statement of what a provider can produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,

    /// The process or product term the provider supports
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Parameters,
}

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            parameters: Parameters::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// A requirement set as handed over by a domain extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub requirements: Vec<Requirement>,

    /// Requirements addressable through external references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library: Vec<LibraryEntry>,
}

/// A referenceable requirement stored alongside a requirement set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub reference: ExternalReference,
    pub requirement: Requirement,
}

impl RequirementSet {
    pub fn new(id: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            requirements,
            library: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_library_entry(mut self, reference: ExternalReference, requirement: Requirement) -> Self {
        self.library.push(LibraryEntry {
            reference,
            requirement,
        });
        self
    }

    /// Total number of requirement nodes, components included
    pub fn total_requirements(&self) -> usize {
        self.requirements.iter().map(Requirement::subtree_len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_id_derived_from_name() {
        let req = Requirement::new("CNC Machining");
        assert_eq!(req.id, "cnc-machining");
        assert_eq!(req.name, "CNC Machining");
    }

    #[test]
    fn test_subtree_len_counts_components() {
        let chair = Requirement::new("Chair")
            .with_component(Requirement::new("Wood Frame").with_component(Requirement::new("Timber Piece")))
            .with_component(Requirement::new("Cushion"));
        assert_eq!(chair.subtree_len(), 4);
        assert!(chair.is_compound());
    }

    #[test]
    fn test_requirement_deserializes_with_defaults() {
        let json = r#"{"id": "weld", "name": "Welding"}"#;
        let req: Requirement = serde_json::from_str(json).unwrap();
        assert!(req.parameters.is_empty());
        assert!(req.components.is_empty());
        assert!(req.reference.is_none());
    }

    #[test]
    fn test_external_reference_display() {
        let reference = ExternalReference::new("part", "frame-01");
        assert_eq!(reference.to_string(), "part:frame-01");
    }
}
