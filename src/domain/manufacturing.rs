//! Manufacturing: hardware designs against fabrication facilities.
//!
//! A design document lists top-level `manufacturing_processes` and a bill of
//! materials in `parts`; parts nest and may point at a shared definition in the
//! design's `library` through a `reference`. A facility document lists
//! `manufacturing_processes` and `equipment`; each equipment entry contributes
//! itself and the processes it lists as capabilities.

use serde_json::{Map, Value};

use crate::catalog::store::Provider;
use crate::core::requirement::{Capability, ExternalReference, Parameters, Requirement, RequirementSet};
use crate::domain::{
    array_field, as_object, copy_metadata, document_id, named_entry, push_capability, string_field,
    DomainHandler, ExtractError,
};
use crate::matching::scoring::NEAR_MISS_CONFIDENCE;
use crate::tree::supply_tree::SupplyTree;

const PROCESSES: &str = "manufacturing_processes";

/// Facility fields carried into provider metadata
const FACILITY_METADATA: &[&str] = &["location", "access_type", "facility_status", "owner"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ManufacturingHandler;

impl DomainHandler for ManufacturingHandler {
    fn name(&self) -> &'static str {
        "manufacturing"
    }

    fn extract_requirements(&self, document: &Value) -> Result<RequirementSet, ExtractError> {
        let object = as_object(document)?;
        let id = document_id(object, &["title", "name"])?;

        let mut requirements = processes(object)?;
        for part in array_field(object, "parts")? {
            requirements.push(extract_part(part)?);
        }
        if requirements.is_empty() {
            return Err(ExtractError::MissingField(PROCESSES.to_string()));
        }

        let mut set = RequirementSet::new(id, requirements);
        if let Some(title) = string_field(object, &["title", "name"]) {
            set.name = title.to_string();
        }
        for entry in array_field(object, "library")? {
            let entry = as_object(entry)?;
            let kind = string_field(entry, &["kind"]).unwrap_or("part");
            let part = entry
                .get("part")
                .ok_or_else(|| ExtractError::MissingField("library.part".to_string()))?;
            let requirement = extract_part(part)?;
            let reference_id = string_field(entry, &["id"]).map_or_else(|| requirement.id.clone(), str::to_string);
            set = set.with_library_entry(ExternalReference::new(kind, reference_id), requirement);
        }
        Ok(set)
    }

    fn extract_provider(&self, document: &Value) -> Result<Provider, ExtractError> {
        let object = as_object(document)?;
        let id = document_id(object, &["name"])?;
        let name = string_field(object, &["name"]).unwrap_or(&id).to_string();

        let mut capabilities = Vec::new();
        for entry in array_field(object, PROCESSES)? {
            let (name, parameters) = named_entry(entry, PROCESSES, &["name", "process"])?;
            push_capability(&mut capabilities, with_parameters(Capability::new(name), parameters))?;
        }
        for entry in array_field(object, "equipment")? {
            let (name, parameters) = named_entry(entry, "equipment", &["name", "type"])?;
            push_capability(&mut capabilities, with_parameters(Capability::new(name), parameters))?;
            if let Value::Object(equipment) = entry {
                for process in array_field(equipment, "processes")? {
                    let (name, parameters) = named_entry(process, "equipment.processes", &["name", "process"])?;
                    push_capability(&mut capabilities, with_parameters(Capability::new(name), parameters))?;
                }
            }
        }

        let mut provider = Provider::new(id, name)
            .with_domain(self.name())
            .with_capabilities(capabilities);
        copy_metadata(&mut provider, object, FACILITY_METADATA);
        Ok(provider)
    }

    fn validate(&self, tree: &SupplyTree) -> Vec<String> {
        tree.nodes()
            .filter(|node| node.capability_ref.is_some() && node.confidence <= NEAR_MISS_CONFIDENCE)
            .map(|node| {
                format!(
                    "Process '{}' matched with confidence {:.2}; confirm the facility can perform it",
                    node.name, node.confidence
                )
            })
            .collect()
    }
}

fn with_parameters(mut capability: Capability, parameters: Parameters) -> Capability {
    capability.parameters = parameters;
    capability
}

fn processes(object: &Map<String, Value>) -> Result<Vec<Requirement>, ExtractError> {
    array_field(object, PROCESSES)?
        .iter()
        .map(|entry| {
            let (name, parameters) = named_entry(entry, PROCESSES, &["name", "process"])?;
            let mut requirement = Requirement::new(name);
            requirement.parameters = parameters;
            Ok(requirement)
        })
        .collect()
}

/// A part becomes a compound requirement of its processes and sub-parts
fn extract_part(part: &Value) -> Result<Requirement, ExtractError> {
    let object = as_object(part)?;
    let name = string_field(object, &["name", "title"])
        .ok_or_else(|| ExtractError::MissingField("parts.name".to_string()))?;

    let mut requirement = Requirement::new(name).with_components(processes(object)?);
    if let Some(id) = string_field(object, &["id"]) {
        requirement = requirement.with_id(id);
    }
    for sub_part in array_field(object, "parts")? {
        requirement = requirement.with_component(extract_part(sub_part)?);
    }
    if let Some(reference) = object.get("reference").and_then(Value::as_object) {
        let kind = string_field(reference, &["kind", "type"]).unwrap_or("part");
        let id = string_field(reference, &["id"])
            .ok_or_else(|| ExtractError::MissingField("reference.id".to_string()))?;
        requirement = requirement.with_reference(ExternalReference::new(kind, id));
    }
    for key in ["material", "quantity", "dimensions"] {
        if let Some(value) = object.get(key) {
            requirement = requirement.with_parameter(key, value.clone());
        }
    }
    Ok(requirement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn design() -> Value {
        json!({
            "title": "Bike Frame",
            "manufacturing_processes": ["Welding", {"name": "Powder Coating", "color": "red"}],
            "parts": [
                {
                    "id": "rear-triangle",
                    "name": "Rear Triangle",
                    "material": "steel",
                    "manufacturing_processes": ["Tube Bending"],
                    "parts": [{"name": "Dropout", "manufacturing_processes": ["Laser Cutting"]}]
                },
                {"name": "Head Tube", "reference": {"kind": "part", "id": "head-tube"}}
            ],
            "library": [
                {"kind": "part", "id": "head-tube", "part": {"name": "Head Tube Stock", "manufacturing_processes": ["Turning"]}}
            ]
        })
    }

    #[test]
    fn test_extract_design() {
        let set = ManufacturingHandler.extract_requirements(&design()).unwrap();
        assert_eq!(set.id, "bike-frame");
        assert_eq!(set.name, "Bike Frame");
        assert_eq!(set.requirements.len(), 4);
        assert_eq!(set.requirements[1].parameters["color"], "red");

        let rear = &set.requirements[2];
        assert_eq!(rear.id, "rear-triangle");
        assert_eq!(rear.parameters["material"], "steel");
        assert_eq!(rear.components.len(), 2);
        assert_eq!(rear.components[1].name, "Dropout");

        let head = &set.requirements[3];
        assert_eq!(head.reference, Some(ExternalReference::new("part", "head-tube")));
        assert_eq!(set.library.len(), 1);
        assert_eq!(set.library[0].requirement.components[0].name, "Turning");
    }

    #[test]
    fn test_design_without_requirements_is_rejected() {
        assert_eq!(
            ManufacturingHandler.extract_requirements(&json!({"title": "Empty"})),
            Err(ExtractError::MissingField(PROCESSES.to_string()))
        );
        assert_eq!(
            ManufacturingHandler.extract_requirements(&json!([1, 2])),
            Err(ExtractError::NotAnObject)
        );
    }

    #[test]
    fn test_extract_facility() {
        let facility = json!({
            "name": "Fab Lab Berlin",
            "location": {"city": "Berlin"},
            "access_type": "public",
            "manufacturing_processes": ["Welding", "welding"],
            "equipment": [
                {"type": "CNC Mill", "processes": ["Milling", {"name": "Drilling"}]},
                "Laser Cutter"
            ]
        });
        let provider = ManufacturingHandler.extract_provider(&facility).unwrap();
        assert_eq!(provider.id.as_str(), "fab-lab-berlin");
        assert_eq!(provider.domain.as_deref(), Some("manufacturing"));
        let names: Vec<&str> = provider.capabilities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Welding", "CNC Mill", "Milling", "Drilling", "Laser Cutter"]);
        assert_eq!(provider.metadata["access_type"], "public");
    }

    #[test]
    fn test_invalid_field_type() {
        let facility = json!({"name": "Shop", "equipment": "lathe"});
        assert!(matches!(
            ManufacturingHandler.extract_provider(&facility),
            Err(ExtractError::InvalidField { .. })
        ));
    }
}
