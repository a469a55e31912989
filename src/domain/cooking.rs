//! Cooking: recipes against kitchens.
//!
//! A recipe needs every listed technique and ingredient. A kitchen offers its
//! appliances, the techniques its cooks know, and the ingredients in stock.

use serde_json::{Map, Value};

use crate::catalog::store::Provider;
use crate::core::requirement::{Capability, Requirement, RequirementSet};
use crate::domain::{
    array_field, as_object, copy_metadata, document_id, named_entry, push_capability, string_field,
    DomainHandler, ExtractError,
};
use crate::tree::supply_tree::SupplyTree;

/// Nodes below this confidence get a substitution warning
const SUBSTITUTION_WARNING: f64 = 0.9;

const KITCHEN_METADATA: &[&str] = &["location", "cuisine", "capacity", "owner"];

#[derive(Debug, Clone, Copy, Default)]
pub struct CookingHandler;

impl DomainHandler for CookingHandler {
    fn name(&self) -> &'static str {
        "cooking"
    }

    fn extract_requirements(&self, document: &Value) -> Result<RequirementSet, ExtractError> {
        let object = as_object(document)?;
        let id = document_id(object, &["title", "name"])?;

        let mut requirements = entries(object, "techniques", &["name", "technique"])?;
        requirements.extend(entries(object, "ingredients", &["name", "ingredient"])?);
        if requirements.is_empty() {
            return Err(ExtractError::MissingField("techniques".to_string()));
        }

        let mut set = RequirementSet::new(id, requirements);
        if let Some(title) = string_field(object, &["title", "name"]) {
            set.name = title.to_string();
        }
        Ok(set)
    }

    fn extract_provider(&self, document: &Value) -> Result<Provider, ExtractError> {
        let object = as_object(document)?;
        let id = document_id(object, &["name"])?;
        let name = string_field(object, &["name"]).unwrap_or(&id).to_string();

        let mut capabilities = Vec::new();
        for (field, name_fields) in [
            ("appliances", &["name", "type"][..]),
            ("techniques", &["name", "technique"][..]),
            ("ingredients", &["name", "ingredient"][..]),
        ] {
            for entry in array_field(object, field)? {
                let (term, parameters) = named_entry(entry, field, name_fields)?;
                let mut capability = Capability::new(term);
                capability.parameters = parameters;
                push_capability(&mut capabilities, capability)?;
            }
        }

        let mut provider = Provider::new(id, name)
            .with_domain(self.name())
            .with_capabilities(capabilities);
        copy_metadata(&mut provider, object, KITCHEN_METADATA);
        Ok(provider)
    }

    fn validate(&self, tree: &SupplyTree) -> Vec<String> {
        tree.nodes()
            .filter(|node| node.capability_ref.is_some() && node.confidence < SUBSTITUTION_WARNING)
            .map(|node| format!("'{}' relies on a substitution (confidence {:.2})", node.name, node.confidence))
            .collect()
    }
}

fn entries(object: &Map<String, Value>, field: &str, name_fields: &[&str]) -> Result<Vec<Requirement>, ExtractError> {
    array_field(object, field)?
        .iter()
        .map(|entry| {
            let (name, parameters) = named_entry(entry, field, name_fields)?;
            let mut requirement = Requirement::new(name);
            requirement.parameters = parameters;
            Ok(requirement)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_recipe() {
        let recipe = json!({
            "title": "Tomato Soup",
            "techniques": ["Sauteing", {"name": "Simmering", "minutes": 30}],
            "ingredients": [{"name": "Tomato", "quantity": "1kg"}, "Onion"]
        });
        let set = CookingHandler.extract_requirements(&recipe).unwrap();
        assert_eq!(set.id, "tomato-soup");
        let names: Vec<&str> = set.requirements.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Sauteing", "Simmering", "Tomato", "Onion"]);
        assert_eq!(set.requirements[1].parameters["minutes"], 30);
        assert_eq!(set.requirements[2].parameters["quantity"], "1kg");
    }

    #[test]
    fn test_empty_recipe_is_rejected() {
        assert_eq!(
            CookingHandler.extract_requirements(&json!({"title": "Air"})),
            Err(ExtractError::MissingField("techniques".to_string()))
        );
    }

    #[test]
    fn test_extract_kitchen() {
        let kitchen = json!({
            "id": "corner-bistro",
            "name": "Corner Bistro",
            "cuisine": "french",
            "appliances": [{"type": "Oven", "parameters": {"max_temp": 250}}, "Stove"],
            "techniques": ["Sauteing", "Simmering"],
            "ingredients": ["Tomato"]
        });
        let provider = CookingHandler.extract_provider(&kitchen).unwrap();
        assert_eq!(provider.id.as_str(), "corner-bistro");
        assert_eq!(provider.name, "Corner Bistro");
        assert_eq!(provider.capabilities.len(), 5);
        assert_eq!(provider.capabilities[0].parameters["max_temp"], 250);
        assert_eq!(provider.metadata["cuisine"], "french");
    }

    #[test]
    fn test_recipe_matches_kitchen_terms() {
        let pipeline = CookingHandler.pipeline(&crate::matching::engine::MatchingConfig::default());
        let result = pipeline.match_term("simmering", &["Sauteing", "Simmering"]);
        assert!(result.is_match());
        assert_eq!(result.candidate_index, Some(1));
    }
}
