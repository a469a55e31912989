//! Turn resolver output into workflows.
//!
//! A direct match becomes one workflow with one node. A decomposed match becomes
//! one node for the compound requirement plus one workflow per child, each
//! connected to the parent node with a `Decomposition` connection.

use serde_json::json;
use uuid::Uuid;

use crate::core::reference::{ResourceReference, ResourceSnapshot};
use crate::core::requirement::{Capability, Requirement};
use crate::core::types::ProviderId;
use crate::matching::resolver::ComponentMatchResult;
use crate::tree::supply_tree::{ConnectionKind, NodeRef, SupplyTree, TreeError, WorkflowConnection};
use crate::tree::workflow::{Workflow, WorkflowNode};

/// Builds a [`SupplyTree`] for one provider from resolved requirements
#[derive(Debug)]
pub struct TreeBuilder {
    set_id: String,
    provider: ProviderId,
    tree: SupplyTree,
}

impl TreeBuilder {
    pub fn new(set_id: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            set_id: set_id.into(),
            tree: SupplyTree::new().with_provider(provider.clone()),
            provider,
        }
    }

    /// Add the workflows for one top-level result, returning the root node.
    ///
    /// # Errors
    ///
    /// Fails if any part of the result is unresolved, or if the tree rejects a
    /// workflow or connection. The builder should be discarded after an error.
    pub fn add_result(&mut self, result: &ComponentMatchResult) -> Result<NodeRef, TreeError> {
        let mut path = Vec::new();
        self.build_node(result, &mut path)
    }

    pub fn build(self) -> SupplyTree {
        self.tree
    }

    fn build_node(&mut self, result: &ComponentMatchResult, path: &mut Vec<String>) -> Result<NodeRef, TreeError> {
        if !result.is_resolved() {
            return Err(TreeError::Unresolved {
                requirement: result.requirement.name.clone(),
                outcome: result.outcome,
            });
        }

        let requirement = &result.requirement;
        path.push(requirement.id.clone());
        let requirement_ref = ResourceReference::requirement(&self.set_id, path.iter().cloned());
        self.tree
            .add_snapshot(ResourceSnapshot::capture(requirement_ref.clone(), requirement_content(requirement)));

        let mut node = WorkflowNode::new(&requirement.name, requirement_ref)
            .with_confidence(result.confidence)
            .with_inputs(requirement.parameters.clone());
        if let Some(capability) = &result.capability {
            let capability_ref = ResourceReference::capability(self.provider.as_str(), &capability.id);
            self.tree
                .add_snapshot(ResourceSnapshot::capture(capability_ref.clone(), capability_content(capability)));
            node = node.with_capability(capability_ref);
        }

        let mut workflow = Workflow::new(&requirement.name);
        let index = workflow.add_node(node);
        let workflow_id: Uuid = self.tree.add_workflow(workflow)?;
        let parent = NodeRef::new(workflow_id, index);

        for child in &result.children {
            let child_root = self.build_node(child, path)?;
            self.tree.connect_workflows(WorkflowConnection {
                source: child_root,
                target: parent,
                kind: ConnectionKind::Decomposition,
            })?;
        }

        path.pop();
        tracing::debug!(
            children = result.children.len(),
            "Built workflow for '{}' ({})",
            requirement.name,
            result.outcome
        );
        Ok(parent)
    }
}

/// Build a tree for `provider` from a batch of results
pub fn build_tree(
    set_id: &str,
    provider: ProviderId,
    results: &[ComponentMatchResult],
) -> Result<SupplyTree, TreeError> {
    let mut builder = TreeBuilder::new(set_id, provider);
    for result in results {
        builder.add_result(result)?;
    }
    Ok(builder.build())
}

fn requirement_content(requirement: &Requirement) -> serde_json::Value {
    json!({
        "id": requirement.id,
        "name": requirement.name,
        "parameters": requirement.parameters,
        "components": requirement.components.iter().map(|c| &c.id).collect::<Vec<_>>(),
    })
}

fn capability_content(capability: &Capability) -> serde_json::Value {
    json!({
        "id": capability.id,
        "name": capability.name,
        "parameters": capability.parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::engine::MatchPipeline;
    use crate::matching::resolver::ComponentResolver;
    use crate::tree::workflow::NodeIndex;

    fn resolve(requirement: &Requirement, capabilities: &[Capability]) -> ComponentMatchResult {
        let pipeline = MatchPipeline::default();
        ComponentResolver::new(&pipeline).resolve(requirement, capabilities)
    }

    #[test]
    fn test_direct_match_builds_single_node() {
        let result = resolve(
            &Requirement::new("CNC Machining"),
            &[Capability::new("cnc machining"), Capability::new("welding")],
        );
        let tree = build_tree("design", ProviderId::new("fab-lab"), &[result]).unwrap();

        assert_eq!(tree.workflows().len(), 1);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.connections().is_empty());
        assert!((tree.calculate_confidence() - 0.95).abs() < 1e-9);

        let node = &tree.workflows()[0].nodes()[0];
        assert_eq!(
            node.requirement_ref.to_string(),
            "requirement://design/cnc-machining"
        );
        assert_eq!(
            node.capability_ref.as_ref().unwrap().to_string(),
            "capability://fab-lab/capabilities/cnc-machining"
        );
        assert_eq!(tree.snapshots().len(), 2);
        assert!(tree.validate_against_snapshot());
    }

    #[test]
    fn test_decomposition_builds_connected_workflows() {
        let table = Requirement::new("Table")
            .with_component(Requirement::new("Sanding"))
            .with_component(Requirement::new("Varnishing"));
        let result = resolve(&table, &[Capability::new("sanding"), Capability::new("Varnishing")]);
        let tree = build_tree("furniture", ProviderId::new("shop"), &[result]).unwrap();

        assert_eq!(tree.workflows().len(), 3);
        assert_eq!(tree.connections().len(), 2);
        let root = tree.workflows()[0].id;
        for connection in tree.connections() {
            assert_eq!(connection.kind, ConnectionKind::Decomposition);
            assert_eq!(connection.target, NodeRef::new(root, NodeIndex(0)));
        }
        let table_node = &tree.workflows()[0].nodes()[0];
        assert!(table_node.capability_ref.is_none());
        assert!((table_node.confidence - 0.975).abs() < 1e-9);

        let sanding = &tree.workflows()[1].nodes()[0];
        assert_eq!(sanding.requirement_ref.path, vec!["table", "sanding"]);
        assert_eq!(tree.longest_chain(), 2);
        assert!(tree.validate_against_snapshot());
    }

    #[test]
    fn test_unresolved_result_cannot_be_built() {
        let result = resolve(&Requirement::new("Basket Weaving"), &[Capability::new("welding")]);
        let err = build_tree("design", ProviderId::new("fab-lab"), &[result]).unwrap_err();
        assert!(matches!(err, TreeError::Unresolved { .. }));
    }
}
