//! Supply trees: workflows plus cross-workflow connections and snapshots.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::reference::{ResourceReference, ResourceSnapshot};
use crate::core::requirement::{Capability, Requirement};
use crate::core::types::ProviderId;
use crate::matching::engine::MatchPipeline;
use crate::matching::resolver::ResolutionOutcome;
use crate::tree::workflow::{NodeIndex, Workflow, WorkflowError, WorkflowNode};
use crate::utils::validation::{clamp_confidence, count_to_f64};

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Workflow '{name}' is invalid: {source}")]
    InvalidWorkflow {
        name: String,
        #[source]
        source: WorkflowError,
    },

    #[error("Workflow {0} is already part of this tree")]
    DuplicateWorkflow(Uuid),

    #[error("Unknown workflow {0}")]
    UnknownWorkflow(Uuid),

    #[error("Workflow {workflow} has no node {node}")]
    UnknownNode { workflow: Uuid, node: NodeIndex },

    #[error("Connection {source_workflow} -> {target_workflow} would create a cycle between workflows")]
    ConnectionCycle {
        source_workflow: Uuid,
        target_workflow: Uuid,
    },

    #[error("Requirement '{requirement}' is unresolved ({outcome}) and cannot be built into a workflow")]
    Unresolved {
        requirement: String,
        outcome: ResolutionOutcome,
    },

    #[error("Failed to parse supply tree: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A node addressed across the whole tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub workflow: Uuid,
    pub node: NodeIndex,
}

impl NodeRef {
    pub fn new(workflow: Uuid, node: NodeIndex) -> Self {
        Self { workflow, node }
    }
}

/// Relationship expressed by a [`WorkflowConnection`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// A part produced by the source is required to build the target
    Decomposition,
    Assembly,
    Material,
    Other(String),
}

/// Directed link between nodes of two workflows; the source feeds the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConnection {
    pub source: NodeRef,
    pub target: NodeRef,
    pub kind: ConnectionKind,
}

/// A problem found while validating a tree against live or snapshot data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeIssue {
    Structure(String),
    UnclaimedRequirement(String),
    MissingCapability { node: String, capability: String },
    CapabilityMismatch { node: String, capability: String },
    MissingSnapshot { node: String, reference: String },
    CorruptSnapshot(String),
    RequirementChanged { node: String, reference: String },
}

impl std::fmt::Display for TreeIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structure(msg) => write!(f, "structure: {msg}"),
            Self::UnclaimedRequirement(id) => write!(f, "requirement '{id}' is not satisfied by any node"),
            Self::MissingCapability { node, capability } => {
                write!(f, "node '{node}' uses {capability}, which is no longer offered")
            }
            Self::CapabilityMismatch { node, capability } => {
                write!(f, "node '{node}' no longer matches {capability}")
            }
            Self::MissingSnapshot { node, reference } => {
                write!(f, "node '{node}' depends on {reference}, which has no snapshot")
            }
            Self::CorruptSnapshot(key) => write!(f, "snapshot {key} fails its checksum"),
            Self::RequirementChanged { node, reference } => {
                write!(f, "node '{node}' no longer matches the snapshot of {reference}")
            }
        }
    }
}

/// A validated, confidence-scored plan for satisfying a requirement set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyTree {
    pub id: Uuid,
    workflows: Vec<Workflow>,
    #[serde(default)]
    connections: Vec<WorkflowConnection>,
    #[serde(default)]
    snapshots: BTreeMap<String, ResourceSnapshot>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_provider: Option<ProviderId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for SupplyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SupplyTree {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            workflows: Vec::new(),
            connections: Vec::new(),
            snapshots: BTreeMap::new(),
            created_at: Utc::now(),
            primary_provider: None,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.primary_provider = Some(provider);
        self
    }

    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    pub fn workflow(&self, id: Uuid) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id == id)
    }

    pub fn connections(&self) -> &[WorkflowConnection] {
        &self.connections
    }

    pub fn snapshots(&self) -> &BTreeMap<String, ResourceSnapshot> {
        &self.snapshots
    }

    pub fn node(&self, node: NodeRef) -> Option<&WorkflowNode> {
        self.workflow(node.workflow)?.node(node.node)
    }

    /// Every node in the tree, workflow by workflow
    pub fn nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.workflows.iter().flat_map(Workflow::nodes)
    }

    pub fn node_count(&self) -> usize {
        self.workflows.iter().map(Workflow::len).sum()
    }

    /// Add a workflow after checking it is valid and acyclic
    pub fn add_workflow(&mut self, workflow: Workflow) -> Result<Uuid, TreeError> {
        if self.workflow(workflow.id).is_some() {
            return Err(TreeError::DuplicateWorkflow(workflow.id));
        }
        workflow.validate().map_err(|source| TreeError::InvalidWorkflow {
            name: workflow.name.clone(),
            source,
        })?;
        let id = workflow.id;
        self.workflows.push(workflow);
        Ok(id)
    }

    /// Connect two nodes already present in the tree
    pub fn connect_workflows(&mut self, connection: WorkflowConnection) -> Result<(), TreeError> {
        self.check_endpoint(connection.source)?;
        self.check_endpoint(connection.target)?;

        let (source, target) = (connection.source.workflow, connection.target.workflow);
        if source == target || self.workflow_reaches(target, source) {
            return Err(TreeError::ConnectionCycle {
                source_workflow: source,
                target_workflow: target,
            });
        }
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
        Ok(())
    }

    /// Store a snapshot under its reference string; a later snapshot with the same key replaces it
    pub fn add_snapshot(&mut self, snapshot: ResourceSnapshot) {
        self.snapshots.insert(snapshot.key(), snapshot);
    }

    /// Snapshot for a reference, falling back to the reference without its fragment
    pub fn snapshot_for(&self, reference: &ResourceReference) -> Option<&ResourceSnapshot> {
        self.snapshots
            .get(&reference.to_string())
            .or_else(|| self.snapshots.get(&reference.without_fragment().to_string()))
    }

    /// Mean node confidence across all workflows; 0.0 for an empty tree
    pub fn calculate_confidence(&self) -> f64 {
        let count = self.node_count();
        if count == 0 {
            return 0.0;
        }
        let total: f64 = self.nodes().map(|n| n.confidence).sum();
        clamp_confidence(total / count_to_f64(count))
    }

    /// Re-check every workflow and every connection endpoint
    pub fn validate_structure(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        for workflow in &self.workflows {
            if !seen.insert(workflow.id) {
                return Err(TreeError::DuplicateWorkflow(workflow.id));
            }
            workflow.validate().map_err(|source| TreeError::InvalidWorkflow {
                name: workflow.name.clone(),
                source,
            })?;
        }
        for connection in &self.connections {
            self.check_endpoint(connection.source)?;
            self.check_endpoint(connection.target)?;
        }
        if self.workflow_order().is_none() {
            let first = self.connections.first();
            return Err(TreeError::ConnectionCycle {
                source_workflow: first.map_or(Uuid::nil(), |c| c.source.workflow),
                target_workflow: first.map_or(Uuid::nil(), |c| c.target.workflow),
            });
        }
        Ok(())
    }

    /// Whether the tree still satisfies `requirements` with the live `capabilities`
    pub fn validate_against_live(&self, requirements: &[Requirement], capabilities: &[Capability]) -> bool {
        self.live_issues(&MatchPipeline::default(), requirements, capabilities)
            .is_empty()
    }

    /// Live validation with a caller-supplied pipeline
    pub fn validate_against_live_with(
        &self,
        pipeline: &MatchPipeline,
        requirements: &[Requirement],
        capabilities: &[Capability],
    ) -> bool {
        self.live_issues(pipeline, requirements, capabilities).is_empty()
    }

    /// Everything preventing live validation from passing
    pub fn live_issues(
        &self,
        pipeline: &MatchPipeline,
        requirements: &[Requirement],
        capabilities: &[Capability],
    ) -> Vec<TreeIssue> {
        let mut issues = Vec::new();
        if let Err(e) = self.validate_structure() {
            issues.push(TreeIssue::Structure(e.to_string()));
        }

        for requirement in requirements {
            let claimed = self
                .nodes()
                .any(|n| n.requirement_ref.leaf() == requirement.id);
            if !claimed {
                issues.push(TreeIssue::UnclaimedRequirement(requirement.id.clone()));
            }
        }

        for node in self.nodes() {
            let Some(capability_ref) = &node.capability_ref else {
                continue;
            };
            let Some(capability) = capabilities.iter().find(|c| c.id == capability_ref.leaf()) else {
                issues.push(TreeIssue::MissingCapability {
                    node: node.name.clone(),
                    capability: capability_ref.to_string(),
                });
                continue;
            };
            if !pipeline.match_term(&node.name, &[capability.name.as_str()]).is_match() {
                issues.push(TreeIssue::CapabilityMismatch {
                    node: node.name.clone(),
                    capability: capability_ref.to_string(),
                });
            }
        }

        for issue in &issues {
            tracing::debug!("Live validation of tree {}: {issue}", self.id);
        }
        issues
    }

    /// Whether every node's dependencies resolve, intact, within the stored snapshots
    pub fn validate_against_snapshot(&self) -> bool {
        self.snapshot_issues(&MatchPipeline::default()).is_empty()
    }

    /// Everything preventing snapshot validation from passing
    pub fn snapshot_issues(&self, pipeline: &MatchPipeline) -> Vec<TreeIssue> {
        let mut issues = Vec::new();
        if let Err(e) = self.validate_structure() {
            issues.push(TreeIssue::Structure(e.to_string()));
        }

        for (key, snapshot) in &self.snapshots {
            if !snapshot.is_intact() {
                issues.push(TreeIssue::CorruptSnapshot(key.clone()));
            }
        }

        for node in self.nodes() {
            match self.snapshot_for(&node.requirement_ref) {
                None => issues.push(TreeIssue::MissingSnapshot {
                    node: node.name.clone(),
                    reference: node.requirement_ref.to_string(),
                }),
                Some(snapshot) => {
                    if snapshot_name(snapshot) != Some(node.name.as_str()) {
                        issues.push(TreeIssue::RequirementChanged {
                            node: node.name.clone(),
                            reference: node.requirement_ref.to_string(),
                        });
                    }
                }
            }

            let Some(capability_ref) = &node.capability_ref else {
                continue;
            };
            match self.snapshot_for(capability_ref) {
                None => issues.push(TreeIssue::MissingSnapshot {
                    node: node.name.clone(),
                    reference: capability_ref.to_string(),
                }),
                Some(snapshot) => {
                    let matches = snapshot_name(snapshot)
                        .is_some_and(|name| pipeline.match_term(&node.name, &[name]).is_match());
                    if !matches {
                        issues.push(TreeIssue::CapabilityMismatch {
                            node: node.name.clone(),
                            capability: capability_ref.to_string(),
                        });
                    }
                }
            }
        }

        for issue in &issues {
            tracing::debug!("Snapshot validation of tree {}: {issue}", self.id);
        }
        issues
    }

    /// Number of nodes on the longest dependency chain, following connections across workflows
    pub fn longest_chain(&self) -> usize {
        let offsets: HashMap<Uuid, usize> = self
            .workflows
            .iter()
            .scan(0, |offset, w| {
                let start = *offset;
                *offset += w.len();
                Some((w.id, start))
            })
            .collect();
        let total = self.node_count();

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); total];
        for workflow in &self.workflows {
            let base = offsets[&workflow.id];
            for edge in workflow.edges() {
                successors[base + edge.from.0].push(base + edge.to.0);
            }
        }
        for connection in &self.connections {
            let (Some(source), Some(target)) = (
                offsets.get(&connection.source.workflow),
                offsets.get(&connection.target.workflow),
            ) else {
                continue;
            };
            let (from, to) = (source + connection.source.node.0, target + connection.target.node.0);
            if from < total && to < total {
                successors[from].push(to);
            }
        }

        let mut in_degree = vec![0usize; total];
        for next in successors.iter().flatten() {
            in_degree[*next] += 1;
        }
        let mut queue: VecDeque<usize> = (0..total).filter(|&n| in_degree[n] == 0).collect();
        let mut chain = vec![1usize; total];
        let mut visited = 0;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            for &next in &successors[node] {
                chain[next] = chain[next].max(chain[node] + 1);
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
        if visited < total {
            return 0;
        }
        chain.into_iter().max().unwrap_or(0)
    }

    pub fn to_json(&self) -> Result<String, TreeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a tree and re-check its structure
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let tree: Self = serde_json::from_str(json)?;
        tree.validate_structure()?;
        Ok(tree)
    }

    fn check_endpoint(&self, node: NodeRef) -> Result<(), TreeError> {
        let workflow = self
            .workflow(node.workflow)
            .ok_or(TreeError::UnknownWorkflow(node.workflow))?;
        if workflow.contains(node.node) {
            Ok(())
        } else {
            Err(TreeError::UnknownNode {
                workflow: node.workflow,
                node: node.node,
            })
        }
    }

    fn workflow_reaches(&self, start: Uuid, target: Uuid) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(workflow) = stack.pop() {
            if workflow == target {
                return true;
            }
            if !visited.insert(workflow) {
                continue;
            }
            stack.extend(
                self.connections
                    .iter()
                    .filter(|c| c.source.workflow == workflow)
                    .map(|c| c.target.workflow),
            );
        }
        false
    }

    /// Workflow ids with feeding workflows first, `None` if connections form a cycle
    fn workflow_order(&self) -> Option<Vec<Uuid>> {
        let mut in_degree: HashMap<Uuid, usize> = self.workflows.iter().map(|w| (w.id, 0)).collect();
        for connection in &self.connections {
            *in_degree.entry(connection.target.workflow).or_default() += 1;
        }
        let mut queue: VecDeque<Uuid> = self
            .workflows
            .iter()
            .map(|w| w.id)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(self.workflows.len());
        while let Some(workflow) = queue.pop_front() {
            order.push(workflow);
            for connection in self.connections.iter().filter(|c| c.source.workflow == workflow) {
                if let Some(degree) = in_degree.get_mut(&connection.target.workflow) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(connection.target.workflow);
                    }
                }
            }
        }
        (order.len() == self.workflows.len()).then_some(order)
    }
}

fn snapshot_name(snapshot: &ResourceSnapshot) -> Option<&str> {
    snapshot.content.get("name").and_then(serde_json::Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_node_workflow(name: &str, confidence: f64) -> Workflow {
        let mut workflow = Workflow::new(name);
        workflow.add_node(
            WorkflowNode::new(name, ResourceReference::requirement("design", [name]))
                .with_capability(ResourceReference::capability("fab-lab", name))
                .with_confidence(confidence),
        );
        workflow
    }

    fn decomposition(source: Uuid, target: Uuid) -> WorkflowConnection {
        WorkflowConnection {
            source: NodeRef::new(source, NodeIndex(0)),
            target: NodeRef::new(target, NodeIndex(0)),
            kind: ConnectionKind::Decomposition,
        }
    }

    #[test]
    fn test_empty_tree_confidence_is_zero() {
        let tree = SupplyTree::new();
        assert!(tree.calculate_confidence().abs() < f64::EPSILON);
        assert!(tree.validate_structure().is_ok());
        assert_eq!(tree.longest_chain(), 0);
    }

    #[test]
    fn test_confidence_is_mean_of_nodes() {
        let mut tree = SupplyTree::new();
        tree.add_workflow(single_node_workflow("welding", 1.0)).unwrap();
        tree.add_workflow(single_node_workflow("painting", 0.8)).unwrap();
        assert!((tree.calculate_confidence() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_add_workflow_rejects_invalid() {
        let mut tree = SupplyTree::new();
        let mut value = serde_json::to_value(single_node_workflow("a", 1.0)).unwrap();
        value["nodes"][0]["confidence"] = json!(1.5);
        let bad: Workflow = serde_json::from_value(value).unwrap();
        assert!(matches!(
            tree.add_workflow(bad),
            Err(TreeError::InvalidWorkflow { .. })
        ));

        let good = single_node_workflow("b", 1.0);
        let copy = good.clone();
        tree.add_workflow(good).unwrap();
        assert!(matches!(
            tree.add_workflow(copy),
            Err(TreeError::DuplicateWorkflow(_))
        ));
    }

    #[test]
    fn test_connect_requires_existing_endpoints() {
        let mut tree = SupplyTree::new();
        let a = tree.add_workflow(single_node_workflow("a", 1.0)).unwrap();
        let b = tree.add_workflow(single_node_workflow("b", 1.0)).unwrap();

        assert!(matches!(
            tree.connect_workflows(decomposition(a, Uuid::new_v4())),
            Err(TreeError::UnknownWorkflow(_))
        ));
        let dangling = WorkflowConnection {
            source: NodeRef::new(a, NodeIndex(3)),
            ..decomposition(a, b)
        };
        assert!(matches!(
            tree.connect_workflows(dangling),
            Err(TreeError::UnknownNode { .. })
        ));

        tree.connect_workflows(decomposition(a, b)).unwrap();
        tree.connect_workflows(decomposition(a, b)).unwrap();
        assert_eq!(tree.connections().len(), 1);
        assert_eq!(tree.longest_chain(), 2);
    }

    #[test]
    fn test_connection_cycle_rejected() {
        let mut tree = SupplyTree::new();
        let a = tree.add_workflow(single_node_workflow("a", 1.0)).unwrap();
        let b = tree.add_workflow(single_node_workflow("b", 1.0)).unwrap();
        tree.connect_workflows(decomposition(a, b)).unwrap();
        assert!(matches!(
            tree.connect_workflows(decomposition(b, a)),
            Err(TreeError::ConnectionCycle { .. })
        ));
        assert!(matches!(
            tree.connect_workflows(decomposition(a, a)),
            Err(TreeError::ConnectionCycle { .. })
        ));
    }

    #[test]
    fn test_snapshot_overwrites_by_key() {
        let mut tree = SupplyTree::new();
        let reference = ResourceReference::capability("fab-lab", "welding");
        tree.add_snapshot(ResourceSnapshot::capture(reference.clone(), json!({"name": "Welding"})));
        tree.add_snapshot(ResourceSnapshot::capture(reference.clone(), json!({"name": "TIG Welding"})));
        assert_eq!(tree.snapshots().len(), 1);
        assert_eq!(
            tree.snapshot_for(&reference.with_fragment("amperage")).unwrap().content["name"],
            "TIG Welding"
        );
    }

    fn snapshotted_tree() -> SupplyTree {
        let mut tree = SupplyTree::new();
        tree.add_workflow(single_node_workflow("welding", 0.95)).unwrap();
        tree.add_snapshot(ResourceSnapshot::capture(
            ResourceReference::requirement("design", ["welding"]),
            json!({"id": "welding", "name": "welding"}),
        ));
        tree.add_snapshot(ResourceSnapshot::capture(
            ResourceReference::capability("fab-lab", "welding"),
            json!({"id": "welding", "name": "Welding"}),
        ));
        tree
    }

    #[test]
    fn test_validate_against_snapshot() {
        let tree = snapshotted_tree();
        assert!(tree.validate_against_snapshot());

        let mut tampered = tree.clone();
        let key = "capability://fab-lab/capabilities/welding".to_string();
        let mut snapshot = tampered.snapshots()[&key].clone();
        snapshot.content = json!({"id": "welding", "name": "Soldering"});
        tampered.snapshots.insert(key, snapshot);
        let issues = tampered.snapshot_issues(&MatchPipeline::default());
        assert!(issues.iter().any(|i| matches!(i, TreeIssue::CorruptSnapshot(_))));
        assert!(!tampered.validate_against_snapshot());

        let mut missing = tree;
        missing.snapshots.clear();
        assert!(!missing.validate_against_snapshot());
    }

    #[test]
    fn test_validate_against_live() {
        let tree = snapshotted_tree();
        let requirements = vec![Requirement::new("Welding")];
        assert!(tree.validate_against_live(&requirements, &[Capability::new("WELDING").with_id("welding")]));

        // Capability withdrawn
        assert!(!tree.validate_against_live(&requirements, &[Capability::new("Painting")]));

        // Capability renamed to something unrelated
        assert!(!tree.validate_against_live(
            &requirements,
            &[Capability::new("Basket Weaving").with_id("welding")]
        ));

        // Requirement the tree never claimed
        let extra = vec![Requirement::new("Welding"), Requirement::new("Painting")];
        assert!(!tree.validate_against_live(&extra, &[Capability::new("Welding")]));
    }

    #[test]
    fn test_json_round_trip_preserves_structure() {
        let mut tree = snapshotted_tree().with_provider(ProviderId::new("fab-lab"));
        let other = tree.add_workflow(single_node_workflow("cutting", 0.9)).unwrap();
        let first = tree.workflows()[0].id;
        tree.connect_workflows(decomposition(other, first)).unwrap();
        tree.metadata.insert("domain".to_string(), json!("manufacturing"));

        let json = tree.to_json().unwrap();
        let back = SupplyTree::from_json(&json).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.longest_chain(), 2);
    }

    #[test]
    fn test_from_json_rejects_dangling_connection() {
        let mut tree = SupplyTree::new();
        let a = tree.add_workflow(single_node_workflow("a", 1.0)).unwrap();
        let b = tree.add_workflow(single_node_workflow("b", 1.0)).unwrap();
        tree.connect_workflows(decomposition(a, b)).unwrap();
        let mut value = serde_json::to_value(&tree).unwrap();
        value["connections"][0]["target"]["node"] = json!(5);
        assert!(SupplyTree::from_json(&value.to_string()).is_err());
    }
}
