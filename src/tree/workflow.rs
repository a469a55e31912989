//! Workflow DAG of production steps.
//!
//! Nodes live in an arena (`Vec<WorkflowNode>`) and are addressed by
//! [`NodeIndex`]. An edge `a → b` means "b depends on a": a must complete
//! before b may start. Cycles are rejected when an edge is inserted and
//! checked again by [`Workflow::validate`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::reference::ResourceReference;
use crate::core::requirement::Parameters;
use crate::utils::validation::clamp_confidence;

/// Position of a node within its workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(pub usize);

impl std::fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Execution status of a workflow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Unknown node {0}")]
    UnknownNode(NodeIndex),

    #[error("Edge {0} -> {0} would be a self loop")]
    SelfLoop(NodeIndex),

    #[error("Edge {from} -> {to} would create a cycle")]
    CycleDetected { from: NodeIndex, to: NodeIndex },

    #[error("Workflow '{0}' contains a cycle")]
    NotAcyclic(String),

    #[error("Node {node} has id {found}, expected its position")]
    IndexMismatch { node: NodeIndex, found: NodeIndex },

    #[error("Node {node} has confidence {confidence} outside [0, 1]")]
    InvalidConfidence { node: NodeIndex, confidence: f64 },

    #[error("Node {node} cannot go from {from} to {to}")]
    InvalidTransition {
        node: NodeIndex,
        from: NodeStatus,
        to: NodeStatus,
    },

    #[error("Node {node} cannot start: {} predecessor(s) not completed", .waiting_on.len())]
    UnmetDependencies {
        node: NodeIndex,
        waiting_on: Vec<NodeIndex>,
    },
}

/// One production step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: NodeIndex,
    pub name: String,

    /// The requirement this step satisfies
    pub requirement_ref: ResourceReference,

    /// The capability performing this step; absent for assembly of decomposed parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_ref: Option<ResourceReference>,

    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub inputs: Parameters,

    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub outputs: Parameters,

    #[serde(default)]
    pub status: NodeStatus,

    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowNode {
    /// A pending node; its id is assigned by [`Workflow::add_node`]
    pub fn new(name: impl Into<String>, requirement_ref: ResourceReference) -> Self {
        Self {
            id: NodeIndex(0),
            name: name.into(),
            requirement_ref,
            capability_ref: None,
            inputs: Parameters::new(),
            outputs: Parameters::new(),
            status: NodeStatus::Pending,
            confidence: 0.0,
            started_at: None,
            finished_at: None,
        }
    }

    #[must_use]
    pub fn with_capability(mut self, capability_ref: ResourceReference) -> Self {
        self.capability_ref = Some(capability_ref);
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    #[must_use]
    pub fn with_inputs(mut self, inputs: Parameters) -> Self {
        self.inputs = inputs;
        self
    }
}

/// A serialized edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub from: NodeIndex,
    pub to: NodeIndex,
}

/// Directed acyclic graph of [`WorkflowNode`]s
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WorkflowData")]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    nodes: Vec<WorkflowNode>,
    edges: Vec<WorkflowEdge>,

    /// Downstream adjacency, rebuilt from `edges`
    #[serde(skip)]
    successors: Vec<Vec<NodeIndex>>,

    /// Upstream adjacency, rebuilt from `edges`
    #[serde(skip)]
    predecessors: Vec<Vec<NodeIndex>>,
}

/// Serialized form of a workflow, before adjacency is rebuilt
#[derive(Deserialize)]
struct WorkflowData {
    id: Uuid,
    name: String,
    #[serde(default)]
    nodes: Vec<WorkflowNode>,
    #[serde(default)]
    edges: Vec<WorkflowEdge>,
}

impl TryFrom<WorkflowData> for Workflow {
    type Error = WorkflowError;

    fn try_from(data: WorkflowData) -> Result<Self, Self::Error> {
        let mut workflow = Self {
            id: data.id,
            name: data.name,
            nodes: data.nodes,
            edges: data.edges,
            successors: Vec::new(),
            predecessors: Vec::new(),
        };
        workflow.rebuild_adjacency()?;
        Ok(workflow)
    }
}

impl PartialEq for Workflow {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.nodes == other.nodes
            && self.edges == other.edges
    }
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[WorkflowEdge] {
        &self.edges
    }

    pub fn node(&self, index: NodeIndex) -> Option<&WorkflowNode> {
        self.nodes.get(index.0)
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        index.0 < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node and return its index
    pub fn add_node(&mut self, mut node: WorkflowNode) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        node.id = index;
        node.confidence = clamp_confidence(node.confidence);
        self.nodes.push(node);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        index
    }

    /// Add a dependency edge `from → to`.
    ///
    /// Returns `Ok(false)` when the edge already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if either node is unknown, the edge is a self loop, or
    /// it would close a cycle. The graph is unchanged on error.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) -> Result<bool, WorkflowError> {
        self.check_node(from)?;
        self.check_node(to)?;
        if from == to {
            return Err(WorkflowError::SelfLoop(from));
        }
        if self.successors[from.0].contains(&to) {
            return Ok(false);
        }
        // from → to closes a cycle exactly when `from` is reachable from `to`
        if self.reaches(to, from) {
            return Err(WorkflowError::CycleDetected { from, to });
        }

        self.edges.push(WorkflowEdge { from, to });
        self.successors[from.0].push(to);
        self.predecessors[to.0].push(from);
        Ok(true)
    }

    pub fn successors(&self, index: NodeIndex) -> &[NodeIndex] {
        self.successors.get(index.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, index: NodeIndex) -> &[NodeIndex] {
        self.predecessors.get(index.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes with no predecessors
    pub fn entry_nodes(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len())
            .map(NodeIndex)
            .filter(|&n| self.predecessors(n).is_empty())
            .collect()
    }

    /// Nodes with no successors
    pub fn exit_nodes(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len())
            .map(NodeIndex)
            .filter(|&n| self.successors(n).is_empty())
            .collect()
    }

    /// Dependencies before dependents, lower indices first among ready nodes.
    ///
    /// Kahn's algorithm; fails only if the graph somehow contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeIndex>, WorkflowError> {
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(Vec::len).collect();
        let mut queue: VecDeque<NodeIndex> = self.entry_nodes().into();
        let mut sorted = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            sorted.push(node);
            let mut ready: Vec<NodeIndex> = Vec::new();
            for &next in self.successors(node) {
                in_degree[next.0] -= 1;
                if in_degree[next.0] == 0 {
                    ready.push(next);
                }
            }
            ready.sort_unstable();
            queue.extend(ready);
        }

        if sorted.len() == self.nodes.len() {
            Ok(sorted)
        } else {
            Err(WorkflowError::NotAcyclic(self.name.clone()))
        }
    }

    /// Number of nodes on the longest dependency chain
    pub fn longest_chain(&self) -> usize {
        let Ok(order) = self.topological_order() else {
            return 0;
        };
        let mut chain = vec![1usize; self.nodes.len()];
        for node in order {
            for &next in self.successors(node) {
                chain[next.0] = chain[next.0].max(chain[node.0] + 1);
            }
        }
        chain.into_iter().max().unwrap_or(0)
    }

    /// Check node ids, confidences and acyclicity
    pub fn validate(&self) -> Result<(), WorkflowError> {
        for (position, node) in self.nodes.iter().enumerate() {
            let expected = NodeIndex(position);
            if node.id != expected {
                return Err(WorkflowError::IndexMismatch {
                    node: expected,
                    found: node.id,
                });
            }
            if !(0.0..=1.0).contains(&node.confidence) {
                return Err(WorkflowError::InvalidConfidence {
                    node: expected,
                    confidence: node.confidence,
                });
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Whether a node is pending and all its direct predecessors are completed
    pub fn can_start(&self, index: NodeIndex) -> Result<bool, WorkflowError> {
        let node = self.check_node(index)?;
        Ok(node.status == NodeStatus::Pending && self.waiting_on(index).is_empty())
    }

    /// `Pending → InProgress`, recording the start time
    pub fn start_node(&mut self, index: NodeIndex) -> Result<(), WorkflowError> {
        let status = self.check_node(index)?.status;
        if status != NodeStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                node: index,
                from: status,
                to: NodeStatus::InProgress,
            });
        }
        let waiting_on = self.waiting_on(index);
        if !waiting_on.is_empty() {
            return Err(WorkflowError::UnmetDependencies {
                node: index,
                waiting_on,
            });
        }
        let node = &mut self.nodes[index.0];
        node.status = NodeStatus::InProgress;
        node.started_at = Some(Utc::now());
        Ok(())
    }

    /// `InProgress → Completed`, recording the finish time
    pub fn complete_node(&mut self, index: NodeIndex) -> Result<(), WorkflowError> {
        self.finish(index, NodeStatus::Completed)
    }

    /// `InProgress → Failed`, recording the finish time
    pub fn fail_node(&mut self, index: NodeIndex) -> Result<(), WorkflowError> {
        self.finish(index, NodeStatus::Failed)
    }

    /// `Pending → Blocked`
    pub fn block_node(&mut self, index: NodeIndex) -> Result<(), WorkflowError> {
        let status = self.check_node(index)?.status;
        if status != NodeStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                node: index,
                from: status,
                to: NodeStatus::Blocked,
            });
        }
        self.nodes[index.0].status = NodeStatus::Blocked;
        Ok(())
    }

    /// Recompute adjacency lists from the edge list
    pub fn rebuild_adjacency(&mut self) -> Result<(), WorkflowError> {
        self.successors = vec![Vec::new(); self.nodes.len()];
        self.predecessors = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            for index in [edge.from, edge.to] {
                if !self.contains(index) {
                    return Err(WorkflowError::UnknownNode(index));
                }
            }
            self.successors[edge.from.0].push(edge.to);
            self.predecessors[edge.to.0].push(edge.from);
        }
        Ok(())
    }

    fn finish(&mut self, index: NodeIndex, to: NodeStatus) -> Result<(), WorkflowError> {
        let status = self.check_node(index)?.status;
        if status != NodeStatus::InProgress {
            return Err(WorkflowError::InvalidTransition {
                node: index,
                from: status,
                to,
            });
        }
        let node = &mut self.nodes[index.0];
        node.status = to;
        node.finished_at = Some(Utc::now());
        Ok(())
    }

    fn check_node(&self, index: NodeIndex) -> Result<&WorkflowNode, WorkflowError> {
        self.nodes
            .get(index.0)
            .ok_or(WorkflowError::UnknownNode(index))
    }

    fn waiting_on(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.predecessors(index)
            .iter()
            .copied()
            .filter(|p| self.nodes[p.0].status != NodeStatus::Completed)
            .collect()
    }

    /// Depth-first reachability from `start` to `target`
    fn reaches(&self, start: NodeIndex, target: NodeIndex) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if std::mem::replace(&mut visited[node.0], true) {
                continue;
            }
            stack.extend(self.successors(node).iter().copied());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> WorkflowNode {
        WorkflowNode::new(name, ResourceReference::requirement("design", [name])).with_confidence(0.9)
    }

    fn chain(names: &[&str]) -> (Workflow, Vec<NodeIndex>) {
        let mut workflow = Workflow::new("test");
        let indices: Vec<NodeIndex> = names.iter().map(|n| workflow.add_node(node(n))).collect();
        for pair in indices.windows(2) {
            workflow.add_edge(pair[0], pair[1]).unwrap();
        }
        (workflow, indices)
    }

    #[test]
    fn test_add_node_assigns_indices() {
        let mut workflow = Workflow::new("test");
        let a = workflow.add_node(node("cut"));
        let b = workflow.add_node(node("weld"));
        assert_eq!(a, NodeIndex(0));
        assert_eq!(b, NodeIndex(1));
        assert_eq!(workflow.node(b).unwrap().id, b);
        assert_eq!(workflow.len(), 2);
    }

    #[test]
    fn test_confidence_clamped_on_insert() {
        let mut workflow = Workflow::new("test");
        let mut raw = node("cut");
        raw.confidence = f64::NAN;
        let index = workflow.add_node(raw);
        assert!(workflow.node(index).unwrap().confidence.abs() < f64::EPSILON);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_entry_and_exit_nodes() {
        let (workflow, idx) = chain(&["cut", "weld", "paint"]);
        assert_eq!(workflow.entry_nodes(), vec![idx[0]]);
        assert_eq!(workflow.exit_nodes(), vec![idx[2]]);
        assert_eq!(workflow.topological_order().unwrap(), idx);
        assert_eq!(workflow.longest_chain(), 3);
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut workflow, idx) = chain(&["cut", "weld", "paint"]);
        let err = workflow.add_edge(idx[2], idx[0]).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::CycleDetected {
                from: idx[2],
                to: idx[0]
            }
        );
        // Graph unchanged
        assert_eq!(workflow.edges().len(), 2);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_self_loop_and_unknown_node_rejected() {
        let (mut workflow, idx) = chain(&["cut"]);
        assert_eq!(
            workflow.add_edge(idx[0], idx[0]),
            Err(WorkflowError::SelfLoop(idx[0]))
        );
        assert_eq!(
            workflow.add_edge(idx[0], NodeIndex(9)),
            Err(WorkflowError::UnknownNode(NodeIndex(9)))
        );
    }

    #[test]
    fn test_duplicate_edge_is_idempotent() {
        let (mut workflow, idx) = chain(&["cut", "weld"]);
        assert_eq!(workflow.add_edge(idx[0], idx[1]), Ok(false));
        assert_eq!(workflow.edges().len(), 1);
    }

    #[test]
    fn test_diamond_topological_order() {
        let mut workflow = Workflow::new("diamond");
        let a = workflow.add_node(node("a"));
        let b = workflow.add_node(node("b"));
        let c = workflow.add_node(node("c"));
        let d = workflow.add_node(node("d"));
        workflow.add_edge(a, c).unwrap();
        workflow.add_edge(a, b).unwrap();
        workflow.add_edge(b, d).unwrap();
        workflow.add_edge(c, d).unwrap();
        assert_eq!(workflow.topological_order().unwrap(), vec![a, b, c, d]);
        assert_eq!(workflow.longest_chain(), 3);
        assert!(workflow.add_edge(d, a).is_err());
    }

    #[test]
    fn test_status_transitions() {
        let (mut workflow, idx) = chain(&["cut", "weld"]);

        assert!(workflow.can_start(idx[0]).unwrap());
        assert!(!workflow.can_start(idx[1]).unwrap());
        assert!(matches!(
            workflow.start_node(idx[1]),
            Err(WorkflowError::UnmetDependencies { .. })
        ));

        workflow.start_node(idx[0]).unwrap();
        assert!(workflow.node(idx[0]).unwrap().started_at.is_some());
        assert!(!workflow.can_start(idx[1]).unwrap());

        workflow.complete_node(idx[0]).unwrap();
        assert!(workflow.node(idx[0]).unwrap().finished_at.is_some());
        assert!(workflow.can_start(idx[1]).unwrap());

        workflow.start_node(idx[1]).unwrap();
        workflow.fail_node(idx[1]).unwrap();
        assert_eq!(workflow.node(idx[1]).unwrap().status, NodeStatus::Failed);
    }

    #[test]
    fn test_invalid_transitions() {
        let (mut workflow, idx) = chain(&["cut"]);
        assert_eq!(
            workflow.complete_node(idx[0]),
            Err(WorkflowError::InvalidTransition {
                node: idx[0],
                from: NodeStatus::Pending,
                to: NodeStatus::Completed
            })
        );
        workflow.block_node(idx[0]).unwrap();
        assert!(!workflow.can_start(idx[0]).unwrap());
        assert!(workflow.start_node(idx[0]).is_err());
    }

    #[test]
    fn test_failed_predecessor_blocks_start() {
        let (mut workflow, idx) = chain(&["cut", "weld"]);
        workflow.start_node(idx[0]).unwrap();
        workflow.fail_node(idx[0]).unwrap();
        assert!(!workflow.can_start(idx[1]).unwrap());
    }

    #[test]
    fn test_serde_rebuilds_adjacency() {
        let (workflow, idx) = chain(&["cut", "weld", "paint"]);
        let json = serde_json::to_string(&workflow).unwrap();
        assert!(!json.contains("successors"));

        let back: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, workflow);
        assert_eq!(back.successors(idx[0]), &[idx[1]]);
        assert_eq!(back.predecessors(idx[2]), &[idx[1]]);
    }

    #[test]
    fn test_deserialize_rejects_dangling_edge() {
        let json = format!(
            r#"{{"id": "{}", "name": "bad", "nodes": [], "edges": [{{"from": 0, "to": 1}}]}}"#,
            Uuid::new_v4()
        );
        assert!(serde_json::from_str::<Workflow>(&json).is_err());
    }

    #[test]
    fn test_validate_detects_cycle_in_loaded_data() {
        let (workflow, _) = chain(&["a", "b"]);
        let mut value = serde_json::to_value(&workflow).unwrap();
        value["edges"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"from": 1, "to": 0}));
        let loaded: Workflow = serde_json::from_value(value).unwrap();
        assert!(matches!(loaded.validate(), Err(WorkflowError::NotAcyclic(_))));
    }
}
