//! Workflow graph model
//!
//! A workflow is a directed graph of typed nodes. There are no explicit
//! entry/exit markers beyond node type; start nodes are discovered by
//! type or by having no incoming edges. Branching nodes label their
//! outgoing edges through `sourceHandle`.

use orchid_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// The type tag of a workflow node
///
/// Unknown tags deserialize to `Unknown` so a malformed document still
/// loads; dispatching such a node fails the run with
/// `UNKNOWN_NODE_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Ai,
    Condition,
    Input,
    Output,
    Code,
    Trigger,
    Knowledge,
    Mcp,
    Http,
    Variable,
    Transform,
    Delay,
    Loop,
    Parallel,
    Subworkflow,
    ImageGen,
    VideoGen,
    AudioTts,
    Merge,
    #[serde(other)]
    Unknown,
}

/// A vertex in the workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: Value,
}

impl Node {
    pub fn new(id: &str, kind: NodeKind, data: Value) -> Self {
        Self {
            id: id.to_string(),
            kind,
            data,
        }
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "sourceHandle", default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
        }
    }

    pub fn with_handle(mut self, handle: &str) -> Self {
        self.source_handle = Some(handle.to_string());
        self
    }
}

/// Validated workflow graph
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    by_id: HashMap<String, usize>,
}

impl WorkflowGraph {
    /// Build a graph, checking that every edge endpoint exists
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let mut by_id = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            by_id.insert(node.id.clone(), index);
        }

        for edge in &edges {
            if !by_id.contains_key(&edge.source) {
                return Err(Error::execution(format!(
                    "edge references unknown source node '{}'",
                    edge.source
                )));
            }
            if !by_id.contains_key(&edge.target) {
                return Err(Error::execution(format!(
                    "edge references unknown target node '{}'",
                    edge.target
                )));
            }
        }

        Ok(Self {
            nodes,
            edges,
            by_id,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Start nodes: typed as start/trigger, or without incoming edges
    pub fn start_nodes(&self) -> Vec<&Node> {
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| {
                matches!(n.kind, NodeKind::Start | NodeKind::Trigger)
                    || !targets.contains(n.id.as_str())
            })
            .collect()
    }

    /// Successors of a node, optionally filtered to a branch label
    ///
    /// With `branch` set, only edges whose handle matches are followed;
    /// an unlabelled edge never matches a branch.
    pub fn successors(&self, id: &str, branch: Option<&str>) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .filter(|e| match branch {
                Some(label) => e.source_handle.as_deref() == Some(label),
                None => true,
            })
            .filter_map(|e| self.node(&e.target))
            .collect()
    }

    /// Number of edges pointing at a node
    pub fn incoming_count(&self, id: &str) -> usize {
        self.edges.iter().filter(|e| e.target == id).count()
    }
}
