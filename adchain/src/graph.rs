use std::collections::HashMap;
use std::convert::TryFrom;

use petgraph::graphmap::DiGraphMap;

use crate::error::GraphError;
use crate::types::{EdgeType, NodeType};

/// Metadata from the graph description's `<desc>` block.
#[derive(Debug, Clone, Default)]
pub struct GraphMeta {
    pub version: Option<String>,
    pub url: Option<String>,
    pub is_root: Option<bool>,
}

/// One page load's causality graph: a directed multigraph over typed nodes
/// and edges, plus the two adjacency indexes every traversal reads.
///
/// The graph is immutable once constructed. All five attribution steps for
/// all of a page's labeled resources read the same instance; nothing about
/// it survives the page pass.
#[derive(Debug)]
pub struct PageGraph {
    pub meta: GraphMeta,
    pub nodes: HashMap<NodeId, Node>,
    pub edges: HashMap<EdgeId, Edge>,
    pub graph: DiGraphMap<NodeId, Vec<EdgeId>>,

    edge_order: Vec<EdgeId>,
    by_source: HashMap<NodeId, Vec<EdgeId>>,
    by_target: HashMap<NodeId, Vec<EdgeId>>,
    root: Option<NodeId>,
}

impl PageGraph {
    /// Assembles a graph from nodes and edges in document order, building
    /// the by-source and by-target indexes once.
    ///
    /// Every node gets an index entry even when it has no edges, so
    /// traversal steps index without existence checks. An edge referencing
    /// a node that was never declared is a [`GraphError::MalformedGraph`].
    pub fn from_parts(
        meta: GraphMeta,
        node_list: Vec<Node>,
        edge_list: Vec<Edge>,
    ) -> Result<Self, GraphError> {
        let root = node_list.first().map(|node| node.id);

        let mut nodes = HashMap::with_capacity(node_list.len());
        let mut graph: DiGraphMap<NodeId, Vec<EdgeId>> = DiGraphMap::new();
        let mut by_source: HashMap<NodeId, Vec<EdgeId>> = HashMap::with_capacity(node_list.len());
        let mut by_target: HashMap<NodeId, Vec<EdgeId>> = HashMap::with_capacity(node_list.len());
        for node in node_list {
            graph.add_node(node.id);
            by_source.entry(node.id).or_default();
            by_target.entry(node.id).or_default();
            nodes.insert(node.id, node);
        }

        let mut edges = HashMap::with_capacity(edge_list.len());
        let mut edge_order = Vec::with_capacity(edge_list.len());
        for edge in edge_list {
            if !nodes.contains_key(&edge.source) {
                return Err(GraphError::malformed(format!(
                    "edge {} references undeclared source node {}",
                    edge.id, edge.source
                )));
            }
            if !nodes.contains_key(&edge.target) {
                return Err(GraphError::malformed(format!(
                    "edge {} references undeclared target node {}",
                    edge.id, edge.target
                )));
            }
            match graph.edge_weight_mut(edge.source, edge.target) {
                Some(ids) => ids.push(edge.id),
                None => {
                    graph.add_edge(edge.source, edge.target, vec![edge.id]);
                }
            }
            by_source.entry(edge.source).or_default().push(edge.id);
            by_target.entry(edge.target).or_default().push(edge.id);
            edge_order.push(edge.id);
            edges.insert(edge.id, edge);
        }

        Ok(Self {
            meta,
            nodes,
            edges,
            graph,
            edge_order,
            by_source,
            by_target,
            root,
        })
    }

    /// The sentinel node representing the start of the page load: the first
    /// node allocated in the recording. It has no creation provenance of its
    /// own, and backward traversal terminates at it.
    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// The URL of the page the graph was recorded from.
    pub fn root_url(&self) -> Option<&str> {
        self.meta.url.as_deref()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn source_node<'a>(&'a self, edge: &Edge) -> &'a Node {
        self.nodes.get(&edge.source).unwrap_or_else(|| {
            panic!("source node for edge {:?} could not be found in the graph", edge)
        })
    }

    pub fn target_node<'a>(&'a self, edge: &Edge) -> &'a Node {
        self.nodes.get(&edge.target).unwrap_or_else(|| {
            panic!("target node for edge {:?} could not be found in the graph", edge)
        })
    }

    /// Ids of the edges leaving `node`, in document order. Empty slice for
    /// a node without outgoing edges (or not in the graph at all).
    pub fn outgoing_edge_ids(&self, node: NodeId) -> &[EdgeId] {
        self.by_source.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of the edges arriving at `node`, in document order.
    pub fn incoming_edge_ids(&self, node: NodeId) -> &[EdgeId] {
        self.by_target.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing_edge_ids(node).iter().map(move |id| &self.edges[id])
    }

    pub fn incoming_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.incoming_edge_ids(node).iter().map(move |id| &self.edges[id])
    }

    /// All nodes in document order.
    pub fn nodes_in_order(&self) -> impl Iterator<Item = &Node> {
        self.graph.nodes().map(move |id| &self.nodes[&id])
    }

    /// All edges in document order.
    pub fn edges_in_order(&self) -> impl Iterator<Item = &Edge> {
        self.edge_order.iter().map(move |id| &self.edges[id])
    }

    pub fn filter_nodes<F: Fn(&NodeType) -> bool>(&self, f: F) -> Vec<&Node> {
        self.nodes_in_order().filter(|node| f(&node.node_type)).collect()
    }

    pub fn filter_edges<F: Fn(&EdgeType) -> bool>(&self, f: F) -> Vec<&Edge> {
        self.edges_in_order().filter(|edge| f(&edge.edge_type)).collect()
    }
}

/// An identifier used to reference a node.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, serde::Serialize)]
pub struct NodeId(usize);

impl From<usize> for NodeId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = ParseIdError;

    fn try_from(v: &str) -> Result<Self, Self::Error> {
        if let Some(("", rest)) = v.split_once('n') {
            Ok(Self(rest.parse::<usize>()?))
        } else {
            Err(ParseIdError::MissingPrefix)
        }
    }
}

/// An identifier used to reference an edge.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, serde::Serialize)]
pub struct EdgeId(usize);

impl From<usize> for EdgeId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl TryFrom<&str> for EdgeId {
    type Error = ParseIdError;

    fn try_from(v: &str) -> Result<Self, Self::Error> {
        if let Some(("", rest)) = v.split_once('e') {
            Ok(Self(rest.parse::<usize>()?))
        } else {
            Err(ParseIdError::MissingPrefix)
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseIdError {
    MissingPrefix,
    ParseIntError,
    FrameIdLength,
}

impl From<std::num::ParseIntError> for ParseIdError {
    fn from(_: std::num::ParseIntError) -> Self {
        Self::ParseIntError
    }
}

/// A node, representing a side effect of a page load.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub node_timestamp: isize,
    pub node_type: NodeType,
}

/// An edge, representing an action taken during page load.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Edge {
    pub id: EdgeId,
    pub edge_timestamp: Option<isize>,
    pub edge_type: EdgeType,
    pub source: NodeId,
    pub target: NodeId,
}

impl PartialEq for Edge {
    fn eq(&self, rhs: &Self) -> bool {
        self.id == rhs.id
    }
}

/// The token identifying a remote frame.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, serde::Serialize)]
pub struct FrameId(u128);

impl TryFrom<&str> for FrameId {
    type Error = ParseIdError;
    /// Chromium formats these 128-bit tokens as 32-character hexadecimal strings.
    fn try_from(v: &str) -> Result<Self, Self::Error> {
        if v.len() != 32 {
            return Err(ParseIdError::FrameIdLength);
        }
        Ok(Self(u128::from_str_radix(v, 16)?))
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0>32X}", self.0)
    }
}

impl std::fmt::Debug for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{:0>32X}\"", self.0)
    }
}

#[cfg(test)]
mod id_parsing_tests {
    use super::*;

    #[test]
    fn test_frame_id_parsing() {
        assert_eq!(FrameId::try_from("00000000000000000000000000000000"), Ok(FrameId(0)));
        assert_eq!(FrameId::try_from("00000000000000000000000000000001"), Ok(FrameId(1)));
        assert_eq!(FrameId::try_from("0000000000000000000000000000000f"), Ok(FrameId(15)));
        assert_eq!(FrameId::try_from("FfFFFFFfFffFFFfFFFFfffFFFfFFFfff"), Ok(FrameId(u128::MAX)));

        assert_eq!(FrameId::try_from(" 00000000000000000000000000000000"), Err(ParseIdError::FrameIdLength));
        assert_eq!(FrameId::try_from(" 0000000000000000000000000000000"), Err(ParseIdError::ParseIntError));
        assert_eq!(FrameId::try_from("0000000000000000000000000000000"), Err(ParseIdError::FrameIdLength));
        assert_eq!(FrameId::try_from("000000000000000000000000000000000"), Err(ParseIdError::FrameIdLength));
    }

    #[test]
    fn test_node_id_parsing() {
        assert_eq!(NodeId::try_from("n0"), Ok(NodeId(0)));
        assert_eq!(NodeId::try_from("n8"), Ok(NodeId(8)));
        assert_eq!(NodeId::try_from("n200"), Ok(NodeId(200)));
        assert_eq!(NodeId::try_from("n103810150"), Ok(NodeId(103810150)));

        assert_eq!(NodeId::try_from("e0"), Err(ParseIdError::MissingPrefix));
        assert_eq!(NodeId::try_from("8"), Err(ParseIdError::MissingPrefix));
        assert_eq!(NodeId::try_from("0n"), Err(ParseIdError::MissingPrefix));
        assert_eq!(NodeId::try_from("n 200"), Err(ParseIdError::ParseIntError));
        assert_eq!(NodeId::try_from("n"), Err(ParseIdError::ParseIntError));
    }

    #[test]
    fn test_edge_id_parsing() {
        assert_eq!(EdgeId::try_from("e0"), Ok(EdgeId(0)));
        assert_eq!(EdgeId::try_from("e8"), Ok(EdgeId(8)));
        assert_eq!(EdgeId::try_from("e200"), Ok(EdgeId(200)));

        assert_eq!(EdgeId::try_from("n0"), Err(ParseIdError::MissingPrefix));
        assert_eq!(EdgeId::try_from("8"), Err(ParseIdError::MissingPrefix));
        assert_eq!(EdgeId::try_from("e 200"), Err(ParseIdError::ParseIntError));
        assert_eq!(EdgeId::try_from("e"), Err(ParseIdError::ParseIntError));
    }

    #[test]
    fn test_round_trip() {
        fn test_str(id_str: &str) {
            assert_eq!(format!("{}", NodeId::try_from(id_str).unwrap()), id_str);

            let node_id = NodeId::try_from(id_str).unwrap();
            assert_eq!(NodeId::try_from(format!("{}", node_id).as_str()).unwrap(), node_id);
        }

        test_str("n0");
        test_str("n8");
        test_str("n200");
        test_str("n103810150");
    }
}
