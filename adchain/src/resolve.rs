//! URL-based lookup of the graph node that represents a resource or frame
//! load, and of the node that triggered that load.

use crate::graph::{NodeId, PageGraph};
use crate::normalize::normalize_url;
use crate::types::{EdgeType, NodeType, ResourceKind};

/// Normalized URL views over one graph, built once and shared by every
/// lookup against that graph. Entries keep document order, so the first
/// match in document order wins; graphs are expected to have at most one
/// representative node per distinct URL within one page load.
pub struct UrlIndex {
    resources: Vec<(NodeId, String)>,
    frames: Vec<(NodeId, String)>,
    value_edges: Vec<(NodeId, String)>,
}

impl UrlIndex {
    pub fn new(graph: &PageGraph) -> Self {
        let mut resources = Vec::new();
        let mut frames = Vec::new();
        for node in graph.nodes_in_order() {
            match &node.node_type {
                NodeType::Resource { url } => resources.push((node.id, normalize_url(url))),
                NodeType::RemoteFrame { url: Some(url), .. } => {
                    frames.push((node.id, normalize_url(url)))
                }
                _ => {}
            }
        }

        let mut value_edges = Vec::new();
        for edge in graph.edges_in_order() {
            if let Some(value) = edge.edge_type.value() {
                value_edges.push((edge.target, normalize_url(value)));
            }
        }

        Self { resources, frames, value_edges }
    }

    /// The node representing the load of `resource_url`: the first resource
    /// node whose normalized URL matches, else the target of the first
    /// value-bearing edge whose normalized value matches. `None` is a normal
    /// outcome (the resource never actually loaded, or its URL was rewritten
    /// beyond recognition).
    pub fn resolve_resource(&self, resource_url: &str) -> Option<NodeId> {
        let query = normalize_url(resource_url);
        self.resources
            .iter()
            .find(|(_, url)| *url == query)
            .map(|(id, _)| *id)
            .or_else(|| {
                self.value_edges
                    .iter()
                    .find(|(_, value)| *value == query)
                    .map(|(target, _)| *target)
            })
    }

    /// Same lookup restricted to remote frame nodes.
    pub fn resolve_frame(&self, frame_url: &str) -> Option<NodeId> {
        let query = normalize_url(frame_url);
        self.frames.iter().find(|(_, url)| *url == query).map(|(id, _)| *id)
    }
}

impl PageGraph {
    /// The node that initiated the load represented by `node`: the source of
    /// the first incoming `request start` edge for an image resource, or of
    /// the first incoming `cross DOM` edge for a remote frame.
    pub fn load_trigger(&self, node: NodeId, kind: ResourceKind) -> Option<NodeId> {
        self.incoming_edges(node)
            .find(|edge| match kind {
                ResourceKind::Image => matches!(edge.edge_type, EdgeType::RequestStart { .. }),
                ResourceKind::Iframe => matches!(edge.edge_type, EdgeType::CrossDom {}),
            })
            .map(|edge| edge.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeId, FrameId, GraphMeta, Node, PageGraph};
    use crate::types::RequestType;
    use std::convert::TryFrom;

    fn resource_node(id: usize, url: &str) -> Node {
        Node {
            id: NodeId::from(id),
            node_timestamp: id as isize,
            node_type: NodeType::Resource { url: url.to_string() },
        }
    }

    fn frame_node(id: usize, url: &str) -> Node {
        Node {
            id: NodeId::from(id),
            node_timestamp: id as isize,
            node_type: NodeType::RemoteFrame {
                frame_id: FrameId::try_from("00000000000000000000000000000001").unwrap(),
                url: Some(url.to_string()),
            },
        }
    }

    fn element_node(id: usize, tag_name: &str) -> Node {
        Node {
            id: NodeId::from(id),
            node_timestamp: id as isize,
            node_type: NodeType::HtmlElement {
                tag_name: tag_name.to_string(),
                is_deleted: false,
                node_id: id,
            },
        }
    }

    fn set_attribute_edge(id: usize, source: usize, target: usize, value: &str) -> Edge {
        Edge {
            id: EdgeId::from(id),
            edge_timestamp: Some(id as isize),
            edge_type: EdgeType::SetAttribute {
                key: "src".to_string(),
                value: Some(value.to_string()),
                is_style: false,
            },
            source: NodeId::from(source),
            target: NodeId::from(target),
        }
    }

    fn request_start_edge(id: usize, source: usize, target: usize) -> Edge {
        Edge {
            id: EdgeId::from(id),
            edge_timestamp: Some(id as isize),
            edge_type: EdgeType::RequestStart {
                request_type: RequestType::Image,
                status: "started".to_string(),
                request_id: id,
            },
            source: NodeId::from(source),
            target: NodeId::from(target),
        }
    }

    fn build(nodes: Vec<Node>, edges: Vec<Edge>) -> PageGraph {
        PageGraph::from_parts(GraphMeta::default(), nodes, edges).unwrap()
    }

    #[test]
    fn resource_nodes_match_before_value_edges() {
        let graph = build(
            vec![
                element_node(1, "img"),
                resource_node(2, "https://a.test/ad.png"),
                element_node(3, "img"),
            ],
            vec![set_attribute_edge(1, 1, 3, "https://a.test/ad.png")],
        );
        let index = UrlIndex::new(&graph);

        assert_eq!(index.resolve_resource("https://a.test/ad.png"), Some(NodeId::from(2)));
    }

    #[test]
    fn value_edge_targets_are_the_fallback() {
        let graph = build(
            vec![element_node(1, "script"), element_node(2, "img")],
            vec![set_attribute_edge(1, 1, 2, "https://a.test/pixel.gif")],
        );
        let index = UrlIndex::new(&graph);

        assert_eq!(index.resolve_resource("https://a.test/pixel.gif"), Some(NodeId::from(2)));
    }

    #[test]
    fn queries_and_recorded_urls_normalize_before_comparison() {
        let graph = build(
            vec![resource_node(1, "https://a.test/?a=1&amp;amp;b=2")],
            vec![],
        );
        let index = UrlIndex::new(&graph);

        assert_eq!(index.resolve_resource("https://a.test/?a=1&b=2"), Some(NodeId::from(1)));
        assert_eq!(index.resolve_resource("https://a.test/?a=1&amp;b=2"), Some(NodeId::from(1)));
    }

    #[test]
    fn first_match_in_document_order_wins() {
        let graph = build(
            vec![
                resource_node(5, "https://a.test/ad.png"),
                resource_node(2, "https://a.test/ad.png"),
            ],
            vec![],
        );
        let index = UrlIndex::new(&graph);

        assert_eq!(index.resolve_resource("https://a.test/ad.png"), Some(NodeId::from(5)));
    }

    #[test]
    fn frames_resolve_against_frame_nodes_only() {
        let graph = build(
            vec![
                resource_node(1, "https://a.test/frame.html"),
                frame_node(2, "https://a.test/frame.html"),
            ],
            vec![],
        );
        let index = UrlIndex::new(&graph);

        assert_eq!(index.resolve_frame("https://a.test/frame.html"), Some(NodeId::from(2)));
        assert_eq!(index.resolve_frame("https://a.test/other.html"), None);
    }

    #[test]
    fn unknown_urls_resolve_to_none() {
        let graph = build(vec![resource_node(1, "https://a.test/ad.png")], vec![]);
        let index = UrlIndex::new(&graph);

        assert_eq!(index.resolve_resource("https://a.test/missing.png"), None);
    }

    #[test]
    fn image_trigger_is_the_request_start_source() {
        let graph = build(
            vec![element_node(1, "img"), resource_node(2, "https://a.test/ad.png")],
            vec![request_start_edge(1, 1, 2)],
        );

        assert_eq!(
            graph.load_trigger(NodeId::from(2), ResourceKind::Image),
            Some(NodeId::from(1))
        );
        assert_eq!(graph.load_trigger(NodeId::from(2), ResourceKind::Iframe), None);
    }
}
