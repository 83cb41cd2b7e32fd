//! Filter-list checks over resources and attributed chains.
//!
//! Checking only: deciding whether existing rules already cover a resource
//! or the scripts that injected it. Generating new rules is out of scope.

use adblock::lists::ParseOptions;
use adblock::request::Request;
use adblock::Engine;

use crate::attribution::AttributionRecord;
use crate::graph::{Node, NodeId, PageGraph};
use crate::types::{EdgeType, NodeType, ResourceKind};

/// An adblock engine compiled from filter-list rules.
pub struct FilterChecker {
    engine: Engine,
}

impl FilterChecker {
    pub fn new(rules: &[String]) -> Self {
        Self {
            engine: Engine::from_rules(rules, ParseOptions::default()),
        }
    }

    /// Whether any rule blocks a request for `url` made from `page_url`.
    /// `data:` and `blob:` URLs, and URLs the request model rejects, never
    /// match.
    pub fn blocks(&self, url: &str, page_url: &str, request_type: &str) -> bool {
        if url.starts_with("data:") || url.starts_with("blob:") {
            return false;
        }
        match Request::new(url, page_url, request_type) {
            Ok(request) => self.engine.check_network_request(&request).matched,
            Err(_) => false,
        }
    }

    /// The first element of an attribution the rules block: the resource
    /// itself first, then the pruned chain scripts, closest cause first.
    /// `None` means the rules miss this ad entirely.
    pub fn first_blocked(&self, record: &AttributionRecord, page_url: &str) -> Option<String> {
        let request_type = match record.resource_kind {
            ResourceKind::Image => "image",
            ResourceKind::Iframe => "sub_frame",
        };
        if self.blocks(&record.resource_url, page_url, request_type) {
            return Some(record.resource_url.clone());
        }
        let attribution = record.attribution.as_ref()?;
        attribution
            .scripts
            .iter()
            .find(|script| self.blocks(script, page_url, "script"))
            .cloned()
    }
}

impl PageGraph {
    /// Distinct request types recorded for requests to a resource node, as
    /// filter-rule request type strings.
    pub fn resource_request_types(&self, resource: NodeId) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self
            .incoming_edges(resource)
            .filter_map(|edge| match &edge.edge_type {
                EdgeType::RequestStart { request_type, .. } => Some(request_type.as_str()),
                _ => None,
            })
            .collect();
        types.sort_unstable();
        types.dedup();
        if types.is_empty() {
            types.push("other");
        }
        types
    }

    /// All resource nodes whose requests match a set of adblock filter
    /// patterns. Optionally, only match on exception patterns.
    pub fn resources_matching_filters(
        &self,
        patterns: &[String],
        only_exceptions: bool,
    ) -> Vec<(NodeId, &Node)> {
        let source_url = match self.root_url() {
            Some(url) => url,
            None => return Vec::new(),
        };
        let checker = FilterChecker::new(patterns);

        self.nodes_in_order()
            .filter_map(|node| {
                let url = match &node.node_type {
                    NodeType::Resource { url } => url,
                    _ => return None,
                };
                if url::Url::parse(url).is_err() {
                    return None;
                }
                let matched = self.resource_request_types(node.id).iter().any(|request_type| {
                    match Request::new(url, source_url, request_type) {
                        Ok(request) => {
                            let result = checker.engine.check_network_request(&request);
                            if only_exceptions {
                                result.exception.is_some()
                            } else {
                                result.matched
                            }
                        }
                        Err(_) => false,
                    }
                });
                matched.then_some((node.id, node))
            })
            .collect()
    }

    /// All resource nodes whose requests match a single adblock filter
    /// pattern.
    pub fn resources_matching_filter(
        &self,
        pattern: &str,
        only_exceptions: bool,
    ) -> Vec<(NodeId, &Node)> {
        self.resources_matching_filters(&[pattern.to_string()], only_exceptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::ChainAttribution;
    use crate::graph::{Edge, EdgeId, GraphMeta, PageGraph};
    use crate::types::RequestType;

    const PAGE: &str = "https://news.example/article";

    fn rules(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn network_rules_match_and_miss() {
        let checker = FilterChecker::new(&rules(&["||ads.example^"]));

        assert!(checker.blocks("https://ads.example/banner.png", PAGE, "image"));
        assert!(!checker.blocks("https://cdn.example/logo.png", PAGE, "image"));
    }

    #[test]
    fn data_and_blob_urls_never_match() {
        let checker = FilterChecker::new(&rules(&["*"]));

        assert!(!checker.blocks("data:image/png;base64,AAAA", PAGE, "image"));
        assert!(!checker.blocks("blob:https://news.example/x", PAGE, "image"));
    }

    fn record(resource_url: &str, scripts: &[&str]) -> AttributionRecord {
        AttributionRecord {
            resource_url: resource_url.to_string(),
            resource_kind: ResourceKind::Image,
            attribution: Some(ChainAttribution {
                scripts: scripts.iter().map(|s| s.to_string()).collect(),
                full_chain_scripts: scripts.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    #[test]
    fn first_blocked_prefers_the_resource_itself() {
        let checker = FilterChecker::new(&rules(&["||ads.example^"]));
        let record = record("https://ads.example/ad.png", &["https://ads.example/a.js"]);

        assert_eq!(
            checker.first_blocked(&record, PAGE),
            Some("https://ads.example/ad.png".to_string())
        );
    }

    #[test]
    fn first_blocked_falls_through_to_the_chain() {
        let checker = FilterChecker::new(&rules(&["||tracker.example^"]));
        let record = record(
            "https://images.example/ad.png",
            &["https://cdn.example/loader.js", "https://tracker.example/inject.js"],
        );

        assert_eq!(
            checker.first_blocked(&record, PAGE),
            Some("https://tracker.example/inject.js".to_string())
        );
    }

    #[test]
    fn unmatched_records_return_none() {
        let checker = FilterChecker::new(&rules(&["||tracker.example^"]));
        let record = record("https://images.example/photo.png", &["https://cdn.example/app.js"]);

        assert_eq!(checker.first_blocked(&record, PAGE), None);
    }

    #[test]
    fn matching_resource_nodes_are_found() {
        let meta = GraphMeta {
            version: None,
            url: Some("https://news.example/".to_string()),
            is_root: Some(true),
        };
        let nodes = vec![
            crate::graph::Node {
                id: NodeId::from(1),
                node_timestamp: 0,
                node_type: NodeType::Parser {},
            },
            crate::graph::Node {
                id: NodeId::from(2),
                node_timestamp: 1,
                node_type: NodeType::Resource {
                    url: "https://ads.example/banner.png".to_string(),
                },
            },
            crate::graph::Node {
                id: NodeId::from(3),
                node_timestamp: 2,
                node_type: NodeType::Resource {
                    url: "https://cdn.example/logo.png".to_string(),
                },
            },
        ];
        let edges = vec![
            Edge {
                id: EdgeId::from(1),
                edge_timestamp: Some(1),
                edge_type: EdgeType::RequestStart {
                    request_type: RequestType::Image,
                    status: "started".to_string(),
                    request_id: 1,
                },
                source: NodeId::from(1),
                target: NodeId::from(2),
            },
            Edge {
                id: EdgeId::from(2),
                edge_timestamp: Some(2),
                edge_type: EdgeType::RequestStart {
                    request_type: RequestType::Image,
                    status: "started".to_string(),
                    request_id: 2,
                },
                source: NodeId::from(1),
                target: NodeId::from(3),
            },
        ];
        let graph = PageGraph::from_parts(meta, nodes, edges).unwrap();

        let matching = graph.resources_matching_filter("||ads.example^", false);

        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].0, NodeId::from(2));
    }
}
