//! The per-resource, per-page, and batch attribution pipelines.
//!
//! Every failure mode here is local: an unresolved resource yields a record
//! with no attribution, an undecodable page skips that page, and the batch
//! always runs to completion.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::from_xml;
use crate::graph::PageGraph;
use crate::graph_algos::ChainPolicy;
use crate::resolve::UrlIndex;
use crate::sources::{GraphSource, LabelSource};
use crate::types::ResourceKind;

/// One ad-labeled resource load to attribute. Field names follow the
/// classification records the labels are exported from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdResource {
    #[serde(rename = "resource_url")]
    pub url: String,
    #[serde(rename = "resource_type")]
    pub kind: ResourceKind,
    /// A script URL already known (from filter-list checking) to be the
    /// blocked element of this chain; the chain is rebound to start there.
    #[serde(rename = "chain_element_block", default, skip_serializing_if = "Option::is_none")]
    pub known_blocked_script: Option<String>,
}

/// The scripts held responsible for one resource load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainAttribution {
    /// External script URLs along the pruned chain, closest cause first.
    pub scripts: Vec<String>,
    /// The same projection before pruning, for comparative reporting.
    pub full_chain_scripts: Vec<String>,
}

/// The externally consumed output: one per labeled resource per page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionRecord {
    pub resource_url: String,
    pub resource_kind: ResourceKind,
    /// `None` when resolution failed at any step: node not found, no
    /// trigger, no chain left.
    pub attribution: Option<ChainAttribution>,
}

/// Builds the attribution for a single labeled resource against one graph.
pub fn attribute_resource(
    graph: &PageGraph,
    index: &UrlIndex,
    resource: &AdResource,
    policy: &ChainPolicy,
) -> Result<ChainAttribution, GraphError> {
    let node = match resource.kind {
        ResourceKind::Image => index.resolve_resource(&resource.url),
        ResourceKind::Iframe => index.resolve_frame(&resource.url),
    }
    .ok_or_else(|| GraphError::not_found(format!("no node represents {}", resource.url)))?;

    let trigger = graph
        .load_trigger(node, resource.kind)
        .ok_or_else(|| GraphError::not_found(format!("no load trigger for {}", resource.url)))?;

    let start = match &resource.known_blocked_script {
        Some(script_url) => graph.rebind_start(trigger, script_url)?.unwrap_or(trigger),
        None => trigger,
    };

    let mut chain = vec![start];
    chain.extend(graph.injector_chain(start)?);

    let full_chain_scripts = graph.extract_scripts(&chain);
    let pruned = graph.prune_chain(&chain, policy)?;
    let scripts = graph.extract_scripts(&pruned);

    Ok(ChainAttribution { scripts, full_chain_scripts })
}

/// Attributes every labeled resource of one page. Failures are recorded as
/// `attribution: None` and never interrupt the rest of the page.
pub fn attribute_page(
    graph: &PageGraph,
    resources: &[AdResource],
    policy: &ChainPolicy,
) -> Vec<AttributionRecord> {
    let index = UrlIndex::new(graph);
    resources
        .iter()
        .map(|resource| {
            let attribution = match attribute_resource(graph, &index, resource, policy) {
                Ok(attribution) => Some(attribution),
                Err(e) => {
                    tracing::debug!(resource = %resource.url, error = %e, "no attribution");
                    None
                }
            };
            AttributionRecord {
                resource_url: resource.url.clone(),
                resource_kind: resource.kind,
                attribution,
            }
        })
        .collect()
}

/// All attribution records for one page.
#[derive(Debug, Serialize, Deserialize)]
pub struct PageAttribution {
    pub page_url: String,
    pub records: Vec<AttributionRecord>,
}

/// Aggregate outcome of a batch run. Failure counts live here; individual
/// failures never surface as errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchSummary {
    pub pages: Vec<PageAttribution>,
    /// Pages whose graph could not be fetched or decoded; all of their
    /// resources are recorded without attribution.
    pub pages_skipped: usize,
    /// Resources that yielded no attribution, across all pages.
    pub unattributed: usize,
}

/// Runs attribution for every labeled page, processing page graphs in
/// parallel. Each graph is decoded, used for all of its page's resources,
/// and dropped before the worker moves on.
pub fn attribute_batch<G, L>(
    graphs: &G,
    labels: &L,
    policy: &ChainPolicy,
) -> Result<BatchSummary, GraphError>
where
    G: GraphSource + Sync,
    L: LabelSource,
{
    let labeled_pages = labels.labeled_pages()?;

    let results: Vec<(PageAttribution, bool)> = labeled_pages
        .par_iter()
        .map(|page| {
            let decoded = graphs
                .fetch(&page.page_url)
                .and_then(|document| from_xml::read_from_string(&document));
            match decoded {
                Ok(graph) => {
                    let records = attribute_page(&graph, &page.resources, policy);
                    (PageAttribution { page_url: page.page_url.clone(), records }, false)
                }
                Err(e) => {
                    tracing::warn!(page = %page.page_url, error = %e, "skipping page graph");
                    let records = page
                        .resources
                        .iter()
                        .map(|resource| AttributionRecord {
                            resource_url: resource.url.clone(),
                            resource_kind: resource.kind,
                            attribution: None,
                        })
                        .collect();
                    (PageAttribution { page_url: page.page_url.clone(), records }, true)
                }
            }
        })
        .collect();

    let pages_skipped = results.iter().filter(|(_, skipped)| *skipped).count();
    let pages: Vec<PageAttribution> = results.into_iter().map(|(page, _)| page).collect();
    let unattributed = pages
        .iter()
        .flat_map(|page| &page.records)
        .filter(|record| record.attribution.is_none())
        .count();

    Ok(BatchSummary { pages, pages_skipped, unattributed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeId, GraphMeta, Node, NodeId};
    use crate::sources::PageLabels;
    use crate::types::{EdgeType, NodeType, RequestType, ScriptType};

    fn one_script_graph() -> PageGraph {
        let nodes = vec![
            Node { id: NodeId::from(1), node_timestamp: 0, node_type: NodeType::Parser {} },
            Node {
                id: NodeId::from(2),
                node_timestamp: 1,
                node_type: NodeType::Script {
                    url: Some("https://ads.example/a.js".to_string()),
                    script_type: ScriptType::ExternalFile,
                    script_id: 2,
                },
            },
            Node {
                id: NodeId::from(3),
                node_timestamp: 2,
                node_type: NodeType::Resource { url: "https://ads.example/ad.png".to_string() },
            },
        ];
        let edges = vec![
            Edge {
                id: EdgeId::from(1),
                edge_timestamp: Some(1),
                edge_type: EdgeType::Execute {},
                source: NodeId::from(1),
                target: NodeId::from(2),
            },
            Edge {
                id: EdgeId::from(2),
                edge_timestamp: Some(2),
                edge_type: EdgeType::RequestStart {
                    request_type: RequestType::Image,
                    status: "started".to_string(),
                    request_id: 1,
                },
                source: NodeId::from(2),
                target: NodeId::from(3),
            },
        ];
        PageGraph::from_parts(GraphMeta::default(), nodes, edges).unwrap()
    }

    fn image(url: &str) -> AdResource {
        AdResource { url: url.to_string(), kind: ResourceKind::Image, known_blocked_script: None }
    }

    #[test]
    fn attributed_and_unattributed_resources_in_one_pass() {
        let graph = one_script_graph();
        let resources = vec![image("https://ads.example/ad.png"), image("https://gone.example/x.png")];

        let records = attribute_page(&graph, &resources, &ChainPolicy::default());

        assert_eq!(records.len(), 2);
        let attributed = records[0].attribution.as_ref().unwrap();
        assert_eq!(attributed.scripts, vec!["https://ads.example/a.js".to_string()]);
        assert_eq!(attributed.full_chain_scripts, attributed.scripts);
        // The unresolved resource short-circuits without affecting the rest.
        assert!(records[1].attribution.is_none());
    }

    #[test]
    fn label_records_deserialize_from_the_classifier_shape() {
        let labels = r#"[
            {"resource_url": "https://ads.example/ad.png", "resource_type": "image"},
            {"resource_url": "https://ads.example/f.html", "resource_type": "iframe",
             "chain_element_block": "https://ads.example/mid.js"}
        ]"#;
        let resources: Vec<AdResource> = serde_json::from_str(labels).unwrap();

        assert_eq!(resources[0].kind, ResourceKind::Image);
        assert!(resources[0].known_blocked_script.is_none());
        assert_eq!(resources[1].kind, ResourceKind::Iframe);
        assert_eq!(
            resources[1].known_blocked_script.as_deref(),
            Some("https://ads.example/mid.js")
        );
    }

    struct FixedLabels(Vec<PageLabels>);

    impl LabelSource for FixedLabels {
        fn labeled_pages(&self) -> Result<Vec<PageLabels>, GraphError> {
            Ok(self.0.clone())
        }
    }

    struct FixedGraphs(std::collections::HashMap<String, String>);

    impl GraphSource for FixedGraphs {
        fn fetch(&self, page_url: &str) -> Result<String, GraphError> {
            self.0
                .get(page_url)
                .cloned()
                .ok_or_else(|| GraphError::not_found(format!("no recording for {}", page_url)))
        }
    }

    #[test]
    fn batch_continues_past_undecodable_pages() {
        let mut graphs = std::collections::HashMap::new();
        graphs.insert("https://bad.example/".to_string(), "not graphml at all".to_string());
        let graphs = FixedGraphs(graphs);
        let labels = FixedLabels(vec![
            PageLabels {
                page_url: "https://bad.example/".to_string(),
                resources: vec![image("https://ads.example/ad.png")],
            },
            PageLabels {
                page_url: "https://missing.example/".to_string(),
                resources: vec![image("https://ads.example/other.png")],
            },
        ]);

        let summary = attribute_batch(&graphs, &labels, &ChainPolicy::default()).unwrap();

        assert_eq!(summary.pages.len(), 2);
        assert_eq!(summary.pages_skipped, 2);
        assert_eq!(summary.unattributed, 2);
        for page in &summary.pages {
            assert!(page.records.iter().all(|record| record.attribution.is_none()));
        }
    }
}
