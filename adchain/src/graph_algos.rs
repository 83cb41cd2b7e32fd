//! Injector chain construction, pruning, and script projection.

use std::collections::HashSet;

use crate::error::GraphError;
use crate::graph::{NodeId, PageGraph};
use crate::types::{EdgeType, NodeType, ScriptType};

/// Side-effect budget for the safe-to-remove analysis: how much unexplained
/// fan-out a chain node is allowed before it can no longer be held solely
/// responsible for the load being traced.
///
/// Both knobs are tuning points rather than baked-in constants; stricter
/// settings cut chains earlier and attribute fewer scripts.
#[derive(Debug, Clone, Copy)]
pub struct ChainPolicy {
    /// How many distinct insertion parents a node may touch, beyond the
    /// nodes it created itself, before it stops being solely attributable.
    pub max_unexplained_parents: usize,
    /// Whether scripts created by a node must themselves be safe to remove.
    pub recurse_created_scripts: bool,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            max_unexplained_parents: 2,
            recurse_created_scripts: true,
        }
    }
}

impl PageGraph {
    /// The immediate creation-provenance predecessor of `node`: the source
    /// of an incoming `execute` edge for script nodes (falling back to
    /// `create node`), the source of an incoming `create node` edge for
    /// everything else. `None` when no qualifying edge exists.
    fn provenance_parent(&self, node: NodeId) -> Option<NodeId> {
        let is_script = self
            .node(node)
            .map(|n| n.node_type.is_script())
            .unwrap_or(false);
        if is_script {
            if let Some(edge) = self
                .incoming_edges(node)
                .find(|edge| matches!(edge.edge_type, EdgeType::Execute {}))
            {
                return Some(edge.source);
            }
        }
        self.incoming_edges(node)
            .find(|edge| matches!(edge.edge_type, EdgeType::CreateNode {}))
            .map(|edge| edge.source)
    }

    /// Walks creation provenance backward from `start_node` and returns the
    /// ordered ancestor chain: index 0 is the nearest cause of `start_node`,
    /// increasing index is further back in time. `start_node` itself and the
    /// root sentinel are not included.
    ///
    /// Node creation strictly precedes use, so a well-formed graph reaches
    /// the root in finitely many steps; a cycle in the provenance edges is a
    /// [`GraphError::MalformedGraph`].
    pub fn injector_chain(&self, start_node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(start_node);
        let mut current = start_node;
        while let Some(ancestor) = self.provenance_parent(current) {
            if !visited.insert(ancestor) {
                return Err(GraphError::malformed(format!(
                    "provenance cycle through {}",
                    ancestor
                )));
            }
            if self.root_id() == Some(ancestor) {
                break;
            }
            chain.push(ancestor);
            current = ancestor;
        }
        Ok(chain)
    }

    /// The URL an external script was actually fetched from, resolved by
    /// following the script's `execute` predecessor (the element that ran
    /// it) to that element's completed request.
    pub fn script_request_url(&self, node: NodeId) -> Option<String> {
        let executor = self
            .incoming_edges(node)
            .find(|edge| matches!(edge.edge_type, EdgeType::Execute {}))?
            .source;
        let resource = self
            .incoming_edges(executor)
            .find(|edge| matches!(edge.edge_type, EdgeType::RequestComplete { .. }))?
            .source;
        self.node(resource)?.node_type.url().map(str::to_owned)
    }

    /// Rebinds a chain start to an already-known upstream script: walks
    /// creation provenance from `start` (inclusive) and returns the first
    /// external-file script whose request URL, or failing that its recorded
    /// URL, equals `script_url`. `Ok(None)` when the walk reaches the root
    /// or dead-ends without a match; callers then keep the original start.
    pub fn rebind_start(
        &self,
        start: NodeId,
        script_url: &str,
    ) -> Result<Option<NodeId>, GraphError> {
        let mut visited = HashSet::new();
        let mut current = start;
        loop {
            if !visited.insert(current) {
                return Err(GraphError::malformed(format!(
                    "provenance cycle through {}",
                    current
                )));
            }
            if let Some(node) = self.node(current) {
                if let NodeType::Script {
                    url,
                    script_type: ScriptType::ExternalFile,
                    ..
                } = &node.node_type
                {
                    let resolved = self.script_request_url(current).or_else(|| url.clone());
                    if resolved.as_deref() == Some(script_url) {
                        return Ok(Some(current));
                    }
                }
            }
            match self.provenance_parent(current) {
                Some(ancestor) if self.root_id() != Some(ancestor) => current = ancestor,
                _ => return Ok(None),
            }
        }
    }

    /// Whether `node`'s observable footprint in this graph is small enough
    /// to hold it solely responsible for the chain of creations being
    /// traced.
    ///
    /// The footprint is every outgoing edge: DOM nodes it created, scripts
    /// it created (recursively held to the same standard when the policy
    /// says so), and the insertion parents it placed nodes under. Insertion
    /// parents it did not itself create are the unexplained side effects
    /// counted against the policy budget.
    pub fn safe_to_remove(&self, node: NodeId, policy: &ChainPolicy) -> Result<bool, GraphError> {
        self.safe_to_remove_inner(node, policy, &mut HashSet::new())
    }

    fn safe_to_remove_inner(
        &self,
        node: NodeId,
        policy: &ChainPolicy,
        visiting: &mut HashSet<NodeId>,
    ) -> Result<bool, GraphError> {
        if !visiting.insert(node) {
            return Err(GraphError::malformed(format!(
                "create-node cycle through {}",
                node
            )));
        }

        let mut created_dom_ids = HashSet::new();
        let mut created_scripts = Vec::new();
        let mut insertion_parents = HashSet::new();
        for edge in self.outgoing_edges(node) {
            match &edge.edge_type {
                EdgeType::CreateNode {} => {
                    let target = self.target_node(edge);
                    if let Some(dom_id) = target.node_type.dom_node_id() {
                        created_dom_ids.insert(dom_id);
                    }
                    if target.node_type.is_script() {
                        created_scripts.push(target.id);
                    }
                }
                EdgeType::InsertNode { parent, .. } => {
                    insertion_parents.insert(*parent);
                }
                _ => {}
            }
        }

        let unexplained_parents = insertion_parents.difference(&created_dom_ids).count();
        let mut safe = unexplained_parents <= policy.max_unexplained_parents;
        if safe && policy.recurse_created_scripts {
            for script in created_scripts {
                if !self.safe_to_remove_inner(script, policy, visiting)? {
                    safe = false;
                    break;
                }
            }
        }

        visiting.remove(&node);
        Ok(safe)
    }

    /// Truncates a chain at the first node that is not safe to remove: the
    /// result is the prefix strictly before that node, or the whole chain
    /// when every node passes.
    pub fn prune_chain(
        &self,
        chain: &[NodeId],
        policy: &ChainPolicy,
    ) -> Result<Vec<NodeId>, GraphError> {
        for (i, node) in chain.iter().enumerate() {
            if !self.safe_to_remove(*node, policy)? {
                return Ok(chain[..i].to_vec());
            }
        }
        Ok(chain.to_vec())
    }

    /// Projects a chain onto the external script URLs it contains, chain
    /// order preserved. The URL recorded on the script node is preferred;
    /// a node without one falls back to its resolved request URL. Non-script
    /// and inline-script nodes are skipped.
    pub fn extract_scripts(&self, chain: &[NodeId]) -> Vec<String> {
        chain
            .iter()
            .filter_map(|&id| match self.node(id).map(|node| &node.node_type) {
                Some(NodeType::Script {
                    url,
                    script_type: ScriptType::ExternalFile,
                    ..
                }) => url.clone().or_else(|| self.script_request_url(id)),
                _ => None,
            })
            .collect()
    }
}
