// prune.rs — Dead-node removal
//
// Drops every node whose branch-tag set is empty, together with every edge
// touching a dropped node. Running it again removes nothing.
//
// Preconditions: branch labeling has run.
// Postconditions: every live node has a non-empty tag set; every live edge
//   connects two live nodes. The root is kept (it carries its own tag).
// Failure modes: none.
// Side effects: debug-level tracing of what was removed.

use uuid::Uuid;

use crate::graph::Graph;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneResult {
    pub removed_nodes: Vec<Uuid>,
    pub removed_edges: Vec<Uuid>,
}

pub fn prune(graph: &mut Graph) -> PruneResult {
    let (nodes, edges) = graph.retain_nodes(|node| !node.tags.is_empty());
    let result = PruneResult {
        removed_nodes: nodes.iter().map(|&n| graph.node(n).uuid).collect(),
        removed_edges: edges.iter().map(|&e| graph.edge(e).uuid).collect(),
    };
    for node in &result.removed_nodes {
        tracing::debug!(%node, "pruned unreachable node");
    }
    tracing::debug!(
        nodes = result.removed_nodes.len(),
        edges = result.removed_edges.len(),
        "prune complete"
    );
    result
}
