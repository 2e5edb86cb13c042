// schedule.rs — Topological ordering of the pruned graph
//
// Orders live nodes so that every producer precedes its consumers, using
// Kahn's algorithm over live edges. Ties between independent nodes are broken
// by node id (snapshot order), so the same snapshot always yields the same
// order.
//
// Preconditions: pruning has run (every live edge joins two live nodes).
// Postconditions: the graph's node list is a dependency-respecting
//   permutation of the live nodes.
// Failure modes: a cycle among live nodes produces `CompileError::Cycle`
//   naming the nodes that could not be ordered.
// Side effects: reorders the graph's node list.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::diag::CompileError;
use crate::graph::{Graph, NodeId};

// ── Public types ────────────────────────────────────────────────────────────

/// The computed order, also written back into the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub order: Vec<NodeId>,
}

impl Schedule {
    /// Position of each node in the order.
    pub fn positions(&self) -> HashMap<NodeId, usize> {
        self.order.iter().enumerate().map(|(i, &n)| (n, i)).collect()
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn schedule(graph: &mut Graph) -> Result<Schedule, CompileError> {
    let order = sort_nodes(graph)?;
    graph.set_node_order(order.clone());
    tracing::debug!(nodes = order.len(), "topological order computed");
    Ok(Schedule { order })
}

// ── Topological sort (Kahn's algorithm) ─────────────────────────────────────

fn sort_nodes(graph: &Graph) -> Result<Vec<NodeId>, CompileError> {
    let nodes = graph.node_ids();

    // In-degree counts distinct producers, matching the adjacency built below.
    let mut in_degree: HashMap<NodeId, u32> = HashMap::new();
    let mut adj: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &node in nodes {
        in_degree.entry(node).or_insert(0);
        adj.entry(node).or_default();
    }

    let mut seen_pairs = HashSet::new();
    for &edge_id in graph.edge_ids() {
        let edge = graph.edge(edge_id);
        let source = graph.port(edge.source).node;
        let target = graph.port(edge.target).node;
        if !seen_pairs.insert((source, target)) {
            continue;
        }
        *in_degree.entry(target).or_insert(0) += 1;
        adj.entry(source).or_default().push(target);
    }

    // Deterministic ordering (sort by NodeId)
    let mut queue: Vec<NodeId> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    queue.sort();
    let mut queue: VecDeque<NodeId> = queue.into_iter().collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = queue.pop_front() {
        order.push(node);
        if let Some(neighbors) = adj.get(&node) {
            let mut sorted = neighbors.clone();
            sorted.sort();
            for next in sorted {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let scheduled: HashSet<NodeId> = order.iter().copied().collect();
        let stuck: Vec<_> = nodes
            .iter()
            .filter(|id| !scheduled.contains(id))
            .map(|&id| graph.node(id).uuid)
            .collect();
        return Err(CompileError::Cycle { nodes: stuck });
    }

    Ok(order)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_graph, select_root};
    use crate::label::label_branches;
    use crate::prune::prune;
    use crate::snapshot::{NodeKindTag, Snapshot};
    use crate::types::DeclaredType;
    use uuid::Uuid;

    fn chain(snap: &mut Snapshot, kind: NodeKindTag) -> (Uuid, Uuid, Uuid) {
        let n = snap.add_node(kind);
        let i = snap.add_input(n, DeclaredType::AnyFloat);
        let o = snap.add_output(n, DeclaredType::AnyFloat);
        (n, i, o)
    }

    fn ordered(snap: &Snapshot) -> Result<(Graph, Schedule), CompileError> {
        let mut graph = build_graph(snap).graph;
        select_root(&mut graph, None)?;
        label_branches(&mut graph)?;
        prune(&mut graph);
        let s = schedule(&mut graph)?;
        Ok((graph, s))
    }

    #[test]
    fn producers_precede_consumers() {
        // Declared consumer-first so the order cannot come from the snapshot.
        let mut snap = Snapshot::default();
        let preview = snap.add_node(NodeKindTag::Preview);
        let p_in = snap.add_input(preview, DeclaredType::Any);
        let (f, f_in, f_out) = chain(&mut snap, NodeKindTag::Fract);
        let (n, n_in, n_out) = chain(&mut snap, NodeKindTag::Normalize);
        let uv = snap.add_node(NodeKindTag::TexCoord);
        let uv_out = snap.add_output(uv, DeclaredType::AnyFloat);
        snap.connect(uv_out, n_in);
        snap.connect(n_out, f_in);
        snap.connect(f_out, p_in);

        let (graph, s) = ordered(&snap).unwrap();
        let uuids: Vec<Uuid> = s.order.iter().map(|&id| graph.node(id).uuid).collect();
        assert_eq!(uuids, vec![uv, n, f, preview]);
        assert_eq!(graph.node_ids(), s.order.as_slice());
    }

    #[test]
    fn shared_producer_counted_once() {
        let mut snap = Snapshot::default();
        let preview = snap.add_node(NodeKindTag::Preview);
        let p_in = snap.add_input(preview, DeclaredType::Any);
        let add = snap.add_node(NodeKindTag::Add);
        let a = snap.add_input(add, DeclaredType::AnyFloat);
        let b = snap.add_input(add, DeclaredType::AnyFloat);
        let add_out = snap.add_output(add, DeclaredType::AnyFloat);
        let uv = snap.add_node(NodeKindTag::TexCoord);
        let uv_out = snap.add_output(uv, DeclaredType::AnyFloat);
        snap.connect(uv_out, a);
        snap.connect(uv_out, b);
        snap.connect(add_out, p_in);

        let (_, s) = ordered(&snap).unwrap();
        assert_eq!(s.order.len(), 3);
    }

    #[test]
    fn cycle_is_fatal() {
        let mut snap = Snapshot::default();
        let preview = snap.add_node(NodeKindTag::Preview);
        let p_in = snap.add_input(preview, DeclaredType::Any);
        let (a, a_in, a_out) = chain(&mut snap, NodeKindTag::Fract);
        let (b, b_in, b_out) = chain(&mut snap, NodeKindTag::Fract);
        snap.connect(a_out, p_in);
        snap.connect(b_out, a_in);
        snap.connect(a_out, b_in);

        let err = ordered(&snap).unwrap_err();
        assert_eq!(err, CompileError::Cycle { nodes: vec![preview, a, b] });
    }
}
