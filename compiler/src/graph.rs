// graph.rs — Compiler graph: arena-allocated nodes, ports and edges
//
// The graph owns every node, port and edge in flat arenas addressed by
// integer ids. Ports hold back-references (ids) to their owning node and to
// their connected edges. Passes never remove arena entries; removal takes a
// node or edge out of the live `node_list` / `edge_list` and detaches the
// edge from its ports.
//
// Invariant: every edge in `edge_list` connects ports whose nodes are in
// `node_list` (established by pruning).
//
// Preconditions: none.
// Postconditions: `connect` keeps input ports single-writer.
// Failure modes: none; malformed connections are refused, not reported.
// Side effects: none.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::id::{BranchTag, BranchTagAllocator, IdAllocator};
use crate::node::{InputRegion, NodeKind};
use crate::types::{ConcreteType, DeclaredType};

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Labeling behavior of an input port, fixed when the node is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRegion {
    Inherit,
    Begin(BranchTag),
    Boundary,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub uuid: Uuid,
    pub node: NodeId,
    pub direction: PortDirection,
    pub declared: DeclaredType,
    pub region: PortRegion,
    /// Set once by concretization.
    pub concrete: Option<ConcreteType>,
    /// Input ports only: at most one writer.
    pub incoming: Option<EdgeId>,
    /// Output ports only.
    pub outgoing: Vec<EdgeId>,
    reserved_id: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub uuid: Uuid,
    pub kind: NodeKind,
    pub inputs: Vec<PortId>,
    pub outputs: Vec<PortId>,
    /// Conditional regions this node's value is needed in.
    pub tags: BTreeSet<BranchTag>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub uuid: Uuid,
    /// Output port.
    pub source: PortId,
    /// Input port.
    pub target: PortId,
}

#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    ports: Vec<Port>,
    edges: Vec<Edge>,
    live: Vec<bool>,
    node_list: Vec<NodeId>,
    edge_list: Vec<EdgeId>,
    node_index: IndexMap<Uuid, NodeId>,
    port_index: IndexMap<Uuid, PortId>,
    root: Option<NodeId>,
    tags: BranchTagAllocator,
}

// ── Construction ────────────────────────────────────────────────────────────

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and its ports. Inputs that open a conditional region get a
    /// fresh branch tag here.
    pub fn add_node(
        &mut self,
        uuid: Uuid,
        kind: NodeKind,
        inputs: &[(Uuid, DeclaredType)],
        outputs: &[(Uuid, DeclaredType)],
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let input_ports = inputs
            .iter()
            .enumerate()
            .map(|(i, &(port_uuid, declared))| {
                let region = match kind.input_region(i) {
                    InputRegion::Inherit => PortRegion::Inherit,
                    InputRegion::NewBranch => PortRegion::Begin(self.tags.alloc()),
                    InputRegion::Boundary => PortRegion::Boundary,
                };
                self.add_port(port_uuid, id, PortDirection::Input, declared, region)
            })
            .collect();
        let output_ports = outputs
            .iter()
            .map(|&(port_uuid, declared)| {
                self.add_port(port_uuid, id, PortDirection::Output, declared, PortRegion::Inherit)
            })
            .collect();

        self.nodes.push(Node {
            uuid,
            kind,
            inputs: input_ports,
            outputs: output_ports,
            tags: BTreeSet::new(),
        });
        self.live.push(true);
        self.node_list.push(id);
        self.node_index.insert(uuid, id);
        id
    }

    fn add_port(
        &mut self,
        uuid: Uuid,
        node: NodeId,
        direction: PortDirection,
        declared: DeclaredType,
        region: PortRegion,
    ) -> PortId {
        let id = PortId(self.ports.len() as u32);
        self.ports.push(Port {
            uuid,
            node,
            direction,
            declared,
            region,
            concrete: None,
            incoming: None,
            outgoing: Vec::new(),
            reserved_id: None,
        });
        self.port_index.insert(uuid, id);
        id
    }

    /// Connect an output port to an input port. Refused (returns `None`) when
    /// the directions are wrong or the input already has a writer.
    pub fn connect(&mut self, uuid: Uuid, source: PortId, target: PortId) -> Option<EdgeId> {
        let src = self.ports.get(source.0 as usize)?;
        let dst = self.ports.get(target.0 as usize)?;
        if src.direction != PortDirection::Output
            || dst.direction != PortDirection::Input
            || dst.incoming.is_some()
        {
            return None;
        }
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            uuid,
            source,
            target,
        });
        self.ports[source.0 as usize].outgoing.push(id);
        self.ports[target.0 as usize].incoming = Some(id);
        self.edge_list.push(id);
        Some(id)
    }

    pub fn mint_tag(&mut self) -> BranchTag {
        self.tags.alloc()
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }
}

// ── Queries ─────────────────────────────────────────────────────────────────

impl Graph {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.0 as usize]
    }

    pub fn port_mut(&mut self, id: PortId) -> &mut Port {
        &mut self.ports[id.0 as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Live nodes, in the current list order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_list
    }

    /// Live edges.
    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_list
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.live.get(id.0 as usize).copied().unwrap_or(false)
    }

    pub fn node_by_uuid(&self, uuid: Uuid) -> Option<NodeId> {
        self.node_index.get(&uuid).copied()
    }

    pub fn port_by_uuid(&self, uuid: Uuid) -> Option<PortId> {
        self.port_index.get(&uuid).copied()
    }

    /// The output port feeding `input`, if it is connected.
    pub fn upstream(&self, input: PortId) -> Option<PortId> {
        self.port(input).incoming.map(|e| self.edge(e).source)
    }

    /// The node producing the value for `input`, if it is connected.
    pub fn producer(&self, input: PortId) -> Option<NodeId> {
        self.upstream(input).map(|p| self.port(p).node)
    }

    /// Distinct producers of `node`'s connected inputs, in port order.
    pub fn dependencies(&self, node: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.node(node)
            .inputs
            .iter()
            .filter_map(|&p| self.producer(p))
            .filter(|n| seen.insert(*n))
            .collect()
    }

    pub fn has_edge(&self, port: PortId) -> bool {
        let p = self.port(port);
        p.incoming.is_some() || !p.outgoing.is_empty()
    }
}

// ── Mutation by passes ──────────────────────────────────────────────────────

impl Graph {
    /// Replace the live node list with a permutation of it.
    pub fn set_node_order(&mut self, order: Vec<NodeId>) {
        debug_assert_eq!(order.len(), self.node_list.len());
        self.node_list = order;
    }

    /// Keep only nodes satisfying `keep`; edges touching a removed node are
    /// removed too. Returns what was removed.
    pub fn retain_nodes(&mut self, keep: impl Fn(&Node) -> bool) -> (Vec<NodeId>, Vec<EdgeId>) {
        let mut removed_nodes = Vec::new();
        let mut kept = Vec::with_capacity(self.node_list.len());
        for &id in &self.node_list {
            if keep(&self.nodes[id.0 as usize]) {
                kept.push(id);
            } else {
                self.live[id.0 as usize] = false;
                removed_nodes.push(id);
            }
        }
        self.node_list = kept;

        let mut removed_edges = Vec::new();
        let mut kept_edges = Vec::with_capacity(self.edge_list.len());
        for &id in &self.edge_list {
            let edge = &self.edges[id.0 as usize];
            let source_node = self.ports[edge.source.0 as usize].node;
            let target_node = self.ports[edge.target.0 as usize].node;
            if self.live[source_node.0 as usize] && self.live[target_node.0 as usize] {
                kept_edges.push(id);
            } else {
                removed_edges.push(id);
            }
        }
        self.edge_list = kept_edges;

        for &id in &removed_edges {
            let Edge { source, target, .. } = self.edges[id.0 as usize];
            self.ports[source.0 as usize].outgoing.retain(|e| *e != id);
            let target = &mut self.ports[target.0 as usize];
            if target.incoming == Some(id) {
                target.incoming = None;
            }
        }

        (removed_nodes, removed_edges)
    }

    /// The id for `port`, reserving a fresh one on first use. Reservation is
    /// idempotent: later calls return the same id.
    pub fn reserve_id(&mut self, port: PortId, ids: &mut IdAllocator) -> u32 {
        let slot = &mut self.ports[port.0 as usize].reserved_id;
        *slot.get_or_insert_with(|| ids.alloc())
    }

    pub fn reserved_id(&self, port: PortId) -> Option<u32> {
        self.port(port).reserved_id
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Graph ({} nodes, {} edges)",
            self.node_list.len(),
            self.edge_list.len()
        )?;
        for &id in &self.node_list {
            let node = self.node(id);
            let tags: Vec<String> = node.tags.iter().map(|t| t.to_string()).collect();
            writeln!(f, "  n{} {} [{}]", id.0, node.kind.name(), tags.join(", "))?;
        }
        for &id in &self.edge_list {
            let edge = self.edge(id);
            writeln!(
                f,
                "  n{} -> n{}",
                self.port(edge.source).node.0,
                self.port(edge.target).node.0
            )?;
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ArithOp, ConstantValue};

    fn float() -> DeclaredType {
        DeclaredType::Concrete(ConcreteType::Float)
    }

    fn constant(g: &mut Graph) -> (NodeId, PortId) {
        let n = g.add_node(
            Uuid::new_v4(),
            NodeKind::Constant(ConstantValue::Float(1.0)),
            &[],
            &[(Uuid::new_v4(), float())],
        );
        (n, g.node(n).outputs[0])
    }

    fn add(g: &mut Graph) -> NodeId {
        g.add_node(
            Uuid::new_v4(),
            NodeKind::Arithmetic(ArithOp::Add),
            &[(Uuid::new_v4(), float()), (Uuid::new_v4(), float())],
            &[(Uuid::new_v4(), float())],
        )
    }

    #[test]
    fn input_ports_are_single_writer() {
        let mut g = Graph::new();
        let (_, a) = constant(&mut g);
        let (_, b) = constant(&mut g);
        let sum = add(&mut g);
        let input = g.node(sum).inputs[0];
        assert!(g.connect(Uuid::new_v4(), a, input).is_some());
        assert!(g.connect(Uuid::new_v4(), b, input).is_none());
        assert_eq!(g.edge_ids().len(), 1);
    }

    #[test]
    fn connect_rejects_wrong_direction() {
        let mut g = Graph::new();
        let sum = add(&mut g);
        let other = add(&mut g);
        let out = g.node(sum).outputs[0];
        let other_out = g.node(other).outputs[0];
        assert!(g.connect(Uuid::new_v4(), out, other_out).is_none());
    }

    #[test]
    fn producer_follows_edge() {
        let mut g = Graph::new();
        let (c, out) = constant(&mut g);
        let sum = add(&mut g);
        let input = g.node(sum).inputs[1];
        g.connect(Uuid::new_v4(), out, input);
        assert_eq!(g.producer(input), Some(c));
        assert_eq!(g.dependencies(sum), vec![c]);
        assert!(g.has_edge(out));
    }

    #[test]
    fn retain_nodes_drops_touching_edges() {
        let mut g = Graph::new();
        let (c, out) = constant(&mut g);
        let sum = add(&mut g);
        let input = g.node(sum).inputs[0];
        g.connect(Uuid::new_v4(), out, input);

        let (nodes, edges) = g.retain_nodes(|n| !matches!(n.kind, NodeKind::Constant(_)));
        assert_eq!(nodes, vec![c]);
        assert_eq!(edges.len(), 1);
        assert!(!g.contains(c));
        assert!(g.port(input).incoming.is_none());
        assert!(g.port(out).outgoing.is_empty());
    }

    #[test]
    fn reserve_id_is_idempotent() {
        let mut g = Graph::new();
        let (_, out) = constant(&mut g);
        let mut ids = IdAllocator::new();
        let first = g.reserve_id(out, &mut ids);
        let second = g.reserve_id(out, &mut ids);
        assert_eq!(first, second);
        assert_eq!(ids.bound(), first + 1);
    }

    #[test]
    fn if_else_sides_get_fresh_tags() {
        let mut g = Graph::new();
        let ports: Vec<(Uuid, DeclaredType)> = (0..3).map(|_| (Uuid::new_v4(), float())).collect();
        let n = g.add_node(
            Uuid::new_v4(),
            NodeKind::IfElse,
            &ports,
            &[(Uuid::new_v4(), float())],
        );
        let inputs = g.node(n).inputs.clone();
        assert_eq!(g.port(inputs[0]).region, PortRegion::Inherit);
        let (PortRegion::Begin(t), PortRegion::Begin(f)) =
            (g.port(inputs[1]).region, g.port(inputs[2]).region)
        else {
            panic!("branch inputs must open regions");
        };
        assert_ne!(t, f);
    }
}
