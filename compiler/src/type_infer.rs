// type_infer.rs — Type concretization
//
// Narrows every live port from its declared (possibly abstract) type to one
// concrete type. Node kinds contribute constraints over their own ports;
// every live edge contributes `Same(source, target)`. Candidate sets are
// bitset domains narrowed by propagation to a fixpoint.
//
// A port still ambiguous at the fixpoint is resolved by looking at its
// equivalence group (ports joined through `Same`): a group touching an edge
// has nothing anchoring it and is an error; an isolated group (unconnected
// ports only) takes its lowest-ranked candidate and propagation resumes.
// Ambiguous ports are visited in topological node order, inputs first.
//
// Preconditions: pruning and ordering have run.
// Postconditions: every live port has `concrete` set.
// Failure modes: `TypeConflict` when a domain becomes empty; `Unresolved`
//   when a connected group stays ambiguous. Both name the offending node.
// Side effects: writes `Port::concrete`; debug-level tracing for defaults.

use std::collections::HashMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::diag::CompileError;
use crate::graph::{Graph, NodeId, PortId};
use crate::types::{ConcreteType, Domain};

// ── Constraints ─────────────────────────────────────────────────────────────

/// A type rule between ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// All ports resolve to the same type.
    Same(Vec<PortId>),
    /// Both ports have the same composite size (texture element size counts).
    SameComposite(PortId, PortId),
    /// Both ports have the same dimensionality (texture dimension counts).
    SameDimensionality(PortId, PortId),
    /// The port resolves to a member of the domain.
    Restrict(PortId, Domain),
}

/// A constraint together with the node it is attributed to.
#[derive(Debug, Clone)]
struct Rule {
    node: NodeId,
    constraint: Constraint,
}

// ── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeResult {
    /// Number of ports given a concrete type.
    pub resolved: usize,
    /// Unconnected ports that took their default type.
    pub defaulted: Vec<(Uuid, ConcreteType)>,
}

// ── Type concretization engine ──────────────────────────────────────────────

pub fn concretize(graph: &mut Graph) -> Result<TypeResult, CompileError> {
    let rules = collect_rules(graph);
    let mut solver = Solver::new(graph);
    solver.propagate(&rules)?;
    let defaulted = solver.resolve_ambiguous(&rules)?;

    let assignments: Vec<(PortId, Option<ConcreteType>)> = solver
        .domains
        .iter()
        .map(|(&port, domain)| (port, domain.single()))
        .collect();
    let resolved = assignments.len();
    for (port, ty) in assignments {
        graph.port_mut(port).concrete = ty;
    }

    tracing::debug!(resolved, defaulted = defaulted.len(), "port types concretized");
    Ok(TypeResult {
        resolved,
        defaulted,
    })
}

/// Node rules in node order, then one `Same` per live edge attributed to the
/// consuming node. Restrictions come first so conflicts are reported against
/// the declaration that excluded a type.
fn collect_rules(graph: &Graph) -> Vec<Rule> {
    let mut rules = Vec::new();
    for &id in graph.node_ids() {
        let node = graph.node(id);
        for constraint in node.kind.constraints(&node.inputs, &node.outputs) {
            rules.push(Rule {
                node: id,
                constraint,
            });
        }
    }
    for &edge_id in graph.edge_ids() {
        let edge = graph.edge(edge_id);
        rules.push(Rule {
            node: graph.port(edge.target).node,
            constraint: Constraint::Same(vec![edge.source, edge.target]),
        });
    }
    let (mut restricts, others): (Vec<Rule>, Vec<Rule>) = rules
        .into_iter()
        .partition(|r| matches!(r.constraint, Constraint::Restrict(..)));
    restricts.extend(others);
    restricts
}

struct Solver<'g> {
    graph: &'g Graph,
    domains: HashMap<PortId, Domain>,
}

impl<'g> Solver<'g> {
    fn new(graph: &'g Graph) -> Self {
        let mut domains = HashMap::new();
        for &id in graph.node_ids() {
            let node = graph.node(id);
            for &port in node.inputs.iter().chain(&node.outputs) {
                domains.insert(port, graph.port(port).declared.domain());
            }
        }
        Solver { graph, domains }
    }

    fn domain(&self, port: PortId) -> Domain {
        self.domains.get(&port).copied().unwrap_or(Domain::EMPTY)
    }

    /// Returns whether the domain changed.
    fn set(&mut self, port: PortId, domain: Domain) -> bool {
        self.domains.insert(port, domain) != Some(domain)
    }

    fn conflict(&self, node: NodeId, port: PortId, found: Domain, allowed: Domain) -> CompileError {
        CompileError::TypeConflict {
            node: self.graph.node(node).uuid,
            port: self.graph.port(port).uuid,
            found,
            allowed,
        }
    }

    fn propagate(&mut self, rules: &[Rule]) -> Result<(), CompileError> {
        loop {
            let mut changed = false;
            for rule in rules {
                changed |= self.apply(rule)?;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn apply(&mut self, rule: &Rule) -> Result<bool, CompileError> {
        match &rule.constraint {
            Constraint::Restrict(port, allowed) => {
                let current = self.domain(*port);
                let next = current.intersect(*allowed);
                if next.is_empty() {
                    return Err(self.conflict(rule.node, *port, current, *allowed));
                }
                Ok(self.set(*port, next))
            }
            Constraint::Same(ports) => {
                let mut common = Domain::ALL;
                for &port in ports {
                    let next = common.intersect(self.domain(port));
                    if next.is_empty() {
                        return Err(self.conflict(rule.node, port, self.domain(port), common));
                    }
                    common = next;
                }
                let mut changed = false;
                for &port in ports {
                    changed |= self.set(port, common);
                }
                Ok(changed)
            }
            Constraint::SameComposite(a, b) => {
                self.match_pair(rule.node, *a, *b, ConcreteType::composite_size)
            }
            Constraint::SameDimensionality(a, b) => {
                self.match_pair(rule.node, *a, *b, ConcreteType::dimensionality)
            }
        }
    }

    /// Keep the members of each side whose `key` appears on the other side.
    fn match_pair(
        &mut self,
        node: NodeId,
        a: PortId,
        b: PortId,
        key: fn(ConcreteType) -> u8,
    ) -> Result<bool, CompileError> {
        let (da, db) = (self.domain(a), self.domain(b));
        let na = da.filter(|t| db.iter().any(|u| key(u) == key(t)));
        if na.is_empty() {
            return Err(self.conflict(node, a, da, db));
        }
        let nb = db.filter(|t| na.iter().any(|u| key(u) == key(t)));
        if nb.is_empty() {
            return Err(self.conflict(node, b, db, na));
        }
        let changed = self.set(a, na);
        Ok(self.set(b, nb) || changed)
    }

    fn resolve_ambiguous(&mut self, rules: &[Rule]) -> Result<Vec<(Uuid, ConcreteType)>, CompileError> {
        let groups = EquivalenceGroups::new(self.graph, rules);
        let mut defaulted = Vec::new();

        let graph = self.graph;
        for &id in graph.node_ids() {
            let node = graph.node(id);
            for &port in node.inputs.iter().chain(&node.outputs) {
                let candidates = self.domain(port);
                if candidates.len() <= 1 {
                    continue;
                }
                if groups.touches_edge(port) {
                    return Err(CompileError::Unresolved {
                        node: node.uuid,
                        port: graph.port(port).uuid,
                        candidates,
                    });
                }
                let Some(ty) = candidates.first() else {
                    continue;
                };
                tracing::debug!(node = %node.uuid, port = %graph.port(port).uuid, %ty, "unconnected port defaulted");
                self.set(port, Domain::of(ty));
                defaulted.push((graph.port(port).uuid, ty));
                self.propagate(rules)?;
            }
        }
        Ok(defaulted)
    }
}

// ── Equivalence groups ──────────────────────────────────────────────────────

/// Union-find over ports joined by `Same` rules (edges included).
struct EquivalenceGroups {
    parent: HashMap<PortId, PortId>,
    connected: HashMap<PortId, bool>,
}

impl EquivalenceGroups {
    fn new(graph: &Graph, rules: &[Rule]) -> Self {
        let mut groups = EquivalenceGroups {
            parent: HashMap::new(),
            connected: HashMap::new(),
        };
        for rule in rules {
            if let Constraint::Same(ports) = &rule.constraint {
                for pair in ports.windows(2) {
                    groups.union(pair[0], pair[1]);
                }
            }
        }
        let ports: Vec<PortId> = graph
            .node_ids()
            .iter()
            .flat_map(|&id| {
                let node = graph.node(id);
                node.inputs.iter().chain(&node.outputs).copied().collect::<Vec<_>>()
            })
            .collect();
        for port in ports {
            if graph.has_edge(port) {
                let root = groups.find(port);
                groups.connected.insert(root, true);
            }
        }
        groups
    }

    fn find(&mut self, port: PortId) -> PortId {
        let parent = self.parent.get(&port).copied().unwrap_or(port);
        if parent == port {
            return port;
        }
        let root = self.find(parent);
        self.parent.insert(port, root);
        root
    }

    fn find_readonly(&self, mut port: PortId) -> PortId {
        while let Some(&parent) = self.parent.get(&port) {
            if parent == port {
                break;
            }
            port = parent;
        }
        port
    }

    fn union(&mut self, a: PortId, b: PortId) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent.insert(ra.max(rb), ra.min(rb));
        }
    }

    fn touches_edge(&self, port: PortId) -> bool {
        let root = self.find_readonly(port);
        self.connected.get(&root).copied().unwrap_or(false)
    }
}

// ── Rendering ───────────────────────────────────────────────────────────────

/// One line per live node: its kind, id and the concrete port types.
pub fn render_types(graph: &Graph) -> String {
    let name = |port: &PortId| {
        graph
            .port(*port)
            .concrete
            .map_or_else(|| "?".to_string(), |t| t.to_string())
    };
    let mut out = String::new();
    for &id in graph.node_ids() {
        let node = graph.node(id);
        let inputs: Vec<String> = node.inputs.iter().map(name).collect();
        let outputs: Vec<String> = node.outputs.iter().map(name).collect();
        let _ = writeln!(
            out,
            "{} {}: ({}) -> ({})",
            node.uuid,
            node.kind.name(),
            inputs.join(", "),
            outputs.join(", ")
        );
    }
    out
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_graph, select_root};
    use crate::label::label_branches;
    use crate::prune::prune;
    use crate::schedule::schedule;
    use crate::snapshot::{DataValue, NodeKindTag, Snapshot};
    use crate::types::DeclaredType;
    use indexmap::IndexMap;

    fn typed(snap: &Snapshot) -> Result<(Graph, TypeResult), CompileError> {
        let mut graph = build_graph(snap).graph;
        select_root(&mut graph, None)?;
        label_branches(&mut graph)?;
        prune(&mut graph);
        schedule(&mut graph)?;
        let result = concretize(&mut graph)?;
        Ok((graph, result))
    }

    fn port_type(graph: &Graph, port: Uuid) -> Option<ConcreteType> {
        graph.port(graph.port_by_uuid(port).unwrap()).concrete
    }

    fn preview(snap: &mut Snapshot) -> Uuid {
        let node = snap.add_node(NodeKindTag::Preview);
        snap.add_input(node, DeclaredType::Any)
    }

    fn source(snap: &mut Snapshot, kind: NodeKindTag) -> Uuid {
        let node = snap.add_node(kind);
        snap.add_output(node, DeclaredType::AnyFloat)
    }

    #[test]
    fn arithmetic_follows_its_connected_input() {
        let mut snap = Snapshot::default();
        let sink = preview(&mut snap);
        let uv = source(&mut snap, NodeKindTag::TexCoord);
        let add = snap.add_node(NodeKindTag::Add);
        let a = snap.add_input(add, DeclaredType::AnyFloat);
        let b = snap.add_input(add, DeclaredType::AnyFloat);
        let out = snap.add_output(add, DeclaredType::AnyFloat);
        snap.connect(uv, a);
        snap.connect(out, sink);

        let (graph, result) = typed(&snap).unwrap();
        for port in [uv, a, b, out, sink] {
            assert_eq!(port_type(&graph, port), Some(ConcreteType::Float2));
        }
        assert!(result.defaulted.is_empty());
    }

    #[test]
    fn mismatched_inputs_conflict_at_the_consumer() {
        let mut snap = Snapshot::default();
        let sink = preview(&mut snap);
        let normal = source(&mut snap, NodeKindTag::Normal);
        let uv = source(&mut snap, NodeKindTag::TexCoord);
        let add = snap.add_node(NodeKindTag::Add);
        let a = snap.add_input(add, DeclaredType::AnyFloat);
        let b = snap.add_input(add, DeclaredType::AnyFloat);
        let out = snap.add_output(add, DeclaredType::AnyFloat);
        snap.connect(normal, a);
        snap.connect(uv, b);
        snap.connect(out, sink);

        let err = typed(&snap).unwrap_err();
        assert!(matches!(err, CompileError::TypeConflict { node, .. } if node == add));
    }

    #[test]
    fn declared_type_excludes_connected_value() {
        let mut snap = Snapshot::default();
        let output = snap.add_node(NodeKindTag::MaterialOutput);
        let input = snap.add_input(output, DeclaredType::Concrete(ConcreteType::Float4));
        let uv = source(&mut snap, NodeKindTag::TexCoord);
        snap.connect(uv, input);

        let err = typed(&snap).unwrap_err();
        assert_eq!(err.node(), Some(output));
    }

    #[test]
    fn connected_but_unanchored_is_unresolved() {
        let mut snap = Snapshot::default();
        let sink = preview(&mut snap);
        let fract = snap.add_node(NodeKindTag::Fract);
        snap.add_input(fract, DeclaredType::AnyFloat);
        let out = snap.add_output(fract, DeclaredType::AnyFloat);
        snap.connect(out, sink);

        let err = typed(&snap).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Unresolved { node, candidates, .. }
                if node == fract && candidates == Domain::FLOATS
        ));
    }

    #[test]
    fn isolated_port_takes_default() {
        let mut snap = Snapshot::default();
        let sink = preview(&mut snap);
        let length = snap.add_node(NodeKindTag::Length);
        let input = snap.add_input(length, DeclaredType::AnyFloat);
        let out = snap.add_output(length, DeclaredType::AnyFloat);
        snap.connect(out, sink);

        let (graph, result) = typed(&snap).unwrap();
        assert_eq!(result.defaulted, vec![(input, ConcreteType::Float)]);
        assert_eq!(port_type(&graph, sink), Some(ConcreteType::Float));
    }

    #[test]
    fn sample_follows_texture_element_and_dimension() {
        let mut snap = Snapshot::default();
        let sink = preview(&mut snap);
        let mut data = IndexMap::new();
        data.insert("value".to_string(), DataValue::Int3([64, 64, 1]));
        let compute = snap.add_node_with(NodeKindTag::Compute, data);
        let compute_in = snap.add_input(compute, DeclaredType::AnyFloat);
        let texture = snap.add_output(compute, DeclaredType::AnyTexture);
        let uv = source(&mut snap, NodeKindTag::TexCoord);
        let sample = snap.add_node(NodeKindTag::Sample);
        let field = snap.add_input(sample, DeclaredType::AnyTexture);
        let position = snap.add_input(sample, DeclaredType::AnyFloat123);
        let out = snap.add_output(sample, DeclaredType::AnyFloat);
        snap.connect(texture, field);
        snap.connect(uv, position);
        snap.connect(out, sink);

        let (graph, result) = typed(&snap).unwrap();
        assert_eq!(
            port_type(&graph, field),
            Some(ConcreteType::Texture { dim: 2, size: 4 })
        );
        assert_eq!(port_type(&graph, out), Some(ConcreteType::Float4));
        assert_eq!(port_type(&graph, sink), Some(ConcreteType::Float4));
        assert_eq!(result.defaulted, vec![(compute_in, ConcreteType::Float)]);
    }

    #[test]
    fn dimension_mismatch_conflicts() {
        let mut snap = Snapshot::default();
        let sink = preview(&mut snap);
        let mut data = IndexMap::new();
        data.insert("value".to_string(), DataValue::Int3([8, 8, 8]));
        let compute = snap.add_node_with(NodeKindTag::Compute, data);
        snap.add_input(compute, DeclaredType::AnyFloat);
        let texture = snap.add_output(compute, DeclaredType::AnyTexture);
        let uv = source(&mut snap, NodeKindTag::TexCoord);
        let sample = snap.add_node(NodeKindTag::Sample);
        let field = snap.add_input(sample, DeclaredType::AnyTexture);
        let position = snap.add_input(sample, DeclaredType::AnyFloat123);
        let out = snap.add_output(sample, DeclaredType::AnyFloat);
        snap.connect(texture, field);
        snap.connect(uv, position);
        snap.connect(out, sink);

        let err = typed(&snap).unwrap_err();
        assert!(matches!(err, CompileError::TypeConflict { node, .. } if node == sample));
    }

    #[test]
    fn rendered_types_list_every_live_node() {
        let mut snap = Snapshot::default();
        let sink = preview(&mut snap);
        let uv = source(&mut snap, NodeKindTag::TexCoord);
        snap.connect(uv, sink);

        let (graph, _) = typed(&snap).unwrap();
        let text = render_types(&graph);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("load: () -> (float2)"));
        assert!(lines[1].ends_with("preview: (float2) -> ()"));
    }
}
