// builder.rs — Compiler graph construction from a snapshot
//
// Groups the snapshot's ports by owning node, instantiates one graph node
// per descriptor by dispatching on its kind, then wires edges between the
// ports that were actually created. Root selection lives here too.
//
// Preconditions: none; the snapshot may describe a graph mid-edit.
// Postconditions: returns a `Graph` plus a `BuildReport` listing every node
//   and edge that was left out.
// Failure modes: none for construction (incomplete configuration drops the
//   node, dangling edges are dropped); `select_root` fails with a structural
//   error when no usable sink exists.
// Side effects: debug-level tracing for each dropped item.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::diag::CompileError;
use crate::graph::{Graph, NodeId, PortDirection};
use crate::node::{ArithOp, Builtin, ConstantValue, NodeKind, VectorOp};
use crate::parser::parse_formula;
use crate::snapshot::{DataValue, NodeDescriptor, NodeKindTag, Snapshot};
use crate::types::DeclaredType;

// ── Public types ────────────────────────────────────────────────────────────

/// Why a node was left out of the compiler graph.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The kind has no code generation.
    Unsupported,
    /// A configuration entry is absent or has the wrong shape.
    Config(&'static str),
    /// The node's port counts do not fit its kind.
    Ports { inputs: usize, outputs: usize },
    /// Another node with the same id came first.
    DuplicateId,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Unsupported => write!(f, "unsupported kind"),
            DropReason::Config(key) => write!(f, "configuration '{key}' missing or malformed"),
            DropReason::Ports { inputs, outputs } => {
                write!(f, "unexpected port shape ({inputs} in, {outputs} out)")
            }
            DropReason::DuplicateId => write!(f, "duplicate node id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedNode {
    pub node: Uuid,
    pub kind: NodeKindTag,
    pub reason: DropReason,
}

/// Everything the builder left out. None of it is an error: these are the
/// normal states of a graph that is still being edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub dropped_nodes: Vec<DroppedNode>,
    pub dropped_edges: Vec<Uuid>,
    /// Calculator nodes whose formula did not parse (built with no expression).
    pub rejected_formulas: Vec<(Uuid, String)>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.dropped_nodes.is_empty()
            && self.dropped_edges.is_empty()
            && self.rejected_formulas.is_empty()
    }
}

#[derive(Debug)]
pub struct GraphResult {
    pub graph: Graph,
    pub report: BuildReport,
}

// ── Public entry points ─────────────────────────────────────────────────────

/// Build the compiler graph described by `snapshot`.
pub fn build_graph(snapshot: &Snapshot) -> GraphResult {
    let mut builder = GraphBuilder::new(snapshot);
    builder.build_nodes();
    builder.build_edges();
    GraphResult {
        graph: builder.graph,
        report: builder.report,
    }
}

/// Choose the sink compilation starts from and record it on the graph.
///
/// With an explicit `requested` id the node must exist and be a sink.
/// Without one the graph must contain exactly one sink.
pub fn select_root(graph: &mut Graph, requested: Option<Uuid>) -> Result<NodeId, CompileError> {
    let root = match requested {
        Some(uuid) => {
            let id = graph.node_by_uuid(uuid).ok_or(CompileError::MissingRoot)?;
            let node = graph.node(id);
            if !node.kind.is_sink() {
                return Err(CompileError::UnexpectedRoot {
                    node: uuid,
                    kind: node.kind.name(),
                });
            }
            id
        }
        None => {
            let sinks: Vec<NodeId> = graph
                .node_ids()
                .iter()
                .copied()
                .filter(|&id| graph.node(id).kind.is_sink())
                .collect();
            match sinks.as_slice() {
                [] => return Err(CompileError::MissingRoot),
                [only] => *only,
                many => {
                    return Err(CompileError::AmbiguousRoot {
                        candidates: many.len(),
                    })
                }
            }
        }
    };
    graph.set_root(root);
    Ok(root)
}

// ── Internal context ────────────────────────────────────────────────────────

type PortList = Vec<(Uuid, DeclaredType)>;

struct GraphBuilder<'a> {
    snapshot: &'a Snapshot,
    ports_by_node: IndexMap<Uuid, (PortList, PortList)>,
    graph: Graph,
    report: BuildReport,
}

impl<'a> GraphBuilder<'a> {
    fn new(snapshot: &'a Snapshot) -> Self {
        let mut ports_by_node: IndexMap<Uuid, (PortList, PortList)> = IndexMap::new();
        for port in &snapshot.input_ports {
            let entry = ports_by_node.entry(port.node).or_default();
            entry.0.push((port.id, port.data_type));
        }
        for port in &snapshot.output_ports {
            let entry = ports_by_node.entry(port.node).or_default();
            entry.1.push((port.id, port.data_type));
        }
        GraphBuilder {
            snapshot,
            ports_by_node,
            graph: Graph::new(),
            report: BuildReport::default(),
        }
    }

    fn drop_node(&mut self, desc: &NodeDescriptor, reason: DropReason) {
        tracing::debug!(node = %desc.id, kind = ?desc.kind, %reason, "node left out of graph");
        self.report.dropped_nodes.push(DroppedNode {
            node: desc.id,
            kind: desc.kind,
            reason,
        });
    }

    // ── Nodes ───────────────────────────────────────────────────────────

    fn build_nodes(&mut self) {
        let snapshot = self.snapshot;
        let mut seen = HashSet::new();
        let empty = (Vec::new(), Vec::new());

        for desc in &snapshot.nodes {
            if !seen.insert(desc.id) {
                self.drop_node(desc, DropReason::DuplicateId);
                continue;
            }
            let kind = match self.node_kind(desc) {
                Ok(kind) => kind,
                Err(reason) => {
                    self.drop_node(desc, reason);
                    continue;
                }
            };
            let (inputs, outputs) = self.ports_by_node.get(&desc.id).unwrap_or(&empty);
            if !kind.accepts_ports(inputs.len(), outputs.len()) {
                let reason = DropReason::Ports {
                    inputs: inputs.len(),
                    outputs: outputs.len(),
                };
                self.drop_node(desc, reason);
                continue;
            }
            let (inputs, outputs) = (inputs.clone(), outputs.clone());
            self.graph.add_node(desc.id, kind, &inputs, &outputs);
        }
    }

    /// Dispatch on the stored kind tag and validate its configuration.
    fn node_kind(&mut self, desc: &NodeDescriptor) -> Result<NodeKind, DropReason> {
        let value = desc.data.get("value");
        Ok(match desc.kind {
            NodeKindTag::Add => NodeKind::Arithmetic(ArithOp::Add),
            NodeKindTag::Subtract => NodeKind::Arithmetic(ArithOp::Subtract),
            NodeKindTag::Multiply => NodeKind::Arithmetic(ArithOp::Multiply),
            NodeKindTag::Divide => NodeKind::Arithmetic(ArithOp::Divide),
            NodeKindTag::Constant => NodeKind::Constant(match value {
                Some(DataValue::Float(v)) => ConstantValue::Float(*v),
                Some(DataValue::Float2(v)) => ConstantValue::Float2(*v),
                Some(DataValue::Float3(v)) => ConstantValue::Float3(*v),
                Some(DataValue::Float4(v)) => ConstantValue::Float4(*v),
                Some(DataValue::Int(v)) => ConstantValue::Int(*v),
                Some(DataValue::Bool(v)) => ConstantValue::Bool(*v),
                _ => return Err(DropReason::Config("value")),
            }),
            NodeKindTag::Color => match value {
                Some(DataValue::Float4([h, s, b, a])) => {
                    let [r, g, b] = crate::node::hsb_to_rgb(*h, *s, *b);
                    NodeKind::Constant(ConstantValue::Float4([r, g, b, *a]))
                }
                _ => return Err(DropReason::Config("value")),
            },
            NodeKindTag::WorldPosition => NodeKind::Load(Builtin::WorldPosition),
            NodeKindTag::TexCoord => NodeKind::Load(Builtin::TexCoord),
            NodeKindTag::Normal => NodeKind::Load(Builtin::Normal),
            NodeKindTag::Tangent => NodeKind::Load(Builtin::Tangent),
            NodeKindTag::Bitangent => NodeKind::Load(Builtin::Bitangent),
            NodeKindTag::Fract => NodeKind::Vector(VectorOp::Fract),
            NodeKindTag::Normalize => NodeKind::Vector(VectorOp::Normalize),
            NodeKindTag::Length => NodeKind::Vector(VectorOp::Length),
            NodeKindTag::Swizzle => {
                let count = match desc.data.get("component_count") {
                    Some(DataValue::Int(n)) if (1..=4).contains(n) => *n as usize,
                    _ => return Err(DropReason::Config("component_count")),
                };
                let Some(DataValue::Float4(selectors)) = value else {
                    return Err(DropReason::Config("value"));
                };
                NodeKind::Swizzle {
                    selectors: selectors[..count]
                        .iter()
                        .map(|s| s.round().clamp(0.0, 3.0) as u32)
                        .collect(),
                }
            }
            NodeKindTag::Combine => NodeKind::Combine,
            NodeKindTag::Separate => NodeKind::Separate,
            NodeKindTag::Sample => NodeKind::Sample,
            NodeKindTag::Compute => match value {
                Some(DataValue::Int3(dims)) if dims.iter().all(|d| *d >= 1) => NodeKind::Compute {
                    dimensions: dims.map(|d| d as u32),
                },
                _ => return Err(DropReason::Config("value")),
            },
            NodeKindTag::IfElse => NodeKind::IfElse,
            NodeKindTag::Calculator => {
                let formula: String = match value {
                    Some(DataValue::StringArray(parts)) => parts.concat(),
                    Some(DataValue::String(text)) => text.clone(),
                    _ => return Err(DropReason::Config("value")),
                };
                let formula: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
                let expression = match parse_formula(&formula) {
                    Ok(expr) => Some(expr),
                    Err(err) => {
                        tracing::debug!(node = %desc.id, %formula, %err, "formula rejected");
                        self.report.rejected_formulas.push((desc.id, err.to_string()));
                        None
                    }
                };
                NodeKind::Calculator { expression }
            }
            NodeKindTag::MaterialOutput => NodeKind::MaterialOutput,
            NodeKindTag::Preview => NodeKind::Preview,
            NodeKindTag::Unsupported => return Err(DropReason::Unsupported),
        })
    }

    // ── Edges ───────────────────────────────────────────────────────────

    fn build_edges(&mut self) {
        let snapshot = self.snapshot;
        for edge in &snapshot.edges {
            let source = self
                .graph
                .port_by_uuid(edge.source)
                .filter(|&p| self.graph.port(p).direction == PortDirection::Output);
            let target = self
                .graph
                .port_by_uuid(edge.target)
                .filter(|&p| self.graph.port(p).direction == PortDirection::Input);
            let connected = match (source, target) {
                (Some(s), Some(t)) => self.graph.connect(edge.id, s, t).is_some(),
                _ => false,
            };
            if !connected {
                tracing::debug!(edge = %edge.id, "edge left out of graph");
                self.report.dropped_edges.push(edge.id);
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConcreteType;

    fn data(key: &str, value: DataValue) -> IndexMap<String, DataValue> {
        let mut map = IndexMap::new();
        map.insert(key.to_string(), value);
        map
    }

    fn float4() -> DeclaredType {
        DeclaredType::Concrete(ConcreteType::Float4)
    }

    #[test]
    fn color_without_value_is_dropped() {
        let mut snap = Snapshot::default();
        let color = snap.add_node(NodeKindTag::Color);
        snap.add_output(color, float4());
        let result = build_graph(&snap);
        assert!(result.graph.node_ids().is_empty());
        assert_eq!(result.report.dropped_nodes[0].reason, DropReason::Config("value"));
    }

    #[test]
    fn color_is_converted_from_hsb() {
        let mut snap = Snapshot::default();
        let color = snap.add_node_with(
            NodeKindTag::Color,
            data("value", DataValue::Float4([0.0, 1.0, 1.0, 0.5])),
        );
        snap.add_output(color, float4());
        let result = build_graph(&snap);
        let id = result.graph.node_by_uuid(color).unwrap();
        assert_eq!(
            result.graph.node(id).kind,
            NodeKind::Constant(ConstantValue::Float4([1.0, 0.0, 0.0, 0.5]))
        );
        assert!(result.report.is_complete());
    }

    #[test]
    fn dangling_edges_are_dropped() {
        let mut snap = Snapshot::default();
        let preview = snap.add_node(NodeKindTag::Preview);
        let input = snap.add_input(preview, DeclaredType::Any);
        let edge = snap.connect(Uuid::new_v4(), input);
        let result = build_graph(&snap);
        assert_eq!(result.graph.node_ids().len(), 1);
        assert!(result.graph.edge_ids().is_empty());
        assert_eq!(result.report.dropped_edges, vec![edge]);
    }

    #[test]
    fn edges_into_dropped_nodes_are_dropped() {
        let mut snap = Snapshot::default();
        let spline = snap.add_node(NodeKindTag::Unsupported);
        let out = snap.add_output(spline, DeclaredType::AnyFloat);
        let preview = snap.add_node(NodeKindTag::Preview);
        let input = snap.add_input(preview, DeclaredType::Any);
        snap.connect(out, input);
        let result = build_graph(&snap);
        assert_eq!(result.report.dropped_nodes.len(), 1);
        assert_eq!(result.report.dropped_nodes[0].reason, DropReason::Unsupported);
        assert_eq!(result.report.dropped_edges.len(), 1);
    }

    #[test]
    fn wrong_port_shape_is_dropped() {
        let mut snap = Snapshot::default();
        let branch = snap.add_node(NodeKindTag::IfElse);
        snap.add_input(branch, DeclaredType::Any);
        snap.add_output(branch, DeclaredType::Any);
        let result = build_graph(&snap);
        assert_eq!(
            result.report.dropped_nodes[0].reason,
            DropReason::Ports {
                inputs: 1,
                outputs: 1
            }
        );
    }

    #[test]
    fn swizzle_reads_count_and_selectors() {
        let mut snap = Snapshot::default();
        let mut config = data("component_count", DataValue::Int(2));
        config.insert("value".into(), DataValue::Float4([2.0, 0.4, 9.0, 1.0]));
        let swizzle = snap.add_node_with(NodeKindTag::Swizzle, config);
        snap.add_input(swizzle, DeclaredType::AnyFloat);
        snap.add_output(swizzle, DeclaredType::AnyFloat);
        let result = build_graph(&snap);
        let id = result.graph.node_by_uuid(swizzle).unwrap();
        assert_eq!(
            result.graph.node(id).kind,
            NodeKind::Swizzle {
                selectors: vec![2, 0]
            }
        );
    }

    #[test]
    fn calculator_formula_is_parsed() {
        let mut snap = Snapshot::default();
        let calc = snap.add_node_with(
            NodeKindTag::Calculator,
            data(
                "value",
                DataValue::StringArray(vec!["x * ".into(), "2".into()]),
            ),
        );
        snap.add_input(calc, DeclaredType::AnyFloat);
        snap.add_output(calc, DeclaredType::AnyFloat);
        let result = build_graph(&snap);
        let id = result.graph.node_by_uuid(calc).unwrap();
        let NodeKind::Calculator { expression } = &result.graph.node(id).kind else {
            panic!("expected calculator");
        };
        assert_eq!(expression.as_ref().unwrap().to_string(), "mul(x, 2)");
    }

    #[test]
    fn bad_formula_keeps_node_without_expression() {
        let mut snap = Snapshot::default();
        let calc = snap.add_node_with(
            NodeKindTag::Calculator,
            data("value", DataValue::String("sqrt(1".into())),
        );
        snap.add_output(calc, DeclaredType::AnyFloat);
        let result = build_graph(&snap);
        let id = result.graph.node_by_uuid(calc).unwrap();
        assert_eq!(
            result.graph.node(id).kind,
            NodeKind::Calculator { expression: None }
        );
        assert_eq!(result.report.rejected_formulas.len(), 1);
    }

    #[test]
    fn root_selection() {
        let mut snap = Snapshot::default();
        let constant = snap.add_node_with(NodeKindTag::Constant, data("value", DataValue::Float(1.0)));
        snap.add_output(constant, DeclaredType::AnyFloat);
        let mut graph = build_graph(&snap).graph;
        assert_eq!(select_root(&mut graph, None), Err(CompileError::MissingRoot));
        assert!(matches!(
            select_root(&mut graph, Some(constant)),
            Err(CompileError::UnexpectedRoot { kind: "constant", .. })
        ));

        let a = snap.add_node(NodeKindTag::Preview);
        snap.add_input(a, DeclaredType::Any);
        let b = snap.add_node(NodeKindTag::MaterialOutput);
        snap.add_input(b, float4());
        let mut graph = build_graph(&snap).graph;
        assert_eq!(
            select_root(&mut graph, None),
            Err(CompileError::AmbiguousRoot { candidates: 2 })
        );
        let root = select_root(&mut graph, Some(b)).unwrap();
        assert_eq!(graph.root(), Some(root));
    }
}
