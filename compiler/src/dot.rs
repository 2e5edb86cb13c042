// dot.rs — Graphviz DOT output for compiler graphs
//
// Renders the live nodes and edges of a graph in DOT format suitable for
// `dot` or other Graphviz layout engines. Nodes show their kind and branch
// tags; edges show the concrete type flowing along them once concretization
// has run, and edges feeding a conditional's true/false inputs are dashed.
//
// Preconditions: `graph` is built; labeling and concretization are optional.
// Postconditions: returns a DOT string with one statement per live node and edge.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::graph::{Graph, NodeId};

/// Emit the graph as a Graphviz DOT string.
pub fn emit_dot(graph: &Graph) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "digraph shader {{");
    let _ = writeln!(buf, "    rankdir=LR;");
    let _ = writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10, shape=box];");
    let _ = writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];");
    let _ = writeln!(buf);

    for &id in graph.node_ids() {
        let node = graph.node(id);
        let mut label = node.kind.name().to_string();
        if !node.tags.is_empty() {
            let tags: Vec<String> = node.tags.iter().map(|t| t.to_string()).collect();
            let _ = write!(label, "\\n[{}]", tags.join(", "));
        }
        let style = node_style(graph, id);
        let _ = writeln!(buf, "    n{} [label=\"{}\"{}];", id.0, label, style);
    }

    if !graph.edge_ids().is_empty() {
        let _ = writeln!(buf);
    }
    for &id in graph.edge_ids() {
        let edge = graph.edge(id);
        let source = graph.port(edge.source);
        let target = graph.port(edge.target);
        let consumer = graph.node(target.node);

        let mut attrs = Vec::new();
        if let Some(ty) = source.concrete {
            attrs.push(format!("label=\"{ty}\""));
        }
        if let Some((on_true, on_false)) = consumer.kind.branch_inputs(&consumer.inputs) {
            if edge.target == on_true {
                attrs.push("style=dashed, color=darkgreen, taillabel=\"true\"".into());
            } else if edge.target == on_false {
                attrs.push("style=dashed, color=firebrick, taillabel=\"false\"".into());
            }
        }
        let attrs = if attrs.is_empty() {
            String::new()
        } else {
            format!(" [{}]", attrs.join(", "))
        };
        let _ = writeln!(buf, "    n{} -> n{}{};", source.node.0, target.node.0, attrs);
    }

    let _ = writeln!(buf, "}}");
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn node_style(graph: &Graph, id: NodeId) -> &'static str {
    let kind = &graph.node(id).kind;
    if graph.root() == Some(id) {
        ", shape=doubleoctagon, style=filled, fillcolor=lightblue"
    } else if kind.is_sink() {
        ", shape=octagon"
    } else if kind.is_branch() {
        ", shape=diamond"
    } else {
        ""
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_graph, select_root};
    use crate::label::label_branches;
    use crate::snapshot::{NodeKindTag, Snapshot};
    use crate::types::{ConcreteType, DeclaredType};

    #[test]
    fn branch_edges_are_dashed_and_root_highlighted() {
        let mut snap = Snapshot::default();
        let preview = snap.add_node(NodeKindTag::Preview);
        let p_in = snap.add_input(preview, DeclaredType::Any);
        let branch = snap.add_node(NodeKindTag::IfElse);
        snap.add_input(branch, DeclaredType::Concrete(ConcreteType::Bool));
        let on_true = snap.add_input(branch, DeclaredType::Any);
        snap.add_input(branch, DeclaredType::Any);
        let b_out = snap.add_output(branch, DeclaredType::Any);
        let uv = snap.add_node(NodeKindTag::TexCoord);
        let uv_out = snap.add_output(uv, DeclaredType::AnyFloat);
        snap.connect(uv_out, on_true);
        snap.connect(b_out, p_in);

        let mut graph = build_graph(&snap).graph;
        select_root(&mut graph, None).unwrap();
        label_branches(&mut graph).unwrap();
        let dot = emit_dot(&graph);

        assert!(dot.starts_with("digraph shader {"));
        assert!(dot.contains("n0 [label=\"preview\\n[b2]\", shape=doubleoctagon"));
        assert!(dot.contains("n1 [label=\"if_else\\n[b2]\", shape=diamond];"));
        assert!(dot.contains("n2 -> n1 [style=dashed, color=darkgreen, taillabel=\"true\"];"));
        assert!(dot.contains("n1 -> n0;"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn empty_graph_renders() {
        let graph = Graph::new();
        let dot = emit_dot(&graph);
        assert_eq!(dot.lines().count(), 6);
    }
}
