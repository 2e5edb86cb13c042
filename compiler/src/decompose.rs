// decompose.rs — Branch decomposition into structured bodies
//
// Assigns every live node to exactly one scope: the top level, or the true
// or false body of one conditional node. A node's scope is the innermost
// scope enclosing every region in its tag set, so a value needed both inside
// a branch and outside it is hoisted to the outer scope and never duplicated
// into the inner body. Each scope keeps topological order.
//
// Preconditions: labeling, pruning and ordering have run.
// Postconditions: top-level and body lists are disjoint and together cover
//   every live node; every live conditional node has an entry in `bodies`.
// Failure modes: none.
// Side effects: none.

use std::collections::HashMap;
use std::fmt::Write;

use indexmap::IndexMap;

use crate::graph::{Graph, NodeId, PortRegion};
use crate::id::BranchTag;

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchBodies {
    pub on_true: Vec<NodeId>,
    pub on_false: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposition {
    /// Nodes emitted in the function's entry scope, in order.
    pub top_level: Vec<NodeId>,
    /// Private bodies per conditional node.
    pub bodies: IndexMap<NodeId, BranchBodies>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Scope {
    Top,
    Body(BranchTag),
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn decompose(graph: &Graph) -> Decomposition {
    let order = graph.node_ids();

    // Region tag -> (owning conditional, is true side).
    let mut owners: HashMap<BranchTag, (NodeId, bool)> = HashMap::new();
    for &id in order {
        let node = graph.node(id);
        let Some((on_true, on_false)) = node.kind.branch_inputs(&node.inputs) else {
            continue;
        };
        for (port, side) in [(on_true, true), (on_false, false)] {
            if let PortRegion::Begin(tag) = graph.port(port).region {
                owners.insert(tag, (id, side));
            }
        }
    }

    // A conditional consumes everything tagged with its regions, so it comes
    // later in the order; walking backwards sees it first.
    let mut scopes: HashMap<NodeId, Scope> = HashMap::new();
    for &id in order.iter().rev() {
        let scope = graph
            .node(id)
            .tags
            .iter()
            .map(|tag| {
                if owners.contains_key(tag) {
                    Scope::Body(*tag)
                } else {
                    Scope::Top
                }
            })
            .reduce(|a, b| common_scope(a, b, &owners, &scopes))
            .unwrap_or(Scope::Top);
        scopes.insert(id, scope);
    }

    let mut result = Decomposition::default();
    let mut by_tag: HashMap<BranchTag, Vec<NodeId>> = HashMap::new();
    for &id in order {
        match scopes.get(&id).copied().unwrap_or(Scope::Top) {
            Scope::Top => result.top_level.push(id),
            Scope::Body(tag) => by_tag.entry(tag).or_default().push(id),
        }
        if graph.node(id).kind.is_branch() {
            result.bodies.insert(id, BranchBodies::default());
        }
    }
    for (tag, nodes) in by_tag {
        let Some(&(owner, side)) = owners.get(&tag) else {
            continue;
        };
        if let Some(bodies) = result.bodies.get_mut(&owner) {
            if side {
                bodies.on_true = nodes;
            } else {
                bodies.on_false = nodes;
            }
        }
    }

    tracing::debug!(
        top_level = result.top_level.len(),
        conditionals = result.bodies.len(),
        "branches decomposed"
    );
    result
}

/// The scope directly enclosing `scope`.
fn parent(
    scope: Scope,
    owners: &HashMap<BranchTag, (NodeId, bool)>,
    scopes: &HashMap<NodeId, Scope>,
) -> Option<Scope> {
    match scope {
        Scope::Top => None,
        Scope::Body(tag) => Some(
            owners
                .get(&tag)
                .and_then(|(owner, _)| scopes.get(owner))
                .copied()
                .unwrap_or(Scope::Top),
        ),
    }
}

/// Innermost scope enclosing both `a` and `b`.
fn common_scope(
    a: Scope,
    b: Scope,
    owners: &HashMap<BranchTag, (NodeId, bool)>,
    scopes: &HashMap<NodeId, Scope>,
) -> Scope {
    let mut chain = vec![a];
    let mut current = a;
    while let Some(up) = parent(current, owners, scopes) {
        chain.push(up);
        current = up;
    }
    let mut current = b;
    loop {
        if chain.contains(&current) {
            return current;
        }
        match parent(current, owners, scopes) {
            Some(up) => current = up,
            None => return Scope::Top,
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────────────────

/// The scheduled node list with conditional bodies nested under their node.
pub fn render_order(graph: &Graph, decomposition: &Decomposition) -> String {
    let mut out = String::new();
    render_list(graph, decomposition, &decomposition.top_level, 0, &mut out);
    out
}

fn render_list(
    graph: &Graph,
    decomposition: &Decomposition,
    nodes: &[NodeId],
    depth: usize,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    for &id in nodes {
        let node = graph.node(id);
        let tags: Vec<String> = node.tags.iter().map(|t| t.to_string()).collect();
        let _ = writeln!(
            out,
            "{indent}{} {} [{}]",
            node.kind.name(),
            node.uuid,
            tags.join(", ")
        );
        if let Some(bodies) = decomposition.bodies.get(&id) {
            let _ = writeln!(out, "{indent}  true:");
            render_list(graph, decomposition, &bodies.on_true, depth + 2, out);
            let _ = writeln!(out, "{indent}  false:");
            render_list(graph, decomposition, &bodies.on_false, depth + 2, out);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
