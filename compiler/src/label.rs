// label.rs — Branch labeling
//
// Tags every node with the conditional regions whose evaluation needs its
// value. Work starts at the root's connected inputs under the root's own
// tag and proceeds breadth-first against the edge direction. A producer
// inherits the consumer's tag, except through inputs that open a region of
// their own (the two sides of an if/else), which hand their own tag down.
// Boundary inputs (compute nodes) are not followed.
//
// Preconditions: a root has been selected; tags are empty.
// Postconditions: the root carries its own tag; every node with a path to
//   the root carries the union of the tags of the regions reaching it;
//   nodes with no path to the root keep an empty tag set.
// Failure modes: `MissingRoot` if no root was selected.
// Side effects: writes `Node::tags`.

use std::collections::VecDeque;

use crate::diag::CompileError;
use crate::graph::{Graph, PortId, PortRegion};
use crate::id::BranchTag;

/// Summary of one labeling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelResult {
    pub root_tag: BranchTag,
    /// Number of (node, tag) pairs recorded.
    pub assignments: usize,
}

/// Label every node reachable from the root.
pub fn label_branches(graph: &mut Graph) -> Result<LabelResult, CompileError> {
    let root = graph.root().ok_or(CompileError::MissingRoot)?;
    let root_tag = graph.mint_tag();
    graph.node_mut(root).tags.insert(root_tag);

    let mut queue: VecDeque<(BranchTag, PortId)> = VecDeque::new();
    enqueue_inputs(graph, root, root_tag, &mut queue);

    let mut assignments = 1;
    while let Some((branch, port)) = queue.pop_front() {
        let Some(producer) = graph.producer(port) else {
            continue;
        };
        // A (node, tag) pair is expanded once; this is what bounds the walk
        // on shared ancestors and on cyclic input.
        if !graph.node_mut(producer).tags.insert(branch) {
            continue;
        }
        assignments += 1;
        enqueue_inputs(graph, producer, branch, &mut queue);
    }

    tracing::debug!(%root_tag, assignments, "branches labeled");
    Ok(LabelResult {
        root_tag,
        assignments,
    })
}

fn enqueue_inputs(
    graph: &Graph,
    node: crate::graph::NodeId,
    branch: BranchTag,
    queue: &mut VecDeque<(BranchTag, PortId)>,
) {
    for &input in &graph.node(node).inputs {
        let port = graph.port(input);
        if port.incoming.is_none() {
            continue;
        }
        match port.region {
            PortRegion::Inherit => queue.push_back((branch, input)),
            PortRegion::Begin(own) => queue.push_back((own, input)),
            PortRegion::Boundary => {}
        }
    }
}
