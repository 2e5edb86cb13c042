// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the compiler's seven passes (reading the snapshot document is
// outside the runner), their dependency edges, and the artifacts they
// produce. Used by the pipeline runner to compute minimal pass subsets for
// each --emit target.

use std::collections::HashSet;
use std::fmt;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each compiler pass (snapshot parsing excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Build,
    Label,
    Prune,
    Order,
    Concretize,
    Decompose,
    Emit,
}

/// Machine-readable artifact identifiers. Each maps to a field of the
/// compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Graph,         // Graph
    Report,        // BuildReport
    Labels,        // LabelResult
    Pruned,        // PruneResult
    Schedule,      // Schedule
    Types,         // TypeResult
    Decomposition, // Decomposition
    Module,        // CompiledModule
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(descriptor(*self).name)
    }
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Postconditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Build => PassDescriptor {
            name: "build",
            inputs: &[],
            outputs: &[ArtifactId::Graph, ArtifactId::Report],
            invariants: "unusable nodes and dangling edges dropped, root selected",
        },
        PassId::Label => PassDescriptor {
            name: "label",
            inputs: &[PassId::Build],
            outputs: &[ArtifactId::Labels],
            invariants: "every node reaching the root carries its region tags",
        },
        PassId::Prune => PassDescriptor {
            name: "prune",
            inputs: &[PassId::Label],
            outputs: &[ArtifactId::Pruned],
            invariants: "untagged nodes and their edges removed",
        },
        PassId::Order => PassDescriptor {
            name: "order",
            inputs: &[PassId::Prune],
            outputs: &[ArtifactId::Schedule],
            invariants: "producers precede consumers",
        },
        PassId::Concretize => PassDescriptor {
            name: "concretize",
            inputs: &[PassId::Order],
            outputs: &[ArtifactId::Types],
            invariants: "every live port has exactly one concrete type",
        },
        PassId::Decompose => PassDescriptor {
            name: "decompose",
            inputs: &[PassId::Order],
            outputs: &[ArtifactId::Decomposition],
            invariants: "every live node placed in exactly one scope",
        },
        PassId::Emit => PassDescriptor {
            name: "emit",
            inputs: &[PassId::Concretize, PassId::Decompose],
            outputs: &[ArtifactId::Module],
            invariants: "header bound exceeds every issued id",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 7] = [
    PassId::Build,
    PassId::Label,
    PassId::Prune,
    PassId::Order,
    PassId::Concretize,
    PassId::Decompose,
    PassId::Emit,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
