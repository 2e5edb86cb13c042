// pipeline.rs — Compilation state and pass orchestration
//
// Holds every pass artifact and runs the minimal set of passes for a given
// terminal PassId. The graph is threaded through the passes by mutable
// reference and stored back into the state whether or not a pass failed,
// so a caller can still render what was built.
//
// Preconditions: the snapshot is set before calling run_pipeline.
// Postconditions: all artifacts for required passes are populated, or a
//   `PipelineError` names the failing pass.
// Failure modes: any pass returning a `CompileError`.
// Side effects: calls on_pass_complete after each pass; debug-level tracing.

use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::builder::{build_graph, select_root, BuildReport};
use crate::codegen::{emit_module, CompiledModule};
use crate::decompose::{decompose, Decomposition};
use crate::diag::CompileError;
use crate::graph::Graph;
use crate::label::{label_branches, LabelResult};
use crate::pass::{required_passes, PassId};
use crate::prune::{prune, PruneResult};
use crate::schedule::{schedule, Schedule};
use crate::snapshot::Snapshot;
use crate::type_infer::{concretize, TypeResult};

// ── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Sink to compile from. `None` requires the graph to have exactly one.
    pub root: Option<Uuid>,
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible builds and cache-key use.
///
/// `snapshot_hash`: SHA-256 of the compact JSON serialization of the snapshot.
/// `module_hash`: SHA-256 of the module bytes (little-endian words).
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub snapshot_hash: [u8; 32],
    pub module_hash: [u8; 32],
    pub compiler_version: &'static str,
}

#[derive(Serialize)]
struct BuildInfo<'a> {
    snapshot_hash: String,
    module_hash: String,
    compiler_version: &'a str,
    bound: u32,
    words: usize,
}

impl Provenance {
    pub fn snapshot_hash_hex(&self) -> String {
        bytes_to_hex(&self.snapshot_hash)
    }

    pub fn module_hash_hex(&self) -> String {
        bytes_to_hex(&self.module_hash)
    }

    /// Serialize as pretty JSON for `--emit build-info`.
    pub fn to_json(&self, module: &CompiledModule) -> String {
        let info = BuildInfo {
            snapshot_hash: self.snapshot_hash_hex(),
            module_hash: self.module_hash_hex(),
            compiler_version: self.compiler_version,
            bound: module.module.bound,
            words: module.module.words.len(),
        };
        let mut text = serde_json::to_string_pretty(&info).unwrap_or_default();
        text.push('\n');
        text
    }
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Compute provenance from the snapshot and the finished module.
pub fn compute_provenance(
    snapshot: &Snapshot,
    module: &CompiledModule,
) -> Result<Provenance, CompileError> {
    let canonical =
        serde_json::to_vec(snapshot).map_err(|e| CompileError::Snapshot(e.to_string()))?;
    Ok(Provenance {
        snapshot_hash: sha256(&canonical),
        module_hash: sha256(&module.module.to_bytes()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Holds the input snapshot and all compilation artifacts.
#[derive(Debug)]
pub struct CompilationState {
    pub snapshot: Snapshot,
    pub graph: Option<Graph>,
    pub report: Option<BuildReport>,
    pub labels: Option<LabelResult>,
    pub pruned: Option<PruneResult>,
    pub schedule: Option<Schedule>,
    pub types: Option<TypeResult>,
    pub decomposition: Option<Decomposition>,
    pub module: Option<CompiledModule>,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            graph: None,
            report: None,
            labels: None,
            pruned: None,
            schedule: None,
            types: None,
            decomposition: None,
            module: None,
            provenance: None,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution stopped at `failing_pass`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{failing_pass} failed: {error}")]
pub struct PipelineError {
    pub failing_pass: PassId,
    pub error: CompileError,
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → trace → on_pass_complete(callback) → error check.
///
/// Postconditions: artifacts for all passes in `required_passes(terminal)` are
///   populated, or the error names the first pass that failed. `state.graph`
///   is set in both cases.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    options: &CompileOptions,
    mut on_pass_complete: impl FnMut(PassId, Duration),
) -> Result<(), PipelineError> {
    let passes = required_passes(terminal);
    let mut graph = Graph::new();
    let result = run_passes(state, &mut graph, &passes, options, &mut on_pass_complete);
    state.graph = Some(graph);
    result
}

fn run_passes(
    state: &mut CompilationState,
    graph: &mut Graph,
    passes: &[PassId],
    options: &CompileOptions,
    on_pass_complete: &mut impl FnMut(PassId, Duration),
) -> Result<(), PipelineError> {
    for &pass_id in passes {
        let t = Instant::now();
        let outcome = run_pass(state, graph, pass_id, options);
        let elapsed = t.elapsed();
        tracing::debug!(
            pass = %pass_id,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            ok = outcome.is_ok(),
            "pass complete"
        );
        on_pass_complete(pass_id, elapsed);
        outcome.map_err(|error| PipelineError {
            failing_pass: pass_id,
            error,
        })?;
    }
    Ok(())
}

fn run_pass(
    state: &mut CompilationState,
    graph: &mut Graph,
    pass_id: PassId,
    options: &CompileOptions,
) -> Result<(), CompileError> {
    match pass_id {
        PassId::Build => {
            let result = build_graph(&state.snapshot);
            *graph = result.graph;
            state.report = Some(result.report);
            select_root(graph, options.root)?;
        }
        PassId::Label => state.labels = Some(label_branches(graph)?),
        PassId::Prune => state.pruned = Some(prune(graph)),
        PassId::Order => state.schedule = Some(schedule(graph)?),
        PassId::Concretize => state.types = Some(concretize(graph)?),
        PassId::Decompose => state.decomposition = Some(decompose(graph)),
        PassId::Emit => {
            let decomposition = match state.decomposition.take() {
                Some(d) => d,
                None => decompose(graph),
            };
            let module = emit_module(graph, &decomposition);
            state.decomposition = Some(decomposition);
            let module = module?;
            state.provenance = Some(compute_provenance(&state.snapshot, &module)?);
            state.module = Some(module);
        }
    }
    Ok(())
}

/// Compile `snapshot` to a module in one call.
pub fn compile(
    snapshot: Snapshot,
    options: &CompileOptions,
) -> Result<CompiledModule, PipelineError> {
    let mut state = CompilationState::new(snapshot);
    run_pipeline(&mut state, PassId::Emit, options, |_, _| {})?;
    state.module.ok_or(PipelineError {
        failing_pass: PassId::Emit,
        error: CompileError::MissingRoot,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::NodeKindTag;
    use crate::types::DeclaredType;

    fn uv_preview() -> Snapshot {
        let mut snap = Snapshot::default();
        let preview = snap.add_node(NodeKindTag::Preview);
        let input = snap.add_input(preview, DeclaredType::Any);
        let uv = snap.add_node(NodeKindTag::TexCoord);
        let out = snap.add_output(uv, DeclaredType::AnyFloat);
        snap.connect(out, input);
        snap
    }

    #[test]
    fn runs_only_required_passes() {
        let mut state = CompilationState::new(uv_preview());
        let mut seen = Vec::new();
        run_pipeline(&mut state, PassId::Order, &CompileOptions::default(), |p, _| {
            seen.push(p)
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![PassId::Build, PassId::Label, PassId::Prune, PassId::Order]
        );
        assert!(state.schedule.is_some());
        assert!(state.types.is_none());
        assert!(state.module.is_none());
    }

    #[test]
    fn failure_names_the_pass() {
        let mut snap = uv_preview();
        let output = snap.add_node(NodeKindTag::MaterialOutput);
        snap.add_input(output, DeclaredType::AnyFloat);
        let mut state = CompilationState::new(snap);
        let err = run_pipeline(&mut state, PassId::Emit, &CompileOptions::default(), |_, _| {})
            .unwrap_err();
        assert_eq!(err.failing_pass, PassId::Build);
        assert_eq!(err.error, CompileError::AmbiguousRoot { candidates: 2 });
        assert!(state.graph.is_some());
        assert!(err.to_string().starts_with("build failed"));
    }

    #[test]
    fn explicit_root_disambiguates() {
        let mut snap = uv_preview();
        let root = snap.nodes[0].id;
        let output = snap.add_node(NodeKindTag::MaterialOutput);
        snap.add_input(output, DeclaredType::AnyFloat);
        let options = CompileOptions { root: Some(root) };
        let module = compile(snap, &options).unwrap();
        assert!(module.module.bound > 1);
    }

    #[test]
    fn provenance_is_stable() {
        let snap = uv_preview();
        let mut a = CompilationState::new(snap.clone());
        let mut b = CompilationState::new(snap);
        let opts = CompileOptions::default();
        run_pipeline(&mut a, PassId::Emit, &opts, |_, _| {}).unwrap();
        run_pipeline(&mut b, PassId::Emit, &opts, |_, _| {}).unwrap();
        let (pa, pb) = (a.provenance.unwrap(), b.provenance.unwrap());
        assert_eq!(pa, pb);
        assert_eq!(pa.module_hash_hex().len(), 64);
        let json = pa.to_json(a.module.as_ref().unwrap());
        assert!(json.contains("\"compiler_version\""));
    }

    #[test]
    fn hex_encoding() {
        assert_eq!(bytes_to_hex(&[0x00, 0xab, 0x7f]), "00ab7f");
    }
}
