// Property-based tests over generated graphs and formulas.
//
// Graphs are random DAGs of constants, fract, add and if/else nodes ending in
// a fract feeding a preview. Edges only run from earlier to later nodes, so
// the graph is acyclic; node declaration order is optionally reversed so the
// schedule cannot simply follow the snapshot.

use std::collections::HashMap;

use indexmap::IndexMap;
use proptest::prelude::*;
use sgc::graph::Graph;
use sgc::module::{encode_string, Instruction};
use sgc::parser::parse_formula;
use sgc::pass::PassId;
use sgc::pipeline::{run_pipeline, CompilationState, CompileOptions};
use sgc::prune::prune;
use sgc::snapshot::{DataValue, NodeKindTag, Snapshot};
use sgc::types::{ConcreteType, DeclaredType};
use uuid::Uuid;

type NodeSpec = (u8, [usize; 3], [bool; 3]);

fn arb_nodes() -> impl Strategy<Value = (Vec<NodeSpec>, bool)> {
    (
        prop::collection::vec(
            (0u8..4, prop::array::uniform3(0usize..64), prop::array::uniform3(any::<bool>())),
            1..24,
        ),
        any::<bool>(),
    )
}

fn float() -> DeclaredType {
    DeclaredType::Concrete(ConcreteType::Float)
}

/// Each spec picks a kind and, per input, whether to connect it and to which
/// earlier output.
fn build_snapshot(specs: &[NodeSpec], reverse: bool) -> Snapshot {
    let mut snap = Snapshot::default();
    let mut outputs: Vec<Uuid> = Vec::new();

    for (i, &(kind, picks, flags)) in specs.iter().enumerate() {
        let (node, inputs) = match kind {
            0 if i > 0 => {
                let n = snap.add_node(NodeKindTag::Fract);
                (n, vec![snap.add_input(n, float())])
            }
            1 if i > 0 => {
                let n = snap.add_node(NodeKindTag::Add);
                let a = snap.add_input(n, float());
                let b = snap.add_input(n, float());
                (n, vec![a, b])
            }
            2 if i > 0 => {
                let n = snap.add_node(NodeKindTag::IfElse);
                let _cond = snap.add_input(n, DeclaredType::Concrete(ConcreteType::Bool));
                let t = snap.add_input(n, DeclaredType::Any);
                let f = snap.add_input(n, DeclaredType::Any);
                (n, vec![t, f])
            }
            _ => {
                let mut data = IndexMap::new();
                data.insert("value".to_string(), DataValue::Float(i as f32));
                (snap.add_node_with(NodeKindTag::Constant, data), Vec::new())
            }
        };
        for (k, &input) in inputs.iter().enumerate() {
            if flags[k] && !outputs.is_empty() {
                let source = outputs[picks[k] % outputs.len()];
                snap.connect(source, input);
            }
        }
        let declared = if kind == 2 && i > 0 {
            DeclaredType::Any
        } else {
            float()
        };
        outputs.push(snap.add_output(node, declared));
    }

    let last = snap.add_node(NodeKindTag::Fract);
    let last_in = snap.add_input(last, float());
    let last_out = snap.add_output(last, float());
    if let Some(&tail) = outputs.last() {
        snap.connect(tail, last_in);
    }
    let preview = snap.add_node(NodeKindTag::Preview);
    let p_in = snap.add_input(preview, DeclaredType::Any);
    snap.connect(last_out, p_in);

    if reverse {
        snap.nodes.reverse();
    }
    snap
}

fn compiled(specs: &[NodeSpec], reverse: bool) -> CompilationState {
    let mut state = CompilationState::new(build_snapshot(specs, reverse));
    let result = run_pipeline(&mut state, PassId::Emit, &CompileOptions::default(), |_, _| {});
    assert!(result.is_ok(), "pipeline failed: {:?}", result.err());
    state
}

fn live_edges(graph: &Graph) -> Vec<(sgc::graph::NodeId, sgc::graph::NodeId)> {
    graph
        .edge_ids()
        .iter()
        .map(|&e| {
            let edge = graph.edge(e);
            (graph.port(edge.source).node, graph.port(edge.target).node)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn producers_precede_consumers((specs, reverse) in arb_nodes()) {
        let state = compiled(&specs, reverse);
        let graph = state.graph.as_ref().unwrap();
        let positions = state.schedule.as_ref().unwrap().positions();
        for (source, target) in live_edges(graph) {
            prop_assert!(positions[&source] < positions[&target]);
        }
    }

    #[test]
    fn prune_is_idempotent((specs, reverse) in arb_nodes()) {
        let mut state = compiled(&specs, reverse);
        let graph = state.graph.as_mut().unwrap();
        let before = graph.node_ids().len();
        let again = prune(graph);
        prop_assert!(again.removed_nodes.is_empty());
        prop_assert!(again.removed_edges.is_empty());
        prop_assert_eq!(graph.node_ids().len(), before);
    }

    #[test]
    fn every_live_node_has_one_scope((specs, reverse) in arb_nodes()) {
        let state = compiled(&specs, reverse);
        let graph = state.graph.as_ref().unwrap();
        let d = state.decomposition.as_ref().unwrap();
        let mut seen: HashMap<sgc::graph::NodeId, usize> = HashMap::new();
        let bodies = d.bodies.values().flat_map(|b| b.on_true.iter().chain(&b.on_false));
        for &node in d.top_level.iter().chain(bodies) {
            *seen.entry(node).or_default() += 1;
        }
        prop_assert_eq!(seen.len(), graph.node_ids().len());
        prop_assert!(seen.values().all(|&n| n == 1));
    }

    #[test]
    fn module_decodes_cleanly((specs, reverse) in arb_nodes()) {
        let state = compiled(&specs, reverse);
        let module = &state.module.as_ref().unwrap().module;
        let header = module.header().unwrap();
        prop_assert_eq!(header.bound, module.bound);
        let decoded: usize = module
            .instructions()
            .unwrap()
            .iter()
            .map(|i| i.words.len() + 1)
            .sum();
        prop_assert_eq!(decoded + 5, module.words.len());
    }

    #[test]
    fn string_operands_are_padded(text in "[a-zA-Z0-9_.]{0,40}") {
        let words = encode_string(&text);
        prop_assert_eq!(words.len(), text.len() / 4 + 1);
        let inst = Instruction::new(5).word(1).string(&text);
        let mut out = Vec::new();
        inst.encode_into(&mut out);
        prop_assert_eq!(out.len() as u32, inst.word_count());
        prop_assert_eq!(out[0] >> 16, inst.word_count());
    }

    #[test]
    fn formula_parsing_never_panics(text in "[-+*/^().0-9xyzwepitaurondsqcglb]{0,24}") {
        let _ = parse_formula(&text);
    }
}
