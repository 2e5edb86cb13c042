use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sgc::diag::CompileError;
use sgc::pass::PassId;
use sgc::pipeline::{run_pipeline, CompilationState, CompileOptions};
use sgc::snapshot::Snapshot;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Binary module
    Spv,
    /// Module words in hex, eight per line
    Words,
    /// One line per instruction
    Disasm,
    /// Scheduled node list with branch bodies
    Order,
    /// Concrete port types per node
    Types,
    /// Graphviz rendering of the labeled graph
    Dot,
    /// Provenance record as JSON
    BuildInfo,
    /// WGSL source via naga
    #[cfg(feature = "naga")]
    Wgsl,
}

impl EmitStage {
    fn terminal(self) -> PassId {
        match self {
            EmitStage::Dot => PassId::Label,
            EmitStage::Order => PassId::Decompose,
            EmitStage::Types => PassId::Concretize,
            _ => PassId::Emit,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "sgc",
    version,
    about = "Shader Graph Compiler — compiles node-based material graphs to SPIR-V modules"
)]
struct Cli {
    /// Input snapshot (.json)
    source: PathBuf,

    /// Output file path (text stages print to stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Id of the output node to compile from
    #[arg(long)]
    root: Option<uuid::Uuid>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Spv)]
    emit: EmitStage,

    /// Print compiler passes and timing
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if verbose {
        if let Ok(directive) = "sgc=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        eprintln!("sgc: source = {}", cli.source.display());
        eprintln!("sgc: emit   = {:?}", cli.emit);
    }

    // ── Read snapshot ──
    let text = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sgc: error: {}: {}", cli.source.display(), e);
            return ExitCode::from(2);
        }
    };
    let snapshot = match Snapshot::from_json(&text) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sgc: {}", e.render());
            return ExitCode::from(2);
        }
    };

    // ── Compile ──
    let mut state = CompilationState::new(snapshot);
    let options = CompileOptions { root: cli.root };
    let verbose = cli.verbose;
    let result = run_pipeline(&mut state, cli.emit.terminal(), &options, |pass, elapsed| {
        if verbose {
            eprintln!(
                "sgc: {} complete, {:.1}ms",
                pass,
                elapsed.as_secs_f64() * 1000.0
            );
        }
    });

    if let Some(report) = &state.report {
        for dropped in &report.dropped_nodes {
            eprintln!("sgc: note: node {} left out ({})", dropped.node, dropped.reason);
        }
        if !report.dropped_edges.is_empty() {
            eprintln!("sgc: note: {} edge(s) left out", report.dropped_edges.len());
        }
        for (node, message) in &report.rejected_formulas {
            eprintln!("sgc: note: formula of node {node} rejected: {message}");
        }
    }

    if let Err(e) = result {
        eprintln!("sgc: {} (in {})", e.error.render(), e.failing_pass);
        return ExitCode::from(1);
    }

    // ── Emit ──
    match render(&state, cli.emit) {
        Ok(Output::Text(text)) => match &cli.output {
            Some(path) => write_file(path, text.as_bytes()),
            None => {
                print!("{text}");
                ExitCode::SUCCESS
            }
        },
        Ok(Output::Binary(bytes)) => {
            let path = cli.output.unwrap_or_else(|| PathBuf::from("out.spv"));
            write_file(&path, &bytes)
        }
        Err(e) => {
            eprintln!("sgc: {}", e.render());
            ExitCode::from(1)
        }
    }
}

enum Output {
    Text(String),
    Binary(Vec<u8>),
}

fn render(state: &CompilationState, emit: EmitStage) -> Result<Output, CompileError> {
    let Some(graph) = &state.graph else {
        return Err(CompileError::MissingRoot);
    };
    let compiled = state.module.as_ref();
    let text = match (emit, compiled) {
        (EmitStage::Dot, _) => sgc::dot::emit_dot(graph),
        (EmitStage::Types, _) => sgc::type_infer::render_types(graph),
        (EmitStage::Order, _) => match &state.decomposition {
            Some(d) => sgc::decompose::render_order(graph, d),
            None => String::new(),
        },
        (EmitStage::Spv, Some(c)) => return Ok(Output::Binary(c.module.to_bytes())),
        (EmitStage::Words, Some(c)) => words_listing(&c.module.words),
        (EmitStage::Disasm, Some(c)) => sgc::module::disassemble(&c.module.words)
            .map_err(|e| CompileError::CrossCompile(e.to_string()))?,
        (EmitStage::BuildInfo, Some(c)) => match &state.provenance {
            Some(p) => p.to_json(c),
            None => String::new(),
        },
        #[cfg(feature = "naga")]
        (EmitStage::Wgsl, Some(c)) => {
            use sgc::cross::CrossCompiler;
            sgc::cross::NagaCompiler.cross_compile(&c.module.words, c.module.bound)?
        }
        (_, None) => return Err(CompileError::MissingRoot),
    };
    Ok(Output::Text(text))
}

fn words_listing(words: &[u32]) -> String {
    let mut out = String::new();
    for chunk in words.chunks(8) {
        let line: Vec<String> = chunk.iter().map(|w| format!("0x{w:08x}")).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

fn write_file(path: &Path, bytes: &[u8]) -> ExitCode {
    match std::fs::write(path, bytes) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sgc: error: {}: {}", path.display(), e);
            ExitCode::from(2)
        }
    }
}
