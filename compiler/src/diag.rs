// diag.rs — Compilation error model
//
// Every fatal condition in the pipeline is a `CompileError`. Each variant
// carries a stable diagnostic code so hosts can match on failures without
// parsing messages.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use uuid::Uuid;

use crate::parser::MathError;
use crate::types::Domain;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0200`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    pub const E0100: DiagCode = DiagCode("E0100"); // formula lex error
    pub const E0101: DiagCode = DiagCode("E0101"); // formula parse error
    pub const E0200: DiagCode = DiagCode("E0200"); // conflicting concrete types
    pub const E0201: DiagCode = DiagCode("E0201"); // unresolved abstract type
    pub const E0300: DiagCode = DiagCode("E0300"); // dependency cycle
    pub const E0301: DiagCode = DiagCode("E0301"); // no root sink
    pub const E0302: DiagCode = DiagCode("E0302"); // root of unexpected kind
    pub const E0303: DiagCode = DiagCode("E0303"); // several candidate roots
    pub const E0400: DiagCode = DiagCode("E0400"); // malformed snapshot
    pub const E0500: DiagCode = DiagCode("E0500"); // cross-compiler rejection
}

// ── Compile error ────────────────────────────────────────────────────────

/// A fatal compilation error. No partial output accompanies it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("unrecognized input in formula")]
    Lex,

    #[error("malformed formula: {0}")]
    Parse(String),

    #[error("node {node}: port {port} cannot be {found} (allowed: {allowed})")]
    TypeConflict {
        node: Uuid,
        port: Uuid,
        found: Domain,
        allowed: Domain,
    },

    #[error("node {node}: type of port {port} is ambiguous ({candidates}); nothing anchors it")]
    Unresolved {
        node: Uuid,
        port: Uuid,
        candidates: Domain,
    },

    #[error("graph contains a cycle through {} node(s): {nodes:?}", .nodes.len())]
    Cycle { nodes: Vec<Uuid> },

    #[error("no output node to compile from")]
    MissingRoot,

    #[error("node {node} is a {kind} node, not a material or preview output")]
    UnexpectedRoot { node: Uuid, kind: &'static str },

    #[error("{candidates} output nodes present; choose one as the root")]
    AmbiguousRoot { candidates: usize },

    #[error("invalid graph snapshot: {0}")]
    Snapshot(String),

    #[error("cross-compilation failed: {0}")]
    CrossCompile(String),
}

impl CompileError {
    pub fn code(&self) -> DiagCode {
        match self {
            CompileError::Lex => codes::E0100,
            CompileError::Parse(_) => codes::E0101,
            CompileError::TypeConflict { .. } => codes::E0200,
            CompileError::Unresolved { .. } => codes::E0201,
            CompileError::Cycle { .. } => codes::E0300,
            CompileError::MissingRoot => codes::E0301,
            CompileError::UnexpectedRoot { .. } => codes::E0302,
            CompileError::AmbiguousRoot { .. } => codes::E0303,
            CompileError::Snapshot(_) => codes::E0400,
            CompileError::CrossCompile(_) => codes::E0500,
        }
    }

    /// The graph node this error is attributed to, when there is one.
    pub fn node(&self) -> Option<Uuid> {
        match self {
            CompileError::TypeConflict { node, .. }
            | CompileError::Unresolved { node, .. }
            | CompileError::UnexpectedRoot { node, .. } => Some(*node),
            CompileError::Cycle { nodes } => nodes.first().copied(),
            _ => None,
        }
    }

    /// Render as `error[CODE]: message`.
    pub fn render(&self) -> String {
        format!("error[{}]: {}", self.code(), self)
    }
}

impl From<MathError> for CompileError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Lex => CompileError::Lex,
            parse => CompileError::Parse(parse.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_code() {
        let e = CompileError::MissingRoot;
        assert_eq!(e.render(), "error[E0301]: no output node to compile from");
    }

    #[test]
    fn type_errors_name_the_node() {
        let node = Uuid::from_u128(7);
        let e = CompileError::Unresolved {
            node,
            port: Uuid::from_u128(8),
            candidates: Domain::FLOATS,
        };
        assert_eq!(e.node(), Some(node));
        assert_eq!(e.code(), codes::E0201);
        assert!(e.to_string().contains("{float, float2, float3, float4}"));
    }

    #[test]
    fn math_errors_convert() {
        assert_eq!(CompileError::from(MathError::Lex), CompileError::Lex);
        let e = CompileError::from(MathError::UnexpectedEnd);
        assert_eq!(e.code(), codes::E0101);
    }
}
