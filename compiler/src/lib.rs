// sgc — Shader Graph Compiler
//
// Library root. One module per pipeline stage, in pipeline order:
// snapshot → builder → label → prune → schedule → type_infer → decompose →
// codegen (over module), with the formula sub-language in lexer/parser/ast.

pub mod ast;
pub mod builder;
pub mod codegen;
pub mod cross;
pub mod decompose;
pub mod diag;
pub mod dot;
pub mod graph;
pub mod id;
pub mod label;
pub mod lexer;
pub mod module;
pub mod node;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod prune;
pub mod schedule;
pub mod snapshot;
pub mod type_infer;
pub mod types;
