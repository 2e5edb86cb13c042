// snapshot.rs — Read-only input document describing a graph
//
// The editor's graph store is exported as one JSON document: node
// descriptors with their key/value configuration, input and output port
// descriptors, and edges between ports. Nothing here is validated beyond
// its shape; dangling references and incomplete configuration are the graph
// builder's concern.
//
// Preconditions: none.
// Postconditions: `Snapshot::from_json` returns the document as typed values.
// Failure modes: malformed JSON or unknown data type names produce
//   `CompileError::Snapshot`.
// Side effects: none.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diag::CompileError;
use crate::types::DeclaredType;

// ── Document types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub input_ports: Vec<PortDescriptor>,
    #[serde(default)]
    pub output_ports: Vec<PortDescriptor>,
    #[serde(default)]
    pub edges: Vec<EdgeDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: Uuid,
    pub kind: NodeKindTag,
    #[serde(default)]
    pub data: IndexMap<String, DataValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub id: Uuid,
    pub node: Uuid,
    pub data_type: DeclaredType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub id: Uuid,
    /// Output port the value leaves from.
    pub source: Uuid,
    /// Input port the value arrives at.
    pub target: Uuid,
}

/// Node kind as stored by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKindTag {
    Add,
    Subtract,
    Multiply,
    Divide,
    Constant,
    Color,
    WorldPosition,
    TexCoord,
    Normal,
    Tangent,
    Bitangent,
    Fract,
    Normalize,
    Length,
    Swizzle,
    Combine,
    Separate,
    Sample,
    Compute,
    IfElse,
    Calculator,
    MaterialOutput,
    Preview,
    /// Kinds this compiler has no code generation for (splines, nested
    /// materials, user functions, ...).
    #[serde(other)]
    Unsupported,
}

/// A node configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataValue {
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Int(i32),
    Int2([i32; 2]),
    Int3([i32; 3]),
    Int4([i32; 4]),
    Bool(bool),
    String(String),
    StringArray(Vec<String>),
}

// ── Construction helpers ───────────────────────────────────────────────────

impl Snapshot {
    pub fn from_json(text: &str) -> Result<Self, CompileError> {
        serde_json::from_str(text).map_err(|e| CompileError::Snapshot(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, CompileError> {
        serde_json::to_string_pretty(self).map_err(|e| CompileError::Snapshot(e.to_string()))
    }

    /// Append a node with a fresh id.
    pub fn add_node(&mut self, kind: NodeKindTag) -> Uuid {
        self.add_node_with(kind, IndexMap::new())
    }

    pub fn add_node_with(&mut self, kind: NodeKindTag, data: IndexMap<String, DataValue>) -> Uuid {
        let id = Uuid::new_v4();
        self.nodes.push(NodeDescriptor { id, kind, data });
        id
    }

    pub fn add_input(&mut self, node: Uuid, data_type: DeclaredType) -> Uuid {
        let id = Uuid::new_v4();
        self.input_ports.push(PortDescriptor { id, node, data_type });
        id
    }

    pub fn add_output(&mut self, node: Uuid, data_type: DeclaredType) -> Uuid {
        let id = Uuid::new_v4();
        self.output_ports.push(PortDescriptor { id, node, data_type });
        id
    }

    /// Wire an output port to an input port.
    pub fn connect(&mut self, source: Uuid, target: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.edges.push(EdgeDescriptor { id, source, target });
        id
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
