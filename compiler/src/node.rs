// node.rs — Node kinds and their capabilities
//
// Node kinds form a closed sum type. Each variant carries its configuration
// payload; the capability methods below describe how a kind participates
// in each pipeline stage (port shape, region boundaries, type constraints,
// branch decomposition). Instruction emission per kind lives in codegen.rs.

use crate::ast::MathExpr;
use crate::graph::PortId;
use crate::type_infer::Constraint;
use crate::types::{ConcreteType, Domain};

// ── Payload types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Per-fragment stage inputs a load node can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builtin {
    WorldPosition,
    TexCoord,
    Tangent,
    Bitangent,
    Normal,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::WorldPosition,
        Builtin::TexCoord,
        Builtin::Tangent,
        Builtin::Bitangent,
        Builtin::Normal,
    ];

    pub fn ty(self) -> ConcreteType {
        match self {
            Builtin::WorldPosition => ConcreteType::Float4,
            Builtin::TexCoord => ConcreteType::Float2,
            Builtin::Tangent | Builtin::Bitangent | Builtin::Normal => ConcreteType::Float3,
        }
    }

    pub fn location(self) -> u32 {
        match self {
            Builtin::WorldPosition => 0,
            Builtin::TexCoord => 1,
            Builtin::Tangent => 2,
            Builtin::Bitangent => 3,
            Builtin::Normal => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::WorldPosition => "worldPos",
            Builtin::TexCoord => "texCoord",
            Builtin::Tangent => "tangent",
            Builtin::Bitangent => "bitangent",
            Builtin::Normal => "normal",
        }
    }

    /// Direction vectors are renormalized after interpolation.
    pub fn normalized(self) -> bool {
        matches!(self, Builtin::Tangent | Builtin::Bitangent | Builtin::Normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOp {
    Fract,
    Normalize,
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Int(i32),
    Bool(bool),
}

impl ConstantValue {
    pub fn ty(&self) -> ConcreteType {
        match self {
            ConstantValue::Float(_) => ConcreteType::Float,
            ConstantValue::Float2(_) => ConcreteType::Float2,
            ConstantValue::Float3(_) => ConcreteType::Float3,
            ConstantValue::Float4(_) => ConcreteType::Float4,
            ConstantValue::Int(_) => ConcreteType::Int,
            ConstantValue::Bool(_) => ConcreteType::Bool,
        }
    }
}

/// How labeling treats the value arriving at an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRegion {
    /// Upstream nodes inherit the consumer's branch.
    Inherit,
    /// The port opens a conditional region with its own branch tag.
    NewBranch,
    /// The value is produced outside this module; labeling stops here.
    Boundary,
}

// ── Node kind ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Arithmetic(ArithOp),
    Constant(ConstantValue),
    Load(Builtin),
    Vector(VectorOp),
    /// Component selectors, one per output component (1..=4).
    Swizzle { selectors: Vec<u32> },
    Combine,
    Separate,
    Sample,
    /// Texture filled by an external compute stage.
    Compute { dimensions: [u32; 3] },
    IfElse,
    /// `None` when the stored formula did not parse.
    Calculator { expression: Option<MathExpr> },
    MaterialOutput,
    Preview,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Arithmetic(ArithOp::Add) => "add",
            NodeKind::Arithmetic(ArithOp::Subtract) => "subtract",
            NodeKind::Arithmetic(ArithOp::Multiply) => "multiply",
            NodeKind::Arithmetic(ArithOp::Divide) => "divide",
            NodeKind::Constant(_) => "constant",
            NodeKind::Load(_) => "load",
            NodeKind::Vector(VectorOp::Fract) => "fract",
            NodeKind::Vector(VectorOp::Normalize) => "normalize",
            NodeKind::Vector(VectorOp::Length) => "length",
            NodeKind::Swizzle { .. } => "swizzle",
            NodeKind::Combine => "combine",
            NodeKind::Separate => "separate",
            NodeKind::Sample => "sample",
            NodeKind::Compute { .. } => "compute",
            NodeKind::IfElse => "if_else",
            NodeKind::Calculator { .. } => "calculator",
            NodeKind::MaterialOutput => "material_output",
            NodeKind::Preview => "preview",
        }
    }

    /// Terminal kinds a compilation may start from.
    pub fn is_sink(&self) -> bool {
        matches!(self, NodeKind::MaterialOutput | NodeKind::Preview)
    }

    /// Kinds that own conditional regions and take part in decomposition.
    pub fn is_branch(&self) -> bool {
        matches!(self, NodeKind::IfElse)
    }

    /// Whether a node of this kind can have `inputs` input and `outputs`
    /// output ports.
    pub fn accepts_ports(&self, inputs: usize, outputs: usize) -> bool {
        match self {
            NodeKind::Arithmetic(_) => outputs == 1,
            NodeKind::Constant(_) | NodeKind::Load(_) => inputs == 0 && outputs == 1,
            NodeKind::Vector(_) | NodeKind::Swizzle { .. } | NodeKind::Compute { .. } => {
                inputs == 1 && outputs == 1
            }
            NodeKind::Combine => (2..=4).contains(&inputs) && outputs == 1,
            NodeKind::Separate => inputs == 1 && (2..=4).contains(&outputs),
            NodeKind::Sample => (2..=3).contains(&inputs) && outputs == 1,
            NodeKind::IfElse => inputs == 3 && outputs == 1,
            NodeKind::Calculator { .. } => inputs <= 4 && outputs == 1,
            NodeKind::MaterialOutput | NodeKind::Preview => inputs == 1 && outputs == 0,
        }
    }

    pub fn input_region(&self, index: usize) -> InputRegion {
        match (self, index) {
            (NodeKind::IfElse, 1 | 2) => InputRegion::NewBranch,
            (NodeKind::Compute { .. }, 0) => InputRegion::Boundary,
            _ => InputRegion::Inherit,
        }
    }

    /// The true and false inputs of a conditional node.
    pub fn branch_inputs(&self, inputs: &[PortId]) -> Option<(PortId, PortId)> {
        match (self, inputs) {
            (NodeKind::IfElse, [_, on_true, on_false]) => Some((*on_true, *on_false)),
            _ => None,
        }
    }

    /// Type rules relating this node's ports. Ports are given in declaration
    /// order and already satisfy `accepts_ports`.
    pub fn constraints(&self, inputs: &[PortId], outputs: &[PortId]) -> Vec<Constraint> {
        let all = || inputs.iter().chain(outputs).copied();
        let restrict_all = |domain: Domain| {
            all()
                .map(|port| Constraint::Restrict(port, domain))
                .collect::<Vec<_>>()
        };
        let fixed = |port: PortId, ty: ConcreteType| Constraint::Restrict(port, Domain::of(ty));

        match self {
            NodeKind::Arithmetic(_) => {
                let mut rules = restrict_all(Domain::NUMERIC);
                rules.push(Constraint::Same(all().collect()));
                rules
            }
            NodeKind::Calculator { .. } => {
                let mut rules = restrict_all(Domain::FLOATS);
                rules.push(Constraint::Same(all().collect()));
                rules
            }
            NodeKind::Constant(value) => vec![fixed(outputs[0], value.ty())],
            NodeKind::Load(builtin) => vec![fixed(outputs[0], builtin.ty())],
            NodeKind::Vector(VectorOp::Length) => vec![
                Constraint::Restrict(inputs[0], Domain::FLOATS),
                fixed(outputs[0], ConcreteType::Float),
            ],
            NodeKind::Vector(_) => vec![
                Constraint::Restrict(inputs[0], Domain::FLOATS),
                Constraint::Same(vec![inputs[0], outputs[0]]),
            ],
            NodeKind::Swizzle { selectors } => {
                let mut rules = vec![Constraint::Restrict(inputs[0], Domain::FLOATS)];
                if let Some(ty) = ConcreteType::float_vector(selectors.len() as u8) {
                    rules.push(fixed(outputs[0], ty));
                }
                rules
            }
            NodeKind::Combine => {
                let mut rules: Vec<Constraint> = inputs
                    .iter()
                    .map(|&port| fixed(port, ConcreteType::Float))
                    .collect();
                if let Some(ty) = ConcreteType::float_vector(inputs.len() as u8) {
                    rules.push(fixed(outputs[0], ty));
                }
                rules
            }
            NodeKind::Separate => {
                let mut rules: Vec<Constraint> = outputs
                    .iter()
                    .map(|&port| fixed(port, ConcreteType::Float))
                    .collect();
                if let Some(ty) = ConcreteType::float_vector(outputs.len() as u8) {
                    rules.push(fixed(inputs[0], ty));
                }
                rules
            }
            NodeKind::Sample => {
                let (field, position, out) = (inputs[0], inputs[1], outputs[0]);
                let mut rules = vec![
                    Constraint::Restrict(field, Domain::TEXTURES),
                    Constraint::Restrict(position, Domain::FLOATS123),
                    Constraint::Restrict(out, Domain::FLOATS),
                    Constraint::SameComposite(field, out),
                    Constraint::SameDimensionality(field, position),
                ];
                if let Some(&lod) = inputs.get(2) {
                    rules.push(fixed(lod, ConcreteType::Float));
                }
                rules
            }
            NodeKind::Compute { dimensions } => {
                let mut rules = vec![Constraint::Restrict(inputs[0], Domain::FLOATS)];
                if let Some(ty) = ConcreteType::texture(texture_dimensionality(*dimensions), 4) {
                    rules.push(fixed(outputs[0], ty));
                }
                rules
            }
            NodeKind::IfElse => {
                let (cond, on_true, on_false, out) = (inputs[0], inputs[1], inputs[2], outputs[0]);
                vec![
                    fixed(cond, ConcreteType::Bool),
                    Constraint::Restrict(on_true, Domain::VALUES),
                    Constraint::Restrict(on_false, Domain::VALUES),
                    Constraint::Restrict(out, Domain::VALUES),
                    Constraint::Same(vec![on_true, on_false, out]),
                ]
            }
            NodeKind::MaterialOutput => vec![fixed(inputs[0], ConcreteType::Float4)],
            NodeKind::Preview => vec![Constraint::Restrict(inputs[0], Domain::VALUES)],
        }
    }
}

/// Texture dimensionality implied by a compute node's dispatch size.
pub fn texture_dimensionality(dimensions: [u32; 3]) -> u8 {
    match dimensions {
        [_, _, z] if z > 1 => 3,
        [_, y, _] if y > 1 => 2,
        _ => 1,
    }
}

/// Hue/saturation/brightness (all in 0..=1) to linear RGB.
pub fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> [f32; 3] {
    if saturation <= 0.0 {
        return [brightness; 3];
    }
    let h = (hue - hue.floor()) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = brightness * (1.0 - saturation);
    let q = brightness * (1.0 - saturation * f);
    let t = brightness * (1.0 - saturation * (1.0 - f));
    match sector as u32 % 6 {
        0 => [brightness, t, p],
        1 => [q, brightness, p],
        2 => [p, brightness, t],
        3 => [p, q, brightness],
        4 => [t, p, brightness],
        _ => [brightness, p, q],
    }
}
