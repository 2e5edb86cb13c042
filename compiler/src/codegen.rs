// codegen.rs — Module emission for the decomposed graph
//
// Lowers the scheduled, concretely typed graph into one fragment entry point.
// Every node output port reserves a result id on first use; a node writes
// its value straight into that id, so consumers only need to look up the
// reserved id of the output feeding them. Conditional nodes emit a
// structured selection whose bodies are their decomposed node lists.
//
// Preconditions: concretization and decomposition completed without errors.
// Postconditions: returns a `CompiledModule` whose header bound is the
//   exclusive upper bound of every id issued during the run.
// Failure modes: a live port without a concrete type yields
//   `CompileError::Unresolved` (only reachable if concretization was skipped).
// Side effects: reserves ids on graph ports.

use std::collections::HashMap;

use uuid::Uuid;

use crate::ast::{BinaryOp, MathExpr, UnaryOp};
use crate::decompose::Decomposition;
use crate::diag::CompileError;
use crate::graph::{Graph, Node, NodeId, PortId};
use crate::module::{
    capability, decoration, op, storage, Instruction, Module, ModuleBuilder, Section, TypeKey,
    ADDRESSING_LOGICAL, EXECUTION_FRAGMENT, FUNCTION_CONTROL_NONE, IMAGE_OPERANDS_LOD,
    MEMORY_GLSL450, MODE_ORIGIN_UPPER_LEFT, SELECTION_CONTROL_NONE,
};
use crate::node::{ArithOp, Builtin, ConstantValue, NodeKind, VectorOp};
use crate::types::ConcreteType;

/// Descriptor set holding textures produced by compute stages.
pub const COMPUTE_DESCRIPTOR_SET: u32 = 3;

/// GLSL.std.450 extended instruction numbers.
mod glsl {
    pub const ROUND: u32 = 1;
    pub const FABS: u32 = 4;
    pub const FLOOR: u32 = 8;
    pub const CEIL: u32 = 9;
    pub const FRACT: u32 = 10;
    pub const SIN: u32 = 13;
    pub const COS: u32 = 14;
    pub const TAN: u32 = 15;
    pub const ASIN: u32 = 16;
    pub const ACOS: u32 = 17;
    pub const ATAN: u32 = 18;
    pub const POW: u32 = 26;
    pub const LOG: u32 = 28;
    pub const SQRT: u32 = 31;
    pub const LENGTH: u32 = 66;
    pub const NORMALIZE: u32 = 69;
}

// ── Public types ────────────────────────────────────────────────────────────

/// A texture the host must bind before drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    /// The compute node producing it.
    pub node: Uuid,
    pub binding: u32,
    pub dimensions: [u32; 3],
}

#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub module: Module,
    pub texture_bindings: Vec<TextureBinding>,
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn emit_module(
    graph: &mut Graph,
    decomposition: &Decomposition,
) -> Result<CompiledModule, CompileError> {
    let mut ctx = CodegenCtx::new(graph, decomposition);
    ctx.emit_prologue();
    ctx.emit_list(&decomposition.top_level)?;
    ctx.code(Instruction::new(op::RETURN));
    ctx.code(Instruction::new(op::FUNCTION_END));

    let texture_bindings = ctx.bindings;
    let module = ctx.b.finish();
    tracing::debug!(
        words = module.words.len(),
        bound = module.bound,
        textures = texture_bindings.len(),
        "module emitted"
    );
    Ok(CompiledModule {
        module,
        texture_bindings,
    })
}

// ── Internal context ────────────────────────────────────────────────────────

struct CodegenCtx<'a> {
    graph: &'a mut Graph,
    decomposition: &'a Decomposition,
    b: ModuleBuilder,
    glsl: u32,
    stage_inputs: HashMap<Builtin, u32>,
    frag_color: u32,
    /// Label of the block instructions are currently appended to.
    current_label: u32,
    bindings: Vec<TextureBinding>,
}

impl<'a> CodegenCtx<'a> {
    fn new(graph: &'a mut Graph, decomposition: &'a Decomposition) -> Self {
        CodegenCtx {
            graph,
            decomposition,
            b: ModuleBuilder::new(),
            glsl: 0,
            stage_inputs: HashMap::new(),
            frag_color: 0,
            current_label: 0,
            bindings: Vec::new(),
        }
    }

    fn code(&mut self, inst: Instruction) {
        self.b.push(Section::Function, inst);
    }

    fn ty(&mut self, t: ConcreteType) -> u32 {
        match t {
            ConcreteType::Float => self.b.type_id(TypeKey::Float),
            ConcreteType::Float2 | ConcreteType::Float3 | ConcreteType::Float4 => {
                let component = self.b.type_id(TypeKey::Float);
                self.b.type_id(TypeKey::Vector {
                    component,
                    count: u32::from(t.composite_size()),
                })
            }
            ConcreteType::Int => self.b.type_id(TypeKey::Int),
            ConcreteType::Bool => self.b.type_id(TypeKey::Bool),
            ConcreteType::Texture { dim, .. } => {
                if dim == 1 {
                    self.b.require_capability(capability::SAMPLED_1D);
                }
                let image = self.b.type_id(TypeKey::Image {
                    dim: u32::from(dim) - 1,
                });
                self.b.type_id(TypeKey::SampledImage { image })
            }
        }
    }

    fn port_type(&self, port: PortId) -> Result<ConcreteType, CompileError> {
        let p = self.graph.port(port);
        p.concrete.ok_or_else(|| CompileError::Unresolved {
            node: self.graph.node(p.node).uuid,
            port: p.uuid,
            candidates: p.declared.domain(),
        })
    }

    /// Result id reserved for an output port.
    fn result_id(&mut self, port: PortId) -> u32 {
        self.graph.reserve_id(port, self.b.ids())
    }

    /// Id of the value arriving at an input port, if it is connected.
    fn input_value(&mut self, port: PortId) -> Option<u32> {
        let source = self.graph.upstream(port)?;
        Some(self.result_id(source))
    }

    fn input_at(&mut self, node: &Node, index: usize) -> Option<u32> {
        let port = *node.inputs.get(index)?;
        self.input_value(port)
    }

    /// Bind an existing value to `result`.
    fn copy(&mut self, ty: u32, result: u32, value: u32) {
        self.code(
            Instruction::new(op::COPY_OBJECT)
                .with_type(ty)
                .with_result(result)
                .word(value),
        );
    }

    fn bind_null(&mut self, ty: u32, result: u32) {
        let null = self.b.constant_null(ty);
        self.copy(ty, result, null);
    }

    fn ext(&mut self, ty: u32, result: u32, inst: u32, args: &[u32]) {
        let glsl = self.glsl;
        self.code(
            Instruction::new(op::EXT_INST)
                .with_type(ty)
                .with_result(result)
                .word(glsl)
                .word(inst)
                .words(args.iter().copied()),
        );
    }

    fn label(&mut self, id: u32) {
        self.code(Instruction::new(op::LABEL).with_result(id));
        self.current_label = id;
    }

    /// `value` repeated to fill `t` (a float scalar or vector).
    fn splat(&mut self, t: ConcreteType, value: f32) -> u32 {
        let scalar = self.b.constant_f32(value);
        if t.composite_size() == 1 {
            return scalar;
        }
        let ty = self.ty(t);
        self.b
            .constant_composite(ty, vec![scalar; usize::from(t.composite_size())])
    }

    // ── Prologue ────────────────────────────────────────────────────────

    fn emit_prologue(&mut self) {
        self.b.require_capability(capability::SHADER);

        self.glsl = self.b.alloc_id();
        let import = Instruction::new(op::EXT_INST_IMPORT)
            .with_result(self.glsl)
            .string("GLSL.std.450");
        self.b.push(Section::ExtImport, import);
        self.b.push(
            Section::MemoryModel,
            Instruction::new(op::MEMORY_MODEL)
                .word(ADDRESSING_LOGICAL)
                .word(MEMORY_GLSL450),
        );

        let mut interface = Vec::new();
        for builtin in Builtin::ALL {
            let ty = self.ty(builtin.ty());
            let var = self.stage_variable(ty, storage::INPUT, builtin.location(), builtin.name());
            self.stage_inputs.insert(builtin, var);
            interface.push(var);
        }
        let float4 = self.ty(ConcreteType::Float4);
        self.frag_color = self.stage_variable(float4, storage::OUTPUT, 0, "fragColor");
        interface.push(self.frag_color);

        let void = self.b.type_id(TypeKey::Void);
        let fn_ty = self.b.type_id(TypeKey::Function {
            ret: void,
            params: Vec::new(),
        });
        let main = self.b.alloc_id();
        self.b.name(main, "main");
        self.b.push(
            Section::EntryPoint,
            Instruction::new(op::ENTRY_POINT)
                .word(EXECUTION_FRAGMENT)
                .word(main)
                .string("main")
                .words(interface),
        );
        self.b.push(
            Section::ExecutionMode,
            Instruction::new(op::EXECUTION_MODE)
                .word(main)
                .word(MODE_ORIGIN_UPPER_LEFT),
        );

        self.code(
            Instruction::new(op::FUNCTION)
                .with_type(void)
                .with_result(main)
                .word(FUNCTION_CONTROL_NONE)
                .word(fn_ty),
        );
        let entry = self.b.alloc_id();
        self.label(entry);
    }

    fn stage_variable(&mut self, ty: u32, class: u32, location: u32, name: &str) -> u32 {
        let pointer = self.b.type_id(TypeKey::Pointer {
            storage: class,
            pointee: ty,
        });
        let var = self.b.alloc_id();
        self.b.push(
            Section::Global,
            Instruction::new(op::VARIABLE)
                .with_type(pointer)
                .with_result(var)
                .word(class),
        );
        self.b.decorate(var, decoration::LOCATION, location);
        self.b.name(var, name);
        var
    }

    // ── Node dispatch ───────────────────────────────────────────────────

    fn emit_list(&mut self, nodes: &[NodeId]) -> Result<(), CompileError> {
        for &id in nodes {
            self.emit_node(id)?;
        }
        Ok(())
    }

    fn emit_node(&mut self, id: NodeId) -> Result<(), CompileError> {
        let node = self.graph.node(id).clone();
        match &node.kind {
            NodeKind::Arithmetic(arith) => self.emit_arithmetic(&node, *arith),
            NodeKind::Constant(value) => self.emit_constant(&node, value),
            NodeKind::Load(builtin) => self.emit_load(&node, *builtin),
            NodeKind::Vector(vector) => self.emit_vector(&node, *vector),
            NodeKind::Swizzle { selectors } => self.emit_swizzle(&node, selectors),
            NodeKind::Combine => self.emit_combine(&node),
            NodeKind::Separate => self.emit_separate(&node),
            NodeKind::Sample => self.emit_sample(&node),
            NodeKind::Compute { dimensions } => self.emit_compute(&node, *dimensions),
            NodeKind::IfElse => self.emit_if_else(id, &node),
            NodeKind::Calculator { expression } => self.emit_calculator(&node, expression.as_ref()),
            NodeKind::MaterialOutput => self.emit_material_output(&node),
            NodeKind::Preview => self.emit_preview(&node),
        }
    }

    // ── Value nodes ─────────────────────────────────────────────────────

    /// Left fold over the connected inputs.
    fn emit_arithmetic(&mut self, node: &Node, arith: ArithOp) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        let values: Vec<u32> = node
            .inputs
            .iter()
            .filter_map(|&p| self.input_value(p))
            .collect();

        let opcode = match (arith, t == ConcreteType::Int) {
            (ArithOp::Add, false) => op::F_ADD,
            (ArithOp::Subtract, false) => op::F_SUB,
            (ArithOp::Multiply, false) => op::F_MUL,
            (ArithOp::Divide, false) => op::F_DIV,
            (ArithOp::Add, true) => op::I_ADD,
            (ArithOp::Subtract, true) => op::I_SUB,
            (ArithOp::Multiply, true) => op::I_MUL,
            (ArithOp::Divide, true) => op::S_DIV,
        };

        match values.as_slice() {
            [] => self.bind_null(ty, result),
            [only] => self.copy(ty, result, *only),
            [first, rest @ ..] => {
                let mut acc = *first;
                for (i, &value) in rest.iter().enumerate() {
                    let target = if i + 1 == rest.len() {
                        result
                    } else {
                        self.b.alloc_id()
                    };
                    self.code(
                        Instruction::new(opcode)
                            .with_type(ty)
                            .with_result(target)
                            .word(acc)
                            .word(value),
                    );
                    acc = target;
                }
            }
        }
        Ok(())
    }

    /// Declared directly at the node's reserved id.
    fn emit_constant(&mut self, node: &Node, value: &ConstantValue) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let ty = self.ty(value.ty());
        let result = self.result_id(out);
        let components: &[f32] = match value {
            ConstantValue::Float(v) => std::slice::from_ref(v),
            ConstantValue::Float2(v) => v,
            ConstantValue::Float3(v) => v,
            ConstantValue::Float4(v) => v,
            ConstantValue::Int(v) => {
                let inst = Instruction::new(op::CONSTANT).with_type(ty).with_result(result).int(*v);
                self.b.push(Section::Global, inst);
                return Ok(());
            }
            ConstantValue::Bool(v) => {
                let opcode = if *v { op::CONSTANT_TRUE } else { op::CONSTANT_FALSE };
                let inst = Instruction::new(opcode).with_type(ty).with_result(result);
                self.b.push(Section::Global, inst);
                return Ok(());
            }
        };
        let inst = match components {
            [scalar] => Instruction::new(op::CONSTANT).float(*scalar),
            parts => {
                let ids: Vec<u32> = parts.iter().map(|&c| self.b.constant_f32(c)).collect();
                Instruction::new(op::CONSTANT_COMPOSITE).words(ids)
            }
        };
        self.b
            .push(Section::Global, inst.with_type(ty).with_result(result));
        Ok(())
    }

    fn emit_load(&mut self, node: &Node, builtin: Builtin) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let ty = self.ty(builtin.ty());
        let result = self.result_id(out);
        let var = self.stage_inputs.get(&builtin).copied().unwrap_or(0);
        let loaded = if builtin.normalized() {
            self.b.alloc_id()
        } else {
            result
        };
        self.code(
            Instruction::new(op::LOAD)
                .with_type(ty)
                .with_result(loaded)
                .word(var),
        );
        if builtin.normalized() {
            self.ext(ty, result, glsl::NORMALIZE, &[loaded]);
        }
        Ok(())
    }

    fn emit_vector(&mut self, node: &Node, vector: VectorOp) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        let Some(value) = self.input_at(node, 0) else {
            self.bind_null(ty, result);
            return Ok(());
        };
        let inst = match vector {
            VectorOp::Fract => glsl::FRACT,
            VectorOp::Normalize => glsl::NORMALIZE,
            VectorOp::Length => glsl::LENGTH,
        };
        self.ext(ty, result, inst, &[value]);
        Ok(())
    }

    fn emit_swizzle(&mut self, node: &Node, selectors: &[u32]) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        let size = u32::from(self.port_type(node.inputs[0])?.composite_size());
        let Some(value) = self.input_at(node, 0) else {
            self.bind_null(ty, result);
            return Ok(());
        };
        let selectors: Vec<u32> = selectors.iter().map(|&s| s.min(size - 1)).collect();

        let inst = match (size, selectors.as_slice()) {
            (1, [_]) => Instruction::new(op::COPY_OBJECT).word(value),
            (1, many) => Instruction::new(op::COMPOSITE_CONSTRUCT).words(many.iter().map(|_| value)),
            (_, [one]) => Instruction::new(op::COMPOSITE_EXTRACT).word(value).word(*one),
            (_, many) => Instruction::new(op::VECTOR_SHUFFLE)
                .word(value)
                .word(value)
                .words(many.iter().copied()),
        };
        self.code(inst.with_type(ty).with_result(result));
        Ok(())
    }

    /// Unconnected inputs contribute 0.
    fn emit_combine(&mut self, node: &Node) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        let mut parts = Vec::with_capacity(node.inputs.len());
        for &port in &node.inputs {
            let part = match self.input_value(port) {
                Some(value) => value,
                None => self.b.constant_f32(0.0),
            };
            parts.push(part);
        }
        self.code(
            Instruction::new(op::COMPOSITE_CONSTRUCT)
                .with_type(ty)
                .with_result(result)
                .words(parts),
        );
        Ok(())
    }

    fn emit_separate(&mut self, node: &Node) -> Result<(), CompileError> {
        let float = self.ty(ConcreteType::Float);
        let value = self.input_at(node, 0);
        for (i, &out) in node.outputs.iter().enumerate() {
            let result = self.result_id(out);
            match value {
                Some(value) => self.code(
                    Instruction::new(op::COMPOSITE_EXTRACT)
                        .with_type(float)
                        .with_result(result)
                        .word(value)
                        .word(i as u32),
                ),
                None => self.bind_null(float, result),
            }
        }
        Ok(())
    }

    /// Explicit-lod sample (lod 0 unless connected), narrowed to the
    /// texture's element size.
    fn emit_sample(&mut self, node: &Node) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        let (Some(field), Some(position)) = (self.input_at(node, 0), self.input_at(node, 1)) else {
            self.bind_null(ty, result);
            return Ok(());
        };
        let lod = match self.input_at(node, 2) {
            Some(lod) => lod,
            None => self.b.constant_f32(0.0),
        };

        let float4 = self.ty(ConcreteType::Float4);
        let size = u32::from(t.composite_size());
        let sampled = if size == 4 { result } else { self.b.alloc_id() };
        self.code(
            Instruction::new(op::IMAGE_SAMPLE_EXPLICIT_LOD)
                .with_type(float4)
                .with_result(sampled)
                .word(field)
                .word(position)
                .word(IMAGE_OPERANDS_LOD)
                .word(lod),
        );
        match size {
            4 => {}
            1 => self.code(
                Instruction::new(op::COMPOSITE_EXTRACT)
                    .with_type(ty)
                    .with_result(result)
                    .word(sampled)
                    .word(0),
            ),
            _ => self.code(
                Instruction::new(op::VECTOR_SHUFFLE)
                    .with_type(ty)
                    .with_result(result)
                    .word(sampled)
                    .word(sampled)
                    .words(0..size),
            ),
        }
        Ok(())
    }

    /// A sampled-texture variable in the compute descriptor set, loaded at
    /// the node's position. The node's input belongs to the compute stage.
    fn emit_compute(&mut self, node: &Node, dimensions: [u32; 3]) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        let binding = self.bindings.len() as u32;

        let pointer = self.b.type_id(TypeKey::Pointer {
            storage: storage::UNIFORM_CONSTANT,
            pointee: ty,
        });
        let var = self.b.alloc_id();
        self.b.push(
            Section::Global,
            Instruction::new(op::VARIABLE)
                .with_type(pointer)
                .with_result(var)
                .word(storage::UNIFORM_CONSTANT),
        );
        self.b
            .decorate(var, decoration::DESCRIPTOR_SET, COMPUTE_DESCRIPTOR_SET);
        self.b.decorate(var, decoration::BINDING, binding);
        self.b.name(var, &format!("computeTexture{binding}"));

        self.code(
            Instruction::new(op::LOAD)
                .with_type(ty)
                .with_result(result)
                .word(var),
        );
        self.bindings.push(TextureBinding {
            node: node.uuid,
            binding,
            dimensions,
        });
        Ok(())
    }

    // ── Control flow ────────────────────────────────────────────────────

    /// Selection over the decomposed bodies, merged with a phi. The phi's
    /// parents are the blocks that end each side, which differ from the
    /// side's first label when a body contains a nested selection.
    fn emit_if_else(&mut self, id: NodeId, node: &Node) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        let condition = match self.input_at(node, 0) {
            Some(cond) => cond,
            None => self.b.constant_bool(false),
        };
        let decomposition = self.decomposition;
        let (on_true, on_false): (&[NodeId], &[NodeId]) = match decomposition.bodies.get(&id) {
            Some(bodies) => (&bodies.on_true, &bodies.on_false),
            None => (&[], &[]),
        };

        let merge = self.b.alloc_id();
        let true_label = self.b.alloc_id();
        let false_label = self.b.alloc_id();
        self.code(
            Instruction::new(op::SELECTION_MERGE)
                .word(merge)
                .word(SELECTION_CONTROL_NONE),
        );
        self.code(
            Instruction::new(op::BRANCH_CONDITIONAL)
                .word(condition)
                .word(true_label)
                .word(false_label),
        );

        let mut incoming = Vec::with_capacity(4);
        for (label, body, index) in [(true_label, on_true, 1), (false_label, on_false, 2)] {
            self.label(label);
            self.emit_list(body)?;
            let value = match self.input_at(node, index) {
                Some(value) => value,
                None => self.b.constant_null(ty),
            };
            incoming.push(value);
            incoming.push(self.current_label);
            self.code(Instruction::new(op::BRANCH).word(merge));
        }

        self.label(merge);
        self.code(
            Instruction::new(op::PHI)
                .with_type(ty)
                .with_result(result)
                .words(incoming),
        );
        Ok(())
    }

    // ── Calculator ──────────────────────────────────────────────────────

    fn emit_calculator(&mut self, node: &Node, expression: Option<&MathExpr>) -> Result<(), CompileError> {
        let out = node.outputs[0];
        let t = self.port_type(out)?;
        let ty = self.ty(t);
        let result = self.result_id(out);
        match expression {
            Some(expr) => {
                let value = self.lower_expr(node, expr, t);
                self.copy(ty, result, value);
            }
            None => self.bind_null(ty, result),
        }
        Ok(())
    }

    /// Lower a formula computed component-wise in `t`.
    fn lower_expr(&mut self, node: &Node, expr: &MathExpr, t: ConcreteType) -> u32 {
        let ty = self.ty(t);
        match expr {
            MathExpr::Literal(v) => self.splat(t, *v),
            MathExpr::Constant(c) => self.splat(t, c.value()),
            MathExpr::Variable(v) => match self.input_at(node, v.index()) {
                Some(value) => value,
                None => self.b.constant_null(ty),
            },
            MathExpr::Unary(unary, operand) => {
                let value = self.lower_expr(node, operand, t);
                let inst = match unary {
                    UnaryOp::Plus => return value,
                    UnaryOp::Minus => {
                        let result = self.b.alloc_id();
                        self.code(
                            Instruction::new(op::F_NEGATE)
                                .with_type(ty)
                                .with_result(result)
                                .word(value),
                        );
                        return result;
                    }
                    UnaryOp::Sqrt => glsl::SQRT,
                    UnaryOp::Floor => glsl::FLOOR,
                    UnaryOp::Ceil => glsl::CEIL,
                    UnaryOp::Round => glsl::ROUND,
                    UnaryOp::Cos => glsl::COS,
                    UnaryOp::Acos => glsl::ACOS,
                    UnaryOp::Sin => glsl::SIN,
                    UnaryOp::Asin => glsl::ASIN,
                    UnaryOp::Tan => glsl::TAN,
                    UnaryOp::Atan => glsl::ATAN,
                    UnaryOp::Abs => glsl::FABS,
                    UnaryOp::Log => glsl::LOG,
                };
                let result = self.b.alloc_id();
                self.ext(ty, result, inst, &[value]);
                result
            }
            MathExpr::Binary(binary, lhs, rhs) => {
                let a = self.lower_expr(node, lhs, t);
                let b = self.lower_expr(node, rhs, t);
                let result = self.b.alloc_id();
                let opcode = match binary {
                    BinaryOp::Add => op::F_ADD,
                    BinaryOp::Subtract => op::F_SUB,
                    BinaryOp::Multiply => op::F_MUL,
                    BinaryOp::Divide => op::F_DIV,
                    BinaryOp::Power => {
                        self.ext(ty, result, glsl::POW, &[a, b]);
                        return result;
                    }
                };
                self.code(
                    Instruction::new(opcode)
                        .with_type(ty)
                        .with_result(result)
                        .word(a)
                        .word(b),
                );
                result
            }
        }
    }

    // ── Sinks ───────────────────────────────────────────────────────────

    fn emit_material_output(&mut self, node: &Node) -> Result<(), CompileError> {
        let value = match self.input_at(node, 0) {
            Some(value) => value,
            None => {
                let float4 = self.ty(ConcreteType::Float4);
                self.b.constant_null(float4)
            }
        };
        self.store_color(value);
        Ok(())
    }

    /// Widen any value to an opaque colour: scalars are replicated, missing
    /// components are 0, alpha is 1.
    fn emit_preview(&mut self, node: &Node) -> Result<(), CompileError> {
        let float4 = self.ty(ConcreteType::Float4);
        let input = node.inputs[0];
        let Some(value) = self.input_value(input) else {
            let null = self.b.constant_null(float4);
            self.store_color(null);
            return Ok(());
        };
        let t = self.port_type(input)?;
        let float = self.ty(ConcreteType::Float);
        let one = self.b.constant_f32(1.0);
        let zero = self.b.constant_f32(0.0);

        let scalar = match t {
            ConcreteType::Int => {
                let converted = self.b.alloc_id();
                self.code(
                    Instruction::new(op::CONVERT_S_TO_F)
                        .with_type(float)
                        .with_result(converted)
                        .word(value),
                );
                Some(converted)
            }
            ConcreteType::Bool => {
                let selected = self.b.alloc_id();
                self.code(
                    Instruction::new(op::SELECT)
                        .with_type(float)
                        .with_result(selected)
                        .word(value)
                        .word(one)
                        .word(zero),
                );
                Some(selected)
            }
            ConcreteType::Float => Some(value),
            _ => None,
        };
        let parts = match (scalar, t) {
            (Some(s), _) => vec![s, s, s, one],
            (None, ConcreteType::Float2) => vec![value, zero, one],
            (None, ConcreteType::Float3) => vec![value, one],
            (None, _) => {
                self.store_color(value);
                return Ok(());
            }
        };
        let color = self.b.alloc_id();
        self.code(
            Instruction::new(op::COMPOSITE_CONSTRUCT)
                .with_type(float4)
                .with_result(color)
                .words(parts),
        );
        self.store_color(color);
        Ok(())
    }

    fn store_color(&mut self, value: u32) {
        let target = self.frag_color;
        self.code(Instruction::new(op::STORE).word(target).word(value));
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
