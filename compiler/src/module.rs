// module.rs — Binary module encoding, assembly and decoding
//
// An instruction is (opcode, optional result type, optional result id,
// operand words); it encodes as a header word `(word_count << 16) | opcode`
// followed by the remaining words in that order. A module is a five-word
// header (magic, version, generator, bound, schema) followed by every
// instruction in emission order.
//
// `ModuleBuilder` keeps one buffer per logical module section so emission
// can interleave declarations and code; types and constants are declared
// once and shared.
//
// Preconditions: none.
// Postconditions: `ModuleBuilder::finish` produces a header whose bound is
//   one greater than the highest id issued.
// Failure modes: decoding a malformed word stream yields `ModuleError`.
// Side effects: none.

use std::collections::HashMap;
use std::fmt::Write;

use crate::id::IdAllocator;

pub const MAGIC: u32 = 0x0723_0203;
pub const VERSION: u32 = 0x0001_0000;
pub const GENERATOR: u32 = 0;
pub const HEADER_WORDS: usize = 5;

// ── Opcodes and enumerants ──────────────────────────────────────────────────

pub mod op {
    pub const NAME: u16 = 5;
    pub const EXT_INST_IMPORT: u16 = 11;
    pub const EXT_INST: u16 = 12;
    pub const MEMORY_MODEL: u16 = 14;
    pub const ENTRY_POINT: u16 = 15;
    pub const EXECUTION_MODE: u16 = 16;
    pub const CAPABILITY: u16 = 17;
    pub const TYPE_VOID: u16 = 19;
    pub const TYPE_BOOL: u16 = 20;
    pub const TYPE_INT: u16 = 21;
    pub const TYPE_FLOAT: u16 = 22;
    pub const TYPE_VECTOR: u16 = 23;
    pub const TYPE_IMAGE: u16 = 25;
    pub const TYPE_SAMPLED_IMAGE: u16 = 27;
    pub const TYPE_POINTER: u16 = 32;
    pub const TYPE_FUNCTION: u16 = 33;
    pub const CONSTANT_TRUE: u16 = 41;
    pub const CONSTANT_FALSE: u16 = 42;
    pub const CONSTANT: u16 = 43;
    pub const CONSTANT_COMPOSITE: u16 = 44;
    pub const CONSTANT_NULL: u16 = 46;
    pub const FUNCTION: u16 = 54;
    pub const FUNCTION_END: u16 = 56;
    pub const VARIABLE: u16 = 59;
    pub const LOAD: u16 = 61;
    pub const STORE: u16 = 62;
    pub const DECORATE: u16 = 71;
    pub const VECTOR_SHUFFLE: u16 = 79;
    pub const COMPOSITE_CONSTRUCT: u16 = 80;
    pub const COMPOSITE_EXTRACT: u16 = 81;
    pub const COPY_OBJECT: u16 = 83;
    pub const IMAGE_SAMPLE_EXPLICIT_LOD: u16 = 88;
    pub const CONVERT_S_TO_F: u16 = 111;
    pub const F_NEGATE: u16 = 127;
    pub const I_ADD: u16 = 128;
    pub const F_ADD: u16 = 129;
    pub const I_SUB: u16 = 130;
    pub const F_SUB: u16 = 131;
    pub const I_MUL: u16 = 132;
    pub const F_MUL: u16 = 133;
    pub const S_DIV: u16 = 135;
    pub const F_DIV: u16 = 136;
    pub const SELECT: u16 = 169;
    pub const PHI: u16 = 245;
    pub const SELECTION_MERGE: u16 = 247;
    pub const LABEL: u16 = 248;
    pub const BRANCH: u16 = 249;
    pub const BRANCH_CONDITIONAL: u16 = 250;
    pub const RETURN: u16 = 253;
}

pub mod capability {
    pub const SHADER: u32 = 1;
    pub const SAMPLED_1D: u32 = 43;
}

pub mod storage {
    pub const UNIFORM_CONSTANT: u32 = 0;
    pub const INPUT: u32 = 1;
    pub const OUTPUT: u32 = 3;
}

pub mod decoration {
    pub const LOCATION: u32 = 30;
    pub const BINDING: u32 = 33;
    pub const DESCRIPTOR_SET: u32 = 34;
}

pub const ADDRESSING_LOGICAL: u32 = 0;
pub const MEMORY_GLSL450: u32 = 1;
pub const EXECUTION_FRAGMENT: u32 = 4;
pub const MODE_ORIGIN_UPPER_LEFT: u32 = 7;
pub const FUNCTION_CONTROL_NONE: u32 = 0;
pub const SELECTION_CONTROL_NONE: u32 = 0;
pub const IMAGE_OPERANDS_LOD: u32 = 0x2;

/// Disassembly metadata: (opcode, name, has result type, has result id).
const OPCODE_INFO: &[(u16, &str, bool, bool)] = &[
    (op::NAME, "OpName", false, false),
    (op::EXT_INST_IMPORT, "OpExtInstImport", false, true),
    (op::EXT_INST, "OpExtInst", true, true),
    (op::MEMORY_MODEL, "OpMemoryModel", false, false),
    (op::ENTRY_POINT, "OpEntryPoint", false, false),
    (op::EXECUTION_MODE, "OpExecutionMode", false, false),
    (op::CAPABILITY, "OpCapability", false, false),
    (op::TYPE_VOID, "OpTypeVoid", false, true),
    (op::TYPE_BOOL, "OpTypeBool", false, true),
    (op::TYPE_INT, "OpTypeInt", false, true),
    (op::TYPE_FLOAT, "OpTypeFloat", false, true),
    (op::TYPE_VECTOR, "OpTypeVector", false, true),
    (op::TYPE_IMAGE, "OpTypeImage", false, true),
    (op::TYPE_SAMPLED_IMAGE, "OpTypeSampledImage", false, true),
    (op::TYPE_POINTER, "OpTypePointer", false, true),
    (op::TYPE_FUNCTION, "OpTypeFunction", false, true),
    (op::CONSTANT_TRUE, "OpConstantTrue", true, true),
    (op::CONSTANT_FALSE, "OpConstantFalse", true, true),
    (op::CONSTANT, "OpConstant", true, true),
    (op::CONSTANT_COMPOSITE, "OpConstantComposite", true, true),
    (op::CONSTANT_NULL, "OpConstantNull", true, true),
    (op::FUNCTION, "OpFunction", true, true),
    (op::FUNCTION_END, "OpFunctionEnd", false, false),
    (op::VARIABLE, "OpVariable", true, true),
    (op::LOAD, "OpLoad", true, true),
    (op::STORE, "OpStore", false, false),
    (op::DECORATE, "OpDecorate", false, false),
    (op::VECTOR_SHUFFLE, "OpVectorShuffle", true, true),
    (op::COMPOSITE_CONSTRUCT, "OpCompositeConstruct", true, true),
    (op::COMPOSITE_EXTRACT, "OpCompositeExtract", true, true),
    (op::COPY_OBJECT, "OpCopyObject", true, true),
    (op::IMAGE_SAMPLE_EXPLICIT_LOD, "OpImageSampleExplicitLod", true, true),
    (op::CONVERT_S_TO_F, "OpConvertSToF", true, true),
    (op::F_NEGATE, "OpFNegate", true, true),
    (op::I_ADD, "OpIAdd", true, true),
    (op::F_ADD, "OpFAdd", true, true),
    (op::I_SUB, "OpISub", true, true),
    (op::F_SUB, "OpFSub", true, true),
    (op::I_MUL, "OpIMul", true, true),
    (op::F_MUL, "OpFMul", true, true),
    (op::S_DIV, "OpSDiv", true, true),
    (op::F_DIV, "OpFDiv", true, true),
    (op::SELECT, "OpSelect", true, true),
    (op::PHI, "OpPhi", true, true),
    (op::SELECTION_MERGE, "OpSelectionMerge", false, false),
    (op::LABEL, "OpLabel", false, true),
    (op::BRANCH, "OpBranch", false, false),
    (op::BRANCH_CONDITIONAL, "OpBranchConditional", false, false),
    (op::RETURN, "OpReturn", false, false),
];

/// Opcodes whose operands contain a literal string, and where it starts.
fn string_operand(opcode: u16) -> Option<usize> {
    match opcode {
        op::EXT_INST_IMPORT => Some(0),
        op::NAME => Some(1),
        op::ENTRY_POINT => Some(2),
        _ => None,
    }
}

// ── Instructions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u16,
    pub result_type: Option<u32>,
    pub result_id: Option<u32>,
    pub operands: Vec<u32>,
}

impl Instruction {
    pub fn new(opcode: u16) -> Self {
        Instruction {
            opcode,
            result_type: None,
            result_id: None,
            operands: Vec::new(),
        }
    }

    pub fn with_type(mut self, result_type: u32) -> Self {
        self.result_type = Some(result_type);
        self
    }

    pub fn with_result(mut self, result_id: u32) -> Self {
        self.result_id = Some(result_id);
        self
    }

    // Operand appenders.

    pub fn word(mut self, word: u32) -> Self {
        self.operands.push(word);
        self
    }

    pub fn words(mut self, words: impl IntoIterator<Item = u32>) -> Self {
        self.operands.extend(words);
        self
    }

    pub fn flag(self, value: bool) -> Self {
        self.word(u32::from(value))
    }

    pub fn float(self, value: f32) -> Self {
        self.word(value.to_bits())
    }

    pub fn int(self, value: i32) -> Self {
        self.word(value as u32)
    }

    pub fn string(self, value: &str) -> Self {
        self.words(encode_string(value))
    }

    pub fn word_count(&self) -> u32 {
        1 + u32::from(self.result_type.is_some())
            + u32::from(self.result_id.is_some())
            + self.operands.len() as u32
    }

    pub fn encode_into(&self, out: &mut Vec<u32>) {
        out.push((self.word_count() << 16) | u32::from(self.opcode));
        out.extend(self.result_type);
        out.extend(self.result_id);
        out.extend_from_slice(&self.operands);
    }
}

/// UTF-8 bytes packed little-endian, four per word, with at least one
/// terminating zero byte.
pub fn encode_string(value: &str) -> Vec<u32> {
    let bytes = value.as_bytes();
    let count = bytes.len() / 4 + 1;
    (0..count)
        .map(|i| {
            (0..4).fold(0u32, |word, j| {
                let byte = bytes.get(i * 4 + j).copied().unwrap_or(0);
                word | (u32::from(byte) << (8 * j))
            })
        })
        .collect()
}

/// Inverse of `encode_string`: the string up to the first zero byte, and the
/// number of words it occupied.
pub fn decode_string(words: &[u32]) -> (String, usize) {
    let mut bytes = Vec::new();
    for (i, word) in words.iter().enumerate() {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                return (String::from_utf8_lossy(&bytes).into_owned(), i + 1);
            }
            bytes.push(byte);
        }
    }
    (String::from_utf8_lossy(&bytes).into_owned(), words.len())
}

// ── Module assembly ─────────────────────────────────────────────────────────

/// Logical module sections, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Capability,
    ExtImport,
    MemoryModel,
    EntryPoint,
    ExecutionMode,
    Debug,
    Annotation,
    Global,
    Function,
}

const SECTION_COUNT: usize = 9;

/// A declared type, used to share one declaration per distinct type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Void,
    Bool,
    Int,
    Float,
    Vector { component: u32, count: u32 },
    Image { dim: u32 },
    SampledImage { image: u32 },
    Pointer { storage: u32, pointee: u32 },
    Function { ret: u32, params: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Scalar { ty: u32, bits: u32 },
    Bool(bool),
    Composite { ty: u32, parts: Vec<u32> },
    Null { ty: u32 },
}

#[derive(Debug, Default)]
pub struct ModuleBuilder {
    ids: IdAllocator,
    sections: [Vec<Instruction>; SECTION_COUNT],
    types: HashMap<TypeKey, u32>,
    constants: HashMap<ConstantKey, u32>,
    capabilities: Vec<u32>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The run's id allocator (shared with port reservation).
    pub fn ids(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub fn alloc_id(&mut self) -> u32 {
        self.ids.alloc()
    }

    pub fn push(&mut self, section: Section, instruction: Instruction) {
        self.sections[section as usize].push(instruction);
    }

    /// Declare a capability once.
    pub fn require_capability(&mut self, cap: u32) {
        if !self.capabilities.contains(&cap) {
            self.capabilities.push(cap);
            self.push(Section::Capability, Instruction::new(op::CAPABILITY).word(cap));
        }
    }

    pub fn type_id(&mut self, key: TypeKey) -> u32 {
        if let Some(&id) = self.types.get(&key) {
            return id;
        }
        let id = self.ids.alloc();
        let inst = match &key {
            TypeKey::Void => Instruction::new(op::TYPE_VOID),
            TypeKey::Bool => Instruction::new(op::TYPE_BOOL),
            TypeKey::Int => Instruction::new(op::TYPE_INT).word(32).word(1),
            TypeKey::Float => Instruction::new(op::TYPE_FLOAT).word(32),
            TypeKey::Vector { component, count } => {
                Instruction::new(op::TYPE_VECTOR).word(*component).word(*count)
            }
            TypeKey::Image { dim } => {
                let float = self.type_id(TypeKey::Float);
                // sampled type, dim, depth, arrayed, ms, sampled, format
                Instruction::new(op::TYPE_IMAGE)
                    .word(float)
                    .word(*dim)
                    .words([0, 0, 0, 1, 0])
            }
            TypeKey::SampledImage { image } => Instruction::new(op::TYPE_SAMPLED_IMAGE).word(*image),
            TypeKey::Pointer { storage, pointee } => {
                Instruction::new(op::TYPE_POINTER).word(*storage).word(*pointee)
            }
            TypeKey::Function { ret, params } => Instruction::new(op::TYPE_FUNCTION)
                .word(*ret)
                .words(params.iter().copied()),
        };
        self.push(Section::Global, inst.with_result(id));
        self.types.insert(key, id);
        id
    }

    pub fn constant_f32(&mut self, value: f32) -> u32 {
        let ty = self.type_id(TypeKey::Float);
        self.scalar_constant(ty, value.to_bits())
    }

    pub fn constant_i32(&mut self, value: i32) -> u32 {
        let ty = self.type_id(TypeKey::Int);
        self.scalar_constant(ty, value as u32)
    }

    fn scalar_constant(&mut self, ty: u32, bits: u32) -> u32 {
        let key = ConstantKey::Scalar { ty, bits };
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let id = self.ids.alloc();
        self.push(
            Section::Global,
            Instruction::new(op::CONSTANT).with_type(ty).with_result(id).word(bits),
        );
        self.constants.insert(key, id);
        id
    }

    pub fn constant_bool(&mut self, value: bool) -> u32 {
        let key = ConstantKey::Bool(value);
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let ty = self.type_id(TypeKey::Bool);
        let id = self.ids.alloc();
        let opcode = if value { op::CONSTANT_TRUE } else { op::CONSTANT_FALSE };
        self.push(
            Section::Global,
            Instruction::new(opcode).with_type(ty).with_result(id),
        );
        self.constants.insert(key, id);
        id
    }

    pub fn constant_composite(&mut self, ty: u32, parts: Vec<u32>) -> u32 {
        let inst = Instruction::new(op::CONSTANT_COMPOSITE)
            .with_type(ty)
            .words(parts.iter().copied());
        let key = ConstantKey::Composite { ty, parts };
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let id = self.ids.alloc();
        self.push(Section::Global, inst.with_result(id));
        self.constants.insert(key, id);
        id
    }

    pub fn constant_null(&mut self, ty: u32) -> u32 {
        let key = ConstantKey::Null { ty };
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let id = self.ids.alloc();
        self.push(
            Section::Global,
            Instruction::new(op::CONSTANT_NULL).with_type(ty).with_result(id),
        );
        self.constants.insert(key, id);
        id
    }

    pub fn name(&mut self, id: u32, name: &str) {
        self.push(Section::Debug, Instruction::new(op::NAME).word(id).string(name));
    }

    pub fn decorate(&mut self, id: u32, decoration: u32, value: u32) {
        self.push(
            Section::Annotation,
            Instruction::new(op::DECORATE).word(id).word(decoration).word(value),
        );
    }

    /// Concatenate the sections behind a header.
    pub fn finish(self) -> Module {
        let bound = self.ids.bound();
        let mut words = vec![MAGIC, VERSION, GENERATOR, bound, 0];
        for section in &self.sections {
            for inst in section {
                inst.encode_into(&mut words);
            }
        }
        Module { bound, words }
    }
}

// ── Finished module ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub bound: u32,
    /// Header followed by instructions.
    pub words: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub generator: u32,
    pub bound: u32,
    pub schema: u32,
}

/// One decoded instruction; `words` excludes the header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInstruction<'a> {
    pub opcode: u16,
    pub words: &'a [u32],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("module shorter than its header")]
    TooShort,
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("instruction at word {offset} has zero length")]
    ZeroLength { offset: usize },
    #[error("instruction at word {offset} runs past the end of the module")]
    Truncated { offset: usize },
}

impl Module {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn header(&self) -> Result<Header, ModuleError> {
        decode_header(&self.words)
    }

    pub fn instructions(&self) -> Result<Vec<RawInstruction<'_>>, ModuleError> {
        decode_instructions(&self.words)
    }
}

pub fn decode_header(words: &[u32]) -> Result<Header, ModuleError> {
    let [magic, version, generator, bound, schema] = match words.get(..HEADER_WORDS) {
        Some(&[a, b, c, d, e]) => [a, b, c, d, e],
        _ => return Err(ModuleError::TooShort),
    };
    if magic != MAGIC {
        return Err(ModuleError::BadMagic(magic));
    }
    Ok(Header {
        magic,
        version,
        generator,
        bound,
        schema,
    })
}

pub fn decode_instructions(words: &[u32]) -> Result<Vec<RawInstruction<'_>>, ModuleError> {
    decode_header(words)?;
    let mut out = Vec::new();
    let mut offset = HEADER_WORDS;
    while offset < words.len() {
        let head = words[offset];
        let count = (head >> 16) as usize;
        if count == 0 {
            return Err(ModuleError::ZeroLength { offset });
        }
        let end = offset + count;
        let Some(rest) = words.get(offset + 1..end) else {
            return Err(ModuleError::Truncated { offset });
        };
        out.push(RawInstruction {
            opcode: (head & 0xFFFF) as u16,
            words: rest,
        });
        offset = end;
    }
    Ok(out)
}

// ── Disassembly ─────────────────────────────────────────────────────────────

/// One line per instruction: `%result = OpName %type operand...`. Literal
/// strings are shown quoted; other operands as plain numbers.
pub fn disassemble(words: &[u32]) -> Result<String, ModuleError> {
    let header = decode_header(words)?;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "; version {}.{}, generator {}, bound {}, schema {}",
        header.version >> 16,
        (header.version >> 8) & 0xFF,
        header.generator,
        header.bound,
        header.schema
    );
    for inst in decode_instructions(words)? {
        let info = OPCODE_INFO.iter().find(|(code, ..)| *code == inst.opcode);
        let (name, has_type, has_result) = match info {
            Some(&(_, name, has_type, has_result)) => (name.to_string(), has_type, has_result),
            None => (format!("Op{}", inst.opcode), false, false),
        };
        let mut rest = inst.words;
        let mut line = String::new();
        let mut result_type = None;
        if has_type {
            if let Some((&ty, tail)) = rest.split_first() {
                result_type = Some(ty);
                rest = tail;
            }
        }
        if has_result {
            if let Some((&id, tail)) = rest.split_first() {
                let _ = write!(line, "%{id} = ");
                rest = tail;
            }
        }
        line.push_str(&name);
        if let Some(ty) = result_type {
            let _ = write!(line, " %{ty}");
        }
        let string_at = string_operand(inst.opcode);
        let mut i = 0;
        while i < rest.len() {
            if Some(i) == string_at {
                let (text, used) = decode_string(&rest[i..]);
                let _ = write!(line, " {text:?}");
                i += used;
            } else {
                let _ = write!(line, " {}", rest[i]);
                i += 1;
            }
        }
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

// ── Tests ───────────────────────────────────────────────────────────────────
