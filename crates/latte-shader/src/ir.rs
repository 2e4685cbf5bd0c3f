//! Decoded shader representation.
//!
//! A [`Shader`] owns a flat arena of [`Instruction`]s in program order. The structured block tree
//! built by [`crate::blockify`] refers into that arena through [`InstrId`] indices, so restructuring
//! never moves or clones instructions.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::opcodes::{AluFlags, CfOpcode, ExpOpcode, Op2, Op3, TexOpcode, VtxOpcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Vertex,
    Pixel,
}

impl ShaderType {
    pub fn name(self) -> &'static str {
        match self {
            ShaderType::Vertex => "vertex",
            ShaderType::Pixel => "pixel",
        }
    }
}

/// Index of an instruction in [`Shader::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    X,
    Y,
    Z,
    W,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::X, Channel::Y, Channel::Z, Channel::W];

    pub fn from_raw(raw: u32) -> Self {
        Channel::ALL[(raw & 3) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_char(self) -> char {
        match self {
            Channel::X => 'x',
            Channel::Y => 'y',
            Channel::Z => 'z',
            Channel::W => 'w',
        }
    }
}

/// Component selector used by fetch and export swizzles (`SQ_SEL_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Select {
    X,
    Y,
    Z,
    W,
    Zero,
    One,
    Mask,
}

impl Select {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Select::X),
            1 => Some(Select::Y),
            2 => Some(Select::Z),
            3 => Some(Select::W),
            4 => Some(Select::Zero),
            5 => Some(Select::One),
            7 => Some(Select::Mask),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Select::X => 'x',
            Select::Y => 'y',
            Select::Z => 'z',
            Select::W => 'w',
            Select::Zero => '0',
            Select::One => '1',
            Select::Mask => '_',
        }
    }
}

/// How the bits of an operand are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Float,
    Int,
    Uint,
}

/// Relative addressing register used by an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexMode {
    ArX,
    ArY,
    ArZ,
    ArW,
    Loop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceKind {
    Register,
    /// A kcache entry, resolved to the locked uniform block.
    UniformBlock { block: u32 },
    ConstantFile,
    ConstantFloat(f32),
    ConstantInt(i32),
    /// Raw bits of an inline literal, interpreted per [`AluSource::value_type`].
    Literal(u32),
    PreviousVector,
    PreviousScalar,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AluSource {
    pub kind: SourceKind,
    /// Register / uniform / constant index. Unused for built-in constants.
    pub id: u32,
    pub chan: Channel,
    pub negate: bool,
    pub absolute: bool,
    pub rel: Option<IndexMode>,
    pub value_type: ValueType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluDest {
    pub id: u32,
    pub chan: Channel,
    pub clamp: bool,
    pub value_type: ValueType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    X,
    Y,
    Z,
    W,
    T,
}

impl Unit {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Unit::X,
            1 => Unit::Y,
            2 => Unit::Z,
            3 => Unit::W,
            _ => Unit::T,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_char(self) -> char {
        match self {
            Unit::X => 'x',
            Unit::Y => 'y',
            Unit::Z => 'z',
            Unit::W => 'w',
            Unit::T => 't',
        }
    }

    /// Vector channel written by the unit; `None` for the transcendental unit.
    pub fn channel(self) -> Option<Channel> {
        match self {
            Unit::T => None,
            unit => Some(Channel::ALL[unit.index()]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputModifier {
    Off,
    Multiply2,
    Multiply4,
    Divide2,
}

impl OutputModifier {
    pub fn from_raw(raw: u32) -> Self {
        match raw & 3 {
            0 => OutputModifier::Off,
            1 => OutputModifier::Multiply2,
            2 => OutputModifier::Multiply4,
            _ => OutputModifier::Divide2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateSelect {
    Off,
    Zero,
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluOpcode {
    Op2(Op2),
    Op3(Op3),
}

impl AluOpcode {
    pub fn name(self) -> &'static str {
        match self {
            AluOpcode::Op2(op) => op.name(),
            AluOpcode::Op3(op) => op.name(),
        }
    }

    pub fn flags(self) -> AluFlags {
        match self {
            AluOpcode::Op2(op) => op.flags(),
            AluOpcode::Op3(op) => op.flags(),
        }
    }

    pub fn src_count(self) -> usize {
        match self {
            AluOpcode::Op2(op) => op.src_count(),
            AluOpcode::Op3(op) => op.src_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CfInstruction {
    pub cf_pc: u32,
    pub opcode: CfOpcode,
    pub addr: u32,
    pub pop_count: u32,
    pub cf_const: u32,
    pub cond: u32,
    /// Spliced in by the decoder around predicate-setting ALU instructions.
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AluInstruction {
    pub cf_pc: u32,
    pub group_pc: u32,
    pub opcode: AluOpcode,
    pub unit: Unit,
    pub pred_sel: PredicateSelect,
    pub bank_swizzle: u32,
    pub dest: AluDest,
    pub sources: Vec<AluSource>,
    /// Always set for OP3, which has no write-mask bit.
    pub write_mask: bool,
    pub update_exec_mask: bool,
    pub update_pred: bool,
    pub omod: OutputModifier,
}

/// DOT4 / CUBE / MAX4 lanes of one group, captured together.
#[derive(Debug, Clone, PartialEq)]
pub struct AluReductionInstruction {
    pub cf_pc: u32,
    pub group_pc: u32,
    pub opcode: Op2,
    pub units: [Option<AluInstruction>; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRegister {
    pub id: u32,
    pub sel: [Select; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TexInstruction {
    pub cf_pc: u32,
    pub group_pc: u32,
    pub opcode: TexOpcode,
    pub resource_id: u32,
    pub sampler_id: u32,
    pub lod_bias: i32,
    pub offset: [i32; 3],
    /// Per axis; `false` means unnormalized coordinates.
    pub coord_normalized: [bool; 4],
    pub src: FetchRegister,
    pub dst: FetchRegister,
    pub fetch_whole_quad: bool,
    pub bc_frac_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumFormat {
    Norm,
    Int,
    Scaled,
}

impl NumFormat {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => NumFormat::Int,
            2 => NumFormat::Scaled,
            _ => NumFormat::Norm,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexFetchInstruction {
    pub cf_pc: u32,
    pub group_pc: u32,
    pub opcode: VtxOpcode,
    pub buffer_id: u32,
    /// Semantic id for `SEMANTIC` fetches, destination GPR otherwise.
    pub dst: FetchRegister,
    pub src_gpr: u32,
    pub data_format: u32,
    pub num_format: NumFormat,
    pub signed: bool,
    pub offset: u32,
    pub mega_fetch_count: u32,
    pub endian_swap: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportType {
    Pixel,
    Position,
    Parameter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportInstruction {
    pub cf_pc: u32,
    pub opcode: ExpOpcode,
    pub ty: ExportType,
    /// Export slot; position exports are rebased so that slot 0 is the first position.
    pub dst_reg: u32,
    /// `ARRAY_BASE` exactly as encoded.
    pub raw_array_base: u32,
    pub src: FetchRegister,
    pub elem_size: u32,
    pub index_gpr: u32,
    pub burst_count: u32,
    pub whole_quad_mode: bool,
    pub barrier: bool,
}

/// Position exports are encoded starting at this array base.
pub const POSITION_EXPORT_BASE: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    ControlFlow(CfInstruction),
    Alu(AluInstruction),
    AluReduction(AluReductionInstruction),
    TextureFetch(TexInstruction),
    VertexFetch(VertexFetchInstruction),
    Export(ExportInstruction),
}

impl Instruction {
    pub fn cf_pc(&self) -> u32 {
        match self {
            Instruction::ControlFlow(ins) => ins.cf_pc,
            Instruction::Alu(ins) => ins.cf_pc,
            Instruction::AluReduction(ins) => ins.cf_pc,
            Instruction::TextureFetch(ins) => ins.cf_pc,
            Instruction::VertexFetch(ins) => ins.cf_pc,
            Instruction::Export(ins) => ins.cf_pc,
        }
    }

    /// Instruction group, for ALU and fetch instructions.
    pub fn group_pc(&self) -> Option<u32> {
        match self {
            Instruction::ControlFlow(_) | Instruction::Export(_) => None,
            Instruction::Alu(ins) => Some(ins.group_pc),
            Instruction::AluReduction(ins) => Some(ins.group_pc),
            Instruction::TextureFetch(ins) => Some(ins.group_pc),
            Instruction::VertexFetch(ins) => Some(ins.group_pc),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instruction::ControlFlow(ins) => ins.opcode.name(),
            Instruction::Alu(ins) => ins.opcode.name(),
            Instruction::AluReduction(ins) => ins.opcode.name(),
            Instruction::TextureFetch(ins) => ins.opcode.name(),
            Instruction::VertexFetch(ins) => ins.opcode.name(),
            Instruction::Export(ins) => ins.opcode.name(),
        }
    }

    pub fn cf_opcode(&self) -> Option<CfOpcode> {
        match self {
            Instruction::ControlFlow(ins) => Some(ins.opcode),
            _ => None,
        }
    }

    /// Whether this is an ALU instruction that updates predicate state.
    pub fn is_pred_set(&self) -> bool {
        match self {
            Instruction::Alu(ins) => ins.opcode.flags().contains(AluFlags::PRED_SET),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Code(Vec<InstrId>),
    Conditional {
        condition: InstrId,
        inner: Vec<Block>,
        inner_else: Vec<Block>,
    },
    Loop {
        inner: Vec<Block>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    pub ty: ShaderType,
    pub code: Vec<Instruction>,
    pub blocks: Vec<Block>,
    pub exports: Vec<InstrId>,
    pub gprs_used: BTreeSet<u32>,
    pub samplers_used: BTreeSet<u32>,
    pub resources_used: BTreeSet<u32>,
    /// Groups whose PV result is consumed by the following group.
    pub pv_used: BTreeSet<u32>,
    /// Groups whose PS result is consumed by the following group.
    pub ps_used: BTreeSet<u32>,
    /// Registers with a channel read before any write; pixel shader inputs arrive here.
    pub input_gprs: BTreeSet<u32>,
}

impl Shader {
    pub fn new(ty: ShaderType) -> Self {
        Self {
            ty,
            code: Vec::new(),
            blocks: Vec::new(),
            exports: Vec::new(),
            gprs_used: BTreeSet::new(),
            samplers_used: BTreeSet::new(),
            resources_used: BTreeSet::new(),
            pv_used: BTreeSet::new(),
            ps_used: BTreeSet::new(),
            input_gprs: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, ins: Instruction) -> InstrId {
        let id = InstrId(self.code.len());
        if matches!(ins, Instruction::Export(_)) {
            self.exports.push(id);
        }
        self.code.push(ins);
        id
    }

    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.code.get(id.0)
    }

    /// Renders the block tree with one instruction per line, for debugging control-flow recovery.
    pub fn dump_blocks(&self) -> String {
        let mut out = String::new();
        self.dump_block_list(&mut out, &self.blocks, 0);
        out
    }

    fn dump_block_list(&self, out: &mut String, blocks: &[Block], depth: usize) {
        let pad = "  ".repeat(depth);
        for block in blocks {
            match block {
                Block::Code(code) => {
                    for &id in code {
                        let _ = writeln!(out, "{pad}{}", self.describe(id));
                    }
                }
                Block::Conditional {
                    condition,
                    inner,
                    inner_else,
                } => {
                    let _ = writeln!(out, "{pad}if({}) {{", self.describe(*condition));
                    self.dump_block_list(out, inner, depth + 1);
                    if !inner_else.is_empty() {
                        let _ = writeln!(out, "{pad}}} else {{");
                        self.dump_block_list(out, inner_else, depth + 1);
                    }
                    let _ = writeln!(out, "{pad}}} // END_COND");
                }
                Block::Loop { inner } => {
                    let _ = writeln!(out, "{pad}while(true) {{ // START_LOOP");
                    self.dump_block_list(out, inner, depth + 1);
                    let _ = writeln!(out, "{pad}}} // END_LOOP");
                }
            }
        }
    }

    fn describe(&self, id: InstrId) -> String {
        match self.get(id) {
            Some(ins) => format!("{} {}", ins.cf_pc(), ins.name()),
            None => format!("<missing {}>", id.0),
        }
    }
}

impl std::ops::Index<InstrId> for Shader {
    type Output = Instruction;

    fn index(&self, id: InstrId) -> &Instruction {
        &self.code[id.0]
    }
}
