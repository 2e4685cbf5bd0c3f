//! Shader body generation.
//!
//! [`generate_body`] walks the block tree and hands each instruction to the emitter registered for
//! its opcode. Instructions without an emitter become `// Unimplemented NAME` lines and mark the
//! body incomplete instead of failing the whole shader.

mod alu;
mod cf;
mod dialect;
mod exp;
mod op2;
mod op3;
mod reduction;
mod tex;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::error::ShaderError;
use crate::ir::{
    AluInstruction, AluOpcode, AluReductionInstruction, Block, CfInstruction, ExportInstruction,
    InstrId, Instruction, Shader, TexInstruction,
};
use crate::opcodes::{CfOpcode, ExpOpcode, Op2, Op3, TexOpcode};

pub use dialect::Dialect;

const INDENT: usize = 3;

/// Output of [`generate_body`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBody {
    /// Statements of `main`, starting at column 0.
    pub source: String,
    /// `false` when at least one instruction was left as an `// Unimplemented` marker.
    pub complete: bool,
}

/// Translates one instruction into the statement currently being written.
///
/// Returns `Ok(false)` when the instruction cannot be expressed; anything written so far is then
/// discarded by the caller.
pub(crate) type Emitter<T> = fn(&mut EmitState<'_>, &T) -> Result<bool, ShaderError>;

/// Opcode → emitter tables, one per instruction kind.
pub struct EmitterRegistry {
    cf: HashMap<CfOpcode, Emitter<CfInstruction>>,
    op2: HashMap<Op2, Emitter<AluInstruction>>,
    op3: HashMap<Op3, Emitter<AluInstruction>>,
    reduction: HashMap<Op2, Emitter<AluReductionInstruction>>,
    tex: HashMap<TexOpcode, Emitter<TexInstruction>>,
    export: HashMap<ExpOpcode, Emitter<ExportInstruction>>,
}

impl EmitterRegistry {
    /// Builds a registry holding every built-in emitter.
    pub fn new() -> Self {
        let mut registry = Self {
            cf: HashMap::new(),
            op2: HashMap::new(),
            op3: HashMap::new(),
            reduction: HashMap::new(),
            tex: HashMap::new(),
            export: HashMap::new(),
        };
        cf::register(&mut registry);
        op2::register(&mut registry);
        op3::register(&mut registry);
        reduction::register(&mut registry);
        tex::register(&mut registry);
        exp::register(&mut registry);
        registry
    }

    /// Process-wide registry, built on first use.
    pub fn global() -> &'static EmitterRegistry {
        static REGISTRY: OnceLock<EmitterRegistry> = OnceLock::new();
        REGISTRY.get_or_init(EmitterRegistry::new)
    }

    /// Whether an emitter exists for the instruction's opcode.
    pub fn supports(&self, ins: &Instruction) -> bool {
        match ins {
            Instruction::ControlFlow(cf) => self.cf.contains_key(&cf.opcode),
            Instruction::Alu(alu) => match alu.opcode {
                AluOpcode::Op2(op) => self.op2.contains_key(&op),
                AluOpcode::Op3(op) => self.op3.contains_key(&op),
            },
            Instruction::AluReduction(red) => self.reduction.contains_key(&red.opcode),
            Instruction::TextureFetch(tex) => self.tex.contains_key(&tex.opcode),
            Instruction::VertexFetch(_) => false,
            Instruction::Export(exp) => self.export.contains_key(&exp.opcode),
        }
    }

    pub(crate) fn add_cf(&mut self, op: CfOpcode, emitter: Emitter<CfInstruction>) {
        self.cf.insert(op, emitter);
    }

    pub(crate) fn add_op2(&mut self, op: Op2, emitter: Emitter<AluInstruction>) {
        self.op2.insert(op, emitter);
    }

    pub(crate) fn add_op3(&mut self, op: Op3, emitter: Emitter<AluInstruction>) {
        self.op3.insert(op, emitter);
    }

    pub(crate) fn add_reduction(&mut self, op: Op2, emitter: Emitter<AluReductionInstruction>) {
        self.reduction.insert(op, emitter);
    }

    pub(crate) fn add_tex(&mut self, op: TexOpcode, emitter: Emitter<TexInstruction>) {
        self.tex.insert(op, emitter);
    }

    pub(crate) fn add_export(&mut self, op: ExpOpcode, emitter: Emitter<ExportInstruction>) {
        self.export.insert(op, emitter);
    }

    fn emit(&self, state: &mut EmitState<'_>, ins: &Instruction) -> Result<bool, ShaderError> {
        match ins {
            Instruction::ControlFlow(cf) => match self.cf.get(&cf.opcode) {
                Some(emit) => emit(state, cf),
                None => Ok(false),
            },
            Instruction::Alu(alu) => {
                let emitter = match alu.opcode {
                    AluOpcode::Op2(op) => self.op2.get(&op),
                    AluOpcode::Op3(op) => self.op3.get(&op),
                };
                match emitter {
                    Some(emit) => emit(state, alu),
                    None => Ok(false),
                }
            }
            Instruction::AluReduction(red) => match self.reduction.get(&red.opcode) {
                Some(emit) => emit(state, red),
                None => Ok(false),
            },
            Instruction::TextureFetch(tex) => match self.tex.get(&tex.opcode) {
                Some(emit) => emit(state, tex),
                None => Ok(false),
            },
            // Vertex fetches are consumed by fetch-shader parsing, never emitted inline.
            Instruction::VertexFetch(_) => Ok(false),
            Instruction::Export(exp) => match self.export.get(&exp.opcode) {
                Some(emit) => emit(state, exp),
                None => Ok(false),
            },
        }
    }
}

impl Default for EmitterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmitterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterRegistry")
            .field("cf", &self.cf.len())
            .field("op2", &self.op2.len())
            .field("op3", &self.op3.len())
            .field("reduction", &self.reduction.len())
            .field("tex", &self.tex.len())
            .field("export", &self.export.len())
            .finish()
    }
}

/// Output buffer and context shared by the emitters while one body is generated.
pub(crate) struct EmitState<'a> {
    shader: &'a Shader,
    dialect: Dialect,
    out: String,
    indent: usize,
    /// Set by emitters that wrote a complete line (comments); suppresses the `;`.
    terminated: bool,
    /// The instruction is being written as the operand of an `if`.
    condition: bool,
}

impl<'a> EmitState<'a> {
    pub(crate) fn shader(&self) -> &'a Shader {
        self.shader
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub(crate) fn push(&mut self, c: char) {
        self.out.push(c);
    }

    pub(crate) fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
    }

    /// Writes a `// text` line in place of a statement.
    pub(crate) fn comment(&mut self, text: &str) {
        let _ = write!(self.out, "// {text}");
        self.terminated = true;
    }

    /// Whether the instruction is being written as a branch condition rather than a statement.
    pub(crate) fn in_condition(&self) -> bool {
        self.condition
    }

    /// Ends the current line and indents the next one.
    pub(crate) fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push(' ');
        }
    }

    pub(crate) fn indent(&mut self) {
        self.indent += INDENT;
    }

    pub(crate) fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(INDENT);
    }

    /// Marks the statement as complete, for emitters that close their own block.
    pub(crate) fn terminate(&mut self) {
        self.terminated = true;
    }
}

struct Generator<'r, 'a> {
    registry: &'r EmitterRegistry,
    state: EmitState<'a>,
    group: Option<u32>,
    complete: bool,
}

/// Generates the statements of `main` for an analysed shader.
pub fn generate_body(
    shader: &Shader,
    registry: &EmitterRegistry,
    dialect: Dialect,
) -> Result<GeneratedBody, ShaderError> {
    let mut gen = Generator {
        registry,
        state: EmitState {
            shader,
            dialect,
            out: String::new(),
            indent: 0,
            terminated: false,
            condition: false,
        },
        group: None,
        complete: true,
    };
    gen.blocks(&shader.blocks)?;

    Ok(GeneratedBody {
        source: gen.state.out,
        complete: gen.complete,
    })
}

impl<'a> Generator<'_, 'a> {
    fn pad(&mut self) {
        for _ in 0..self.state.indent {
            self.state.out.push(' ');
        }
    }

    fn line(&mut self, text: &str) {
        self.pad();
        self.state.out.push_str(text);
        self.state.out.push('\n');
    }

    fn blocks(&mut self, blocks: &'a [Block]) -> Result<(), ShaderError> {
        for block in blocks {
            match block {
                Block::Code(code) => {
                    for &id in code {
                        let ins = self.instruction(id)?;
                        self.begin_group(ins);
                        self.statement(ins)?;
                    }
                }
                Block::Conditional {
                    condition,
                    inner,
                    inner_else,
                } => {
                    let ins = self.instruction(*condition)?;
                    self.begin_group(ins);
                    self.condition(ins)?;

                    self.state.indent();
                    self.blocks(inner)?;
                    self.state.dedent();

                    if !inner_else.is_empty() {
                        self.line("} else {");
                        self.state.indent();
                        self.blocks(inner_else)?;
                        self.state.dedent();
                    }
                    self.line("}");
                }
                Block::Loop { inner } => {
                    self.line("while (true) {");
                    self.state.indent();
                    self.blocks(inner)?;
                    self.state.dedent();
                    self.line("}");
                }
            }
        }
        Ok(())
    }

    fn instruction(&self, id: InstrId) -> Result<&'a Instruction, ShaderError> {
        let shader: &'a Shader = self.state.shader;
        shader.get(id).ok_or_else(|| {
            ShaderError::invariant(format!("block references missing instruction {}", id.0))
        })
    }

    /// Emits the PV/PS shadow copies and the `// groupPC` marker when `ins` opens a new group.
    fn begin_group(&mut self, ins: &Instruction) {
        let Some(group) = ins.group_pc() else {
            return;
        };
        if self.group == Some(group) {
            return;
        }
        self.group = Some(group);

        let shader = self.state.shader;
        if let (Some(prev), Some(prev2)) = (group.checked_sub(1), group.checked_sub(2)) {
            if shader.pv_used.contains(&prev) && shader.pv_used.contains(&prev2) {
                self.line("PV = PVo;");
            }
            if shader.ps_used.contains(&prev) && shader.ps_used.contains(&prev2) {
                self.line("PS = PSo;");
            }
        }
        self.line(&format!("// groupPC = {group}"));
    }

    fn statement(&mut self, ins: &Instruction) -> Result<(), ShaderError> {
        let start = self.state.out.len();
        self.pad();
        self.state.terminated = false;

        if self.registry.emit(&mut self.state, ins)? {
            if !self.state.terminated {
                self.state.out.push(';');
            }
            self.state.out.push('\n');
        } else {
            self.state.out.truncate(start);
            self.line(&format!("// Unimplemented {}", ins.name()));
            self.complete = false;
        }
        Ok(())
    }

    fn condition(&mut self, ins: &Instruction) -> Result<(), ShaderError> {
        if let Instruction::Alu(pred) = ins {
            // A predicate set that also writes its register branches on the written value.
            if pred.write_mask {
                self.statement(ins)?;
                let zero = alu::float_literal(self.state.dialect, 0.0);
                self.line(&format!(
                    "if (R{}.{} != {zero}) {{",
                    pred.dest.id,
                    pred.dest.chan.as_char()
                ));
                return Ok(());
            }

            // The next group still reads the 0/1 result through PV/PS.
            let shader = self.state.shader;
            let previous_used = match pred.unit.channel() {
                Some(_) => shader.pv_used.contains(&pred.group_pc),
                None => shader.ps_used.contains(&pred.group_pc),
            };
            if previous_used {
                self.statement(ins)?;
            }
        }

        self.pad();
        self.state.out.push_str("if (");
        let start = self.state.out.len();
        self.state.terminated = false;
        self.state.condition = true;
        let emitted = self.registry.emit(&mut self.state, ins);
        self.state.condition = false;

        if !emitted? || self.state.terminated {
            self.state.out.truncate(start);
            let _ = write!(self.state.out, "/* Unimplemented {} */ false", ins.name());
            self.complete = false;
        }
        self.state.out.push_str(") {\n");
        Ok(())
    }
}

/// Indents every non-empty line of `source` by `width` spaces.
pub(crate) fn indent_lines(source: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    let mut out = String::with_capacity(source.len() + source.lines().count() * width);
    for line in source.lines() {
        if !line.is_empty() {
            out.push_str(&pad);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
