//! Text listing of a shader binary, one line per CF instruction and clause record.
//!
//! The walk mirrors [`crate::decode()`] but never fails: fields it cannot interpret are printed as
//! `__UNK_*__` and a binary that ends early stops with `__UNK_TRUNCATED__`.

use std::fmt::Write as _;

use crate::decode::{assign_unit, MAX_GROUP_SLOTS};
use crate::encoding::{
    self, AluCfWords, AluWords, CfType, CfWords, ExportWords, TexWords, VtxWords,
};
use crate::ir::{Channel, OutputModifier, Unit};
use crate::opcodes::{AluCfOpcode, AluFlags, CfOpcode, ExpOpcode, Op2, Op3, TexOpcode, VtxOpcode};

const INDENT_SIZE: usize = 2;
const NAME_PAD: usize = 16;
const GROUP_WIDTH: usize = 2;

/// Highest GPR index; the four registers below it and including it are clause temporaries.
const LAST_GPR: u32 = 127;
const TEMP_REGISTERS: u32 = 4;

/// The binary ended in the middle of an instruction.
struct Truncated;

type Result<T> = std::result::Result<T, Truncated>;

/// Renders `binary` as a disassembly listing.
pub fn disassemble(binary: &[u8]) -> String {
    // A dangling partial word is dropped; reaching it reports truncation.
    let whole = binary.len() - binary.len() % 4;
    let words = encoding::words_from_le_bytes(&binary[..whole]).unwrap_or_default();

    let mut dis = Disassembler {
        words: &words,
        out: String::new(),
        indent: 0,
        group: 0,
    };
    if dis.run().is_err() {
        dis.line("__UNK_TRUNCATED__");
    }
    dis.out
}

struct Disassembler<'a> {
    words: &'a [u32],
    out: String,
    indent: usize,
    group: u32,
}

impl Disassembler<'_> {
    fn word(&self, index: usize) -> Result<u32> {
        self.words.get(index).copied().ok_or(Truncated)
    }

    fn begin_line(&mut self) {
        for _ in 0..self.indent {
            self.out.push(' ');
        }
    }

    fn line(&mut self, text: &str) {
        self.begin_line();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn run(&mut self) -> Result<()> {
        let mut cf_pc = 0usize;
        loop {
            let cf = CfWords {
                word0: self.word(cf_pc * 2)?,
                word1: self.word(cf_pc * 2 + 1)?,
            };

            if matches!(cf.ty(), CfType::Normal)
                && CfOpcode::from_raw(cf.cf_inst()) == Some(CfOpcode::LoopEnd)
            {
                self.indent = self.indent.saturating_sub(INDENT_SIZE);
            }

            self.begin_line();
            let _ = write!(self.out, "{cf_pc:02} ");

            let end_of_program = match cf.ty() {
                CfType::Normal => {
                    self.normal(cf)?;
                    cf.end_of_program()
                }
                CfType::Export => {
                    self.export(cf.export());
                    cf.end_of_program()
                }
                CfType::Alu | CfType::AluExtended => {
                    self.alu_clause(cf.alu())?;
                    false
                }
            };

            if end_of_program {
                self.indent = 0;
                self.line("END_OF_PROGRAM");
                return Ok(());
            }
            cf_pc += 1;
        }
    }

    fn normal(&mut self, cf: CfWords) -> Result<()> {
        let Some(opcode) = CfOpcode::from_raw(cf.cf_inst()) else {
            let _ = writeln!(self.out, "__UNK_CF_INST_{}__", cf.cf_inst());
            return Ok(());
        };

        match opcode {
            CfOpcode::Tex => return self.tex_clause(cf),
            CfOpcode::Vtx | CfOpcode::VtxTc => return self.vtx_clause(opcode, cf),
            CfOpcode::LoopStart | CfOpcode::LoopStartDx10 | CfOpcode::LoopStartNoAl => {
                let _ = writeln!(self.out, "{opcode} FAIL_JUMP_ADDR({})", cf.addr());
                self.indent += INDENT_SIZE;
            }
            CfOpcode::LoopEnd => {
                let _ = writeln!(self.out, "{opcode} PASS_JUMP_ADDR({})", cf.addr());
            }
            CfOpcode::Else | CfOpcode::Jump | CfOpcode::PopJump | CfOpcode::Pop => {
                let _ = writeln!(
                    self.out,
                    "{opcode} POP_CNT({}) ADDR({})",
                    cf.pop_count(),
                    cf.addr()
                );
            }
            _ => {
                let _ = writeln!(self.out, "{opcode}");
            }
        }
        Ok(())
    }

    fn export(&mut self, exp: ExportWords) {
        match ExpOpcode::from_raw(exp.cf_inst()) {
            Some(op) => {
                let _ = write!(self.out, "{op}: ");
            }
            None => {
                let _ = write!(self.out, "__UNK_EXP_INST_{}__: ", exp.cf_inst());
            }
        }

        match exp.ty() {
            0 => self.out.push_str("PIX"),
            1 => self.out.push_str("POS"),
            2 => self.out.push_str("PARAM"),
            other => {
                let _ = write!(self.out, "__UNK_TYPE_{other}__");
            }
        }
        let _ = write!(self.out, "{}, R{}.", exp.array_base(), exp.rw_gpr());
        for i in 0..4 {
            self.out.push(select_char(exp.src_sel(i)));
        }
        self.out.push('\n');
    }

    fn tex_clause(&mut self, cf: CfWords) -> Result<()> {
        let _ = writeln!(
            self.out,
            "TEX: ADDR({}) CNT({})",
            cf.addr(),
            cf.count() + 1
        );
        self.indent += INDENT_SIZE;

        let base = cf.addr() as usize * 2;
        for i in 0..cf.count() as usize + 1 {
            let index = base + i * 4;
            let tex = TexWords {
                word0: self.word(index)?,
                word1: self.word(index + 1)?,
                word2: self.word(index + 2)?,
            };
            self.tex(tex);
            self.group += 1;
        }

        self.indent -= INDENT_SIZE;
        Ok(())
    }

    fn tex(&mut self, tex: TexWords) {
        self.begin_line();
        let _ = write!(self.out, "{:0width$} ", self.group, width = GROUP_WIDTH);
        match TexOpcode::from_raw(tex.tex_inst()) {
            Some(op) => {
                let _ = write!(self.out, "{op} ");
            }
            None => {
                let _ = write!(self.out, "__UNK_TEX_INST_{}__ ", tex.tex_inst());
            }
        }

        if tex.dst_rel() {
            self.out.push_str("__UNK_REL__");
        }
        self.register(tex.dst_gpr());
        self.out.push('.');
        for i in 0..4 {
            self.out.push(select_char(tex.dst_sel(i)));
        }

        self.out.push_str(", ");
        if tex.src_rel() {
            self.out.push_str("__UNK_REL__");
        }
        self.register(tex.src_gpr());
        self.out.push('.');
        for i in 0..4 {
            self.out.push(select_char(tex.src_sel(i)));
        }

        let _ = write!(self.out, ", t{}, s{}", tex.resource_id(), tex.sampler_id());

        let offset = [0, 1, 2].map(|axis| encoding::sign_extend(tex.offset(axis), 5));
        if offset.iter().any(|&o| o != 0) {
            let _ = write!(
                self.out,
                " OFFSET({}, {}, {})",
                offset[0], offset[1], offset[2]
            );
        }
        let lod_bias = encoding::sign_extend(tex.lod_bias(), 7);
        if lod_bias != 0 {
            let _ = write!(self.out, " LOD_BIAS({lod_bias})");
        }
        for (axis, name) in ["CTX", "CTY", "CTZ", "CTW"].into_iter().enumerate() {
            if !tex.coord_type(axis) {
                let _ = write!(self.out, " {name}_UNORM");
            }
        }
        if tex.bc_frac_mode() {
            self.out.push_str(" BFM");
        }
        if tex.fetch_whole_quad() {
            self.out.push_str(" FWQ");
        }
        self.out.push('\n');
    }

    fn vtx_clause(&mut self, opcode: CfOpcode, cf: CfWords) -> Result<()> {
        let _ = writeln!(
            self.out,
            "{opcode}: ADDR({}) CNT({})",
            cf.addr(),
            cf.count() + 1
        );
        self.indent += INDENT_SIZE;

        let base = cf.addr() as usize * 2;
        for i in 0..cf.count() as usize + 1 {
            let index = base + i * 4;
            let vtx = VtxWords {
                word0: self.word(index)?,
                word1: self.word(index + 1)?,
                word2: self.word(index + 2)?,
            };
            self.vtx(vtx);
            self.group += 1;
        }

        self.indent -= INDENT_SIZE;
        Ok(())
    }

    fn vtx(&mut self, vtx: VtxWords) {
        self.begin_line();
        let _ = write!(self.out, "{:0width$} ", self.group, width = GROUP_WIDTH);
        match VtxOpcode::from_raw(vtx.vtx_inst()) {
            Some(VtxOpcode::Semantic) => {
                let _ = write!(self.out, "VTX_SEMANTIC SEM{}", vtx.semantic_id());
            }
            Some(VtxOpcode::Fetch) => {
                self.out.push_str("VTX_FETCH ");
                self.register(vtx.dst_gpr());
            }
            None => {
                let _ = write!(self.out, "__UNK_VTX_INST_{}__ ", vtx.vtx_inst());
                self.register(vtx.dst_gpr());
            }
        }
        self.out.push('.');
        for i in 0..4 {
            self.out.push(select_char(vtx.dst_sel(i)));
        }

        self.out.push_str(", ");
        self.register(vtx.src_gpr());
        let _ = write!(
            self.out,
            ".{}, b{} FORMAT({}) OFFSET({}) MEGA({})",
            Channel::from_raw(vtx.src_sel_x()).as_char(),
            vtx.buffer_id(),
            vtx.data_format(),
            vtx.offset(),
            vtx.mega_fetch_count() + 1
        );
        if vtx.format_comp_all() {
            self.out.push_str(" SIGNED");
        }
        if vtx.endian_swap() != 0 {
            let _ = write!(self.out, " ENDIAN_SWAP({})", vtx.endian_swap());
        }
        self.out.push('\n');
    }

    fn alu_clause(&mut self, cf: AluCfWords) -> Result<()> {
        match AluCfOpcode::from_raw(cf.cf_inst()) {
            Some(op) => {
                let _ = write!(self.out, "{op}: ");
            }
            None => {
                let _ = write!(self.out, "__UNK_ALU_CF_INST_{}__: ", cf.cf_inst());
            }
        }
        let _ = writeln!(self.out, "ADDR({}) CNT({})", cf.addr(), cf.count() + 1);
        self.indent += INDENT_SIZE;

        let base = cf.addr() as usize * 2;
        let slot_count = cf.count() as usize + 1;
        let mut slot = 0usize;
        while slot < slot_count {
            let mut group_len = 0usize;
            while group_len < MAX_GROUP_SLOTS {
                let w0 = self.word(base + (slot + group_len) * 2)?;
                group_len += 1;
                if (AluWords { word0: w0, word1: 0 }).last() {
                    break;
                }
            }

            let literal_base = base + (slot + group_len) * 2;
            let mut units = [false; MAX_GROUP_SLOTS];
            let mut literals = 0usize;
            for i in 0..group_len {
                let index = base + (slot + i) * 2;
                let alu = AluWords {
                    word0: self.word(index)?,
                    word1: self.word(index + 1)?,
                };
                literals = literals.max(self.alu(alu, i == 0, &mut units, literal_base)?);
            }

            slot += group_len + (literals + 1) / 2;
            self.group += 1;
        }

        self.indent -= INDENT_SIZE;
        Ok(())
    }

    /// Writes one ALU slot and returns how many literal words it reads.
    fn alu(
        &mut self,
        alu: AluWords,
        first: bool,
        units: &mut [bool; MAX_GROUP_SLOTS],
        literal_base: usize,
    ) -> Result<usize> {
        let (name, srcs, flags) = if alu.is_op2() {
            match Op2::from_raw(alu.op2_inst()) {
                Some(op) => (op.name().to_owned(), op.src_count(), op.flags()),
                None => (format!("__UNK_OP2_{}__", alu.op2_inst()), 0, AluFlags::empty()),
            }
        } else {
            match Op3::from_raw(alu.op3_inst()) {
                Some(op) => (op.name().to_owned(), op.src_count(), op.flags()),
                None => (format!("__UNK_OP3_{}__", alu.op3_inst()), 0, AluFlags::empty()),
            }
        };
        let chan = Channel::from_raw(alu.dst_chan());
        let unit = assign_unit(flags, chan, units).map_or('?', Unit::as_char);

        self.begin_line();
        if first {
            let _ = write!(self.out, "{:0width$}", self.group, width = GROUP_WIDTH);
        } else {
            self.out.push_str(&" ".repeat(GROUP_WIDTH));
        }
        let _ = write!(self.out, " {unit}: {name:<width$}", width = NAME_PAD);

        if alu.is_op2() && !alu.write_mask() {
            self.out.push_str("____");
        } else {
            if alu.dst_rel() {
                self.out.push_str("__UNK_REL__");
            }
            self.register(alu.dst_gpr());
            let _ = write!(self.out, ".{}", chan.as_char());
        }

        let mut literals = 0;
        for i in 0..srcs.min(3) {
            self.out.push_str(", ");
            literals = literals.max(self.alu_source(alu, i, literal_base)?);
        }

        if alu.is_op2() {
            if alu.update_execute_mask() {
                self.out.push_str(" UPDATE_EXECUTE_MASK");
            }
            if alu.update_pred() {
                self.out.push_str(" UPDATE_PRED");
            }
            match OutputModifier::from_raw(alu.omod()) {
                OutputModifier::Off => {}
                OutputModifier::Multiply2 => self.out.push_str(" OMOD_M2"),
                OutputModifier::Multiply4 => self.out.push_str(" OMOD_M4"),
                OutputModifier::Divide2 => self.out.push_str(" OMOD_D2"),
            }
        }

        match alu.bank_swizzle() {
            0 => {}
            1 => self.out.push_str(" VEC_021"),
            2 => self.out.push_str(" VEC_120"),
            3 => self.out.push_str(" VEC_102"),
            4 => self.out.push_str(" VEC_201"),
            5 => self.out.push_str(" VEC_210"),
            other => {
                let _ = write!(self.out, " __UNK_BANK_SWIZZLE_{other}__");
            }
        }
        if alu.clamp() {
            self.out.push_str(" CLAMP");
        }
        self.out.push('\n');
        Ok(literals)
    }

    /// Writes one ALU operand and returns how many literal words it reads.
    fn alu_source(&mut self, alu: AluWords, index: usize, literal_base: usize) -> Result<usize> {
        use crate::encoding::*;

        let src = alu.src(index);
        let chan = Channel::from_raw(src.chan);
        let mut literals = 0;

        if src.rel {
            self.out.push_str("__UNK_REL__");
        }
        if src.abs {
            self.out.push_str("ABS(");
        }
        if src.neg && src.sel != ALU_SRC_M_1_INT {
            self.out.push('-');
        }

        let swizzled = match src.sel {
            0..=ALU_SRC_GPR_MAX => {
                self.register(src.sel);
                true
            }
            ALU_SRC_KCACHE0_BASE..=ALU_SRC_KCACHE1_END => {
                let (bank, base) = if src.sel < ALU_SRC_KCACHE1_BASE {
                    (0, ALU_SRC_KCACHE0_BASE)
                } else {
                    (1, ALU_SRC_KCACHE1_BASE)
                };
                let _ = write!(self.out, "KCACHEBANK{bank}_{}", src.sel - base);
                true
            }
            ALU_SRC_1_DBL_L => self.unknown("Src1DoubleLSW"),
            ALU_SRC_1_DBL_M => self.unknown("Src1DoubleMSW"),
            ALU_SRC_0_5_DBL_L => self.unknown("Src05DoubleLSW"),
            ALU_SRC_0_5_DBL_M => self.unknown("Src05DoubleMSW"),
            ALU_SRC_0 => self.constant("0.0f"),
            ALU_SRC_1 => self.constant("1.0f"),
            ALU_SRC_1_INT => self.constant("1"),
            ALU_SRC_M_1_INT => self.constant(if src.neg { "1" } else { "-1" }),
            ALU_SRC_0_5 => self.constant("0.5f"),
            ALU_SRC_LITERAL => {
                let bits = self.word(literal_base + chan.index())?;
                let _ = write!(self.out, "{:?}f", f32::from_bits(bits));
                literals = chan.index() + 1;
                false
            }
            ALU_SRC_PV => {
                let _ = write!(self.out, "PV{}", i64::from(self.group) - 1);
                true
            }
            ALU_SRC_PS => {
                let _ = write!(self.out, "PS{}", i64::from(self.group) - 1);
                false
            }
            ALU_SRC_CFILE_BASE..=511 => {
                let _ = write!(self.out, "C{}", src.sel - ALU_SRC_CFILE_BASE);
                true
            }
            other => {
                let _ = write!(self.out, "__UNK_SEL_{other}__");
                false
            }
        };

        if swizzled {
            let _ = write!(self.out, ".{}", chan.as_char());
        }
        if src.abs {
            self.out.push(')');
        }
        Ok(literals)
    }

    fn constant(&mut self, text: &str) -> bool {
        self.out.push_str(text);
        false
    }

    fn unknown(&mut self, what: &str) -> bool {
        let _ = write!(self.out, "__UNK_{what}__");
        false
    }

    fn register(&mut self, sel: u32) {
        if sel > LAST_GPR - TEMP_REGISTERS && sel <= LAST_GPR {
            let _ = write!(self.out, "T{}", LAST_GPR - sel);
        } else {
            let _ = write!(self.out, "R{sel}");
        }
    }
}

fn select_char(raw: u32) -> char {
    match raw {
        0 => 'x',
        1 => 'y',
        2 => 'z',
        3 => 'w',
        4 => '0',
        5 => '1',
        7 => '_',
        _ => '?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_binary_is_truncated() {
        assert_eq!(disassemble(&[]), "__UNK_TRUNCATED__\n");
    }

    #[test]
    fn temporaries_use_t_names() {
        let mut dis = Disassembler {
            words: &[],
            out: String::new(),
            indent: 0,
            group: 0,
        };
        dis.register(127);
        dis.register(124);
        dis.register(123);
        assert_eq!(dis.out, "T0T3R123");
    }
}
