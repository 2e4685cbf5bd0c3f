//! Latte shader binary decoder.
//!
//! The control-flow program is a run of 64-bit word pairs starting at byte 0. ALU and TEX clauses
//! live elsewhere in the same buffer at `addr * 8` bytes and are decoded inline when their CF
//! instruction is reached, so the resulting instruction list is in execution order.

use crate::encoding::{self, AluCfWords, AluWords, CfType, CfWords, ExportWords, TexWords};
use crate::error::ShaderError;
use crate::ir::{
    AluDest, AluInstruction, AluOpcode, AluReductionInstruction, AluSource, CfInstruction,
    Channel, ExportInstruction, ExportType, FetchRegister, IndexMode, InstrId, Instruction,
    OutputModifier, PredicateSelect, Select, Shader, ShaderType, SourceKind, TexInstruction, Unit,
    ValueType, POSITION_EXPORT_BASE,
};
use crate::opcodes::{AluCfOpcode, AluFlags, CfOpcode, ExpOpcode, Op2, Op3, TexOpcode};

/// Maximum number of slots in one ALU instruction group (four vector units plus T).
pub(crate) const MAX_GROUP_SLOTS: usize = 5;

/// Decodes a shader binary into a flat instruction list.
///
/// Usage sets and the block tree are left empty; see [`crate::blockify()`] and
/// [`crate::analyse()`].
pub fn decode(ty: ShaderType, binary: &[u8]) -> Result<Shader, ShaderError> {
    let words = encoding::words_from_le_bytes(binary).ok_or_else(|| ShaderError::MalformedEncoding {
        offset: binary.len(),
        message: format!("binary length {} is not a multiple of 4", binary.len()),
    })?;

    let mut decoder = Decoder {
        words: &words,
        shader: Shader::new(ty),
        group: 0,
    };
    decoder.run()?;
    Ok(decoder.shader)
}

#[derive(Debug, Clone, Copy)]
struct KcacheLock {
    bank: u32,
    mode: u32,
    addr: u32,
}

struct Decoder<'a> {
    words: &'a [u32],
    shader: Shader,
    /// Instruction group counter, shared by every clause of the program.
    group: u32,
}

impl Decoder<'_> {
    fn word(&self, index: usize) -> Result<u32, ShaderError> {
        self.words.get(index).copied().ok_or_else(|| {
            ShaderError::malformed(
                index,
                format!(
                    "read past end of binary ({} bytes)",
                    self.words.len() * 4
                ),
            )
        })
    }

    fn run(&mut self) -> Result<(), ShaderError> {
        let mut cf_pc = 0u32;
        loop {
            let index = cf_pc as usize * 2;
            if index + 1 >= self.words.len() {
                return Err(ShaderError::malformed(
                    index,
                    "control flow ran off the end of the binary without END_OF_PROGRAM",
                ));
            }
            let cf = CfWords {
                word0: self.word(index)?,
                word1: self.word(index + 1)?,
            };
            tracing::trace!(cf_pc, word0 = cf.word0, word1 = cf.word1, "decode cf");

            let end_of_program = match cf.ty() {
                CfType::Normal => {
                    self.decode_normal(cf_pc, cf)?;
                    cf.end_of_program()
                }
                CfType::Export => {
                    self.decode_export(cf_pc, cf.export())?;
                    cf.end_of_program()
                }
                CfType::Alu | CfType::AluExtended => {
                    self.decode_alu_clause(cf_pc, cf.alu())?;
                    false
                }
            };

            if end_of_program {
                return Ok(());
            }
            cf_pc += 1;
        }
    }

    fn decode_normal(&mut self, cf_pc: u32, cf: CfWords) -> Result<(), ShaderError> {
        let Some(opcode) = CfOpcode::from_raw(cf.cf_inst()) else {
            return Err(ShaderError::unsupported(
                format!("CF_INST_{}", cf.cf_inst()),
                cf_pc,
            ));
        };

        match opcode {
            CfOpcode::Nop | CfOpcode::CallFs | CfOpcode::EndProgram => Ok(()),
            CfOpcode::Tex => self.decode_tex_clause(cf_pc, cf),
            CfOpcode::Vtx
            | CfOpcode::VtxTc
            | CfOpcode::EmitVertex
            | CfOpcode::EmitCutVertex
            | CfOpcode::CutVertex
            | CfOpcode::WaitAck
            | CfOpcode::TexAck
            | CfOpcode::VtxAck
            | CfOpcode::VtxTcAck => Err(ShaderError::unsupported(opcode.name(), cf_pc)),
            CfOpcode::LoopStart
            | CfOpcode::LoopEnd
            | CfOpcode::LoopStartDx10
            | CfOpcode::LoopStartNoAl
            | CfOpcode::LoopContinue
            | CfOpcode::LoopBreak
            | CfOpcode::Jump
            | CfOpcode::Push
            | CfOpcode::PushElse
            | CfOpcode::Else
            | CfOpcode::Pop
            | CfOpcode::PopJump
            | CfOpcode::PopPush
            | CfOpcode::PopPushElse
            | CfOpcode::Call
            | CfOpcode::Return
            | CfOpcode::Kill => {
                self.shader.push(Instruction::ControlFlow(CfInstruction {
                    cf_pc,
                    opcode,
                    addr: cf.addr(),
                    pop_count: cf.pop_count(),
                    cf_const: cf.cf_const(),
                    cond: cf.cond(),
                    synthetic: false,
                }));
                Ok(())
            }
        }
    }

    fn decode_export(&mut self, cf_pc: u32, exp: ExportWords) -> Result<(), ShaderError> {
        let word_index = cf_pc as usize * 2;
        let opcode = match ExpOpcode::from_raw(exp.cf_inst()) {
            Some(op @ (ExpOpcode::Exp | ExpOpcode::ExpDone)) => op,
            Some(op) => return Err(ShaderError::unsupported(op.name(), cf_pc)),
            None => {
                return Err(ShaderError::unsupported(
                    format!("EXP_INST_{}", exp.cf_inst()),
                    cf_pc,
                ))
            }
        };

        if exp.rw_rel() {
            return Err(ShaderError::malformed(
                word_index,
                "relative export source register",
            ));
        }
        if exp.valid_pixel_mode() {
            return Err(ShaderError::malformed(
                word_index,
                "export with VALID_PIXEL_MODE set",
            ));
        }

        let raw_array_base = exp.array_base();
        let (ty, dst_reg) = match exp.ty() {
            0 => (ExportType::Pixel, raw_array_base),
            1 => {
                let Some(dst) = raw_array_base.checked_sub(POSITION_EXPORT_BASE) else {
                    return Err(ShaderError::malformed(
                        word_index,
                        format!(
                            "position export array base {raw_array_base} is below {POSITION_EXPORT_BASE}"
                        ),
                    ));
                };
                (ExportType::Position, dst)
            }
            2 => (ExportType::Parameter, raw_array_base),
            other => {
                return Err(ShaderError::malformed(
                    word_index,
                    format!("unknown export type {other}"),
                ))
            }
        };

        let mut sel = [Select::Mask; 4];
        for (i, slot) in sel.iter_mut().enumerate() {
            *slot = Select::from_raw(exp.src_sel(i)).ok_or_else(|| {
                ShaderError::malformed(word_index + 1, format!("invalid export swizzle {}", exp.src_sel(i)))
            })?;
        }

        self.shader.push(Instruction::Export(ExportInstruction {
            cf_pc,
            opcode,
            ty,
            dst_reg,
            raw_array_base,
            src: FetchRegister {
                id: exp.rw_gpr(),
                sel,
            },
            elem_size: exp.elem_size(),
            index_gpr: exp.index_gpr(),
            burst_count: exp.burst_count(),
            whole_quad_mode: exp.whole_quad_mode(),
            barrier: exp.barrier(),
        }));
        Ok(())
    }

    fn push_synthetic_cf(&mut self, cf_pc: u32, opcode: CfOpcode, pop_count: u32) {
        self.shader.push(Instruction::ControlFlow(CfInstruction {
            cf_pc,
            opcode,
            addr: 0,
            pop_count,
            cf_const: 0,
            cond: 0,
            synthetic: true,
        }));
    }

    fn decode_alu_clause(&mut self, cf_pc: u32, cf: AluCfWords) -> Result<(), ShaderError> {
        let Some(mode) = AluCfOpcode::from_raw(cf.cf_inst()) else {
            return Err(ShaderError::unsupported(
                format!("ALU_CF_INST_{}", cf.cf_inst()),
                cf_pc,
            ));
        };
        if mode == AluCfOpcode::AluExt {
            return Err(ShaderError::unsupported(mode.name(), cf_pc));
        }

        if matches!(mode, AluCfOpcode::AluBreak | AluCfOpcode::AluContinue) {
            self.push_synthetic_cf(cf_pc, CfOpcode::Push, 0);
        }

        let kcache = [0, 1].map(|i| KcacheLock {
            bank: cf.kcache_bank(i),
            mode: cf.kcache_mode(i),
            addr: cf.kcache_addr(i),
        });

        let base = cf.addr() as usize * 2;
        let slot_count = cf.count() as usize + 1;
        let mut slot = 0usize;
        let mut pushed_before = false;

        while slot < slot_count {
            let mut group_len = 0usize;
            loop {
                let w0 = self.word(base + (slot + group_len) * 2)?;
                group_len += 1;
                if (AluWords { word0: w0, word1: 0 }).last() {
                    break;
                }
                if group_len == MAX_GROUP_SLOTS {
                    return Err(ShaderError::malformed(
                        base + slot * 2,
                        "ALU group has more than five slots",
                    ));
                }
            }

            let literal_base = base + (slot + group_len) * 2;
            let mut units = [false; MAX_GROUP_SLOTS];
            let mut reduction: Option<InstrId> = None;
            let mut literal_count = 0usize;

            for i in 0..group_len {
                let word_index = base + (slot + i) * 2;
                let alu = AluWords {
                    word0: self.word(word_index)?,
                    word1: self.word(word_index + 1)?,
                };
                let Some(ins) =
                    self.decode_alu(cf_pc, word_index, alu, &kcache, literal_base, &mut literal_count)?
                else {
                    continue;
                };

                let flags = ins.opcode.flags();
                let unit = assign_unit(flags, ins.dest.chan, &mut units)
                    .ok_or_else(|| ShaderError::malformed(word_index, format!("{} has no free ALU unit", ins.opcode.name())))?;
                let ins = AluInstruction { unit, ..ins };

                if flags.contains(AluFlags::PRED_SET) {
                    match mode {
                        AluCfOpcode::AluPushBefore if !pushed_before => {
                            self.push_synthetic_cf(cf_pc, CfOpcode::Push, 0);
                            pushed_before = true;
                        }
                        AluCfOpcode::AluElseAfter => {
                            self.push_synthetic_cf(cf_pc, CfOpcode::Push, 0);
                        }
                        _ => {}
                    }
                }

                match (ins.opcode, unit.channel()) {
                    (AluOpcode::Op2(op), Some(chan)) if flags.contains(AluFlags::REDUCTION) => {
                        self.add_reduction_lane(&mut reduction, op, chan, ins, word_index)?;
                    }
                    _ => {
                        self.shader.push(Instruction::Alu(ins));
                    }
                }

                if flags.contains(AluFlags::PRED_SET) {
                    match mode {
                        AluCfOpcode::AluBreak => self.push_synthetic_cf(cf_pc, CfOpcode::LoopBreak, 1),
                        AluCfOpcode::AluContinue => {
                            self.push_synthetic_cf(cf_pc, CfOpcode::LoopContinue, 1)
                        }
                        AluCfOpcode::AluElseAfter => self.push_synthetic_cf(cf_pc, CfOpcode::Else, 1),
                        _ => {}
                    }
                }
            }

            slot += group_len + (literal_count + 1) / 2;
            self.group += 1;
        }

        match mode {
            AluCfOpcode::AluBreak | AluCfOpcode::AluContinue | AluCfOpcode::AluPopAfter => {
                self.push_synthetic_cf(cf_pc, CfOpcode::Pop, 1)
            }
            AluCfOpcode::AluPop2After => self.push_synthetic_cf(cf_pc, CfOpcode::Pop, 2),
            _ => {}
        }
        Ok(())
    }

    fn add_reduction_lane(
        &mut self,
        reduction: &mut Option<InstrId>,
        op: Op2,
        chan: Channel,
        ins: AluInstruction,
        word_index: usize,
    ) -> Result<(), ShaderError> {
        let id = match *reduction {
            Some(id) => id,
            None => {
                let id = self.shader.push(Instruction::AluReduction(AluReductionInstruction {
                    cf_pc: ins.cf_pc,
                    group_pc: ins.group_pc,
                    opcode: op,
                    units: [None, None, None, None],
                }));
                *reduction = Some(id);
                id
            }
        };

        let Some(Instruction::AluReduction(red)) = self.shader.code.get_mut(id.0) else {
            return Err(ShaderError::malformed(word_index, "reduction lane lost its group"));
        };
        if red.opcode != op {
            return Err(ShaderError::malformed(
                word_index,
                format!("{} mixed with {} in one reduction group", op.name(), red.opcode.name()),
            ));
        }
        let lane = &mut red.units[chan.index()];
        if lane.is_some() {
            return Err(ShaderError::malformed(
                word_index,
                format!("duplicate {} lane {}", op.name(), chan.as_char()),
            ));
        }
        *lane = Some(ins);
        Ok(())
    }

    /// Decodes one ALU slot. Returns `None` for slots that produce no instruction (NOP).
    fn decode_alu(
        &self,
        cf_pc: u32,
        word_index: usize,
        alu: AluWords,
        kcache: &[KcacheLock; 2],
        literal_base: usize,
        literal_count: &mut usize,
    ) -> Result<Option<AluInstruction>, ShaderError> {
        let opcode = if alu.is_op2() {
            match Op2::from_raw(alu.op2_inst()) {
                Some(Op2::Nop) => return Ok(None),
                Some(op) => AluOpcode::Op2(op),
                None => {
                    return Err(ShaderError::unsupported(
                        format!("OP2_INST_{}", alu.op2_inst()),
                        cf_pc,
                    ))
                }
            }
        } else {
            match Op3::from_raw(alu.op3_inst()) {
                Some(op) => AluOpcode::Op3(op),
                None => {
                    return Err(ShaderError::unsupported(
                        format!("OP3_INST_{}", alu.op3_inst()),
                        cf_pc,
                    ))
                }
            }
        };

        let flags = opcode.flags();
        if flags.contains(AluFlags::DOUBLE) {
            return Err(ShaderError::unsupported(opcode.name(), cf_pc));
        }

        if alu.dst_rel() {
            return Err(ShaderError::malformed(
                word_index,
                "relative ALU destination register",
            ));
        }

        let src_type = if flags.contains(AluFlags::INT_IN) {
            ValueType::Int
        } else if flags.contains(AluFlags::UINT_IN) {
            ValueType::Uint
        } else {
            ValueType::Float
        };
        let dst_type = if flags.contains(AluFlags::INT_OUT) {
            ValueType::Int
        } else if flags.contains(AluFlags::UINT_OUT) {
            ValueType::Uint
        } else {
            ValueType::Float
        };

        let mut sources = Vec::with_capacity(opcode.src_count());
        for i in 0..opcode.src_count() {
            let src = self.decode_source(
                cf_pc,
                word_index,
                alu,
                i,
                kcache,
                literal_base,
                literal_count,
            )?;
            sources.push(AluSource {
                value_type: src_type,
                ..src
            });
        }

        let pred_sel = match alu.pred_sel() {
            2 => PredicateSelect::Zero,
            3 => PredicateSelect::One,
            _ => PredicateSelect::Off,
        };

        let (write_mask, update_exec_mask, update_pred, omod) = if alu.is_op2() {
            (
                alu.write_mask(),
                alu.update_execute_mask(),
                alu.update_pred(),
                OutputModifier::from_raw(alu.omod()),
            )
        } else {
            (true, false, false, OutputModifier::Off)
        };

        Ok(Some(AluInstruction {
            cf_pc,
            group_pc: self.group,
            opcode,
            unit: Unit::T,
            pred_sel,
            bank_swizzle: alu.bank_swizzle(),
            dest: AluDest {
                id: alu.dst_gpr(),
                chan: Channel::from_raw(alu.dst_chan()),
                clamp: alu.clamp(),
                value_type: dst_type,
            },
            sources,
            write_mask,
            update_exec_mask,
            update_pred,
            omod,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_source(
        &self,
        cf_pc: u32,
        word_index: usize,
        alu: AluWords,
        index: usize,
        kcache: &[KcacheLock; 2],
        literal_base: usize,
        literal_count: &mut usize,
    ) -> Result<AluSource, ShaderError> {
        use crate::encoding::*;

        let fields = alu.src(index);
        let chan = Channel::from_raw(fields.chan);
        let mut id = 0;

        let kind = match fields.sel {
            0..=ALU_SRC_GPR_MAX => {
                id = fields.sel;
                SourceKind::Register
            }
            ALU_SRC_KCACHE0_BASE..=ALU_SRC_KCACHE1_END => {
                let (lock, base) = if fields.sel < ALU_SRC_KCACHE1_BASE {
                    (kcache[0], ALU_SRC_KCACHE0_BASE)
                } else {
                    (kcache[1], ALU_SRC_KCACHE1_BASE)
                };
                match lock.mode {
                    KCACHE_MODE_NOP => {
                        return Err(ShaderError::malformed(
                            word_index,
                            format!("source {index} reads an unlocked kcache bank"),
                        ))
                    }
                    KCACHE_MODE_LOCK_LOOP_INDEX => {
                        return Err(ShaderError::unsupported("KCACHE_LOCK_LOOP_INDEX", cf_pc))
                    }
                    _ => {}
                }
                id = lock.addr * 16 + (fields.sel - base);
                SourceKind::UniformBlock { block: lock.bank }
            }
            ALU_SRC_1_DBL_L | ALU_SRC_1_DBL_M | ALU_SRC_0_5_DBL_L | ALU_SRC_0_5_DBL_M => {
                return Err(ShaderError::unsupported("ALU_SRC_DOUBLE_CONSTANT", cf_pc))
            }
            ALU_SRC_0 => SourceKind::ConstantFloat(0.0),
            ALU_SRC_1 => SourceKind::ConstantFloat(1.0),
            ALU_SRC_1_INT => SourceKind::ConstantInt(1),
            ALU_SRC_M_1_INT => SourceKind::ConstantInt(-1),
            ALU_SRC_0_5 => SourceKind::ConstantFloat(0.5),
            ALU_SRC_LITERAL => {
                *literal_count = (*literal_count).max(chan.index() + 1);
                SourceKind::Literal(self.word(literal_base + chan.index())?)
            }
            ALU_SRC_PV => SourceKind::PreviousVector,
            ALU_SRC_PS => SourceKind::PreviousScalar,
            ALU_SRC_CFILE_BASE..=511 => {
                id = fields.sel - ALU_SRC_CFILE_BASE;
                SourceKind::ConstantFile
            }
            other => {
                return Err(ShaderError::malformed(
                    word_index,
                    format!("unknown ALU source select {other}"),
                ))
            }
        };

        let rel = if fields.rel {
            if !matches!(kind, SourceKind::UniformBlock { .. } | SourceKind::ConstantFile) {
                return Err(ShaderError::malformed(
                    word_index,
                    format!("relative addressing on non-uniform source {index}"),
                ));
            }
            Some(match alu.index_mode() {
                0 => IndexMode::ArX,
                1 => IndexMode::ArY,
                2 => IndexMode::ArZ,
                3 => IndexMode::ArW,
                4 => IndexMode::Loop,
                5 | 6 => return Err(ShaderError::unsupported("INDEX_GLOBAL", cf_pc)),
                other => {
                    return Err(ShaderError::malformed(
                        word_index,
                        format!("unknown index mode {other}"),
                    ))
                }
            })
        } else {
            None
        };

        Ok(AluSource {
            kind,
            id,
            chan,
            negate: fields.neg,
            absolute: fields.abs,
            rel,
            value_type: ValueType::Float,
        })
    }

    fn decode_tex_clause(&mut self, cf_pc: u32, cf: CfWords) -> Result<(), ShaderError> {
        let base = cf.addr() as usize * 2;
        let count = cf.count() as usize + 1;

        for i in 0..count {
            let word_index = base + i * 4;
            let tex = TexWords {
                word0: self.word(word_index)?,
                word1: self.word(word_index + 1)?,
                word2: self.word(word_index + 2)?,
            };

            let opcode = match TexOpcode::from_raw(tex.tex_inst()) {
                Some(op @ (TexOpcode::VtxFetch | TexOpcode::VtxSemantic | TexOpcode::Mem)) => {
                    return Err(ShaderError::unsupported(op.name(), cf_pc))
                }
                Some(op) => op,
                None => {
                    return Err(ShaderError::unsupported(
                        format!("TEX_INST_{}", tex.tex_inst()),
                        cf_pc,
                    ))
                }
            };

            if tex.src_rel() || tex.dst_rel() {
                return Err(ShaderError::malformed(
                    word_index,
                    "relative texture fetch register",
                ));
            }

            let mut src_sel = [Select::Mask; 4];
            let mut dst_sel = [Select::Mask; 4];
            for c in 0..4 {
                src_sel[c] = Select::from_raw(tex.src_sel(c)).ok_or_else(|| {
                    ShaderError::malformed(word_index + 2, format!("invalid source swizzle {}", tex.src_sel(c)))
                })?;
                dst_sel[c] = Select::from_raw(tex.dst_sel(c)).ok_or_else(|| {
                    ShaderError::malformed(word_index + 1, format!("invalid destination swizzle {}", tex.dst_sel(c)))
                })?;
            }

            self.shader.push(Instruction::TextureFetch(TexInstruction {
                cf_pc,
                group_pc: self.group,
                opcode,
                resource_id: tex.resource_id(),
                sampler_id: tex.sampler_id(),
                lod_bias: encoding::sign_extend(tex.lod_bias(), 7),
                offset: [0, 1, 2].map(|axis| encoding::sign_extend(tex.offset(axis), 5)),
                coord_normalized: [0, 1, 2, 3].map(|axis| tex.coord_type(axis)),
                src: FetchRegister {
                    id: tex.src_gpr(),
                    sel: src_sel,
                },
                dst: FetchRegister {
                    id: tex.dst_gpr(),
                    sel: dst_sel,
                },
                fetch_whole_quad: tex.fetch_whole_quad(),
                bc_frac_mode: tex.bc_frac_mode(),
            }));
            self.group += 1;
        }
        Ok(())
    }
}

/// Picks the execution unit for an ALU slot and marks it busy.
pub(crate) fn assign_unit(
    flags: AluFlags,
    chan: Channel,
    units: &mut [bool; MAX_GROUP_SLOTS],
) -> Option<Unit> {
    let t = Unit::T.index();
    let index = if flags.contains(AluFlags::TRANSCENDENTAL) {
        t
    } else if flags.contains(AluFlags::VECTOR) {
        chan.index()
    } else if units[chan.index()] {
        t
    } else {
        chan.index()
    };

    if units[index] {
        return None;
    }
    units[index] = true;
    Some(Unit::from_index(index))
}
