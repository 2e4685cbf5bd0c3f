//! Word-level builders for Latte shader binaries.

#![allow(dead_code)]

pub const CF_TEX: u32 = 1;
pub const CF_VTX: u32 = 2;
pub const CF_LOOP_START_DX10: u32 = 6;
pub const CF_LOOP_END: u32 = 5;
pub const CF_JUMP: u32 = 10;
pub const CF_ELSE: u32 = 13;
pub const CF_POP: u32 = 14;
pub const CF_RETURN: u32 = 20;
pub const CF_KILL: u32 = 24;

pub const ALU: u32 = 8;
pub const ALU_PUSH_BEFORE: u32 = 9;
pub const ALU_POP_AFTER: u32 = 10;
pub const ALU_BREAK: u32 = 14;

pub const EXP: u32 = 39;
pub const EXP_DONE: u32 = 40;

pub const EXPORT_PIXEL: u32 = 0;
pub const EXPORT_POSITION: u32 = 1;
pub const EXPORT_PARAM: u32 = 2;

pub const OP2_ADD: u32 = 0;
pub const OP2_MUL: u32 = 1;
pub const OP2_MOV: u32 = 25;
pub const OP2_PRED_SETE: u32 = 32;
pub const OP2_PRED_SETGT: u32 = 33;
pub const OP2_SUB_INT: u32 = 53;
pub const OP2_PRED_SETE_INT: u32 = 66;
pub const OP2_DOT4: u32 = 80;
pub const OP2_CUBE: u32 = 82;
pub const OP2_MAX4: u32 = 83;
pub const OP2_RECIP_IEEE: u32 = 102;
pub const OP2_FLT64_TO_FLT32: u32 = 28;
pub const OP3_MULADD: u32 = 16;

pub const TEX_SAMPLE: u32 = 16;
pub const TEX_SAMPLE_L: u32 = 17;
pub const TEX_VTX_FETCH: u32 = 0;

pub const VTX_SEMANTIC: u32 = 1;

pub const SRC_0: u32 = 248;
pub const SRC_1: u32 = 249;
pub const SRC_LITERAL: u32 = 253;
pub const SRC_PV: u32 = 254;
pub const SRC_PS: u32 = 255;
pub const SRC_KCACHE0: u32 = 128;

pub const SEL_X: u32 = 0;
pub const SEL_Y: u32 = 1;
pub const SEL_Z: u32 = 2;
pub const SEL_W: u32 = 3;
pub const SEL_0: u32 = 4;
pub const SEL_1: u32 = 5;
pub const SEL_MASK: u32 = 7;
pub const XYZW: [u32; 4] = [SEL_X, SEL_Y, SEL_Z, SEL_W];

pub fn to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Word 1 of a normal CF instruction.
pub fn cf_word1(inst: u32, count: u32, pop_count: u32, end_of_program: bool) -> u32 {
    (pop_count & 7)
        | ((count & 7) << 10)
        | (((count >> 3) & 1) << 19)
        | ((end_of_program as u32) << 21)
        | (inst << 23)
}

#[derive(Debug, Clone, Copy)]
pub struct Src {
    pub sel: u32,
    pub chan: u32,
    pub neg: bool,
    pub abs: bool,
}

pub fn gpr(id: u32, chan: u32) -> Src {
    Src {
        sel: id,
        chan,
        neg: false,
        abs: false,
    }
}

pub fn special(sel: u32, chan: u32) -> Src {
    Src {
        sel,
        chan,
        neg: false,
        abs: false,
    }
}

impl Src {
    pub fn neg(self) -> Self {
        Self { neg: true, ..self }
    }

    pub fn abs(self) -> Self {
        Self { abs: true, ..self }
    }
}

/// One ALU slot.
#[derive(Debug, Clone)]
pub struct Alu {
    pub op3: bool,
    pub inst: u32,
    pub dst: u32,
    pub chan: u32,
    pub srcs: Vec<Src>,
    pub write_mask: bool,
    pub update_exec_mask: bool,
    pub update_pred: bool,
    pub omod: u32,
    pub clamp: bool,
}

pub fn op2(inst: u32, dst: u32, chan: u32, srcs: &[Src]) -> Alu {
    Alu {
        op3: false,
        inst,
        dst,
        chan,
        srcs: srcs.to_vec(),
        write_mask: true,
        update_exec_mask: false,
        update_pred: false,
        omod: 0,
        clamp: false,
    }
}

pub fn op3(inst: u32, dst: u32, chan: u32, srcs: &[Src]) -> Alu {
    Alu {
        op3: true,
        ..op2(inst, dst, chan, srcs)
    }
}

impl Alu {
    /// Predicate set that feeds a branch: no register write, updates exec mask and predicate.
    pub fn branch(self) -> Self {
        Self {
            write_mask: false,
            update_exec_mask: true,
            update_pred: true,
            ..self
        }
    }

    pub fn no_write(self) -> Self {
        Self {
            write_mask: false,
            ..self
        }
    }

    pub fn omod(self, omod: u32) -> Self {
        Self { omod, ..self }
    }

    pub fn clamp(self) -> Self {
        Self {
            clamp: true,
            ..self
        }
    }

    pub fn encode(&self, last: bool) -> [u32; 2] {
        let src = |i: usize| self.srcs.get(i).copied().unwrap_or(gpr(0, 0));
        let (s0, s1, s2) = (src(0), src(1), src(2));

        let word0 = s0.sel
            | (s0.chan << 10)
            | ((s0.neg as u32) << 12)
            | (s1.sel << 13)
            | (s1.chan << 23)
            | ((s1.neg as u32) << 25)
            | ((last as u32) << 31);

        let dst = (self.dst << 21) | (self.chan << 29) | ((self.clamp as u32) << 31);
        let word1 = if self.op3 {
            s2.sel | (s2.chan << 10) | ((s2.neg as u32) << 12) | (self.inst << 13) | dst
        } else {
            (s0.abs as u32)
                | ((s1.abs as u32) << 1)
                | ((self.update_exec_mask as u32) << 2)
                | ((self.update_pred as u32) << 3)
                | ((self.write_mask as u32) << 4)
                | (self.omod << 5)
                | (self.inst << 7)
                | dst
        };
        [word0, word1]
    }
}

/// One instruction group: slots followed by its literal constants, padded to whole slots.
pub fn group(slots: &[Alu], literals: &[u32]) -> Vec<[u32; 2]> {
    let mut out: Vec<[u32; 2]> = slots
        .iter()
        .enumerate()
        .map(|(i, alu)| alu.encode(i + 1 == slots.len()))
        .collect();
    for pair in literals.chunks(2) {
        out.push([pair[0], pair.get(1).copied().unwrap_or(0)]);
    }
    out
}

/// A texture fetch record.
#[derive(Debug, Clone, Copy)]
pub struct Tex {
    pub inst: u32,
    pub resource: u32,
    pub sampler: u32,
    pub src: u32,
    pub src_sel: [u32; 4],
    pub dst: u32,
    pub dst_sel: [u32; 4],
    pub offset: [i32; 3],
}

pub fn sample(resource: u32, sampler: u32, dst: u32, src: u32) -> Tex {
    Tex {
        inst: TEX_SAMPLE,
        resource,
        sampler,
        src,
        src_sel: XYZW,
        dst,
        dst_sel: XYZW,
        offset: [0; 3],
    }
}

impl Tex {
    pub fn encode(&self) -> [u32; 4] {
        let word0 = self.inst | (self.resource << 8) | (self.src << 16);
        let word1 = self.dst
            | (self.dst_sel[0] << 9)
            | (self.dst_sel[1] << 12)
            | (self.dst_sel[2] << 15)
            | (self.dst_sel[3] << 18)
            | (0xf << 28);
        let word2 = ((self.offset[0] as u32) & 0x1f)
            | (((self.offset[1] as u32) & 0x1f) << 5)
            | (((self.offset[2] as u32) & 0x1f) << 10)
            | (self.sampler << 15)
            | (self.src_sel[0] << 20)
            | (self.src_sel[1] << 23)
            | (self.src_sel[2] << 26)
            | (self.src_sel[3] << 29);
        [word0, word1, word2, 0]
    }
}

/// A semantic vertex fetch record.
#[derive(Debug, Clone, Copy)]
pub struct Semantic {
    pub semantic: u32,
    pub buffer: u32,
    pub format: u32,
    pub num_format: u32,
    pub signed: bool,
    pub offset: u32,
    pub dst_sel: [u32; 4],
    pub mega_fetch_count: u32,
}

impl Semantic {
    pub fn encode(&self) -> [u32; 4] {
        let word0 = VTX_SEMANTIC | (self.buffer << 8) | (self.mega_fetch_count << 26);
        let word1 = self.semantic
            | (self.dst_sel[0] << 9)
            | (self.dst_sel[1] << 12)
            | (self.dst_sel[2] << 15)
            | (self.dst_sel[3] << 18)
            | (self.format << 22)
            | (self.num_format << 28)
            | ((self.signed as u32) << 30);
        [word0, word1, self.offset, 0]
    }
}

enum Entry {
    Normal {
        inst: u32,
        addr: u32,
        pop_count: u32,
        eop: bool,
    },
    Alu {
        inst: u32,
        kcache0: Option<(u32, u32)>,
        slots: Vec<[u32; 2]>,
    },
    Tex(Vec<[u32; 4]>),
    Vtx(Vec<[u32; 4]>),
    Export {
        inst: u32,
        ty: u32,
        array_base: u32,
        gpr: u32,
        sel: [u32; 4],
        eop: bool,
    },
}

/// Lays out a CF program followed by its clauses.
#[derive(Default)]
pub struct Program {
    entries: Vec<Entry>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next CF instruction.
    pub fn pc(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn cf(mut self, inst: u32, addr: u32, pop_count: u32) -> Self {
        self.entries.push(Entry::Normal {
            inst,
            addr,
            pop_count,
            eop: false,
        });
        self
    }

    pub fn alu(mut self, inst: u32, groups: Vec<Vec<[u32; 2]>>) -> Self {
        self.entries.push(Entry::Alu {
            inst,
            kcache0: None,
            slots: groups.into_iter().flatten().collect(),
        });
        self
    }

    /// ALU clause with kcache bank 0 locked to `(bank, addr)`.
    pub fn alu_kcache(mut self, inst: u32, bank: u32, addr: u32, groups: Vec<Vec<[u32; 2]>>) -> Self {
        self.entries.push(Entry::Alu {
            inst,
            kcache0: Some((bank, addr)),
            slots: groups.into_iter().flatten().collect(),
        });
        self
    }

    pub fn tex(mut self, records: &[Tex]) -> Self {
        self.entries
            .push(Entry::Tex(records.iter().map(Tex::encode).collect()));
        self
    }

    pub fn vtx(mut self, records: &[Semantic]) -> Self {
        self.entries
            .push(Entry::Vtx(records.iter().map(Semantic::encode).collect()));
        self
    }

    pub fn export(mut self, inst: u32, ty: u32, array_base: u32, gpr: u32, sel: [u32; 4]) -> Self {
        self.entries.push(Entry::Export {
            inst,
            ty,
            array_base,
            gpr,
            sel,
            eop: false,
        });
        self
    }

    /// Marks the last CF instruction as the end of the program.
    pub fn end(mut self) -> Self {
        match self.entries.last_mut() {
            Some(Entry::Normal { eop, .. } | Entry::Export { eop, .. }) => *eop = true,
            _ => panic!("END_OF_PROGRAM must follow a normal or export instruction"),
        }
        self
    }

    pub fn words(&self) -> Vec<u32> {
        let mut cf = Vec::new();
        let mut clauses: Vec<u32> = Vec::new();
        let clause_base = self.entries.len() * 2;

        for entry in &self.entries {
            let addr = ((clause_base + clauses.len()) / 2) as u32;
            match entry {
                Entry::Normal {
                    inst,
                    addr,
                    pop_count,
                    eop,
                } => cf.extend([*addr, cf_word1(*inst, 0, *pop_count, *eop)]),
                Entry::Alu {
                    inst,
                    kcache0,
                    slots,
                } => {
                    let (bank, mode, kaddr) = match kcache0 {
                        Some((bank, kaddr)) => (*bank, 1, *kaddr),
                        None => (0, 0, 0),
                    };
                    let count = slots.len() as u32 - 1;
                    cf.extend([
                        addr | (bank << 22) | (mode << 30),
                        (kaddr << 2) | (count << 18) | (inst << 26),
                    ]);
                    clauses.extend(slots.iter().flatten());
                }
                Entry::Tex(records) => {
                    cf.extend([addr, cf_word1(CF_TEX, records.len() as u32 - 1, 0, false)]);
                    clauses.extend(records.iter().flatten());
                }
                Entry::Vtx(records) => {
                    cf.extend([addr, cf_word1(CF_VTX, records.len() as u32 - 1, 0, false)]);
                    clauses.extend(records.iter().flatten());
                }
                Entry::Export {
                    inst,
                    ty,
                    array_base,
                    gpr,
                    sel,
                    eop,
                } => cf.extend([
                    array_base | (ty << 13) | (gpr << 15),
                    sel[0]
                        | (sel[1] << 3)
                        | (sel[2] << 6)
                        | (sel[3] << 9)
                        | ((*eop as u32) << 21)
                        | (inst << 23),
                ]),
            }
        }

        cf.extend(clauses);
        cf
    }

    pub fn bytes(&self) -> Vec<u8> {
        to_bytes(&self.words())
    }
}
