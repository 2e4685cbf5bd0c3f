//! Raw bit-field views over Latte microcode words.
//!
//! Fields are packed from the least significant bit of each little-endian `u32`. These views do
//! no validation; the decoder and disassembler decide what a field value means.

#[inline]
fn bits(word: u32, lo: u32, len: u32) -> u32 {
    (word >> lo) & ((1u32 << len) - 1)
}

#[inline]
fn bit(word: u32, lo: u32) -> bool {
    bits(word, lo, 1) != 0
}

/// Sign-extends the low `len` bits of `value`.
pub(crate) fn sign_extend(value: u32, len: u32) -> i32 {
    let shift = 32 - len;
    ((value << shift) as i32) >> shift
}

/// Converts a little-endian byte buffer into words. Trailing bytes that do not fill a word are
/// reported through `None`.
pub(crate) fn words_from_le_bytes(bytes: &[u8]) -> Option<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfType {
    Normal,
    Export,
    Alu,
    AluExtended,
}

/// A control-flow word pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfWords {
    pub word0: u32,
    pub word1: u32,
}

impl CfWords {
    pub fn ty(&self) -> CfType {
        match bits(self.word1, 28, 2) {
            0 => CfType::Normal,
            1 => CfType::Export,
            2 => CfType::Alu,
            _ => CfType::AluExtended,
        }
    }

    pub fn addr(&self) -> u32 {
        self.word0
    }

    pub fn pop_count(&self) -> u32 {
        bits(self.word1, 0, 3)
    }

    pub fn cf_const(&self) -> u32 {
        bits(self.word1, 3, 5)
    }

    pub fn cond(&self) -> u32 {
        bits(self.word1, 8, 2)
    }

    /// Clause record count, minus one.
    pub fn count(&self) -> u32 {
        bits(self.word1, 10, 3) | (bits(self.word1, 19, 1) << 3)
    }

    pub fn end_of_program(&self) -> bool {
        bit(self.word1, 21)
    }

    pub fn cf_inst(&self) -> u32 {
        bits(self.word1, 23, 7)
    }

    pub fn alu(self) -> AluCfWords {
        AluCfWords {
            word0: self.word0,
            word1: self.word1,
        }
    }

    pub fn export(self) -> ExportWords {
        ExportWords {
            word0: self.word0,
            word1: self.word1,
        }
    }
}

pub const KCACHE_MODE_NOP: u32 = 0;
pub const KCACHE_MODE_LOCK_LOOP_INDEX: u32 = 3;

/// An ALU clause control-flow word pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluCfWords {
    pub word0: u32,
    pub word1: u32,
}

impl AluCfWords {
    pub fn addr(&self) -> u32 {
        bits(self.word0, 0, 22)
    }

    pub fn kcache_bank(&self, index: usize) -> u32 {
        match index {
            0 => bits(self.word0, 22, 4),
            _ => bits(self.word0, 26, 4),
        }
    }

    pub fn kcache_mode(&self, index: usize) -> u32 {
        match index {
            0 => bits(self.word0, 30, 2),
            _ => bits(self.word1, 0, 2),
        }
    }

    pub fn kcache_addr(&self, index: usize) -> u32 {
        match index {
            0 => bits(self.word1, 2, 8),
            _ => bits(self.word1, 10, 8),
        }
    }

    /// Slot count, minus one. Literal slots are included.
    pub fn count(&self) -> u32 {
        bits(self.word1, 18, 7)
    }

    pub fn cf_inst(&self) -> u32 {
        bits(self.word1, 26, 4)
    }
}

/// An export / memory-write control-flow word pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportWords {
    pub word0: u32,
    pub word1: u32,
}

impl ExportWords {
    pub fn array_base(&self) -> u32 {
        bits(self.word0, 0, 13)
    }

    pub fn ty(&self) -> u32 {
        bits(self.word0, 13, 2)
    }

    pub fn rw_gpr(&self) -> u32 {
        bits(self.word0, 15, 7)
    }

    pub fn rw_rel(&self) -> bool {
        bit(self.word0, 22)
    }

    pub fn index_gpr(&self) -> u32 {
        bits(self.word0, 23, 7)
    }

    pub fn elem_size(&self) -> u32 {
        bits(self.word0, 30, 2)
    }

    pub fn src_sel(&self, index: usize) -> u32 {
        bits(self.word1, 3 * index as u32, 3)
    }

    pub fn burst_count(&self) -> u32 {
        bits(self.word1, 17, 4)
    }

    pub fn valid_pixel_mode(&self) -> bool {
        bit(self.word1, 22)
    }

    pub fn cf_inst(&self) -> u32 {
        bits(self.word1, 23, 7)
    }

    pub fn whole_quad_mode(&self) -> bool {
        bit(self.word1, 30)
    }

    pub fn barrier(&self) -> bool {
        bit(self.word1, 31)
    }
}

pub const ALU_SRC_GPR_MAX: u32 = 127;
pub const ALU_SRC_KCACHE0_BASE: u32 = 128;
pub const ALU_SRC_KCACHE1_BASE: u32 = 160;
pub const ALU_SRC_KCACHE1_END: u32 = 191;
pub const ALU_SRC_1_DBL_L: u32 = 244;
pub const ALU_SRC_1_DBL_M: u32 = 245;
pub const ALU_SRC_0_5_DBL_L: u32 = 246;
pub const ALU_SRC_0_5_DBL_M: u32 = 247;
pub const ALU_SRC_0: u32 = 248;
pub const ALU_SRC_1: u32 = 249;
pub const ALU_SRC_1_INT: u32 = 250;
pub const ALU_SRC_M_1_INT: u32 = 251;
pub const ALU_SRC_0_5: u32 = 252;
pub const ALU_SRC_LITERAL: u32 = 253;
pub const ALU_SRC_PV: u32 = 254;
pub const ALU_SRC_PS: u32 = 255;
pub const ALU_SRC_CFILE_BASE: u32 = 256;

/// Raw operand fields shared by the three ALU source slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluSrcFields {
    pub sel: u32,
    pub rel: bool,
    pub chan: u32,
    pub neg: bool,
    pub abs: bool,
}

/// One ALU slot (two words).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluWords {
    pub word0: u32,
    pub word1: u32,
}

impl AluWords {
    pub fn src(&self, index: usize) -> AluSrcFields {
        match index {
            0 => AluSrcFields {
                sel: bits(self.word0, 0, 9),
                rel: bit(self.word0, 9),
                chan: bits(self.word0, 10, 2),
                neg: bit(self.word0, 12),
                abs: self.is_op2() && bit(self.word1, 0),
            },
            1 => AluSrcFields {
                sel: bits(self.word0, 13, 9),
                rel: bit(self.word0, 22),
                chan: bits(self.word0, 23, 2),
                neg: bit(self.word0, 25),
                abs: self.is_op2() && bit(self.word1, 1),
            },
            _ => AluSrcFields {
                sel: bits(self.word1, 0, 9),
                rel: bit(self.word1, 9),
                chan: bits(self.word1, 10, 2),
                neg: bit(self.word1, 12),
                abs: false,
            },
        }
    }

    pub fn index_mode(&self) -> u32 {
        bits(self.word0, 26, 3)
    }

    pub fn pred_sel(&self) -> u32 {
        bits(self.word0, 29, 2)
    }

    pub fn last(&self) -> bool {
        bit(self.word0, 31)
    }

    /// OP2 instructions have a zero `ENCODING` field.
    pub fn is_op2(&self) -> bool {
        bits(self.word1, 15, 3) == 0
    }

    pub fn bank_swizzle(&self) -> u32 {
        bits(self.word1, 18, 3)
    }

    pub fn dst_gpr(&self) -> u32 {
        bits(self.word1, 21, 7)
    }

    pub fn dst_rel(&self) -> bool {
        bit(self.word1, 28)
    }

    pub fn dst_chan(&self) -> u32 {
        bits(self.word1, 29, 2)
    }

    pub fn clamp(&self) -> bool {
        bit(self.word1, 31)
    }

    pub fn update_execute_mask(&self) -> bool {
        bit(self.word1, 2)
    }

    pub fn update_pred(&self) -> bool {
        bit(self.word1, 3)
    }

    pub fn write_mask(&self) -> bool {
        bit(self.word1, 4)
    }

    pub fn omod(&self) -> u32 {
        bits(self.word1, 5, 2)
    }

    pub fn op2_inst(&self) -> u32 {
        bits(self.word1, 7, 11)
    }

    pub fn op3_inst(&self) -> u32 {
        bits(self.word1, 13, 5)
    }
}

/// One texture-fetch record (three used words out of four).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexWords {
    pub word0: u32,
    pub word1: u32,
    pub word2: u32,
}

impl TexWords {
    pub fn tex_inst(&self) -> u32 {
        bits(self.word0, 0, 5)
    }

    pub fn bc_frac_mode(&self) -> bool {
        bit(self.word0, 5)
    }

    pub fn fetch_whole_quad(&self) -> bool {
        bit(self.word0, 7)
    }

    pub fn resource_id(&self) -> u32 {
        bits(self.word0, 8, 8)
    }

    pub fn src_gpr(&self) -> u32 {
        bits(self.word0, 16, 7)
    }

    pub fn src_rel(&self) -> bool {
        bit(self.word0, 23)
    }

    pub fn dst_gpr(&self) -> u32 {
        bits(self.word1, 0, 7)
    }

    pub fn dst_rel(&self) -> bool {
        bit(self.word1, 7)
    }

    pub fn dst_sel(&self, index: usize) -> u32 {
        bits(self.word1, 9 + 3 * index as u32, 3)
    }

    /// Raw 7-bit LOD bias.
    pub fn lod_bias(&self) -> u32 {
        bits(self.word1, 21, 7)
    }

    /// `true` when the axis uses normalized coordinates.
    pub fn coord_type(&self, index: usize) -> bool {
        bit(self.word1, 28 + index as u32)
    }

    /// Raw 5-bit texel offset.
    pub fn offset(&self, index: usize) -> u32 {
        bits(self.word2, 5 * index as u32, 5)
    }

    pub fn sampler_id(&self) -> u32 {
        bits(self.word2, 15, 5)
    }

    pub fn src_sel(&self, index: usize) -> u32 {
        bits(self.word2, 20 + 3 * index as u32, 3)
    }
}

/// One vertex-fetch record (three used words out of four).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtxWords {
    pub word0: u32,
    pub word1: u32,
    pub word2: u32,
}

impl VtxWords {
    pub fn vtx_inst(&self) -> u32 {
        bits(self.word0, 0, 5)
    }

    pub fn fetch_type(&self) -> u32 {
        bits(self.word0, 5, 2)
    }

    pub fn buffer_id(&self) -> u32 {
        bits(self.word0, 8, 8)
    }

    pub fn src_gpr(&self) -> u32 {
        bits(self.word0, 16, 7)
    }

    pub fn src_sel_x(&self) -> u32 {
        bits(self.word0, 24, 2)
    }

    pub fn mega_fetch_count(&self) -> u32 {
        bits(self.word0, 26, 6)
    }

    pub fn semantic_id(&self) -> u32 {
        bits(self.word1, 0, 8)
    }

    pub fn dst_gpr(&self) -> u32 {
        bits(self.word1, 0, 7)
    }

    pub fn dst_sel(&self, index: usize) -> u32 {
        bits(self.word1, 9 + 3 * index as u32, 3)
    }

    pub fn data_format(&self) -> u32 {
        bits(self.word1, 22, 6)
    }

    pub fn num_format_all(&self) -> u32 {
        bits(self.word1, 28, 2)
    }

    pub fn format_comp_all(&self) -> bool {
        bit(self.word1, 30)
    }

    pub fn offset(&self) -> u32 {
        bits(self.word2, 0, 16)
    }

    pub fn endian_swap(&self) -> u32 {
        bits(self.word2, 16, 2)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extends_narrow_fields() {
        assert_eq!(sign_extend(0b11111, 5), -1);
        assert_eq!(sign_extend(0b10000, 5), -16);
        assert_eq!(sign_extend(0b01111, 5), 15);
        assert_eq!(sign_extend(0x40, 7), -64);
    }

    #[test]
    fn cf_count_includes_count_3() {
        let cf = CfWords {
            word0: 0,
            word1: (0b101 << 10) | (1 << 19),
        };
        assert_eq!(cf.count(), 0b1101);
    }

    #[test]
    fn rejects_partial_words() {
        assert!(words_from_le_bytes(&[0, 0, 0]).is_none());
        assert_eq!(words_from_le_bytes(&[1, 0, 0, 0x80]), Some(vec![0x8000_0001]));
    }
}
