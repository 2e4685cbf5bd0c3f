//! Fetch shader parsing.
//!
//! A fetch shader is a small CF program whose VTX clauses load vertex attributes into GPRs before
//! the vertex shader proper runs. Only the attribute layout is extracted; the vertex shader program
//! reads the attributes as stage inputs instead of executing the fetches.

use crate::encoding::{self, CfType, CfWords, VtxWords};
use crate::error::ShaderError;
use crate::ir::{FetchRegister, NumFormat, Select, VertexFetchInstruction};
use crate::opcodes::{CfOpcode, VtxOpcode};

/// One vertex attribute loaded by a fetch shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchAttribute {
    /// Semantic slot; the attribute is exposed as `fs_out_<location>` and lands in `R<location>`.
    pub location: u32,
    pub buffer: u32,
    /// Byte offset within a vertex.
    pub offset: u32,
    /// `SQ_DATA_FORMAT` value.
    pub format: u32,
    pub num_format: NumFormat,
    pub signed: bool,
    pub endian_swap: u32,
    pub dst_sel: [Select; 4],
    /// Per-instance rather than per-vertex data.
    pub instanced: bool,
    pub src_sel_x: u32,
    pub bytes_per_element: u32,
}

impl FetchAttribute {
    pub fn channels(&self) -> usize {
        data_format_channels(self.format)
    }

    /// GLSL type of the `fs_out_<location>` input.
    pub fn glsl_type(&self) -> &'static str {
        let channels = self.channels();
        match (self.num_format, self.signed) {
            (NumFormat::Int, true) => ["int", "ivec2", "ivec3", "ivec4"][channels - 1],
            (NumFormat::Int, false) => ["uint", "uvec2", "uvec3", "uvec4"][channels - 1],
            _ => ["float", "vec2", "vec3", "vec4"][channels - 1],
        }
    }

    fn from_fetch(vtx: &VertexFetchInstruction, instanced: bool, src_sel_x: u32) -> Self {
        Self {
            location: vtx.dst.id,
            buffer: vtx.buffer_id,
            offset: vtx.offset,
            format: vtx.data_format,
            num_format: vtx.num_format,
            signed: vtx.signed,
            endian_swap: vtx.endian_swap,
            dst_sel: vtx.dst.sel,
            instanced,
            src_sel_x,
            bytes_per_element: vtx.mega_fetch_count + 1,
        }
    }
}

/// Number of components in a `SQ_DATA_FORMAT`; unknown formats are treated as four-wide.
pub fn data_format_channels(format: u32) -> usize {
    match format {
        // 8, 16, 16_FLOAT, 32, 32_FLOAT, 1, 32_AS_8, 32_AS_8_8
        1 | 5 | 6 | 13 | 14 | 37 | 41 | 42 => 1,
        // 4_4, 8_8, 16_16, 16_16_FLOAT, 8_24*, 24_8*, 32_32*, GB_GR, BG_RG
        2 | 7 | 15..=20 | 29 | 30 | 39 | 40 => 2,
        // 3_3_2, 5_6_5, 6_5_5, 10_11_11*, 11_11_10*, X24_8_32_FLOAT, 8_8_8 ... 32_32_32_FLOAT
        3 | 8 | 9 | 21..=24 | 28 | 44..=48 => 3,
        _ => 4,
    }
}

/// Extracts the attribute layout from a fetch shader binary.
///
/// Non-semantic fetches and unexpected CF instructions are skipped with a warning.
pub fn parse_fetch_shader(binary: &[u8]) -> Result<Vec<FetchAttribute>, ShaderError> {
    let words = encoding::words_from_le_bytes(binary).ok_or_else(|| ShaderError::MalformedEncoding {
        offset: binary.len(),
        message: format!("binary length {} is not a multiple of 4", binary.len()),
    })?;
    let word = |index: usize| {
        words.get(index).copied().ok_or_else(|| {
            ShaderError::malformed(index, "fetch clause runs past the end of the binary")
        })
    };

    let mut attributes = Vec::new();
    for cf_pc in 0..words.len() / 2 {
        let cf = CfWords {
            word0: word(cf_pc * 2)?,
            word1: word(cf_pc * 2 + 1)?,
        };

        let opcode = match cf.ty() {
            CfType::Normal => CfOpcode::from_raw(cf.cf_inst()),
            _ => None,
        };
        match opcode {
            Some(CfOpcode::Vtx | CfOpcode::VtxTc) => {
                let base = cf.addr() as usize * 2;
                for i in 0..cf.count() as usize + 1 {
                    let index = base + i * 4;
                    let vtx = VtxWords {
                        word0: word(index)?,
                        word1: word(index + 1)?,
                        word2: word(index + 2)?,
                    };
                    let fetch = decode_vertex_fetch(cf_pc as u32, i as u32, index, vtx)?;
                    if fetch.opcode != VtxOpcode::Semantic {
                        tracing::warn!(cf_pc, opcode = %fetch.opcode, "skipping non-semantic fetch");
                        continue;
                    }
                    attributes.push(FetchAttribute::from_fetch(
                        &fetch,
                        vtx.fetch_type() == 1,
                        vtx.src_sel_x(),
                    ));
                }
            }
            Some(CfOpcode::Return | CfOpcode::EndProgram) => return Ok(attributes),
            _ => tracing::warn!(
                cf_pc,
                word0 = cf.word0,
                word1 = cf.word1,
                "unexpected fetch shader instruction"
            ),
        }

        if cf.end_of_program() {
            return Ok(attributes);
        }
    }

    Err(ShaderError::malformed(
        words.len(),
        "fetch shader has no END_OF_PROGRAM",
    ))
}

fn decode_vertex_fetch(
    cf_pc: u32,
    slot: u32,
    word_index: usize,
    vtx: VtxWords,
) -> Result<VertexFetchInstruction, ShaderError> {
    let opcode = VtxOpcode::from_raw(vtx.vtx_inst()).ok_or_else(|| {
        ShaderError::unsupported(format!("VTX_INST_{}", vtx.vtx_inst()), cf_pc)
    })?;

    let mut sel = [Select::Mask; 4];
    for (c, s) in sel.iter_mut().enumerate() {
        *s = Select::from_raw(vtx.dst_sel(c)).ok_or_else(|| {
            ShaderError::malformed(
                word_index + 1,
                format!("invalid fetch destination swizzle {}", vtx.dst_sel(c)),
            )
        })?;
    }
    let id = match opcode {
        VtxOpcode::Semantic => vtx.semantic_id(),
        VtxOpcode::Fetch => vtx.dst_gpr(),
    };

    Ok(VertexFetchInstruction {
        cf_pc,
        group_pc: slot,
        opcode,
        buffer_id: vtx.buffer_id(),
        dst: FetchRegister { id, sel },
        src_gpr: vtx.src_gpr(),
        data_format: vtx.data_format(),
        num_format: NumFormat::from_raw(vtx.num_format_all()),
        signed: vtx.format_comp_all(),
        offset: vtx.offset(),
        mega_fetch_count: vtx.mega_fetch_count(),
        endian_swap: vtx.endian_swap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_table_covers_vertex_formats() {
        assert_eq!(data_format_channels(14), 1); // 32_FLOAT
        assert_eq!(data_format_channels(30), 2); // 32_32_FLOAT
        assert_eq!(data_format_channels(48), 3); // 32_32_32_FLOAT
        assert_eq!(data_format_channels(26), 4); // 8_8_8_8
        assert_eq!(data_format_channels(0), 4);
    }
}
