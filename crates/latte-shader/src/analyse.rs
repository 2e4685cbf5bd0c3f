//! Register, resource and PV/PS usage analysis over the block tree.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ShaderError;
use crate::ir::{
    AluInstruction, Block, Channel, InstrId, Instruction, Select, Shader, SourceKind,
};

#[derive(Default)]
struct Usage {
    gprs: BTreeSet<u32>,
    samplers: BTreeSet<u32>,
    resources: BTreeSet<u32>,
    pv: BTreeSet<u32>,
    ps: BTreeSet<u32>,
    inputs: BTreeSet<u32>,
    /// Address of the first write to each register channel.
    first_write: BTreeMap<(u32, Channel), u32>,
}

impl Usage {
    fn read(&mut self, addr: u32, reg: u32, chan: Channel) {
        self.gprs.insert(reg);
        if !self.first_write.contains_key(&(reg, chan)) {
            tracing::debug!(addr, "R{reg}.{} read before any write", chan.as_char());
            self.inputs.insert(reg);
        }
    }

    fn write(&mut self, addr: u32, reg: u32, chan: Channel) {
        self.gprs.insert(reg);
        self.first_write.entry((reg, chan)).or_insert(addr);
    }
}

/// Fills the shader's usage sets from its block tree.
///
/// Must run after [`crate::blockify()`]; instructions outside the tree (eliminated jumps) do not
/// contribute.
pub fn analyse(shader: &mut Shader) -> Result<(), ShaderError> {
    let mut usage = Usage::default();
    analyse_blocks(shader, &shader.blocks, &mut usage)?;

    shader.gprs_used = usage.gprs;
    shader.samplers_used = usage.samplers;
    shader.resources_used = usage.resources;
    shader.pv_used = usage.pv;
    shader.ps_used = usage.ps;
    shader.input_gprs = usage.inputs;
    Ok(())
}

fn analyse_blocks(shader: &Shader, blocks: &[Block], usage: &mut Usage) -> Result<(), ShaderError> {
    for block in blocks {
        match block {
            Block::Code(code) => {
                for &id in code {
                    analyse_instruction(shader, id, usage)?;
                }
            }
            Block::Conditional {
                condition,
                inner,
                inner_else,
            } => {
                analyse_instruction(shader, *condition, usage)?;
                analyse_blocks(shader, inner, usage)?;
                analyse_blocks(shader, inner_else, usage)?;
            }
            Block::Loop { inner } => analyse_blocks(shader, inner, usage)?,
        }
    }
    Ok(())
}

fn address(cf_pc: u32, group_pc: Option<u32>) -> u32 {
    (cf_pc << 16) | (group_pc.unwrap_or(0) & 0xffff)
}

fn analyse_instruction(shader: &Shader, id: InstrId, usage: &mut Usage) -> Result<(), ShaderError> {
    let ins = shader.get(id).ok_or_else(|| {
        ShaderError::invariant(format!("block references missing instruction {}", id.0))
    })?;
    let addr = address(ins.cf_pc(), ins.group_pc());

    match ins {
        Instruction::ControlFlow(_) => {}
        Instruction::Alu(alu) => analyse_alu(alu, addr, usage),
        Instruction::AluReduction(red) => {
            for lane in red.units.iter().flatten() {
                analyse_alu(lane, addr, usage);
            }
        }
        Instruction::TextureFetch(tex) => {
            usage.samplers.insert(tex.sampler_id);
            usage.resources.insert(tex.resource_id);
            for sel in tex.src.sel {
                if let Some(chan) = select_channel(sel) {
                    usage.read(addr, tex.src.id, chan);
                }
            }
            for (chan, sel) in Channel::ALL.into_iter().zip(tex.dst.sel) {
                if sel != Select::Mask {
                    usage.write(addr, tex.dst.id, chan);
                }
            }
        }
        Instruction::VertexFetch(vtx) => {
            usage.read(addr, vtx.src_gpr, Channel::X);
            for (chan, sel) in Channel::ALL.into_iter().zip(vtx.dst.sel) {
                if sel != Select::Mask {
                    usage.write(addr, vtx.dst.id, chan);
                }
            }
        }
        Instruction::Export(exp) => {
            for sel in exp.src.sel {
                if let Some(chan) = select_channel(sel) {
                    usage.read(addr, exp.src.id, chan);
                }
            }
        }
    }
    Ok(())
}

fn select_channel(sel: Select) -> Option<Channel> {
    match sel {
        Select::X => Some(Channel::X),
        Select::Y => Some(Channel::Y),
        Select::Z => Some(Channel::Z),
        Select::W => Some(Channel::W),
        Select::Zero | Select::One | Select::Mask => None,
    }
}

fn analyse_alu(alu: &AluInstruction, addr: u32, usage: &mut Usage) {
    for src in &alu.sources {
        match src.kind {
            SourceKind::Register => usage.read(addr, src.id, src.chan),
            SourceKind::PreviousVector => match alu.group_pc.checked_sub(1) {
                Some(prev) => {
                    usage.pv.insert(prev);
                }
                None => tracing::debug!("PV read in the first instruction group"),
            },
            SourceKind::PreviousScalar => match alu.group_pc.checked_sub(1) {
                Some(prev) => {
                    usage.ps.insert(prev);
                }
                None => tracing::debug!("PS read in the first instruction group"),
            },
            SourceKind::UniformBlock { .. }
            | SourceKind::ConstantFile
            | SourceKind::ConstantFloat(_)
            | SourceKind::ConstantInt(_)
            | SourceKind::Literal(_) => {}
        }
    }

    if alu.write_mask {
        usage.write(addr, alu.dest.id, alu.dest.chan);
    }
}
