use crate::error::ShaderError;
use crate::ir::{Channel, FetchRegister, Select, TexInstruction};
use crate::opcodes::TexOpcode;

use super::dialect::SampleLod;
use super::{Dialect, EmitState, EmitterRegistry};

type Result = std::result::Result<bool, ShaderError>;

/// Where the LOD argument of a sample comes from.
#[derive(Clone, Copy)]
enum Level {
    Implicit,
    /// Source `.w`.
    Explicit,
    Zero,
    /// Source `.w`, added to the implicit LOD.
    Bias,
}

pub(super) fn register(registry: &mut EmitterRegistry) {
    use TexOpcode::*;

    // Compare variants sample like their plain counterparts; the reference value is dropped.
    for op in [Sample, SampleC] {
        registry.add_tex(op, |s, tex| sample(s, tex, Level::Implicit));
    }
    for op in [SampleL, SampleCL] {
        registry.add_tex(op, |s, tex| sample(s, tex, Level::Explicit));
    }
    for op in [SampleLz, SampleCLz] {
        registry.add_tex(op, |s, tex| sample(s, tex, Level::Zero));
    }
    for op in [SampleLb, SampleCLb] {
        registry.add_tex(op, |s, tex| sample(s, tex, Level::Bias));
    }
}

/// `R<d>.<written> = texture(sampler_<n>, <coords>).<selected>`
fn sample(state: &mut EmitState<'_>, tex: &TexInstruction, level: Level) -> Result {
    if tex.resource_id != tex.sampler_id {
        return Err(ShaderError::invariant(format!(
            "{} at cf {} reads resource {} through sampler {}",
            tex.opcode, tex.cf_pc, tex.resource_id, tex.sampler_id
        )));
    }

    let mut written = String::new();
    let mut selected = String::new();
    for (chan, sel) in Channel::ALL.into_iter().zip(tex.dst.sel) {
        match sel {
            Select::Mask => {}
            // Constant lanes need a temporary.
            Select::Zero | Select::One => return Ok(false),
            _ => {
                written.push(chan.as_char());
                selected.push(sel.as_char());
            }
        }
    }
    if written.is_empty() {
        state.comment(&format!("{} writes no channels", tex.opcode));
        return Ok(true);
    }

    let dialect = state.dialect();
    let has_offset = tex.offset[..2].iter().any(|&o| o != 0);
    let lod = match level {
        Level::Implicit => SampleLod::Implicit,
        Level::Explicit | Level::Zero => SampleLod::Explicit,
        Level::Bias if has_offset => return Ok(false),
        Level::Bias => SampleLod::Bias,
    };

    let Some(coords) = coordinates(dialect, &tex.src) else {
        return Ok(false);
    };
    let level_arg = match level {
        Level::Implicit => None,
        Level::Zero => Some("0.0".to_owned()),
        Level::Explicit | Level::Bias => match component(&tex.src, tex.src.sel[3]) {
            Some(text) => Some(text),
            None => return Ok(false),
        },
    };

    write!(
        state,
        "R{}.{written} = {}{coords}",
        tex.dst.id,
        dialect.sample(tex.sampler_id, lod, has_offset)
    );
    if let Some(level_arg) = level_arg {
        write!(state, ", {level_arg}");
    }
    if has_offset {
        write!(
            state,
            ", {}({}, {})",
            dialect.int_vector(2),
            tex.offset[0],
            tex.offset[1]
        );
    }
    write!(state, ").{selected}");
    Ok(true)
}

/// Two-component coordinate expression, or `None` when a coordinate lane is masked.
fn coordinates(dialect: Dialect, src: &FetchRegister) -> Option<String> {
    let sel = &src.sel[..2];
    if sel.iter().all(|s| matches!(s, Select::X | Select::Y | Select::Z | Select::W)) {
        let swizzle: String = sel.iter().map(|s| s.as_char()).collect();
        return Some(format!("R{}.{swizzle}", src.id));
    }

    let x = component(src, sel[0])?;
    let y = component(src, sel[1])?;
    Some(format!("{}({x}, {y})", dialect.float_vector(2)))
}

fn component(src: &FetchRegister, sel: Select) -> Option<String> {
    match sel {
        Select::X | Select::Y | Select::Z | Select::W => {
            Some(format!("R{}.{}", src.id, sel.as_char()))
        }
        Select::Zero => Some("0.0".to_owned()),
        Select::One => Some("1.0".to_owned()),
        Select::Mask => None,
    }
}
