//! Destination and operand formatting shared by the ALU emitters.

use crate::error::ShaderError;
use crate::ir::{
    AluInstruction, AluSource, IndexMode, OutputModifier, SourceKind, Unit, ValueType,
};

use super::{Dialect, EmitState};

/// Writes `dest = value`, with `value` produced by the closure.
///
/// The previous-value register of the unit is targeted when the next group reads it, the GPR when
/// the write mask is set. The value is wrapped in the destination bit cast, then the output
/// modifier, then the clamp.
pub(super) fn assign(
    state: &mut EmitState<'_>,
    alu: &AluInstruction,
    unit: Unit,
    value: impl FnOnce(&mut EmitState<'_>) -> Result<bool, ShaderError>,
) -> Result<bool, ShaderError> {
    let shader = state.shader();
    let group = alu.group_pc;
    let shadowed = |used: &std::collections::BTreeSet<u32>| {
        group.checked_sub(1).is_some_and(|prev| used.contains(&prev))
    };

    match unit.channel() {
        Some(chan) if shader.pv_used.contains(&group) => {
            let name = if shadowed(&shader.pv_used) { "PVo" } else { "PV" };
            write!(state, "{name}.{} = ", chan.as_char());
        }
        None if shader.ps_used.contains(&group) => {
            let name = if shadowed(&shader.ps_used) { "PSo" } else { "PS" };
            write!(state, "{name} = ");
        }
        _ => {}
    }

    if alu.write_mask {
        write!(state, "R{}.{} = ", alu.dest.id, alu.dest.chan.as_char());
    }

    let dialect = state.dialect();
    if alu.dest.clamp {
        state.push_str("clamp(");
    }
    if alu.omod != OutputModifier::Off {
        state.push('(');
    }
    let cast = match alu.dest.value_type {
        ValueType::Float => None,
        ValueType::Int => Some(dialect.int_to_float_bits()),
        ValueType::Uint => Some(dialect.uint_to_float_bits()),
    };
    if let Some(cast) = cast {
        state.push_str(cast);
    }

    if !value(state)? {
        return Ok(false);
    }

    if cast.is_some() {
        state.push(')');
    }
    match alu.omod {
        OutputModifier::Off => {}
        OutputModifier::Multiply2 => state.push_str(") * 2"),
        OutputModifier::Multiply4 => state.push_str(") * 4"),
        OutputModifier::Divide2 => state.push_str(") / 2"),
    }
    if alu.dest.clamp {
        state.push_str(", 0, 1)");
    }
    Ok(true)
}

/// Writes source operand `index` read as its decoded value type.
pub(super) fn source(
    state: &mut EmitState<'_>,
    alu: &AluInstruction,
    index: usize,
) -> Result<(), ShaderError> {
    let src = operand(alu, index)?;
    source_as(state, src, src.value_type);
    Ok(())
}

pub(super) fn operand(alu: &AluInstruction, index: usize) -> Result<&AluSource, ShaderError> {
    alu.sources.get(index).ok_or_else(|| {
        ShaderError::invariant(format!(
            "{} at cf {} has no source {index}",
            alu.opcode.name(),
            alu.cf_pc
        ))
    })
}

/// Writes `src` read as `ty`, including negate and absolute-value wraps.
pub(super) fn source_as(state: &mut EmitState<'_>, src: &AluSource, ty: ValueType) {
    let text = source_text(state, src, ty);
    state.push_str(&text);
}

/// Text of `src` read as `ty`, for emitters that repeat an operand.
pub(super) fn source_text(state: &EmitState<'_>, src: &AluSource, ty: ValueType) -> String {
    let mut text = operand_text(state, src, ty);
    if src.negate {
        text = if text.starts_with('-') {
            format!("-({text})")
        } else {
            format!("-{text}")
        };
    }
    if src.absolute {
        text = format!("abs({text})");
    }
    text
}

fn operand_text(state: &EmitState<'_>, src: &AluSource, ty: ValueType) -> String {
    let dialect = state.dialect();
    let stage = state.shader().ty;
    let chan = src.chan.as_char();

    let read = match src.kind {
        SourceKind::Register => format!("R{}.{chan}", src.id),
        SourceKind::UniformBlock { block } => format!(
            "{}{}{}].{chan}",
            dialect.uniform_block(stage, block),
            src.id,
            relative(src.rel)
        ),
        SourceKind::ConstantFile => format!(
            "{}{}{}].{chan}",
            dialect.constant_file(stage),
            src.id,
            relative(src.rel)
        ),
        SourceKind::PreviousVector => format!("PV.{chan}"),
        SourceKind::PreviousScalar => "PS".to_owned(),
        SourceKind::ConstantFloat(value) => {
            let text = float_literal(dialect, value);
            return match ty {
                ValueType::Float => text,
                ValueType::Int => format!("{}{text})", dialect.to_int()),
                ValueType::Uint => format!("{}{text})", dialect.to_uint()),
            };
        }
        SourceKind::ConstantInt(value) => return value.to_string(),
        SourceKind::Literal(bits) => return literal(dialect, bits, ty),
    };

    match ty {
        ValueType::Float => read,
        ValueType::Int => format!("{}{read})", dialect.float_to_int_bits()),
        ValueType::Uint => format!("{}{read})", dialect.float_to_uint_bits()),
    }
}

fn relative(rel: Option<IndexMode>) -> &'static str {
    match rel {
        None => "",
        Some(IndexMode::ArX) => " + AR.x",
        Some(IndexMode::ArY) => " + AR.y",
        Some(IndexMode::ArZ) => " + AR.z",
        Some(IndexMode::ArW) => " + AR.w",
        Some(IndexMode::Loop) => " + AL",
    }
}

/// Inline literal interpreted as `ty`.
pub(crate) fn literal(dialect: Dialect, bits: u32, ty: ValueType) -> String {
    match ty {
        ValueType::Float => float_literal(dialect, f32::from_bits(bits)),
        ValueType::Int => (bits as i32).to_string(),
        ValueType::Uint => format!("{bits}u"),
    }
}

/// `{:.6}f`, or an exact bit cast when six decimals do not reproduce the value.
pub(crate) fn float_literal(dialect: Dialect, value: f32) -> String {
    let text = format!("{value:.6}");
    let exact = value.is_finite()
        && text
            .parse::<f32>()
            .is_ok_and(|parsed| parsed.to_bits() == value.to_bits());
    if exact {
        format!("{text}f")
    } else {
        format!("{}0x{:08x}u)", dialect.uint_to_float_bits(), value.to_bits())
    }
}
