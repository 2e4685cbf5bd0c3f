use crate::error::ShaderError;
use crate::ir::{AluInstruction, AluReductionInstruction, AluSource, Channel, Unit, ValueType};
use crate::opcodes::Op2;

use super::alu::{assign, operand, source, source_text};
use super::{EmitState, EmitterRegistry};

type Result = std::result::Result<bool, ShaderError>;

pub(super) fn register(registry: &mut EmitterRegistry) {
    registry.add_reduction(Op2::Dot4, dot4);
    registry.add_reduction(Op2::Dot4Ieee, dot4);
    registry.add_reduction(Op2::Max4, max4);
    registry.add_reduction(Op2::Cube, cube);
}

/// All four lanes, in channel order.
fn lanes(red: &AluReductionInstruction) -> std::result::Result<[&AluInstruction; 4], ShaderError> {
    let lane = move |i: usize| {
        red.units[i].as_ref().ok_or_else(|| {
            ShaderError::invariant(format!(
                "{} at cf {} group {} is missing lane {i}",
                red.opcode, red.cf_pc, red.group_pc
            ))
        })
    };
    Ok([lane(0)?, lane(1)?, lane(2)?, lane(3)?])
}

/// Lane whose destination receives the result, and the unit used for PV.
///
/// The previous-value result is always `PV.x`, whichever lane is write-masked. Without a
/// write-masked lane the result only lands there.
fn target(red: &AluReductionInstruction) -> std::result::Result<(&AluInstruction, Unit), ShaderError> {
    let mut masked = red.units.iter().flatten().filter(|lane| lane.write_mask);
    match (masked.next(), masked.next()) {
        (Some(lane), None) => Ok((lane, Unit::X)),
        (Some(_), Some(_)) => Err(ShaderError::invariant(format!(
            "{} at cf {} group {} writes more than one lane",
            red.opcode, red.cf_pc, red.group_pc
        ))),
        (None, _) => {
            let [first, ..] = lanes(red)?;
            Ok((first, Unit::X))
        }
    }
}

fn dot4(state: &mut EmitState<'_>, red: &AluReductionInstruction) -> Result {
    let lanes = lanes(red)?;
    let (dest, unit) = target(red)?;
    let vec4 = state.dialect().float_vector(4);

    assign(state, dest, unit, |s| {
        s.push_str("dot(");
        for (operand, sep) in [(0, ", "), (1, ")")] {
            write!(s, "{vec4}(");
            for (i, lane) in lanes.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                source(s, lane, operand)?;
            }
            s.push(')');
            s.push_str(sep);
        }
        Ok(true)
    })
}

fn max4(state: &mut EmitState<'_>, red: &AluReductionInstruction) -> Result {
    let [x, y, z, w] = lanes(red)?;
    let (dest, unit) = target(red)?;

    assign(state, dest, unit, |s| {
        s.push_str("max(max(");
        source(s, x, 0)?;
        s.push_str(", ");
        source(s, y, 0)?;
        s.push_str("), max(");
        source(s, z, 0)?;
        s.push_str(", ");
        source(s, w, 0)?;
        s.push_str("))");
        Ok(true)
    })
}

fn same_operand(a: &AluSource, b: &AluSource) -> bool {
    a.kind == b.kind && a.id == b.id && a.chan == b.chan && a.rel == b.rel
}

/// Cube map face selection, `CUBE R<out>, R<in>.zzxy, R<in>.yxzz`.
///
/// Writes `(t, s, 2 * major axis, face id)` into a local vector, then hands each lane its
/// component through the usual PV/GPR destination.
fn cube(state: &mut EmitState<'_>, red: &AluReductionInstruction) -> Result {
    let lanes = lanes(red)?;
    let x = operand(lanes[2], 0)?;
    let y = operand(lanes[3], 0)?;
    let z = operand(lanes[0], 0)?;
    let consistent = same_operand(operand(lanes[1], 0)?, z)
        && same_operand(operand(lanes[0], 1)?, y)
        && same_operand(operand(lanes[1], 1)?, x)
        && same_operand(operand(lanes[2], 1)?, z)
        && same_operand(operand(lanes[3], 1)?, z);
    if !consistent {
        tracing::debug!(
            cf_pc = red.cf_pc,
            group_pc = red.group_pc,
            "CUBE operands are not in zzxy/yxzz form"
        );
        return Ok(false);
    }

    let vec4 = state.dialect().float_vector(4);
    let x = source_text(state, x, ValueType::Float);
    let y = source_text(state, y, ValueType::Float);
    let z = source_text(state, z, ValueType::Float);

    state.push('{');
    state.indent();
    state.newline();
    write!(state, "{vec4} cube;");
    state.newline();
    write!(state, "if (abs({x}) >= abs({y}) && abs({x}) >= abs({z})) {{");
    state.indent();
    state.newline();
    write!(
        state,
        "cube = {vec4}({y}, sign({x}) * {z}, {x} * 2.0, ({x} >= 0.0) ? 0.0 : 1.0);"
    );
    state.dedent();
    state.newline();
    write!(state, "}} else if (abs({y}) >= abs({x}) && abs({y}) >= abs({z})) {{");
    state.indent();
    state.newline();
    write!(
        state,
        "cube = {vec4}(sign({y}) * -({x}), -({z}), {y} * 2.0, ({y} >= 0.0) ? 2.0 : 3.0);"
    );
    state.dedent();
    state.newline();
    state.push_str("} else {");
    state.indent();
    state.newline();
    write!(
        state,
        "cube = {vec4}({y}, sign({z}) * -({x}), {z} * 2.0, ({z} >= 0.0) ? 4.0 : 5.0);"
    );
    state.dedent();
    state.newline();
    state.push('}');

    let pv_used = state.shader().pv_used.contains(&red.group_pc);
    for (i, lane) in lanes.into_iter().enumerate() {
        if !pv_used && !lane.write_mask {
            continue;
        }
        state.newline();
        let component = Channel::ALL[i].as_char();
        assign(state, lane, Unit::from_index(i), |s| {
            write!(s, "cube.{component}");
            Ok(true)
        })?;
        state.push(';');
    }

    state.dedent();
    state.newline();
    state.push('}');
    state.terminate();
    Ok(true)
}
