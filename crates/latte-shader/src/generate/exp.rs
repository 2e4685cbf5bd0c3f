use crate::error::ShaderError;
use crate::ir::{ExportInstruction, ExportType, Select, ShaderType, POSITION_EXPORT_BASE};
use crate::opcodes::ExpOpcode;

use super::{EmitState, EmitterRegistry};

pub(super) fn register(registry: &mut EmitterRegistry) {
    registry.add_export(ExpOpcode::Exp, export);
    registry.add_export(ExpOpcode::ExpDone, export);
}

fn export(state: &mut EmitState<'_>, exp: &ExportInstruction) -> Result<bool, ShaderError> {
    let stage = state.shader().ty;
    let allowed = match exp.ty {
        ExportType::Pixel => stage == ShaderType::Pixel,
        ExportType::Position | ExportType::Parameter => stage == ShaderType::Vertex,
    };
    if !allowed {
        return Err(ShaderError::invariant(format!(
            "{:?} export at cf {} in a {} shader",
            exp.ty,
            exp.cf_pc,
            stage.name()
        )));
    }

    if exp.ty == ExportType::Position
        && (exp.raw_array_base < POSITION_EXPORT_BASE
            || exp.dst_reg != exp.raw_array_base - POSITION_EXPORT_BASE)
    {
        return Err(ShaderError::invariant(format!(
            "position export at cf {} targets slot {} with array base {}",
            exp.cf_pc, exp.dst_reg, exp.raw_array_base
        )));
    }

    if exp.ty == ExportType::Pixel && exp.src.sel.contains(&Select::Mask) {
        tracing::warn!(
            cf_pc = exp.cf_pc,
            target = exp.dst_reg,
            "masked pixel export channel written as 0.0"
        );
    }

    let dialect = state.dialect();
    let target = dialect.export_name(exp.ty, exp.dst_reg);
    let sel = exp.src.sel;
    if sel.iter().all(|s| matches!(s, Select::X | Select::Y | Select::Z | Select::W)) {
        let swizzle: String = sel.iter().map(|s| s.as_char()).collect();
        write!(state, "{target} = R{}.{swizzle}", exp.src.id);
        return Ok(true);
    }

    write!(state, "{target} = {}(", dialect.float_vector(4));
    for (i, s) in sel.into_iter().enumerate() {
        if i > 0 {
            state.push_str(", ");
        }
        match s {
            Select::X | Select::Y | Select::Z | Select::W => {
                write!(state, "R{}.{}", exp.src.id, s.as_char());
            }
            Select::One => state.push_str("1.0"),
            Select::Zero | Select::Mask => state.push_str("0.0"),
        }
    }
    state.push(')');
    Ok(true)
}
