use crate::error::ShaderError;
use crate::ir::{AluInstruction, SourceKind, ValueType};
use crate::opcodes::Op3;

use super::alu::{assign, operand, source, source_as};
use super::{EmitState, EmitterRegistry};

type Result = std::result::Result<bool, ShaderError>;

pub(super) fn register(registry: &mut EmitterRegistry) {
    use Op3::*;

    for op in [Muladd, MuladdIeee] {
        registry.add_op3(op, |s, alu| muladd(s, alu, None));
    }
    for op in [MuladdM2, MuladdIeeeM2] {
        registry.add_op3(op, |s, alu| muladd(s, alu, Some(" * 2")));
    }
    for op in [MuladdM4, MuladdIeeeM4] {
        registry.add_op3(op, |s, alu| muladd(s, alu, Some(" * 4")));
    }
    for op in [MuladdD2, MuladdIeeeD2] {
        registry.add_op3(op, |s, alu| muladd(s, alu, Some(" / 2")));
    }

    for op in [Cnde, CndeInt] {
        registry.add_op3(op, |s, alu| cnd(s, alu, "=="));
    }
    for op in [Cndgt, CndgtInt] {
        registry.add_op3(op, |s, alu| cnd(s, alu, ">"));
    }
    for op in [Cndge, CndgeInt] {
        registry.add_op3(op, |s, alu| cnd(s, alu, ">="));
    }
}

/// `a * b + c`, optionally scaled as a whole.
fn muladd(state: &mut EmitState<'_>, alu: &AluInstruction, scale: Option<&str>) -> Result {
    assign(state, alu, alu.unit, |s| {
        if scale.is_some() {
            s.push('(');
        }
        source(s, alu, 0)?;
        s.push_str(" * ");
        source(s, alu, 1)?;
        s.push_str(" + ");
        source(s, alu, 2)?;
        if let Some(scale) = scale {
            s.push(')');
            s.push_str(scale);
        }
        Ok(true)
    })
}

/// `((a <op> 0) ? b : c)`; the selected operands always move float bits.
fn cnd(state: &mut EmitState<'_>, alu: &AluInstruction, op: &str) -> Result {
    assign(state, alu, alu.unit, |s| {
        s.push_str("((");
        source(s, alu, 0)?;
        write!(s, " {op} 0) ? ");
        selected(s, alu, 1)?;
        s.push_str(" : ");
        selected(s, alu, 2)?;
        s.push(')');
        Ok(true)
    })
}

fn selected(
    state: &mut EmitState<'_>,
    alu: &AluInstruction,
    index: usize,
) -> std::result::Result<(), ShaderError> {
    let src = operand(alu, index)?;
    let ty = match src.kind {
        SourceKind::ConstantInt(_) | SourceKind::Literal(_) => src.value_type,
        _ => ValueType::Float,
    };
    source_as(state, src, ty);
    Ok(())
}
