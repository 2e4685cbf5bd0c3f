use crate::error::ShaderError;
use crate::ir::{AluInstruction, ValueType};
use crate::opcodes::Op2;

use super::alu::{assign, source};
use super::{EmitState, EmitterRegistry};

type Result = std::result::Result<bool, ShaderError>;

pub(super) fn register(registry: &mut EmitterRegistry) {
    use Op2::*;

    for op in [Add, AddInt] {
        registry.add_op2(op, |s, alu| infix(s, alu, "+"));
    }
    registry.add_op2(SubInt, sub_int);
    for op in [Mul, MulIeee, MulloInt, MulloUint] {
        registry.add_op2(op, |s, alu| infix(s, alu, "*"));
    }
    registry.add_op2(AndInt, |s, alu| infix(s, alu, "&"));
    registry.add_op2(OrInt, |s, alu| infix(s, alu, "|"));
    registry.add_op2(XorInt, |s, alu| infix(s, alu, "^"));
    registry.add_op2(NotInt, |s, alu| prefix(s, alu, "~"));
    registry.add_op2(AshrInt, shift_right);
    registry.add_op2(LshrInt, shift_right);
    registry.add_op2(LshlInt, |s, alu| infix(s, alu, "<<"));

    for op in [Max, MaxDx10, MaxInt, MaxUint] {
        registry.add_op2(op, |s, alu| call2(s, alu, "max"));
    }
    for op in [Min, MinDx10, MinInt, MinUint] {
        registry.add_op2(op, |s, alu| call2(s, alu, "min"));
    }

    registry.add_op2(Mov, |s, alu| prefix(s, alu, ""));
    registry.add_op2(MovaFloor, mova_floor);
    registry.add_op2(MovaInt, mova_int);

    registry.add_op2(Ceil, |s, alu| call1(s, alu, "ceil"));
    registry.add_op2(Floor, |s, alu| call1(s, alu, "floor"));
    registry.add_op2(Trunc, |s, alu| call1(s, alu, "trunc"));
    registry.add_op2(Fract, |s, alu| {
        let name = s.dialect().fract();
        call1(s, alu, name)
    });
    registry.add_op2(Rndne, |s, alu| {
        let name = s.dialect().round_even();
        call1(s, alu, name)
    });
    registry.add_op2(Sin, |s, alu| call1(s, alu, "sin"));
    registry.add_op2(Cos, |s, alu| call1(s, alu, "cos"));
    registry.add_op2(ExpIeee, |s, alu| call1(s, alu, "exp2"));
    for op in [LogIeee, LogClamped] {
        registry.add_op2(op, |s, alu| call1(s, alu, "log2"));
    }
    for op in [RecipIeee, RecipClamped, RecipFf] {
        registry.add_op2(op, recip);
    }
    for op in [RecipsqrtIeee, RecipsqrtClamped, RecipsqrtFf] {
        registry.add_op2(op, |s, alu| {
            let name = s.dialect().inverse_sqrt();
            call1(s, alu, name)
        });
    }
    registry.add_op2(SqrtIeee, |s, alu| call1(s, alu, "sqrt"));

    registry.add_op2(FltToInt, |s, alu| {
        let open = s.dialect().to_int();
        convert(s, alu, open)
    });
    registry.add_op2(FltToUint, |s, alu| {
        let open = s.dialect().to_uint();
        convert(s, alu, open)
    });
    for op in [IntToFlt, UintToFlt] {
        registry.add_op2(op, |s, alu| {
            let open = s.dialect().to_float();
            convert(s, alu, open)
        });
    }

    for op in [PredSete, PredSeteInt] {
        registry.add_op2(op, |s, alu| pred_set(s, alu, "=="));
    }
    for op in [PredSetgt, PredSetgtInt, PredSetgtUint] {
        registry.add_op2(op, |s, alu| pred_set(s, alu, ">"));
    }
    for op in [PredSetge, PredSetgeInt, PredSetgeUint] {
        registry.add_op2(op, |s, alu| pred_set(s, alu, ">="));
    }
    for op in [PredSetne, PredSetneInt] {
        registry.add_op2(op, |s, alu| pred_set(s, alu, "!="));
    }

    for op in [Sete, SeteDx10, SeteInt] {
        registry.add_op2(op, |s, alu| set(s, alu, "=="));
    }
    for op in [Setgt, SetgtDx10, SetgtInt, SetgtUint] {
        registry.add_op2(op, |s, alu| set(s, alu, ">"));
    }
    for op in [Setge, SetgeDx10, SetgeInt, SetgeUint] {
        registry.add_op2(op, |s, alu| set(s, alu, ">="));
    }
    for op in [Setne, SetneDx10, SetneInt] {
        registry.add_op2(op, |s, alu| set(s, alu, "!="));
    }
}

/// `a <op> b`
fn infix(state: &mut EmitState<'_>, alu: &AluInstruction, op: &str) -> Result {
    assign(state, alu, alu.unit, |s| {
        source(s, alu, 0)?;
        write!(s, " {op} ");
        source(s, alu, 1)?;
        Ok(true)
    })
}

/// `<op>a`
fn prefix(state: &mut EmitState<'_>, alu: &AluInstruction, op: &str) -> Result {
    assign(state, alu, alu.unit, |s| {
        s.push_str(op);
        source(s, alu, 0)?;
        Ok(true)
    })
}

fn sub_int(state: &mut EmitState<'_>, alu: &AluInstruction) -> Result {
    assign(state, alu, alu.unit, |s| {
        source(s, alu, 1)?;
        s.push_str(" - ");
        source(s, alu, 0)?;
        Ok(true)
    })
}

/// Shift amounts only use the low five bits.
fn shift_right(state: &mut EmitState<'_>, alu: &AluInstruction) -> Result {
    assign(state, alu, alu.unit, |s| {
        source(s, alu, 0)?;
        s.push_str(" >> (");
        source(s, alu, 1)?;
        s.push_str(" & 0x1f)");
        Ok(true)
    })
}

fn call1(state: &mut EmitState<'_>, alu: &AluInstruction, name: &str) -> Result {
    assign(state, alu, alu.unit, |s| {
        write!(s, "{name}(");
        source(s, alu, 0)?;
        s.push(')');
        Ok(true)
    })
}

fn call2(state: &mut EmitState<'_>, alu: &AluInstruction, name: &str) -> Result {
    assign(state, alu, alu.unit, |s| {
        write!(s, "{name}(");
        source(s, alu, 0)?;
        s.push_str(", ");
        source(s, alu, 1)?;
        s.push(')');
        Ok(true)
    })
}

/// Value conversion; `open` already contains the opening parenthesis.
fn convert(state: &mut EmitState<'_>, alu: &AluInstruction, open: &str) -> Result {
    assign(state, alu, alu.unit, |s| {
        s.push_str(open);
        source(s, alu, 0)?;
        s.push(')');
        Ok(true)
    })
}

fn recip(state: &mut EmitState<'_>, alu: &AluInstruction) -> Result {
    let (open, close) = state.dialect().reciprocal();
    assign(state, alu, alu.unit, |s| {
        s.push_str(open);
        source(s, alu, 0)?;
        s.push_str(close);
        Ok(true)
    })
}

fn mova_floor(state: &mut EmitState<'_>, alu: &AluInstruction) -> Result {
    let int = state.dialect().to_int();
    write!(state, "AR.{} = {int}floor(", alu.dest.chan.as_char());
    source(state, alu, 0)?;
    state.push_str("))");
    Ok(true)
}

fn mova_int(state: &mut EmitState<'_>, alu: &AluInstruction) -> Result {
    write!(state, "AR.{} = ", alu.dest.chan.as_char());
    source(state, alu, 0)?;
    Ok(true)
}

/// The bare comparison as a branch condition, a 0/1 assignment as a statement.
fn pred_set(state: &mut EmitState<'_>, alu: &AluInstruction, op: &str) -> Result {
    if state.in_condition() {
        source(state, alu, 0)?;
        write!(state, " {op} ");
        source(state, alu, 1)?;
        return Ok(true);
    }
    set(state, alu, op)
}

fn set(state: &mut EmitState<'_>, alu: &AluInstruction, op: &str) -> Result {
    let (on, off) = match alu.dest.value_type {
        ValueType::Float => ("1.0f", "0.0f"),
        ValueType::Int | ValueType::Uint => ("1", "0"),
    };
    assign(state, alu, alu.unit, |s| {
        s.push('(');
        source(s, alu, 0)?;
        write!(s, " {op} ");
        source(s, alu, 1)?;
        write!(s, ") ? {on} : {off}");
        Ok(true)
    })
}
