use crate::error::ShaderError;
use crate::ir::CfInstruction;
use crate::opcodes::CfOpcode;

use super::{EmitState, EmitterRegistry};

pub(super) fn register(registry: &mut EmitterRegistry) {
    registry.add_cf(CfOpcode::LoopBreak, |s, _| keyword(s, "break"));
    registry.add_cf(CfOpcode::LoopContinue, |s, _| keyword(s, "continue"));

    // Stack bookkeeping is already expressed by the block structure.
    for op in [
        CfOpcode::Push,
        CfOpcode::PushElse,
        CfOpcode::Pop,
        CfOpcode::PopPush,
        CfOpcode::PopPushElse,
        CfOpcode::Else,
    ] {
        registry.add_cf(op, marker);
    }
}

fn keyword(state: &mut EmitState<'_>, word: &str) -> Result<bool, ShaderError> {
    state.push_str(word);
    Ok(true)
}

fn marker(state: &mut EmitState<'_>, cf: &CfInstruction) -> Result<bool, ShaderError> {
    state.comment(cf.opcode.name());
    Ok(true)
}
