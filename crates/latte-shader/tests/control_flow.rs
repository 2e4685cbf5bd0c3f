mod common;

use std::collections::BTreeSet;

use common::*;
use latte_shader::{
    analyse, blockify, decode, generate_body, Block, Dialect, EmitterRegistry, InstrId, Shader,
    ShaderError, ShaderType,
};
use pretty_assertions::assert_eq;

fn prepare(ty: ShaderType, bytes: &[u8]) -> Shader {
    let mut shader = decode(ty, bytes).unwrap();
    blockify(&mut shader).unwrap();
    analyse(&mut shader).unwrap();
    shader
}

fn body(shader: &Shader) -> String {
    let body = generate_body(shader, EmitterRegistry::global(), Dialect::Glsl).unwrap();
    assert!(body.complete, "incomplete body:\n{}", body.source);
    body.source
}

fn code(ids: &[usize]) -> Block {
    Block::Code(ids.iter().copied().map(InstrId).collect())
}

/// loop { if (R0.x > R1.x) break; R0.x += 1.0 } then export the position.
fn loop_with_break() -> Vec<u8> {
    Program::new()
        .cf(CF_LOOP_START_DX10, 4, 0)
        .alu(
            ALU_BREAK,
            vec![group(
                &[op2(OP2_PRED_SETGT, 0, SEL_X, &[gpr(0, SEL_X), gpr(1, SEL_X)]).branch()],
                &[],
            )],
        )
        .alu(
            ALU,
            vec![group(
                &[op2(OP2_ADD, 0, SEL_X, &[gpr(0, SEL_X), special(SRC_1, SEL_X)])],
                &[],
            )],
        )
        .cf(CF_LOOP_END, 1, 0)
        .export(EXP_DONE, EXPORT_POSITION, 60, 0, XYZW)
        .end()
        .bytes()
}

/// if (R0.x == 0.0) R1.x = 1.0 else R1.x = 0.0, then write R1 to the first render target.
fn if_else() -> Vec<u8> {
    Program::new()
        .alu(
            ALU_PUSH_BEFORE,
            vec![group(
                &[op2(OP2_PRED_SETE, 0, SEL_X, &[gpr(0, SEL_X), special(SRC_0, SEL_X)]).branch()],
                &[],
            )],
        )
        .cf(CF_JUMP, 3, 0)
        .alu(
            ALU,
            vec![group(&[op2(OP2_MOV, 1, SEL_X, &[special(SRC_1, SEL_X)])], &[])],
        )
        .cf(CF_ELSE, 5, 1)
        .alu(
            ALU,
            vec![group(&[op2(OP2_MOV, 1, SEL_X, &[special(SRC_0, SEL_X)])], &[])],
        )
        .cf(CF_POP, 6, 1)
        .export(EXP_DONE, EXPORT_PIXEL, 0, 1, [SEL_X; 4])
        .end()
        .bytes()
}

#[test]
fn alu_break_becomes_conditional_break_inside_loop() {
    let shader = prepare(ShaderType::Vertex, &loop_with_break());

    // 0 LOOP_START_DX10, 1 PUSH, 2 PRED_SETGT, 3 LOOP_BREAK, 4 POP, 5 ADD, 6 LOOP_END, 7 EXP_DONE
    assert_eq!(shader.code.len(), 8);
    assert_eq!(
        shader.blocks,
        vec![
            Block::Loop {
                inner: vec![
                    code(&[1]),
                    Block::Conditional {
                        condition: InstrId(2),
                        inner: vec![code(&[3])],
                        inner_else: vec![],
                    },
                    code(&[4, 5]),
                ],
            },
            code(&[7]),
        ]
    );

    assert_eq!(
        body(&shader),
        "\
while (true) {
   // PUSH
   // groupPC = 0
   if (R0.x > R1.x) {
      break;
   }
   // POP
   // groupPC = 1
   R0.x = R0.x + 1.000000f;
}
exp_position_0 = R0.xyzw;
"
    );
}

#[test]
fn loop_without_branches_holds_its_clause() {
    let bytes = Program::new()
        .cf(CF_LOOP_START_DX10, 3, 0)
        .alu(
            ALU,
            vec![group(
                &[op2(OP2_ADD, 0, SEL_X, &[gpr(0, SEL_X), special(SRC_1, SEL_X)])],
                &[],
            )],
        )
        .cf(CF_LOOP_END, 1, 0)
        .export(EXP_DONE, EXPORT_POSITION, 60, 0, XYZW)
        .end()
        .bytes();
    let shader = prepare(ShaderType::Vertex, &bytes);

    // 0 LOOP_START, 1 ADD, 2 LOOP_END, 3 EXP_DONE
    assert_eq!(
        shader.blocks,
        vec![
            Block::Loop {
                inner: vec![code(&[1])],
            },
            code(&[3]),
        ]
    );

    assert_eq!(
        body(&shader),
        "\
while (true) {
   // groupPC = 0
   R0.x = R0.x + 1.000000f;
}
exp_position_0 = R0.xyzw;
"
    );
}

#[test]
fn jump_and_else_become_if_else() {
    let shader = prepare(ShaderType::Pixel, &if_else());

    // 0 PUSH, 1 PRED_SETE, 2 JUMP, 3 MOV, 4 ELSE, 5 MOV, 6 POP, 7 EXP_DONE
    assert_eq!(
        shader.blocks,
        vec![
            code(&[0]),
            Block::Conditional {
                condition: InstrId(1),
                inner: vec![code(&[3])],
                inner_else: vec![code(&[5])],
            },
            code(&[6, 7]),
        ]
    );

    assert_eq!(
        body(&shader),
        "\
// PUSH
// groupPC = 0
if (R0.x == 0.000000f) {
   // groupPC = 1
   R1.x = 1.000000f;
} else {
   // groupPC = 2
   R1.x = 0.000000f;
}
// POP
exp_pixel_0 = R1.xxxx;
"
    );
}

#[test]
fn block_dump_shows_recovered_structure() {
    let shader = prepare(ShaderType::Pixel, &if_else());
    assert_eq!(
        shader.dump_blocks(),
        "\
0 PUSH
if(0 PRED_SETE) {
  2 MOV
} else {
  4 MOV
} // END_COND
5 POP
6 EXP_DONE
"
    );
}

#[test]
fn write_masked_predicate_branches_on_written_register() {
    let bytes = Program::new()
        .alu(
            ALU_PUSH_BEFORE,
            vec![group(
                &[op2(OP2_PRED_SETE_INT, 2, SEL_X, &[gpr(0, SEL_X), gpr(1, SEL_Y)]).branch()],
                &[],
            )],
        )
        .cf(CF_JUMP, 3, 0)
        .alu(
            ALU,
            vec![group(&[op2(OP2_MOV, 1, SEL_X, &[special(SRC_1, SEL_X)])], &[])],
        )
        .cf(CF_POP, 4, 1)
        .export(EXP_DONE, EXPORT_PIXEL, 0, 1, XYZW)
        .end()
        .bytes();
    let shader = prepare(ShaderType::Pixel, &bytes);
    let source = body(&shader);
    assert!(
        source.contains("if (floatBitsToInt(R0.x) == floatBitsToInt(R1.y)) {\n"),
        "{source}"
    );

    let masked = Program::new()
        .alu(
            ALU_PUSH_BEFORE,
            vec![group(
                &[op2(OP2_PRED_SETE_INT, 2, SEL_X, &[gpr(0, SEL_X), gpr(1, SEL_Y)])],
                &[],
            )],
        )
        .cf(CF_JUMP, 3, 0)
        .alu(
            ALU,
            vec![group(&[op2(OP2_MOV, 1, SEL_X, &[special(SRC_1, SEL_X)])], &[])],
        )
        .cf(CF_POP, 4, 1)
        .export(EXP_DONE, EXPORT_PIXEL, 0, 1, XYZW)
        .end()
        .bytes();
    let shader = prepare(ShaderType::Pixel, &masked);
    let source = body(&shader);
    assert!(
        source.contains(
            "R2.x = (floatBitsToInt(R0.x) == floatBitsToInt(R1.y)) ? 1.0f : 0.0f;\n\
             if (R2.x != 0.000000f) {\n"
        ),
        "{source}"
    );
}

#[test]
fn predicate_without_exec_update_branches_on_bare_comparison() {
    let bytes = Program::new()
        .alu(
            ALU_PUSH_BEFORE,
            vec![group(
                &[Alu {
                    update_pred: true,
                    ..op2(OP2_PRED_SETE, 0, SEL_X, &[gpr(0, SEL_X), gpr(1, SEL_Y)]).no_write()
                }],
                &[],
            )],
        )
        .cf(CF_JUMP, 3, 0)
        .alu(
            ALU,
            vec![group(&[op2(OP2_MOV, 1, SEL_X, &[special(SRC_1, SEL_X)])], &[])],
        )
        .cf(CF_POP, 4, 1)
        .export(EXP_DONE, EXPORT_PIXEL, 0, 1, XYZW)
        .end()
        .bytes();
    let shader = prepare(ShaderType::Pixel, &bytes);

    assert_eq!(
        body(&shader),
        "\
// PUSH
// groupPC = 0
if (R0.x == R1.y) {
   // groupPC = 1
   R1.x = 1.000000f;
}
// POP
exp_pixel_0 = R1.xyzw;
"
    );
}

#[test]
fn previous_vector_is_shadowed_across_consecutive_groups() {
    let bytes = Program::new()
        .alu(
            ALU,
            vec![
                group(&[op2(OP2_MOV, 1, SEL_X, &[gpr(0, SEL_X)])], &[]),
                group(
                    &[op2(OP2_ADD, 2, SEL_X, &[special(SRC_PV, SEL_X), gpr(0, SEL_Y)])],
                    &[],
                ),
                group(
                    &[op2(OP2_ADD, 3, SEL_X, &[special(SRC_PV, SEL_X), special(SRC_1, SEL_X)])],
                    &[],
                ),
            ],
        )
        .export(EXP_DONE, EXPORT_PIXEL, 0, 3, XYZW)
        .end()
        .bytes();
    let shader = prepare(ShaderType::Pixel, &bytes);

    assert_eq!(shader.pv_used, BTreeSet::from([0, 1]));
    assert!(shader.ps_used.is_empty());
    assert_eq!(
        body(&shader),
        "\
// groupPC = 0
PV.x = R1.x = R0.x;
// groupPC = 1
PVo.x = R2.x = PV.x + R0.y;
PV = PVo;
// groupPC = 2
R3.x = PV.x + 1.000000f;
exp_pixel_0 = R3.xyzw;
"
    );
}

#[test]
fn generation_is_deterministic() {
    for (ty, bytes) in [
        (ShaderType::Vertex, loop_with_break()),
        (ShaderType::Pixel, if_else()),
    ] {
        let first = prepare(ty, &bytes);
        let second = prepare(ty, &bytes);
        assert_eq!(first, second);
        assert_eq!(body(&first), body(&second));
    }
}

#[test]
fn unclosed_loop_is_a_structural_mismatch() {
    let bytes = Program::new()
        .cf(CF_LOOP_START_DX10, 2, 0)
        .export(EXP_DONE, EXPORT_POSITION, 60, 0, XYZW)
        .end()
        .bytes();
    let mut shader = decode(ShaderType::Vertex, &bytes).unwrap();
    let err = blockify(&mut shader).unwrap_err();
    assert!(
        matches!(err, ShaderError::StructuralMismatch { .. }),
        "{err:?}"
    );
    assert!(err.is_fallbackable());
}

#[test]
fn loop_end_without_start_is_a_structural_mismatch() {
    let bytes = Program::new()
        .cf(CF_LOOP_END, 0, 0)
        .export(EXP_DONE, EXPORT_POSITION, 60, 0, XYZW)
        .end()
        .bytes();
    let mut shader = decode(ShaderType::Vertex, &bytes).unwrap();
    assert!(matches!(
        blockify(&mut shader),
        Err(ShaderError::StructuralMismatch { .. })
    ));
}

#[test]
fn unconsumed_predicate_is_a_structural_mismatch() {
    let bytes = Program::new()
        .alu(
            ALU,
            vec![group(
                &[op2(OP2_PRED_SETE, 0, SEL_X, &[gpr(0, SEL_X), special(SRC_0, SEL_X)]).branch()],
                &[],
            )],
        )
        .export(EXP_DONE, EXPORT_PIXEL, 0, 0, XYZW)
        .end()
        .bytes();
    let mut shader = decode(ShaderType::Pixel, &bytes).unwrap();
    assert!(matches!(
        blockify(&mut shader),
        Err(ShaderError::StructuralMismatch { .. })
    ));
}

#[test]
fn jump_without_push_is_a_structural_mismatch() {
    let bytes = Program::new()
        .alu(
            ALU,
            vec![group(
                &[op2(OP2_PRED_SETE, 0, SEL_X, &[gpr(0, SEL_X), special(SRC_0, SEL_X)]).branch()],
                &[],
            )],
        )
        .cf(CF_JUMP, 2, 0)
        .export(EXP_DONE, EXPORT_PIXEL, 0, 0, XYZW)
        .end()
        .bytes();
    let mut shader = decode(ShaderType::Pixel, &bytes).unwrap();
    assert!(matches!(
        blockify(&mut shader),
        Err(ShaderError::StructuralMismatch { .. })
    ));
}
