mod common;

use common::*;
use latte_shader::ir::{NumFormat, Select};
use latte_shader::{
    disassemble, parse_fetch_shader, passthrough_shader, translate_shader, Dialect,
    FetchAttribute, ShaderCache, ShaderCacheLookupSource, ShaderError, ShaderOptions, ShaderType,
    TranslateError,
};
use pretty_assertions::assert_eq;

fn fetch_shader() -> Vec<u8> {
    Program::new()
        .vtx(&[
            Semantic {
                semantic: 1,
                buffer: 0,
                format: 48,
                num_format: 0,
                signed: false,
                offset: 0,
                dst_sel: [SEL_X, SEL_Y, SEL_Z, SEL_1],
                mega_fetch_count: 11,
            },
            Semantic {
                semantic: 2,
                buffer: 1,
                format: 26,
                num_format: 1,
                signed: false,
                offset: 12,
                dst_sel: XYZW,
                mega_fetch_count: 3,
            },
        ])
        .cf(CF_RETURN, 0, 0)
        .end()
        .bytes()
}

/// Exports attribute 1 as both the position and the first parameter.
fn passthrough_vertex() -> Vec<u8> {
    Program::new()
        .export(EXP, EXPORT_POSITION, 60, 1, XYZW)
        .export(EXP_DONE, EXPORT_PARAM, 0, 1, XYZW)
        .end()
        .bytes()
}

fn textured_pixel() -> Vec<u8> {
    Program::new()
        .tex(&[sample(0, 0, 1, 0)])
        .export(EXP_DONE, EXPORT_PIXEL, 0, 1, XYZW)
        .end()
        .bytes()
}

fn killing_pixel() -> Vec<u8> {
    Program::new()
        .cf(CF_KILL, 0, 0)
        .export(EXP_DONE, EXPORT_PIXEL, 0, 0, XYZW)
        .end()
        .bytes()
}

#[test]
fn fetch_shader_yields_semantic_attributes() {
    let attributes = parse_fetch_shader(&fetch_shader()).unwrap();
    assert_eq!(
        attributes,
        vec![
            FetchAttribute {
                location: 1,
                buffer: 0,
                offset: 0,
                format: 48,
                num_format: NumFormat::Norm,
                signed: false,
                endian_swap: 0,
                dst_sel: [Select::X, Select::Y, Select::Z, Select::One],
                instanced: false,
                src_sel_x: 0,
                bytes_per_element: 12,
            },
            FetchAttribute {
                location: 2,
                buffer: 1,
                offset: 12,
                format: 26,
                num_format: NumFormat::Int,
                signed: false,
                endian_swap: 0,
                dst_sel: [Select::X, Select::Y, Select::Z, Select::W],
                instanced: false,
                src_sel_x: 0,
                bytes_per_element: 4,
            },
        ]
    );
    assert_eq!(attributes[0].glsl_type(), "vec3");
    assert_eq!(attributes[1].glsl_type(), "uvec4");
}

#[test]
fn fetch_shader_without_end_is_malformed() {
    let bytes = to_bytes(&[0, cf_word1(0, 0, 0, false)]);
    assert!(matches!(
        parse_fetch_shader(&bytes),
        Err(ShaderError::MalformedEncoding { .. })
    ));
}

#[test]
fn vertex_program_reads_fetched_attributes() {
    let attributes = parse_fetch_shader(&fetch_shader()).unwrap();
    let translated = translate_shader(
        ShaderType::Vertex,
        &passthrough_vertex(),
        &attributes,
        ShaderOptions::default(),
    )
    .unwrap();

    assert!(translated.complete);
    assert_eq!(translated.fallback_reason, None);
    assert_eq!(
        translated.source,
        "\
#version 420 core
layout(std140) uniform VertexUB {
   vec4 values[1024];
} VB[16];
out gl_PerVertex {
   vec4 gl_Position;
};

in vec3 fs_out_1;
in uvec4 fs_out_2;

out vec4 vs_out_0;

void main()
{
   vec4 R1;
   vec4 R2;
   ivec4 AR;
   int AL;
   vec4 exp_position_0;
   vec4 exp_param_0;
   R1 = vec4(fs_out_1, 0.0);
   R2 = uintBitsToFloat(fs_out_2);

   exp_position_0 = R1.xyzw;
   exp_param_0 = R1.xyzw;

   gl_Position = exp_position_0;
   vs_out_0 = exp_param_0;
}
"
    );
}

#[test]
fn dx9_constants_replace_uniform_blocks() {
    let options = ShaderOptions {
        dx9_consts: true,
        ..ShaderOptions::default()
    };
    let translated =
        translate_shader(ShaderType::Vertex, &passthrough_vertex(), &[], options).unwrap();
    assert!(translated.source.contains("uniform vec4 VR[256];\n"));
    assert!(!translated.source.contains("VertexUB"));
}

#[test]
fn pixel_program_in_glsl() {
    let translated = translate_shader(
        ShaderType::Pixel,
        &textured_pixel(),
        &[],
        ShaderOptions::default(),
    )
    .unwrap();

    assert_eq!(translated.samplers_used.iter().copied().collect::<Vec<_>>(), [0]);
    assert_eq!(
        translated.source,
        "\
#version 420 core
layout(std140) uniform PixelUB {
   vec4 values[1024];
} PB[16];
uniform sampler2D sampler_0;

in vec4 vs_out_0;

layout(location = 0) out vec4 ps_out_0;

void main()
{
   vec4 R0;
   vec4 R1;
   ivec4 AR;
   int AL;
   vec4 exp_pixel_0;
   R0 = vs_out_0;

   // groupPC = 0
   R1.xyzw = texture(sampler_0, R0.xy).xyzw;
   exp_pixel_0 = R1.xyzw;

   ps_out_0 = exp_pixel_0;
}
"
    );
}

#[test]
fn pixel_program_in_hlsl() {
    let options = ShaderOptions {
        dialect: Dialect::Hlsl,
        flat_inputs: true,
        ..ShaderOptions::default()
    };
    let translated = translate_shader(ShaderType::Pixel, &textured_pixel(), &[], options).unwrap();

    assert_eq!(
        translated.source,
        "\
Texture2D texture_0 : register(t0);
SamplerState sampler_0 : register(s0);

struct PixelInput
{
   nointerpolation float4 vs_out_0 : PARAM0;
};

struct PixelOutput
{
   float4 color0 : SV_Target0;
};

PixelOutput main(PixelInput input)
{
   PixelOutput output = (PixelOutput)0;
   float4 R0;
   float4 R1;
   int4 AR;
   int AL;
   R0 = input.vs_out_0;

   // groupPC = 0
   R1.xyzw = texture_0.Sample(sampler_0, R0.xy).xyzw;
   output.color0 = R1.xyzw;

   return output;
}
"
    );
}

#[test]
fn partial_translation_is_accepted_by_default() {
    let translated = translate_shader(
        ShaderType::Pixel,
        &killing_pixel(),
        &[],
        ShaderOptions::default(),
    )
    .unwrap();
    assert!(!translated.complete);
    assert!(translated.source.contains("   // Unimplemented KILL\n"));
}

#[test]
fn strict_translation_rejects_partial_bodies() {
    let strict = ShaderOptions {
        allow_partial: false,
        ..ShaderOptions::default()
    };
    let err = translate_shader(ShaderType::Pixel, &killing_pixel(), &[], strict).unwrap_err();
    assert!(matches!(err, TranslateError::Incomplete { ty: "pixel" }), "{err:?}");

    let fallback = ShaderOptions {
        fallback_to_passthrough: true,
        ..strict
    };
    let translated = translate_shader(ShaderType::Pixel, &killing_pixel(), &[], fallback).unwrap();
    assert_eq!(
        translated.source,
        passthrough_shader(ShaderType::Pixel, Dialect::Glsl)
    );
    assert_eq!(
        translated.fallback_reason.as_deref(),
        Some("pixel shader translation is incomplete")
    );
}

#[test]
fn unsupported_shader_falls_back_to_passthrough() {
    let bytes = Program::new()
        .vtx(&[Semantic {
            semantic: 1,
            buffer: 0,
            format: 48,
            num_format: 0,
            signed: false,
            offset: 0,
            dst_sel: XYZW,
            mega_fetch_count: 11,
        }])
        .export(EXP_DONE, EXPORT_POSITION, 60, 1, XYZW)
        .end()
        .bytes();

    let err = translate_shader(ShaderType::Vertex, &bytes, &[], ShaderOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        TranslateError::Shader(ShaderError::UnsupportedInstruction { cf_pc: 0, .. })
    ));

    let options = ShaderOptions {
        fallback_to_passthrough: true,
        ..ShaderOptions::default()
    };
    let translated = translate_shader(ShaderType::Vertex, &bytes, &[], options).unwrap();
    assert!(!translated.complete);
    assert!(translated
        .source
        .contains("gl_Position = vec4(0.0, 0.0, 0.0, 1.0);"));
    assert_eq!(
        translated.fallback_reason.as_deref(),
        Some("unsupported instruction VTX (cf 0)")
    );
}

#[test]
fn invariant_violations_never_fall_back() {
    let bytes = Program::new()
        .tex(&[sample(0, 1, 1, 0)])
        .export(EXP_DONE, EXPORT_PIXEL, 0, 1, XYZW)
        .end()
        .bytes();
    let options = ShaderOptions {
        fallback_to_passthrough: true,
        ..ShaderOptions::default()
    };
    let err = translate_shader(ShaderType::Pixel, &bytes, &[], options).unwrap_err();
    assert!(!err.is_fallbackable());
    assert!(matches!(
        err,
        TranslateError::Shader(ShaderError::InvariantViolation { .. })
    ));
}

#[test]
fn cache_translates_once_per_binary() {
    let mut cache = ShaderCache::default();
    let pixel = textured_pixel();

    let first = cache
        .get_or_translate(ShaderType::Pixel, &pixel, &[])
        .unwrap();
    assert_eq!(first.source, ShaderCacheLookupSource::Translated);
    assert!(first.complete);

    let second = cache
        .get_or_translate(ShaderType::Pixel, &pixel, &[])
        .unwrap();
    assert_eq!(second.source, ShaderCacheLookupSource::Memory);
    assert_eq!(second.ty, ShaderType::Pixel);
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_key_covers_stage_and_attributes() {
    let mut cache = ShaderCache::default();
    let vertex = passthrough_vertex();
    let attributes = parse_fetch_shader(&fetch_shader()).unwrap();

    let plain = cache
        .get_or_translate(ShaderType::Vertex, &vertex, &[])
        .unwrap()
        .source;
    assert_eq!(plain, ShaderCacheLookupSource::Translated);
    let with_attributes = cache
        .get_or_translate(ShaderType::Vertex, &vertex, &attributes)
        .unwrap()
        .source;
    assert_eq!(with_attributes, ShaderCacheLookupSource::Translated);
    assert_eq!(cache.len(), 2);
}

#[test]
fn changing_options_clears_the_cache() {
    let mut cache = ShaderCache::new(ShaderOptions::default());
    cache
        .get_or_translate(ShaderType::Pixel, &textured_pixel(), &[])
        .unwrap();
    assert_eq!(cache.len(), 1);

    cache.set_options(ShaderOptions::default());
    assert_eq!(cache.len(), 1);

    let hlsl = ShaderOptions {
        dialect: Dialect::Hlsl,
        ..ShaderOptions::default()
    };
    cache.set_options(hlsl);
    assert!(cache.is_empty());
    assert_eq!(cache.options(), hlsl);

    let lookup = cache
        .get_or_translate(ShaderType::Pixel, &textured_pixel(), &[])
        .unwrap();
    assert_eq!(lookup.source, ShaderCacheLookupSource::Translated);
    assert!(lookup.ty == ShaderType::Pixel);
}

#[test]
fn failed_translations_are_not_cached() {
    let mut cache = ShaderCache::default();
    assert!(cache
        .get_or_translate(ShaderType::Pixel, &[0, 0, 0], &[])
        .is_err());
    assert!(cache.is_empty());
}

#[test]
fn disassembly_lists_clauses_and_exports() {
    let bytes = Program::new()
        .alu(
            ALU,
            vec![group(
                &[
                    op2(OP2_MUL, 0, SEL_X, &[gpr(1, SEL_X), special(SRC_LITERAL, SEL_X)]),
                    op2(OP2_ADD, 0, SEL_Y, &[gpr(1, SEL_Y), special(SRC_1, SEL_X).neg()]).clamp(),
                ],
                &[0x4000_0000],
            )],
        )
        .tex(&[sample(0, 0, 2, 0)])
        .export(EXP_DONE, EXPORT_PIXEL, 0, 2, XYZW)
        .end()
        .bytes();

    insta::assert_snapshot!(disassemble(&bytes), @r###"
    00 ALU: ADDR(3) CNT(3)
      00 x: MUL             R0.x, R1.x, 2.0f
         y: ADD             R0.y, R1.y, -1.0f CLAMP
    01 TEX: ADDR(6) CNT(1)
      01 SAMPLE R2.xyzw, R0.xyzw, t0, s0
    02 EXP_DONE: PIX0, R2.xyzw
    END_OF_PROGRAM
    "###);
}

#[test]
fn disassembly_indents_loop_bodies() {
    let bytes = Program::new()
        .cf(CF_LOOP_START_DX10, 2, 0)
        .cf(CF_LOOP_END, 1, 0)
        .export(EXP_DONE, EXPORT_POSITION, 60, 0, XYZW)
        .end()
        .bytes();
    assert_eq!(
        disassemble(&bytes),
        "\
00 LOOP_START_DX10 FAIL_JUMP_ADDR(2)
01 LOOP_END PASS_JUMP_ADDR(1)
02 EXP_DONE: POS60, R0.xyzw
END_OF_PROGRAM
"
    );
}

#[test]
fn disassembly_reports_truncation() {
    let bytes = Program::new()
        .alu(ALU, vec![group(&[op2(OP2_MOV, 0, SEL_X, &[gpr(1, SEL_X)])], &[])])
        .bytes();
    let text = disassemble(&bytes);
    assert!(text.starts_with("00 ALU: ADDR(1) CNT(1)\n"), "{text}");
    assert!(text.ends_with("__UNK_TRUNCATED__\n"), "{text}");
}
