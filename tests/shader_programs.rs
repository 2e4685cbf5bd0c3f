//! End-to-end translation of a small vertex/pixel shader pair through the public API.

use latte_shader::{
    disassemble, parse_fetch_shader, translate_shader, Dialect, ShaderCache,
    ShaderCacheLookupSource, ShaderOptions, ShaderType,
};
use pretty_assertions::assert_eq;

const CF_TEX: u32 = 1;
const CF_VTX: u32 = 2;
const CF_RETURN: u32 = 20;
const ALU: u32 = 8;
const EXP: u32 = 39;
const EXP_DONE: u32 = 40;

const OP2_MUL: u32 = 1;
const OP2_MOV: u32 = 25;
const TEX_SAMPLE: u32 = 16;
const VTX_SEMANTIC: u32 = 1;

const SRC_1: u32 = 249;
const SRC_KCACHE0: u32 = 128;

const XYZW: u32 = 1 << 3 | 2 << 6 | 3 << 9;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn normal_cf(inst: u32, addr: u32, count: u32, eop: bool) -> [u32; 2] {
    [
        addr,
        (count & 7) << 10 | ((eop as u32) << 21) | inst << 23,
    ]
}

fn export_cf(inst: u32, ty: u32, array_base: u32, gpr: u32, eop: bool) -> [u32; 2] {
    [
        array_base | ty << 13 | gpr << 15,
        XYZW | ((eop as u32) << 21) | inst << 23,
    ]
}

/// ALU clause with kcache bank 0 locked to constant buffer 0, line 0.
fn alu_cf(addr: u32, slots: u32) -> [u32; 2] {
    [addr | 1 << 30, (slots - 1) << 18 | ALU << 26]
}

/// Single-source or two-source OP2 slot writing `R<dst>.<chan>`.
fn op2(inst: u32, dst: u32, chan: u32, src0: (u32, u32), src1: (u32, u32), last: bool) -> [u32; 2] {
    [
        src0.0 | src0.1 << 10 | src1.0 << 13 | src1.1 << 23 | (last as u32) << 31,
        1 << 4 | inst << 7 | dst << 21 | chan << 29,
    ]
}

/// `position` (vec3) into R1 and `texcoord` (vec2) into R2, both from buffer 0.
fn fetch_shader() -> Vec<u8> {
    let semantic = |gpr: u32, format: u32, offset: u32| {
        [
            VTX_SEMANTIC | 19 << 26,
            gpr | XYZW << 9 | format << 22,
            offset,
            0,
        ]
    };
    let mut words = Vec::new();
    words.extend(normal_cf(CF_VTX, 2, 1, false));
    words.extend(normal_cf(CF_RETURN, 0, 0, true));
    words.extend(semantic(1, 48, 0));
    words.extend(semantic(2, 30, 12));
    bytes(&words)
}

/// R0 = vec4(R1.xy * C0.xy, R1.z, 1.0); export R0 as the position and R2 as parameter 0.
fn vertex_shader() -> Vec<u8> {
    let mut words = Vec::new();
    words.extend(alu_cf(3, 4));
    words.extend(export_cf(EXP, 1, 60, 0, false));
    words.extend(export_cf(EXP_DONE, 2, 0, 2, true));
    words.extend(op2(OP2_MUL, 0, 0, (1, 0), (SRC_KCACHE0, 0), false));
    words.extend(op2(OP2_MUL, 0, 1, (1, 1), (SRC_KCACHE0, 1), false));
    words.extend(op2(OP2_MOV, 0, 2, (1, 2), (0, 0), false));
    words.extend(op2(OP2_MOV, 0, 3, (SRC_1, 0), (0, 0), true));
    bytes(&words)
}

/// R1 = texture(0, R0.xy) * R0; written to the first render target.
fn pixel_shader() -> Vec<u8> {
    let mut words = Vec::new();
    words.extend(normal_cf(CF_TEX, 3, 0, false));
    words.extend([5, 3 << 18 | ALU << 26]);
    words.extend(export_cf(EXP_DONE, 0, 0, 1, true));
    words.extend([TEX_SAMPLE, 1 | XYZW << 9 | 0xf << 28, XYZW << 23, 0]);
    for chan in 0..4 {
        words.extend(op2(OP2_MUL, 1, chan, (1, chan), (0, chan), chan == 3));
    }
    bytes(&words)
}

#[test]
fn vertex_shader_reads_fetched_attributes_and_uniforms() {
    init_tracing();

    let attributes = parse_fetch_shader(&fetch_shader()).unwrap();
    assert_eq!(
        attributes.iter().map(|a| (a.location, a.glsl_type())).collect::<Vec<_>>(),
        [(1, "vec3"), (2, "vec2")]
    );
    assert_eq!(attributes[1].offset, 12);
    assert_eq!(attributes[1].bytes_per_element, 20);

    let glsl = translate_shader(
        ShaderType::Vertex,
        &vertex_shader(),
        &attributes,
        ShaderOptions::default(),
    )
    .unwrap();
    assert!(glsl.complete);
    for line in [
        "in vec3 fs_out_1;\n",
        "in vec2 fs_out_2;\n",
        "   R0.x = R1.x * VB[0].values[0].x;\n",
        "   R0.y = R1.y * VB[0].values[0].y;\n",
        "   R0.z = R1.z;\n",
        "   R0.w = 1.000000f;\n",
        "   exp_position_0 = R0.xyzw;\n",
        "   exp_param_0 = R2.xyzw;\n",
        "   gl_Position = exp_position_0;\n",
    ] {
        assert!(glsl.source.contains(line), "missing {line:?} in\n{}", glsl.source);
    }

    let hlsl = translate_shader(
        ShaderType::Vertex,
        &vertex_shader(),
        &attributes,
        ShaderOptions {
            dialect: Dialect::Hlsl,
            ..ShaderOptions::default()
        },
    )
    .unwrap();
    assert!(hlsl.source.contains("R0.x = R1.x * VB_0[0].x;\n"), "{}", hlsl.source);
    assert!(hlsl.source.contains("output.position0 = R0.xyzw;\n"), "{}", hlsl.source);
}

#[test]
fn pixel_shader_modulates_sampled_texture() {
    init_tracing();

    let translated = translate_shader(
        ShaderType::Pixel,
        &pixel_shader(),
        &[],
        ShaderOptions::default(),
    )
    .unwrap();
    assert!(translated.complete);
    assert_eq!(translated.samplers_used.iter().copied().collect::<Vec<_>>(), [0]);
    for line in [
        "uniform sampler2D sampler_0;\n",
        "   R1.xyzw = texture(sampler_0, R0.xy).xyzw;\n",
        "   R1.x = R1.x * R0.x;\n",
        "   R1.w = R1.w * R0.w;\n",
        "   ps_out_0 = exp_pixel_0;\n",
    ] {
        assert!(
            translated.source.contains(line),
            "missing {line:?} in\n{}",
            translated.source
        );
    }
}

#[test]
fn cache_serves_both_stages() {
    init_tracing();

    let attributes = parse_fetch_shader(&fetch_shader()).unwrap();
    let vertex = vertex_shader();
    let pixel = pixel_shader();
    let mut cache = ShaderCache::default();

    let first_vertex = cache
        .get_or_translate(ShaderType::Vertex, &vertex, &attributes)
        .unwrap()
        .source;
    assert_eq!(first_vertex, ShaderCacheLookupSource::Translated);
    let first_pixel = cache
        .get_or_translate(ShaderType::Pixel, &pixel, &[])
        .unwrap()
        .source;
    assert_eq!(first_pixel, ShaderCacheLookupSource::Translated);
    assert_eq!(cache.len(), 2);

    let again = cache
        .get_or_translate(ShaderType::Vertex, &vertex, &attributes)
        .unwrap();
    assert_eq!(again.source, ShaderCacheLookupSource::Memory);
    assert!(again.complete);

    // Position exports are invalid in a pixel shader; failures are never cached.
    assert!(cache.get_or_translate(ShaderType::Pixel, &vertex, &[]).is_err());
    assert_eq!(cache.len(), 2);

    cache.set_options(ShaderOptions {
        dialect: Dialect::Hlsl,
        ..cache.options()
    });
    assert!(cache.is_empty());
}

#[test]
fn disassembly_of_vertex_shader() {
    assert_eq!(
        disassemble(&vertex_shader()),
        "\
00 ALU: ADDR(3) CNT(4)
  00 x: MUL             R0.x, R1.x, KCACHEBANK0_0.x
     y: MUL             R0.y, R1.y, KCACHEBANK0_0.y
     z: MOV             R0.z, R1.z
     w: MOV             R0.w, 1.0f
01 EXP: POS60, R0.xyzw
02 EXP_DONE: PARAM0, R2.xyzw
END_OF_PROGRAM
"
    );
}
