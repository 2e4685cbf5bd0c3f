//! Complete vertex/pixel programs around a generated body.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::fetch::FetchAttribute;
use crate::generate::{indent_lines, Dialect, GeneratedBody};
use crate::ir::{ExportType, Instruction, NumFormat, Shader, ShaderType, SourceKind};

/// Options that affect the emitted source.
///
/// [`crate::ShaderCache`] drops every entry when these change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderOptions {
    pub dialect: Dialect,
    /// Constants come from a flat `VR`/`PR` register array instead of uniform blocks.
    pub dx9_consts: bool,
    /// Accept bodies that still contain `// Unimplemented` markers.
    pub allow_partial: bool,
    /// Replace fallbackable failures with [`passthrough_shader`] output.
    pub fallback_to_passthrough: bool,
    /// Declare pixel shader inputs without interpolation.
    pub flat_inputs: bool,
}

impl Default for ShaderOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Glsl,
            dx9_consts: false,
            allow_partial: true,
            fallback_to_passthrough: false,
            flat_inputs: false,
        }
    }
}

const INDENT: usize = 3;
const UNIFORM_BLOCKS: u32 = 16;
const UNIFORM_BLOCK_VEC4S: u32 = 1024;
const CONSTANT_REGISTERS: u32 = 256;

/// Wraps `body` in declarations, input prologue and export epilogue.
pub fn assemble_program(
    shader: &Shader,
    body: &GeneratedBody,
    options: &ShaderOptions,
    attributes: &[FetchAttribute],
) -> String {
    let layout = Layout::new(shader, attributes);
    match options.dialect {
        Dialect::Glsl => glsl_program(shader, body, options, attributes, &layout),
        Dialect::Hlsl => hlsl_program(shader, body, options, attributes, &layout),
    }
}

/// Interface of the program, derived from the analysed shader.
struct Layout {
    registers: BTreeSet<u32>,
    inputs: BTreeSet<u32>,
    positions: BTreeSet<u32>,
    params: BTreeSet<u32>,
    pixels: BTreeSet<u32>,
    uniform_blocks: BTreeSet<u32>,
}

impl Layout {
    fn new(shader: &Shader, attributes: &[FetchAttribute]) -> Self {
        let mut layout = Layout {
            registers: shader.gprs_used.clone(),
            inputs: BTreeSet::new(),
            positions: BTreeSet::new(),
            params: BTreeSet::new(),
            pixels: BTreeSet::new(),
            uniform_blocks: BTreeSet::new(),
        };

        match shader.ty {
            ShaderType::Vertex => {
                layout.registers.extend(attributes.iter().map(|a| a.location));
            }
            ShaderType::Pixel => {
                layout.inputs = shader.input_gprs.clone();
            }
        }

        for &id in &shader.exports {
            if let Some(Instruction::Export(exp)) = shader.get(id) {
                let set = match exp.ty {
                    ExportType::Position => &mut layout.positions,
                    ExportType::Parameter => &mut layout.params,
                    ExportType::Pixel => &mut layout.pixels,
                };
                set.insert(exp.dst_reg);
            }
        }

        for ins in &shader.code {
            let lanes: Vec<_> = match ins {
                Instruction::Alu(alu) => vec![alu],
                Instruction::AluReduction(red) => red.units.iter().flatten().collect(),
                _ => continue,
            };
            for alu in lanes {
                for src in &alu.sources {
                    if let SourceKind::UniformBlock { block } = src.kind {
                        layout.uniform_blocks.insert(block);
                    }
                }
            }
        }
        layout
    }
}

fn attribute_is_int(attr: &FetchAttribute) -> bool {
    attr.num_format == NumFormat::Int
}

fn attribute_type(dialect: Dialect, attr: &FetchAttribute) -> &'static str {
    match dialect {
        Dialect::Glsl => attr.glsl_type(),
        Dialect::Hlsl => {
            let channels = attr.channels();
            match (attribute_is_int(attr), attr.signed) {
                (true, true) => dialect.int_vector(channels),
                (true, false) => dialect.uint_vector(channels),
                (false, _) => dialect.float_vector(channels),
            }
        }
    }
}

/// `R<loc> = <input padded to four components>;`
fn write_attribute_copy(out: &mut String, dialect: Dialect, attr: &FetchAttribute, input: &str) {
    let pad = 4 - attr.channels();
    let vec4 = dialect.float_vector(4);
    let loc = attr.location;
    if attribute_is_int(attr) {
        let (cast, vector) = if attr.signed {
            (dialect.int_to_float_bits(), dialect.int_vector(4))
        } else {
            (dialect.uint_to_float_bits(), dialect.uint_vector(4))
        };
        if pad == 0 {
            let _ = writeln!(out, "R{loc} = {cast}{input});");
        } else {
            let zeros = ", 0".repeat(pad);
            let _ = writeln!(out, "R{loc} = {cast}{vector}({input}{zeros}));");
        }
    } else if pad == 0 {
        let _ = writeln!(out, "R{loc} = {input};");
    } else {
        let zeros = ", 0.0".repeat(pad);
        let _ = writeln!(out, "R{loc} = {vec4}({input}{zeros});");
    }
}

fn write_locals(out: &mut String, dialect: Dialect, shader: &Shader, layout: &Layout) {
    let vec4 = dialect.float_vector(4);
    for id in &layout.registers {
        let _ = writeln!(out, "{vec4} R{id};");
    }
    if !shader.pv_used.is_empty() {
        let _ = writeln!(out, "{vec4} PV;");
        let _ = writeln!(out, "{vec4} PVo;");
    }
    if !shader.ps_used.is_empty() {
        let _ = writeln!(out, "float PS;");
        let _ = writeln!(out, "float PSo;");
    }
    let _ = writeln!(out, "{} AR;", dialect.int_vector(4));
    let _ = writeln!(out, "int AL;");
}

fn glsl_uniforms(out: &mut String, shader: &Shader, options: &ShaderOptions) {
    let (block, array, registers) = match shader.ty {
        ShaderType::Vertex => ("VertexUB", "VB", "VR"),
        ShaderType::Pixel => ("PixelUB", "PB", "PR"),
    };
    if options.dx9_consts {
        let _ = writeln!(out, "uniform vec4 {registers}[{CONSTANT_REGISTERS}];");
    } else {
        let _ = writeln!(out, "layout(std140) uniform {block} {{");
        let _ = writeln!(out, "   vec4 values[{UNIFORM_BLOCK_VEC4S}];");
        let _ = writeln!(out, "}} {array}[{UNIFORM_BLOCKS}];");
    }
    for id in &shader.samplers_used {
        let _ = writeln!(out, "uniform sampler2D sampler_{id};");
    }
}

fn glsl_program(
    shader: &Shader,
    body: &GeneratedBody,
    options: &ShaderOptions,
    attributes: &[FetchAttribute],
    layout: &Layout,
) -> String {
    let dialect = Dialect::Glsl;
    let mut out = String::new();
    let _ = writeln!(out, "#version 420 core");
    glsl_uniforms(&mut out, shader, options);

    match shader.ty {
        ShaderType::Vertex => {
            let _ = writeln!(out, "out gl_PerVertex {{");
            let _ = writeln!(out, "   vec4 gl_Position;");
            let _ = writeln!(out, "}};");
            out.push('\n');
            for attr in attributes {
                let _ = writeln!(out, "in {} fs_out_{};", attr.glsl_type(), attr.location);
            }
            out.push('\n');
            for n in &layout.params {
                let _ = writeln!(out, "out vec4 vs_out_{n};");
            }
        }
        ShaderType::Pixel => {
            out.push('\n');
            let flat = if options.flat_inputs { "flat " } else { "" };
            for n in &layout.inputs {
                let _ = writeln!(out, "{flat}in vec4 vs_out_{n};");
            }
            out.push('\n');
            for n in &layout.pixels {
                let _ = writeln!(out, "layout(location = {n}) out vec4 ps_out_{n};");
            }
        }
    }
    out.push('\n');

    let mut main = String::new();
    write_locals(&mut main, dialect, shader, layout);
    for n in &layout.positions {
        let _ = writeln!(main, "vec4 exp_position_{n};");
    }
    for n in &layout.params {
        let _ = writeln!(main, "vec4 exp_param_{n};");
    }
    for n in &layout.pixels {
        let _ = writeln!(main, "vec4 exp_pixel_{n};");
    }

    match shader.ty {
        ShaderType::Vertex => {
            if shader.gprs_used.contains(&0) {
                let _ = writeln!(
                    main,
                    "R0 = vec4(intBitsToFloat(gl_VertexID), intBitsToFloat(gl_InstanceID), 0.0, 0.0);"
                );
            }
            for attr in attributes {
                let input = format!("fs_out_{}", attr.location);
                write_attribute_copy(&mut main, dialect, attr, &input);
            }
        }
        ShaderType::Pixel => {
            for n in &layout.inputs {
                let _ = writeln!(main, "R{n} = vs_out_{n};");
            }
        }
    }

    main.push('\n');
    main.push_str(&body.source);
    main.push('\n');

    if layout.positions.contains(&0) {
        let _ = writeln!(main, "gl_Position = exp_position_0;");
    }
    for n in &layout.params {
        let _ = writeln!(main, "vs_out_{n} = exp_param_{n};");
    }
    for n in &layout.pixels {
        let _ = writeln!(main, "ps_out_{n} = exp_pixel_{n};");
    }

    let _ = writeln!(out, "void main()");
    let _ = writeln!(out, "{{");
    out.push_str(&indent_lines(&main, INDENT));
    let _ = writeln!(out, "}}");
    out
}

fn hlsl_program(
    shader: &Shader,
    body: &GeneratedBody,
    options: &ShaderOptions,
    attributes: &[FetchAttribute],
    layout: &Layout,
) -> String {
    let dialect = Dialect::Hlsl;
    let mut out = String::new();

    let (stage, array, registers) = match shader.ty {
        ShaderType::Vertex => ("Vertex", "VB", "VR"),
        ShaderType::Pixel => ("Pixel", "PB", "PR"),
    };
    if options.dx9_consts {
        let _ = writeln!(out, "cbuffer {stage}Registers : register(b0)");
        let _ = writeln!(out, "{{");
        let _ = writeln!(out, "   float4 {registers}[{CONSTANT_REGISTERS}];");
        let _ = writeln!(out, "}};");
    } else {
        for block in &layout.uniform_blocks {
            let _ = writeln!(out, "cbuffer {stage}UB{block} : register(b{block})");
            let _ = writeln!(out, "{{");
            let _ = writeln!(out, "   float4 {array}_{block}[{UNIFORM_BLOCK_VEC4S}];");
            let _ = writeln!(out, "}};");
        }
    }
    for id in &shader.samplers_used {
        let _ = writeln!(out, "Texture2D texture_{id} : register(t{id});");
        let _ = writeln!(out, "SamplerState sampler_{id} : register(s{id});");
    }
    out.push('\n');

    let mut main = String::new();
    match shader.ty {
        ShaderType::Vertex => {
            let _ = writeln!(out, "struct VertexInput");
            let _ = writeln!(out, "{{");
            for attr in attributes {
                let _ = writeln!(
                    out,
                    "   {} fs_out_{loc} : ATTRIB{loc};",
                    attribute_type(dialect, attr),
                    loc = attr.location
                );
            }
            let _ = writeln!(out, "   uint vertex_id : SV_VertexID;");
            let _ = writeln!(out, "   uint instance_id : SV_InstanceID;");
            let _ = writeln!(out, "}};");
            out.push('\n');

            let _ = writeln!(out, "struct VertexOutput");
            let _ = writeln!(out, "{{");
            for n in &layout.positions {
                if *n == 0 {
                    let _ = writeln!(out, "   float4 position0 : SV_Position;");
                } else {
                    let _ = writeln!(out, "   float4 position{n} : POSITION{n};");
                }
            }
            for n in &layout.params {
                let _ = writeln!(out, "   float4 param{n} : PARAM{n};");
            }
            let _ = writeln!(out, "}};");
            out.push('\n');

            let _ = writeln!(out, "VertexOutput main(VertexInput input)");
            let _ = writeln!(main, "VertexOutput output = (VertexOutput)0;");
            write_locals(&mut main, dialect, shader, layout);
            if shader.gprs_used.contains(&0) {
                let _ = writeln!(
                    main,
                    "R0 = float4(asfloat(input.vertex_id), asfloat(input.instance_id), 0.0, 0.0);"
                );
            }
            for attr in attributes {
                let input = format!("input.fs_out_{}", attr.location);
                write_attribute_copy(&mut main, dialect, attr, &input);
            }
        }
        ShaderType::Pixel => {
            let interpolation = if options.flat_inputs { "nointerpolation " } else { "" };
            let _ = writeln!(out, "struct PixelInput");
            let _ = writeln!(out, "{{");
            for n in &layout.inputs {
                let _ = writeln!(out, "   {interpolation}float4 vs_out_{n} : PARAM{n};");
            }
            let _ = writeln!(out, "}};");
            out.push('\n');

            let _ = writeln!(out, "struct PixelOutput");
            let _ = writeln!(out, "{{");
            for n in &layout.pixels {
                let _ = writeln!(out, "   float4 color{n} : SV_Target{n};");
            }
            let _ = writeln!(out, "}};");
            out.push('\n');

            let _ = writeln!(out, "PixelOutput main(PixelInput input)");
            let _ = writeln!(main, "PixelOutput output = (PixelOutput)0;");
            write_locals(&mut main, dialect, shader, layout);
            for n in &layout.inputs {
                let _ = writeln!(main, "R{n} = input.vs_out_{n};");
            }
        }
    }

    main.push('\n');
    main.push_str(&body.source);
    main.push('\n');
    let _ = writeln!(main, "return output;");

    let _ = writeln!(out, "{{");
    out.push_str(&indent_lines(&main, INDENT));
    let _ = writeln!(out, "}}");
    out
}

/// Minimal program for when translation fails: vertex shaders place the vertex at the origin,
/// pixel shaders write opaque magenta.
pub fn passthrough_shader(ty: ShaderType, dialect: Dialect) -> String {
    match (dialect, ty) {
        (Dialect::Glsl, ShaderType::Vertex) => concat!(
            "#version 420 core\n",
            "out gl_PerVertex {\n",
            "   vec4 gl_Position;\n",
            "};\n",
            "\n",
            "void main()\n",
            "{\n",
            "   gl_Position = vec4(0.0, 0.0, 0.0, 1.0);\n",
            "}\n",
        )
        .to_owned(),
        (Dialect::Glsl, ShaderType::Pixel) => concat!(
            "#version 420 core\n",
            "layout(location = 0) out vec4 ps_out_0;\n",
            "\n",
            "void main()\n",
            "{\n",
            "   ps_out_0 = vec4(1.0, 0.0, 1.0, 1.0);\n",
            "}\n",
        )
        .to_owned(),
        (Dialect::Hlsl, ShaderType::Vertex) => concat!(
            "float4 main() : SV_Position\n",
            "{\n",
            "   return float4(0.0, 0.0, 0.0, 1.0);\n",
            "}\n",
        )
        .to_owned(),
        (Dialect::Hlsl, ShaderType::Pixel) => concat!(
            "float4 main() : SV_Target0\n",
            "{\n",
            "   return float4(1.0, 0.0, 1.0, 1.0);\n",
            "}\n",
        )
        .to_owned(),
    }
}
