use crate::ir::{ExportType, ShaderType};

/// How a sample call picks its mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampleLod {
    Implicit,
    Explicit,
    Bias,
}

/// Target shading language.
///
/// The generator is shared between both languages; only the spellings below differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    #[default]
    Glsl,
    Hlsl,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Glsl => "glsl",
            Dialect::Hlsl => "hlsl",
        }
    }

    /// Reinterprets float bits as a signed integer.
    pub fn float_to_int_bits(self) -> &'static str {
        match self {
            Dialect::Glsl => "floatBitsToInt(",
            Dialect::Hlsl => "asint(",
        }
    }

    pub fn float_to_uint_bits(self) -> &'static str {
        match self {
            Dialect::Glsl => "floatBitsToUint(",
            Dialect::Hlsl => "asuint(",
        }
    }

    pub fn int_to_float_bits(self) -> &'static str {
        match self {
            Dialect::Glsl => "intBitsToFloat(",
            Dialect::Hlsl => "asfloat(",
        }
    }

    pub fn uint_to_float_bits(self) -> &'static str {
        match self {
            Dialect::Glsl => "uintBitsToFloat(",
            Dialect::Hlsl => "asfloat(",
        }
    }

    /// Value conversions (not bit casts).
    pub fn to_int(self) -> &'static str {
        match self {
            Dialect::Glsl => "int(",
            Dialect::Hlsl => "(int)(",
        }
    }

    pub fn to_uint(self) -> &'static str {
        match self {
            Dialect::Glsl => "uint(",
            Dialect::Hlsl => "(uint)(",
        }
    }

    pub fn to_float(self) -> &'static str {
        match self {
            Dialect::Glsl => "float(",
            Dialect::Hlsl => "(float)(",
        }
    }

    /// Opening and closing text around a reciprocal operand.
    pub fn reciprocal(self) -> (&'static str, &'static str) {
        match self {
            Dialect::Glsl => ("(1.0 / (", "))"),
            Dialect::Hlsl => ("rcp(", ")"),
        }
    }

    pub fn inverse_sqrt(self) -> &'static str {
        match self {
            Dialect::Glsl => "inversesqrt",
            Dialect::Hlsl => "rsqrt",
        }
    }

    pub fn fract(self) -> &'static str {
        match self {
            Dialect::Glsl => "fract",
            Dialect::Hlsl => "frac",
        }
    }

    pub fn round_even(self) -> &'static str {
        match self {
            Dialect::Glsl => "roundEven",
            Dialect::Hlsl => "round",
        }
    }

    pub fn float_vector(self, components: usize) -> &'static str {
        match (self, components) {
            (_, 1) | (_, 0) => "float",
            (Dialect::Glsl, 2) => "vec2",
            (Dialect::Glsl, 3) => "vec3",
            (Dialect::Glsl, _) => "vec4",
            (Dialect::Hlsl, 2) => "float2",
            (Dialect::Hlsl, 3) => "float3",
            (Dialect::Hlsl, _) => "float4",
        }
    }

    pub fn int_vector(self, components: usize) -> &'static str {
        match (self, components) {
            (_, 1) | (_, 0) => "int",
            (Dialect::Glsl, 2) => "ivec2",
            (Dialect::Glsl, 3) => "ivec3",
            (Dialect::Glsl, _) => "ivec4",
            (Dialect::Hlsl, 2) => "int2",
            (Dialect::Hlsl, 3) => "int3",
            (Dialect::Hlsl, _) => "int4",
        }
    }

    pub fn uint_vector(self, components: usize) -> &'static str {
        match (self, components) {
            (_, 1) | (_, 0) => "uint",
            (Dialect::Glsl, 2) => "uvec2",
            (Dialect::Glsl, 3) => "uvec3",
            (Dialect::Glsl, _) => "uvec4",
            (Dialect::Hlsl, 2) => "uint2",
            (Dialect::Hlsl, 3) => "uint3",
            (Dialect::Hlsl, _) => "uint4",
        }
    }

    /// Opening text of a uniform block element access; the caller writes the index and `]`.
    pub fn uniform_block(self, stage: ShaderType, block: u32) -> String {
        let prefix = match stage {
            ShaderType::Vertex => "VB",
            ShaderType::Pixel => "PB",
        };
        match self {
            Dialect::Glsl => format!("{prefix}[{block}].values["),
            Dialect::Hlsl => format!("{prefix}_{block}["),
        }
    }

    /// Opening text of a DX9-style constant register access.
    pub fn constant_file(self, stage: ShaderType) -> &'static str {
        match stage {
            ShaderType::Vertex => "VR[",
            ShaderType::Pixel => "PR[",
        }
    }

    /// Opening text of a texture sample call; the caller writes the arguments and `)`.
    ///
    /// Arguments follow the coordinates in the order LOD or bias, then offset.
    pub(crate) fn sample(self, unit: u32, lod: SampleLod, offset: bool) -> String {
        match self {
            Dialect::Glsl => {
                let name = match (lod, offset) {
                    (SampleLod::Implicit | SampleLod::Bias, false) => "texture",
                    (SampleLod::Implicit | SampleLod::Bias, true) => "textureOffset",
                    (SampleLod::Explicit, false) => "textureLod",
                    (SampleLod::Explicit, true) => "textureLodOffset",
                };
                format!("{name}(sampler_{unit}, ")
            }
            Dialect::Hlsl => {
                let method = match lod {
                    SampleLod::Implicit => "Sample",
                    SampleLod::Explicit => "SampleLevel",
                    SampleLod::Bias => "SampleBias",
                };
                format!("texture_{unit}.{method}(sampler_{unit}, ")
            }
        }
    }

    pub fn export_name(self, ty: ExportType, index: u32) -> String {
        match (self, ty) {
            (Dialect::Glsl, ExportType::Position) => format!("exp_position_{index}"),
            (Dialect::Glsl, ExportType::Parameter) => format!("exp_param_{index}"),
            (Dialect::Glsl, ExportType::Pixel) => format!("exp_pixel_{index}"),
            (Dialect::Hlsl, ExportType::Position) => format!("output.position{index}"),
            (Dialect::Hlsl, ExportType::Parameter) => format!("output.param{index}"),
            (Dialect::Hlsl, ExportType::Pixel) => format!("output.color{index}"),
        }
    }
}
