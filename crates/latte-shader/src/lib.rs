//! Recompiler for AMD Latte (Wii U GPU) shader microcode.
//!
//! The pipeline runs in four steps over one [`Shader`]:
//!
//! - [`decode()`] turns the binary into a flat instruction list in execution order;
//! - [`blockify()`] rebuilds loops and conditionals as a [`Block`] tree;
//! - [`analyse()`] collects register, sampler and PV/PS usage;
//! - [`generate_body()`] emits GLSL or HLSL statements through an [`EmitterRegistry`].
//!
//! [`assemble_program`] wraps the body into a complete vertex or pixel program, and
//! [`translate_shader`]/[`ShaderCache`] run the whole pipeline in one call.

#![forbid(unsafe_code)]

mod analyse;
mod blockify;
mod decode;
mod disassemble;
mod encoding;
mod error;
mod fetch;
pub mod generate;
pub mod ir;
pub mod opcodes;
mod program;
mod translate;

pub use analyse::analyse;
pub use blockify::blockify;
pub use decode::decode;
pub use disassemble::disassemble;
pub use error::ShaderError;
pub use fetch::{data_format_channels, parse_fetch_shader, FetchAttribute};
pub use generate::{generate_body, Dialect, EmitterRegistry, GeneratedBody};
pub use ir::{Block, InstrId, Instruction, Shader, ShaderType};
pub use program::{assemble_program, passthrough_shader, ShaderOptions};
pub use translate::{
    translate_shader, ShaderCache, ShaderCacheLookup, ShaderCacheLookupSource, TranslateError,
    TranslatedShader,
};
