use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::analyse::analyse;
use crate::blockify::blockify;
use crate::decode::decode;
use crate::error::ShaderError;
use crate::fetch::FetchAttribute;
use crate::generate::{generate_body, EmitterRegistry};
use crate::ir::ShaderType;
use crate::program::{assemble_program, passthrough_shader, ShaderOptions};

#[derive(Debug, Clone)]
pub struct TranslatedShader {
    pub ty: ShaderType,
    pub source: String,
    /// `false` when the body still contains `// Unimplemented` markers.
    pub complete: bool,
    pub samplers_used: BTreeSet<u32>,
    /// Set when `source` is the passthrough program; describes the failure that triggered it.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("{ty} shader translation is incomplete")]
    Incomplete { ty: &'static str },
}

impl TranslateError {
    pub fn is_fallbackable(&self) -> bool {
        match self {
            TranslateError::Shader(err) => err.is_fallbackable(),
            TranslateError::Incomplete { .. } => true,
        }
    }
}

/// Decodes, structures, analyses and emits `binary` as a complete program.
///
/// `attributes` is the vertex layout from [`crate::parse_fetch_shader`]; pixel shaders pass an
/// empty slice. With `fallback_to_passthrough`, fallbackable failures produce
/// [`passthrough_shader`] output and a `fallback_reason` instead of an error.
pub fn translate_shader(
    ty: ShaderType,
    binary: &[u8],
    attributes: &[FetchAttribute],
    options: ShaderOptions,
) -> Result<TranslatedShader, TranslateError> {
    match try_translate(ty, binary, attributes, options) {
        Ok(ok) => Ok(ok),
        Err(err) => {
            tracing::warn!(stage = ty.name(), error = %err, "shader translation failed");
            if !options.fallback_to_passthrough || !err.is_fallbackable() {
                return Err(err);
            }
            Ok(TranslatedShader {
                ty,
                source: passthrough_shader(ty, options.dialect),
                complete: false,
                samplers_used: BTreeSet::new(),
                fallback_reason: Some(err.to_string()),
            })
        }
    }
}

fn try_translate(
    ty: ShaderType,
    binary: &[u8],
    attributes: &[FetchAttribute],
    options: ShaderOptions,
) -> Result<TranslatedShader, TranslateError> {
    let mut shader = decode(ty, binary)?;
    blockify(&mut shader)?;
    analyse(&mut shader)?;

    let body = generate_body(&shader, EmitterRegistry::global(), options.dialect)?;
    if !body.complete && !options.allow_partial {
        return Err(TranslateError::Incomplete { ty: ty.name() });
    }

    Ok(TranslatedShader {
        ty,
        source: assemble_program(&shader, &body, &options, attributes),
        complete: body.complete,
        samplers_used: shader.samplers_used,
        fallback_reason: None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderCacheLookupSource {
    /// The shader was already present in the in-memory cache.
    Memory,
    /// The translator ran and the output was inserted into the in-memory cache.
    Translated,
}

#[derive(Debug)]
pub struct ShaderCacheLookup<'a> {
    pub source: ShaderCacheLookupSource,
    shader: &'a TranslatedShader,
}

impl std::ops::Deref for ShaderCacheLookup<'_> {
    type Target = TranslatedShader;

    fn deref(&self) -> &Self::Target {
        self.shader
    }
}

/// In-memory cache of translated programs, keyed on the binary, the stage and the fetch layout.
pub struct ShaderCache {
    map: HashMap<blake3::Hash, TranslatedShader>,
    options: ShaderOptions,
}

impl ShaderCache {
    pub fn new(options: ShaderOptions) -> Self {
        Self {
            map: HashMap::new(),
            options,
        }
    }

    pub fn options(&self) -> ShaderOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ShaderOptions) {
        if self.options != options {
            self.options = options;
            self.map.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get_or_translate(
        &mut self,
        ty: ShaderType,
        binary: &[u8],
        attributes: &[FetchAttribute],
    ) -> Result<ShaderCacheLookup<'_>, TranslateError> {
        use std::collections::hash_map::Entry;

        let key = cache_key(ty, binary, attributes);
        match self.map.entry(key) {
            Entry::Occupied(e) => Ok(ShaderCacheLookup {
                source: ShaderCacheLookupSource::Memory,
                shader: e.into_mut(),
            }),
            Entry::Vacant(e) => {
                let translated = translate_shader(ty, binary, attributes, self.options)?;
                Ok(ShaderCacheLookup {
                    source: ShaderCacheLookupSource::Translated,
                    shader: e.insert(translated),
                })
            }
        }
    }
}

impl Default for ShaderCache {
    fn default() -> Self {
        Self::new(ShaderOptions::default())
    }
}

fn cache_key(ty: ShaderType, binary: &[u8], attributes: &[FetchAttribute]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ty.name().as_bytes());
    hasher.update(&(binary.len() as u64).to_le_bytes());
    hasher.update(binary);
    for attr in attributes {
        for field in [
            attr.location,
            attr.buffer,
            attr.offset,
            attr.format,
            attr.num_format as u32,
            attr.signed as u32,
            attr.endian_swap,
            attr.instanced as u32,
            attr.src_sel_x,
            attr.bytes_per_element,
        ] {
            hasher.update(&field.to_le_bytes());
        }
        for sel in attr.dst_sel {
            hasher.update(&[sel as u8]);
        }
    }
    hasher.finalize()
}
