use thiserror::Error;

/// Failure raised by any stage of the recompiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    /// The instruction is valid microcode but has no translation.
    #[error("unsupported instruction {name} (cf {cf_pc})")]
    UnsupportedInstruction { name: String, cf_pc: u32 },
    /// A bit-field combination the decoder refuses to interpret.
    #[error("malformed shader encoding at byte {offset:#x}: {message}")]
    MalformedEncoding { offset: usize, message: String },
    /// Control-flow labels could not be matched into a block tree.
    #[error("unbalanced shader control flow: {message}")]
    StructuralMismatch { message: String },
    /// An emitter found state that well-formed input never produces.
    #[error("shader invariant violated: {message}")]
    InvariantViolation { message: String },
}

impl ShaderError {
    pub(crate) fn unsupported(name: impl Into<String>, cf_pc: u32) -> Self {
        ShaderError::UnsupportedInstruction {
            name: name.into(),
            cf_pc,
        }
    }

    pub(crate) fn malformed(word_index: usize, message: impl Into<String>) -> Self {
        ShaderError::MalformedEncoding {
            offset: word_index * 4,
            message: message.into(),
        }
    }

    pub(crate) fn structure(message: impl Into<String>) -> Self {
        ShaderError::StructuralMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        ShaderError::InvariantViolation {
            message: message.into(),
        }
    }

    /// Whether a caller may substitute a passthrough shader and keep rendering.
    ///
    /// Invariant violations are recompiler bugs and are never fallbackable.
    pub fn is_fallbackable(&self) -> bool {
        !matches!(self, ShaderError::InvariantViolation { .. })
    }
}
