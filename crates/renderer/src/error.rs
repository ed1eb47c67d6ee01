use thiserror::Error;

use crate::types::{BufferHandle, ProgramHandle, ShaderStage, TextureHandle};

/// Failures while turning a shader pair into a program. Terminal for the build attempt.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to compile {stage} shader:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("failed to link program:\n{log}")]
    Link { log: String },

    #[error("program failed validation:\n{log}")]
    Validate { log: String },
}

impl PipelineError {
    /// Backend-provided diagnostic text.
    pub fn log(&self) -> &str {
        match self {
            PipelineError::Compile { log, .. }
            | PipelineError::Link { log }
            | PipelineError::Validate { log } => log,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeometryError {
    /// The program has no active input with this name; callers treat it as a skip.
    #[error("attribute '{name}' is not an active input of the program")]
    AttributeNotFound { name: String },

    /// The program fetches this input but no attribute layout feeds it.
    #[error("program input '{name}' at location {location} has no attribute layout")]
    UnboundInput { name: String, location: u32 },

    #[error("attribute '{name}' spans {span} bytes at offset {offset}, exceeding stride {stride}")]
    AttributeOverflow {
        name: String,
        span: u32,
        offset: u32,
        stride: u32,
    },

    #[error("attribute '{name}' has {components} components; expected 1 to 4")]
    InvalidComponents { name: String, components: u32 },

    #[error("attributes sharing a buffer declare {first} and {second} byte strides")]
    StrideMismatch { first: u32, second: u32 },

    #[error("index {index} at position {position} references vertex beyond count {vertex_count}")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: u32,
    },

    #[error("index count {0} is not a multiple of 3")]
    IncompleteTriangle(usize),

    #[error("buffer #{0} is not part of this geometry")]
    UnknownBuffer(usize),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Failures reported by a [`GpuBackend`](crate::GpuBackend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),

    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),

    #[error("texture unit {unit} exceeds the supported {max} units")]
    TextureUnit { unit: u32, max: usize },

    #[error("program input at location {0} has no attribute layout")]
    UndefinedAttribute(u32),

    #[error("buffer {buffer:?} is a {actual} buffer, expected {expected}")]
    BufferTarget {
        buffer: BufferHandle,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("draw reads {required} bytes from buffer {buffer:?} holding {available}")]
    BufferOverrun {
        buffer: BufferHandle,
        required: u64,
        available: u64,
    },

    #[error("surface error: {0}")]
    Surface(String),

    #[error("{0}")]
    Device(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("indexed drawing requested but the geometry has no index buffer")]
    MissingIndexBuffer,

    #[error("draw count {requested} exceeds the {available} available {unit}")]
    DrawCountOutOfRange {
        requested: u32,
        available: u32,
        unit: &'static str,
    },

    #[error("texture list holds {0} textures; at most {} are supported", crate::types::MAX_TEXTURE_UNITS)]
    TooManyTextures(usize),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Aggregate error for the whole bootstrap sequence.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
