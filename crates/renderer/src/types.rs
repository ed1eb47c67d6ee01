use std::fmt;
use std::str::FromStr;

use image::RgbaImage;

/// Number of texture units a program may sample from (`set = 1`, bindings `2n`/`2n + 1`).
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Clear color used when a scene does not specify one.
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.75, 0.85, 0.8, 1.0];

/// The two programmable stages a program is linked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    pub fn as_str(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stage name is not one of `vertex` / `fragment`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shader stage '{0}'; expected vertex or fragment")]
pub struct UnknownShaderStage(pub String);

impl FromStr for ShaderStage {
    type Err = UnknownShaderStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vertex" | "vert" | "vs" => Ok(ShaderStage::Vertex),
            "fragment" | "frag" | "fs" => Ok(ShaderStage::Fragment),
            _ => Err(UnknownShaderStage(value.to_string())),
        }
    }
}

/// Immutable vertex/fragment source pair handed to the pipeline builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw slot index inside the owning backend.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_handle!(
    /// A compiled, not yet linked shader stage.
    ShaderHandle
);
define_handle!(
    /// A linked (and optionally validated) program.
    ProgramHandle
);
define_handle!(
    /// A GPU-resident vertex or index buffer.
    BufferHandle
);
define_handle!(
    /// A GPU-resident 2D texture plus its sampler.
    TextureHandle
);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

impl BufferTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            BufferTarget::Vertex => "vertex",
            BufferTarget::Index => "index",
        }
    }
}

/// Update frequency hint for buffer contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
}

/// Numeric type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexFormat {
    #[default]
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn byte_size(self) -> usize {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Maps one named shader input onto a region of an (optionally interleaved) buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeLayout {
    pub name: String,
    /// Number of `f32` components (1..=4).
    pub components: u32,
    /// Distance between consecutive records, in bytes.
    pub stride: u32,
    /// Byte offset of this attribute inside a record.
    pub offset: u32,
    /// Kept for GL-style layouts. Vertex data is always `f32`, which is read
    /// unchanged whether or not this is set.
    pub normalized: bool,
}

impl AttributeLayout {
    pub fn new(name: impl Into<String>, components: u32, stride: u32, offset: u32) -> Self {
        Self {
            name: name.into(),
            components,
            stride,
            offset,
            normalized: false,
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    /// Bytes one value of this attribute occupies inside a record.
    pub fn byte_span(&self) -> u32 {
        self.components * std::mem::size_of::<f32>() as u32
    }
}

/// Layout handed to the backend once an attribute has a resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub location: u32,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
    /// No effect on `f32` data; see [`AttributeLayout::normalized`].
    pub normalized: bool,
}

/// Whether draws read vertices in order or through the index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    Arrays,
    Indexed,
}

/// A single draw request as issued to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Arrays {
        first: u32,
        count: u32,
    },
    Indexed {
        buffer: BufferHandle,
        count: u32,
        format: IndexFormat,
        offset: u32,
    },
}

impl DrawCall {
    pub fn count(&self) -> u32 {
        match self {
            DrawCall::Arrays { count, .. } | DrawCall::Indexed { count, .. } => *count,
        }
    }
}

/// Decoded RGBA8 image plus upload options.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub pixels: RgbaImage,
    /// Flip rows on upload so image row 0 lands at `v = 1`.
    pub flip_y: bool,
    pub label: String,
}

impl TextureImage {
    pub fn new(label: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            pixels,
            flip_y: true,
            label: label.into(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Physical size of the drawable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// What the frame driver does after a tick fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Log the failure, drop the frame and keep the loop alive.
    #[default]
    SkipFrame,
    /// Log the failure and transition back to idle.
    Stop,
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    #[default]
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window or surface size in physical pixels.
    pub surface_size: (u32, u32),
    pub title: String,
    pub antialiasing: Antialiasing,
    /// Run program validation after linking.
    pub validate: bool,
    pub fault_policy: FaultPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (800, 600),
            title: "meshspin".to_string(),
            antialiasing: Antialiasing::default(),
            validate: cfg!(debug_assertions),
            fault_policy: FaultPolicy::default(),
        }
    }
}
