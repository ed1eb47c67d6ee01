//! The host surface seen from the renderer core.
//!
//! A [`GpuBackend`] owns every GPU object and hands out opaque handles. Unlike a
//! classic GL context there is no "currently bound" slot: each configuration
//! call names the program, buffer, or texture it acts on.
//!
//! Frames follow a fixed protocol driven by [`FrameDriver`](crate::FrameDriver):
//!
//! ```text
//!   set_uniform_matrix* ─▶ clear ─▶ bind_texture* ─▶ draw ─▶ finish_frame
//! ```

use glam::Mat4;

use crate::error::BackendError;
use crate::shader::VertexInput;
use crate::types::{
    BufferHandle, BufferTarget, BufferUsage, DrawCall, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, TextureImage, VertexLayout,
};

/// Any object created through a backend, for teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResource {
    Shader(ShaderHandle),
    Program(ProgramHandle),
    Buffer(BufferHandle),
    Texture(TextureHandle),
}

pub trait GpuBackend {
    /// Compiles one stage. `Err` carries the compiler diagnostic log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;

    /// Links a vertex and fragment stage. `Err` carries the linker log.
    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String>;

    /// Runs the expensive integrity check on a linked program.
    fn validate_program(&mut self, program: ProgramHandle) -> Result<(), String>;

    /// Location of an active vertex input, or `None` when the program does not use it.
    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    /// Every vertex input the program's pipeline will fetch, in declaration order.
    fn vertex_inputs(&self, program: ProgramHandle) -> Vec<VertexInput>;

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        contents: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferHandle, BackendError>;

    /// Declares that `layout.location` of `program` reads from `buffer`.
    fn define_attribute(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        layout: VertexLayout,
    ) -> Result<(), BackendError>;

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, BackendError>;

    /// Writes a `mat4` uniform. Returns `false` when the program has no such uniform.
    fn set_uniform_matrix(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: &Mat4,
    ) -> Result<bool, BackendError>;

    /// Starts a frame by clearing color and depth.
    fn clear(&mut self, color: [f32; 4]);

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<(), BackendError>;

    fn draw(&mut self, program: ProgramHandle, call: DrawCall) -> Result<(), BackendError>;

    /// Submits everything recorded since [`clear`](Self::clear).
    fn finish_frame(&mut self) -> Result<(), BackendError>;

    fn release(&mut self, resource: GpuResource);
}

/// Display-synchronized redraw registration supplied by the host.
pub trait RedrawScheduler {
    /// Asks the host to invoke the next tick on its next display refresh.
    fn schedule_redraw(&mut self);
}
