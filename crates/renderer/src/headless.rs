//! GPU-free backend that records every command it receives.
//!
//! Shaders go through the same naga front end as the wgpu backend, and draws
//! are checked against the defined attribute layouts and buffer sizes, so a
//! scene that runs here only fails on a real device for device-specific reasons.

use std::collections::BTreeMap;

use glam::Mat4;

use crate::backend::{GpuBackend, GpuResource, RedrawScheduler};
use crate::error::BackendError;
use crate::shader::{self, CompiledStage, LinkedProgram, VertexInput};
use crate::types::{
    BufferHandle, BufferTarget, BufferUsage, DrawCall, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, TextureImage, VertexLayout, MAX_TEXTURE_UNITS,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetUniform {
        program: ProgramHandle,
        name: String,
        value: Mat4,
    },
    Clear([f32; 4]),
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    Draw {
        program: ProgramHandle,
        call: DrawCall,
    },
    FinishFrame,
}

/// Counters for the pipeline calls, useful to assert what was attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub compiles: u32,
    pub links: u32,
    pub validations: u32,
}

#[derive(Debug)]
struct RecordedBuffer {
    target: BufferTarget,
    usage: BufferUsage,
    len: u64,
}

#[derive(Debug)]
struct RecordedProgram {
    linked: LinkedProgram,
    layouts: BTreeMap<u32, (BufferHandle, VertexLayout)>,
    uniforms: BTreeMap<String, Mat4>,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    shaders: Vec<Option<CompiledStage>>,
    programs: Vec<Option<RecordedProgram>>,
    buffers: Vec<Option<RecordedBuffer>>,
    textures: Vec<Option<(u32, u32)>>,
    commands: Vec<Command>,
    counts: CallCounts,
    frames: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Draw { call, .. } => Some(*call),
                _ => None,
            })
            .collect()
    }

    pub fn counts(&self) -> CallCounts {
        self.counts
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Last value written to a `mat4` uniform of `program`.
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<Mat4> {
        self.program(program).ok()?.uniforms.get(name).copied()
    }

    /// Number of objects still alive, across every kind.
    pub fn live_objects(&self) -> usize {
        self.shaders.iter().flatten().count()
            + self.programs.iter().flatten().count()
            + self.buffers.iter().flatten().count()
            + self.textures.iter().flatten().count()
    }

    pub fn buffer_usage(&self, buffer: BufferHandle) -> Option<BufferUsage> {
        self.buffers
            .get(buffer.index())?
            .as_ref()
            .map(|recorded| recorded.usage)
    }

    fn program(&self, handle: ProgramHandle) -> Result<&RecordedProgram, BackendError> {
        self.programs
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownProgram(handle))
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&RecordedBuffer, BackendError> {
        self.buffers
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownBuffer(handle))
    }

    fn check_draw(&self, program: ProgramHandle, call: DrawCall) -> Result<(), BackendError> {
        let recorded = self.program(program)?;
        for input in &recorded.linked.interface.inputs {
            if !recorded.layouts.contains_key(&input.location) {
                return Err(BackendError::UndefinedAttribute(input.location));
            }
        }

        let vertices_read = match call {
            DrawCall::Arrays { first, count } => u64::from(first) + u64::from(count),
            DrawCall::Indexed {
                buffer,
                count,
                format,
                offset,
            } => {
                let index = self.buffer(buffer)?;
                if index.target != BufferTarget::Index {
                    return Err(BackendError::BufferTarget {
                        buffer,
                        expected: BufferTarget::Index.as_str(),
                        actual: index.target.as_str(),
                    });
                }
                let required = u64::from(offset) + u64::from(count) * format.byte_size() as u64;
                if required > index.len {
                    return Err(BackendError::BufferOverrun {
                        buffer,
                        required,
                        available: index.len,
                    });
                }
                0
            }
        };

        if vertices_read > 0 {
            for (buffer, layout) in recorded.layouts.values() {
                let available = self.buffer(*buffer)?.len;
                let required = (vertices_read - 1) * u64::from(layout.stride)
                    + u64::from(layout.offset)
                    + u64::from(layout.components) * 4;
                if required > available {
                    return Err(BackendError::BufferOverrun {
                        buffer: *buffer,
                        required,
                        available,
                    });
                }
            }
        }
        Ok(())
    }
}

impl GpuBackend for HeadlessBackend {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        self.counts.compiles += 1;
        let compiled = shader::compile_stage(stage, source)?;
        self.shaders.push(Some(compiled));
        Ok(ShaderHandle(self.shaders.len() as u32 - 1))
    }

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        self.counts.links += 1;
        let lookup = |handle: ShaderHandle| {
            self.shaders
                .get(handle.index())
                .and_then(Option::as_ref)
                .ok_or_else(|| format!("shader {} does not exist", handle.index()))
        };
        let linked = shader::link_stages(lookup(vertex)?, lookup(fragment)?)?;
        self.programs.push(Some(RecordedProgram {
            linked,
            layouts: BTreeMap::new(),
            uniforms: BTreeMap::new(),
        }));
        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn validate_program(&mut self, program: ProgramHandle) -> Result<(), String> {
        self.counts.validations += 1;
        let recorded = self.program(program).map_err(|err| err.to_string())?;
        shader::validate_linked(&recorded.linked)
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let recorded = self.program(program).ok()?;
        recorded.linked.interface.input(name).map(|input| input.location)
    }

    fn vertex_inputs(&self, program: ProgramHandle) -> Vec<VertexInput> {
        self.program(program)
            .map(|recorded| recorded.linked.interface.inputs.clone())
            .unwrap_or_default()
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        contents: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferHandle, BackendError> {
        self.buffers.push(Some(RecordedBuffer {
            target,
            usage,
            len: contents.len() as u64,
        }));
        Ok(BufferHandle(self.buffers.len() as u32 - 1))
    }

    fn define_attribute(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        layout: VertexLayout,
    ) -> Result<(), BackendError> {
        let target = self.buffer(buffer)?.target;
        if target != BufferTarget::Vertex {
            return Err(BackendError::BufferTarget {
                buffer,
                expected: BufferTarget::Vertex.as_str(),
                actual: target.as_str(),
            });
        }
        let recorded = self
            .programs
            .get_mut(program.index())
            .and_then(Option::as_mut)
            .ok_or(BackendError::UnknownProgram(program))?;
        recorded.layouts.insert(layout.location, (buffer, layout));
        Ok(())
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, BackendError> {
        self.textures.push(Some(image.dimensions()));
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn set_uniform_matrix(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: &Mat4,
    ) -> Result<bool, BackendError> {
        let recorded = self
            .programs
            .get_mut(program.index())
            .and_then(Option::as_mut)
            .ok_or(BackendError::UnknownProgram(program))?;
        if recorded.linked.interface.matrix(name).is_none() {
            return Ok(false);
        }
        recorded.uniforms.insert(name.to_string(), *value);
        self.commands.push(Command::SetUniform {
            program,
            name: name.to_string(),
            value: *value,
        });
        Ok(true)
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(Command::Clear(color));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<(), BackendError> {
        if unit as usize >= MAX_TEXTURE_UNITS {
            return Err(BackendError::TextureUnit {
                unit,
                max: MAX_TEXTURE_UNITS,
            });
        }
        if !matches!(self.textures.get(texture.index()), Some(Some(_))) {
            return Err(BackendError::UnknownTexture(texture));
        }
        self.commands.push(Command::BindTexture { unit, texture });
        Ok(())
    }

    fn draw(&mut self, program: ProgramHandle, call: DrawCall) -> Result<(), BackendError> {
        self.check_draw(program, call)?;
        self.commands.push(Command::Draw { program, call });
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), BackendError> {
        self.frames += 1;
        self.commands.push(Command::FinishFrame);
        Ok(())
    }

    fn release(&mut self, resource: GpuResource) {
        let released = match resource {
            GpuResource::Shader(handle) => take_slot(&mut self.shaders, handle.index()),
            GpuResource::Program(handle) => take_slot(&mut self.programs, handle.index()),
            GpuResource::Buffer(handle) => take_slot(&mut self.buffers, handle.index()),
            GpuResource::Texture(handle) => take_slot(&mut self.textures, handle.index()),
        };
        if !released {
            tracing::warn!(?resource, "release of unknown resource ignored");
        }
    }
}

fn take_slot<T>(slots: &mut [Option<T>], index: usize) -> bool {
    slots.get_mut(index).and_then(Option::take).is_some()
}

/// Redraw scheduler that only counts pending requests; the caller pumps ticks.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pending: bool,
    requests: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the pending request, if any.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Total requests received since creation.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}

impl RedrawScheduler for ManualScheduler {
    fn schedule_redraw(&mut self) {
        self.pending = true;
        self.requests += 1;
    }
}
