use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{GpuBackend, GpuResource};
use crate::error::BackendError;
use crate::shader::{self, CompiledStage, LinkedProgram, VertexInput};
use crate::types::{
    Antialiasing, BufferHandle, BufferTarget, BufferUsage, DrawCall, IndexFormat, ProgramHandle,
    ShaderHandle, ShaderStage, SurfaceSize, TextureHandle, TextureImage, VertexLayout,
    DEFAULT_CLEAR_COLOR, MAX_TEXTURE_UNITS,
};

use super::context::GpuContext;
use super::pipeline::{self, PipelineLayouts, PipelineTargets};
use super::texture::GpuTexture;
use super::uniforms::UniformStorage;

struct GpuProgram {
    linked: LinkedProgram,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    attributes: BTreeMap<u32, (BufferHandle, VertexLayout)>,
    uniforms: UniformStorage,
    pipeline: Option<wgpu::RenderPipeline>,
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    target: BufferTarget,
}

/// Commands recorded between `clear` and `finish_frame`, encoded into one render pass.
struct PendingFrame {
    clear: [f32; 4],
    units: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
    draws: Vec<PendingDraw>,
}

struct PendingDraw {
    program: ProgramHandle,
    call: DrawCall,
    units: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
}

/// [`GpuBackend`] rendering into a window surface through wgpu.
pub struct WgpuBackend {
    context: GpuContext,
    layouts: PipelineLayouts,
    placeholder: GpuTexture,
    shaders: Vec<Option<CompiledStage>>,
    programs: Vec<Option<GpuProgram>>,
    buffers: Vec<Option<GpuBuffer>>,
    textures: Vec<Option<GpuTexture>>,
    frame: Option<PendingFrame>,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>, antialiasing: Antialiasing) -> Result<Self> {
        let context = GpuContext::new(window, antialiasing)?;
        let layouts = PipelineLayouts::new(&context.device);
        let placeholder = GpuTexture::placeholder(&context.device, &context.queue);
        Ok(Self {
            context,
            layouts,
            placeholder,
            shaders: Vec::new(),
            programs: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            frame: None,
        })
    }

    pub fn size(&self) -> SurfaceSize {
        self.context.size
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        self.context.resize(size);
    }

    fn program_mut(&mut self, handle: ProgramHandle) -> Result<&mut GpuProgram, BackendError> {
        self.programs
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(BackendError::UnknownProgram(handle))
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&GpuBuffer, BackendError> {
        self.buffers
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownBuffer(handle))
    }

    fn texture(&self, handle: Option<TextureHandle>) -> Result<&GpuTexture, BackendError> {
        match handle {
            None => Ok(&self.placeholder),
            Some(handle) => self
                .textures
                .get(handle.index())
                .and_then(Option::as_ref)
                .ok_or(BackendError::UnknownTexture(handle)),
        }
    }

    /// Builds (or reuses) the program's render pipeline for its current attribute set.
    fn ensure_pipeline(&mut self, handle: ProgramHandle) -> Result<(), BackendError> {
        let targets = PipelineTargets {
            color_format: self.context.surface_format,
            sample_count: self.context.sample_count,
        };
        let device = self.context.device.clone();
        let layouts = &self.layouts;
        let program = self
            .programs
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(BackendError::UnknownProgram(handle))?;
        if program.pipeline.is_some() {
            return Ok(());
        }
        if let Some(input) = program
            .linked
            .interface
            .inputs
            .iter()
            .find(|input| !program.attributes.contains_key(&input.location))
        {
            return Err(BackendError::UndefinedAttribute(input.location));
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let render_pipeline = pipeline::create_render_pipeline(
            &device,
            layouts,
            &program.vertex_module,
            &program.fragment_module,
            &program.attributes,
            &targets,
        );
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::Device(format!(
                "failed to create render pipeline: {err}"
            )));
        }
        tracing::debug!(program = handle.index(), "render pipeline created");
        program.pipeline = Some(render_pipeline);
        Ok(())
    }

    fn encode_frame(&mut self, frame: PendingFrame) -> Result<(), BackendError> {
        for draw in &frame.draws {
            self.ensure_pipeline(draw.program)?;
        }

        let output = match self.context.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.reconfigure();
                return Err(BackendError::Surface(
                    "surface lost or outdated; reconfigured".to_string(),
                ));
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(BackendError::Device("surface out of memory".to_string()));
            }
            Err(other) => return Err(BackendError::Surface(other.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        for draw in &frame.draws {
            if let Some(Some(program)) = self.programs.get_mut(draw.program.index()) {
                program.uniforms.flush(&self.context.queue);
            }
        }

        let mut texture_groups = Vec::with_capacity(frame.draws.len());
        for draw in &frame.draws {
            let mut units = [(&self.placeholder.view, &self.placeholder.sampler); MAX_TEXTURE_UNITS];
            for (slot, handle) in units.iter_mut().zip(draw.units.iter()) {
                let texture = self.texture(*handle)?;
                *slot = (&texture.view, &texture.sampler);
            }
            texture_groups.push(self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("texture bind group"),
                layout: &self.layouts.texture_layout,
                entries: &pipeline::texture_entries(&units),
            }));
        }

        let (attachment_view, resolve_target) = match self.context.targets.msaa_view() {
            Some(msaa) => (msaa, Some(&view)),
            None => (&view, None),
        };
        let [r, g, b, a] = frame.clear;
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(r),
                            g: f64::from(g),
                            b: f64::from(b),
                            a: f64::from(a),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.context.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (draw, texture_group) in frame.draws.iter().zip(texture_groups.iter()) {
                let Some(Some(program)) = self.programs.get(draw.program.index()) else {
                    return Err(BackendError::UnknownProgram(draw.program));
                };
                let Some(render_pipeline) = &program.pipeline else {
                    continue;
                };
                render_pass.set_pipeline(render_pipeline);
                render_pass.set_bind_group(0, &program.uniforms.bind_group, &[]);
                render_pass.set_bind_group(1, texture_group, &[]);
                for (slot, (buffer, _)) in program.attributes.values().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, self.buffer(*buffer)?.buffer.slice(..));
                }
                match draw.call {
                    DrawCall::Arrays { first, count } => {
                        render_pass.draw(first..first + count, 0..1);
                    }
                    DrawCall::Indexed {
                        buffer,
                        count,
                        format,
                        offset,
                    } => {
                        let index = self.buffer(buffer)?;
                        render_pass.set_index_buffer(
                            index.buffer.slice(u64::from(offset)..),
                            index_format(format),
                        );
                        render_pass.draw_indexed(0..count, 0, 0..1);
                    }
                }
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

impl GpuBackend for WgpuBackend {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        let compiled = shader::compile_stage(stage, source)?;
        self.shaders.push(Some(compiled));
        Ok(ShaderHandle(self.shaders.len() as u32 - 1))
    }

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        let lookup = |handle: ShaderHandle| {
            self.shaders
                .get(handle.index())
                .and_then(Option::as_ref)
                .ok_or_else(|| format!("shader {} does not exist", handle.index()))
        };
        let linked = shader::link_stages(lookup(vertex)?, lookup(fragment)?)?;

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = pipeline::create_module(device, &linked.vertex);
        let fragment_module = pipeline::create_module(device, &linked.fragment);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(err.to_string());
        }

        let uniforms = UniformStorage::new(
            device,
            &self.layouts.uniform_layout,
            linked.interface.uniform_block_size(),
        );
        self.programs.push(Some(GpuProgram {
            linked,
            vertex_module,
            fragment_module,
            attributes: BTreeMap::new(),
            uniforms,
            pipeline: None,
        }));
        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn validate_program(&mut self, program: ProgramHandle) -> Result<(), String> {
        let program = self.program_mut(program).map_err(|err| err.to_string())?;
        shader::validate_linked(&program.linked)
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let program = self.programs.get(program.index())?.as_ref()?;
        program.linked.interface.input(name).map(|input| input.location)
    }

    fn vertex_inputs(&self, program: ProgramHandle) -> Vec<VertexInput> {
        self.programs
            .get(program.index())
            .and_then(Option::as_ref)
            .map(|program| program.linked.interface.inputs.clone())
            .unwrap_or_default()
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        contents: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferHandle, BackendError> {
        let mut usages = match target {
            BufferTarget::Vertex => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index => wgpu::BufferUsages::INDEX,
        };
        if usage == BufferUsage::Dynamic {
            usages |= wgpu::BufferUsages::COPY_DST;
        }
        let buffer = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(target.as_str()),
                contents,
                usage: usages,
            });
        self.buffers.push(Some(GpuBuffer { buffer, target }));
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
        let program = self.program_mut(program)?;
        program.attributes.insert(layout.location, (buffer, layout));
        program.pipeline = None;
        Ok(())
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, BackendError> {
        let (width, height) = image.dimensions();
        let max = self.context.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(BackendError::Device(format!(
                "texture '{}' is {width}x{height}; supported range is 1..={max}",
                image.label
            )));
        }
        let texture = GpuTexture::upload(&self.context.device, &self.context.queue, image);
        self.textures.push(Some(texture));
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn set_uniform_matrix(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: &Mat4,
    ) -> Result<bool, BackendError> {
        let program = self.program_mut(program)?;
        let Some((_, matrix)) = program.linked.interface.matrix(name) else {
            return Ok(false);
        };
        let offset = matrix.offset;
        program.uniforms.write_matrix(offset, value);
        Ok(true)
    }

    fn clear(&mut self, color: [f32; 4]) {
        if self.frame.is_some() {
            tracing::warn!("clear called mid-frame; discarding recorded draws");
        }
        self.frame = Some(PendingFrame {
            clear: color,
            units: [None; MAX_TEXTURE_UNITS],
            draws: Vec::new(),
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<(), BackendError> {
        if unit as usize >= MAX_TEXTURE_UNITS {
            return Err(BackendError::TextureUnit {
                unit,
                max: MAX_TEXTURE_UNITS,
            });
        }
        self.texture(Some(texture))?;
        let frame = self.frame.get_or_insert_with(|| PendingFrame {
            clear: DEFAULT_CLEAR_COLOR,
            units: [None; MAX_TEXTURE_UNITS],
            draws: Vec::new(),
        });
        frame.units[unit as usize] = Some(texture);
        Ok(())
    }

    fn draw(&mut self, program: ProgramHandle, call: DrawCall) -> Result<(), BackendError> {
        if let DrawCall::Indexed { buffer, .. } = call {
            let target = self.buffer(buffer)?.target;
            if target != BufferTarget::Index {
                return Err(BackendError::BufferTarget {
                    buffer,
                    expected: BufferTarget::Index.as_str(),
                    actual: target.as_str(),
                });
            }
        }
        self.ensure_pipeline(program)?;
        let frame = self.frame.get_or_insert_with(|| PendingFrame {
            clear: DEFAULT_CLEAR_COLOR,
            units: [None; MAX_TEXTURE_UNITS],
            draws: Vec::new(),
        });
        let units = frame.units;
        frame.draws.push(PendingDraw {
            program,
            call,
            units,
        });
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), BackendError> {
        match self.frame.take() {
            Some(frame) => self.encode_frame(frame),
            None => Ok(()),
        }
    }

    fn release(&mut self, resource: GpuResource) {
        match resource {
            GpuResource::Shader(handle) => {
                take_slot(&mut self.shaders, handle.index());
            }
            GpuResource::Program(handle) => {
                if let Some(program) = take_slot(&mut self.programs, handle.index()) {
                    program.uniforms.destroy();
                }
            }
            GpuResource::Buffer(handle) => {
                if let Some(buffer) = take_slot(&mut self.buffers, handle.index()) {
                    buffer.buffer.destroy();
                }
            }
            GpuResource::Texture(handle) => {
                if let Some(texture) = take_slot(&mut self.textures, handle.index()) {
                    texture.destroy();
                }
            }
        }
    }
}

fn take_slot<T>(slots: &mut [Option<T>], index: usize) -> Option<T> {
    let taken = slots.get_mut(index).and_then(Option::take);
    if taken.is_none() {
        tracing::warn!(index, "release of unknown resource ignored");
    }
    taken
}
