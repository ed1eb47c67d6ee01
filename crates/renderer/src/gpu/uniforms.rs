use glam::Mat4;

use crate::shader::UNIFORM_BINDING;

/// Smallest buffer bound when a program declares no uniform block.
const MIN_BLOCK_BYTES: u64 = 64;

/// CPU mirror of a program's uniform block plus the buffer it flushes to.
pub(crate) struct UniformStorage {
    bytes: Vec<u8>,
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    dirty: bool,
}

impl UniformStorage {
    pub(crate) fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, size: Option<u32>) -> Self {
        let len = size
            .map(u64::from)
            .unwrap_or(MIN_BLOCK_BYTES)
            .max(MIN_BLOCK_BYTES)
            .next_multiple_of(16);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform block"),
            size: len,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: UNIFORM_BINDING,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            bytes: vec![0; len as usize],
            buffer,
            bind_group,
            dirty: true,
        }
    }

    pub(crate) fn write_matrix(&mut self, offset: u32, value: &Mat4) {
        let start = offset as usize;
        let data = bytemuck::bytes_of(value);
        if let Some(slot) = self.bytes.get_mut(start..start + data.len()) {
            slot.copy_from_slice(data);
            self.dirty = true;
        }
    }

    pub(crate) fn flush(&mut self, queue: &wgpu::Queue) {
        if self.dirty {
            queue.write_buffer(&self.buffer, 0, &self.bytes);
            self.dirty = false;
        }
    }

    pub(crate) fn destroy(&self) {
        self.buffer.destroy();
    }
}
