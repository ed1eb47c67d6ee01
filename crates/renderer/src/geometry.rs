use std::collections::BTreeMap;

use crate::backend::{GpuBackend, GpuResource};
use crate::error::GeometryError;
use crate::types::{
    AttributeLayout, BufferHandle, BufferTarget, BufferUsage, IndexFormat, ProgramHandle,
    TextureHandle, TextureImage, VertexLayout,
};

/// One vertex buffer's contents, as `f32` components.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexBufferData {
    pub data: Vec<f32>,
    pub usage: BufferUsage,
}

impl VertexBufferData {
    pub fn new(data: Vec<f32>) -> Self {
        Self {
            data,
            usage: BufferUsage::Static,
        }
    }

    pub fn byte_len(&self) -> u64 {
        (self.data.len() * std::mem::size_of::<f32>()) as u64
    }
}

/// Triangle index list in its declared numeric type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexData {
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
}

impl IndexData {
    pub fn format(&self) -> IndexFormat {
        match self {
            IndexData::Uint16(_) => IndexFormat::Uint16,
            IndexData::Uint32(_) => IndexFormat::Uint32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::Uint16(values) => values.len(),
            IndexData::Uint32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            IndexData::Uint16(values) => Box::new(values.iter().map(|&value| u32::from(value))),
            IndexData::Uint32(values) => Box::new(values.iter().copied()),
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            IndexData::Uint16(values) => bytemuck::cast_slice(values),
            IndexData::Uint32(values) => bytemuck::cast_slice(values),
        }
    }

    /// Checks triangle completeness and that every index names an existing vertex.
    pub fn check(&self, vertex_count: u32) -> Result<(), GeometryError> {
        if self.len() % 3 != 0 {
            return Err(GeometryError::IncompleteTriangle(self.len()));
        }
        match self.iter().enumerate().find(|(_, index)| *index >= vertex_count) {
            Some((position, index)) => Err(GeometryError::IndexOutOfRange {
                index,
                position,
                vertex_count,
            }),
            None => Ok(()),
        }
    }
}

/// Associates an attribute layout with a buffer by its position in
/// [`GeometryDescription::buffers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    pub buffer: usize,
    pub layout: AttributeLayout,
}

/// Static mesh data plus how to feed it to a program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryDescription {
    pub buffers: Vec<VertexBufferData>,
    pub attributes: Vec<AttributeBinding>,
    pub indices: Option<IndexData>,
    pub index_usage: BufferUsage,
}

impl GeometryDescription {
    /// Number of whole vertex records every attribute can read.
    pub fn vertex_count(&self) -> Result<u32, GeometryError> {
        let mut strides: BTreeMap<usize, u32> = BTreeMap::new();
        let mut spans: BTreeMap<usize, u32> = BTreeMap::new();
        for binding in &self.attributes {
            let layout = &binding.layout;
            if !(1..=4).contains(&layout.components) {
                return Err(GeometryError::InvalidComponents {
                    name: layout.name.clone(),
                    components: layout.components,
                });
            }
            if binding.buffer >= self.buffers.len() {
                return Err(GeometryError::UnknownBuffer(binding.buffer));
            }
            let stride = effective_stride(layout);
            if layout.offset + layout.byte_span() > stride {
                return Err(GeometryError::AttributeOverflow {
                    name: layout.name.clone(),
                    span: layout.byte_span(),
                    offset: layout.offset,
                    stride,
                });
            }
            match strides.get(&binding.buffer) {
                Some(&first) if first != stride => {
                    return Err(GeometryError::StrideMismatch {
                        first,
                        second: stride,
                    })
                }
                _ => {
                    strides.insert(binding.buffer, stride);
                }
            }
            let total = spans.entry(binding.buffer).or_default();
            *total += layout.byte_span();
            if *total > stride {
                return Err(GeometryError::AttributeOverflow {
                    name: layout.name.clone(),
                    span: *total,
                    offset: layout.offset,
                    stride,
                });
            }
        }

        let count = self
            .attributes
            .iter()
            .map(|binding| {
                let bytes = self.buffers[binding.buffer].byte_len();
                let layout = &binding.layout;
                let stride = u64::from(effective_stride(layout));
                let needed = u64::from(layout.offset + layout.byte_span());
                if bytes < needed {
                    0
                } else {
                    ((bytes - needed) / stride + 1) as u32
                }
            })
            .min()
            .unwrap_or(0);
        Ok(count)
    }
}

/// A zero stride means tightly packed, as in classic GL.
fn effective_stride(layout: &AttributeLayout) -> u32 {
    if layout.stride == 0 {
        layout.byte_span()
    } else {
        layout.stride
    }
}

/// Attribute that resolved to a program input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub name: String,
    pub location: u32,
    pub buffer: BufferHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundIndices {
    pub buffer: BufferHandle,
    pub count: u32,
    pub format: IndexFormat,
}

/// GPU-resident geometry ready for drawing with the program it was bound against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundGeometry {
    pub program: ProgramHandle,
    pub buffers: Vec<BufferHandle>,
    pub indices: Option<BoundIndices>,
    pub vertex_count: u32,
    pub attributes: Vec<ActiveAttribute>,
    /// Attributes the program does not use.
    pub skipped: Vec<String>,
}

impl BoundGeometry {
    pub fn release<B: GpuBackend + ?Sized>(self, backend: &mut B) {
        for buffer in self.buffers {
            backend.release(GpuResource::Buffer(buffer));
        }
        if let Some(indices) = self.indices {
            backend.release(GpuResource::Buffer(indices.buffer));
        }
    }
}

/// Uploads geometry and wires named attributes to explicitly named buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryBinder;

impl GeometryBinder {
    pub fn bind<B: GpuBackend + ?Sized>(
        backend: &mut B,
        program: ProgramHandle,
        description: &GeometryDescription,
    ) -> Result<BoundGeometry, GeometryError> {
        let vertex_count = description.vertex_count()?;
        if let Some(indices) = &description.indices {
            indices.check(vertex_count)?;
        }

        let mut buffers = Vec::with_capacity(description.buffers.len());
        for data in &description.buffers {
            match backend.create_buffer(
                BufferTarget::Vertex,
                bytemuck::cast_slice(&data.data),
                data.usage,
            ) {
                Ok(handle) => buffers.push(handle),
                Err(err) => {
                    release_buffers(backend, &buffers);
                    return Err(err.into());
                }
            }
        }

        let mut attributes = Vec::new();
        let mut skipped = Vec::new();
        for binding in &description.attributes {
            let buffer = buffers[binding.buffer];
            match Self::bind_attribute(backend, program, buffer, &binding.layout) {
                Ok(location) => attributes.push(ActiveAttribute {
                    name: binding.layout.name.clone(),
                    location,
                    buffer,
                }),
                Err(GeometryError::AttributeNotFound { name }) => {
                    tracing::warn!(attribute = %name, "attribute not used by program; skipping");
                    skipped.push(name);
                }
                Err(err) => {
                    release_buffers(backend, &buffers);
                    return Err(err);
                }
            }
        }

        let unbound = backend
            .vertex_inputs(program)
            .into_iter()
            .find(|input| !attributes.iter().any(|active| active.location == input.location));
        if let Some(input) = unbound {
            release_buffers(backend, &buffers);
            return Err(GeometryError::UnboundInput {
                name: input.name,
                location: input.location,
            });
        }

        let indices = match &description.indices {
            Some(indices) => {
                match backend.create_buffer(BufferTarget::Index, indices.bytes(), description.index_usage) {
                    Ok(buffer) => Some(BoundIndices {
                        buffer,
                        count: indices.len() as u32,
                        format: indices.format(),
                    }),
                    Err(err) => {
                        release_buffers(backend, &buffers);
                        return Err(err.into());
                    }
                }
            }
            None => None,
        };

        tracing::debug!(
            vertex_count,
            buffers = buffers.len(),
            attributes = attributes.len(),
            skipped = skipped.len(),
            indices = indices.map(|bound| bound.count),
            "geometry bound"
        );
        Ok(BoundGeometry {
            program,
            buffers,
            indices,
            vertex_count,
            attributes,
            skipped,
        })
    }

    /// Resolves `attribute` by name and points it at `buffer`. Returns the input location.
    pub fn bind_attribute<B: GpuBackend + ?Sized>(
        backend: &mut B,
        program: ProgramHandle,
        buffer: BufferHandle,
        attribute: &AttributeLayout,
    ) -> Result<u32, GeometryError> {
        let location = backend
            .attribute_location(program, &attribute.name)
            .ok_or_else(|| GeometryError::AttributeNotFound {
                name: attribute.name.clone(),
            })?;
        backend.define_attribute(
            program,
            buffer,
            VertexLayout {
                location,
                components: attribute.components,
                stride: effective_stride(attribute),
                offset: attribute.offset,
                normalized: attribute.normalized,
            },
        )?;
        Ok(location)
    }

    pub fn upload_textures<B: GpuBackend + ?Sized>(
        backend: &mut B,
        images: &[TextureImage],
    ) -> Result<Vec<TextureHandle>, GeometryError> {
        let mut handles = Vec::with_capacity(images.len());
        for image in images {
            match backend.create_texture(image) {
                Ok(handle) => {
                    let (width, height) = image.dimensions();
                    tracing::debug!(label = %image.label, width, height, "texture uploaded");
                    handles.push(handle);
                }
                Err(err) => {
                    for handle in handles {
                        backend.release(GpuResource::Texture(handle));
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(handles)
    }
}

fn release_buffers<B: GpuBackend + ?Sized>(backend: &mut B, buffers: &[BufferHandle]) {
    for &buffer in buffers {
        backend.release(GpuResource::Buffer(buffer));
    }
}
