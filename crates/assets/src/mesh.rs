//! Decodes the JSON mesh export (`meshes[0]`) into renderer geometry.
//!
//! The file carries flat `vertices`, a `faces` list of index triples, the
//! first `texturecoords` channel, and optional `normals`. Each attribute goes
//! into its own tightly packed buffer.
use glam::Vec3;
use renderer::{
    AttributeBinding, AttributeLayout, BufferUsage, GeometryDescription, IndexData,
    VertexBufferData,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh JSON does not match the expected layout: {0}")]
    Format(#[from] serde_json::Error),

    #[error("mesh file contains no meshes")]
    Empty,

    #[error("{attribute} holds {len} floats, not a multiple of {components}")]
    Ragged {
        attribute: &'static str,
        len: usize,
        components: usize,
    },

    #[error("{attribute} covers {found} vertices but positions cover {expected}")]
    CountMismatch {
        attribute: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("face {face} has {len} indices; only triangles are supported")]
    NonTriangularFace { face: usize, len: usize },

    #[error("face {face} references vertex {index} but the mesh has {vertex_count}")]
    IndexOutOfRange {
        face: usize,
        index: u32,
        vertex_count: usize,
    },
}

#[derive(Debug, Deserialize)]
struct MeshFile {
    meshes: Vec<MeshEntry>,
}

#[derive(Debug, Deserialize)]
struct MeshEntry {
    vertices: Vec<f32>,
    faces: Vec<Vec<u32>>,
    #[serde(default)]
    texturecoords: Vec<Vec<f32>>,
    #[serde(default)]
    normals: Option<Vec<f32>>,
}

/// Shader input names the mesh attributes bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshAttributeNames {
    pub position: String,
    pub tex_coord: String,
    pub normal: String,
}

impl Default for MeshAttributeNames {
    fn default() -> Self {
        Self {
            position: "vertPosition".to_string(),
            tex_coord: "vertTexCoord".to_string(),
            normal: "vertNormal".to_string(),
        }
    }
}

/// Positions (3 floats), optional UVs (2) and normals (3) per vertex, plus triangle indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub tex_coords: Option<Vec<f32>>,
    pub normals: Option<Vec<f32>>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MeshError> {
        Self::from_file(serde_json::from_slice(bytes)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, MeshError> {
        Self::from_file(serde_json::from_value(value)?)
    }

    fn from_file(file: MeshFile) -> Result<Self, MeshError> {
        let entry = file.meshes.into_iter().next().ok_or(MeshError::Empty)?;
        let vertex_count = per_vertex("vertices", &entry.vertices, 3)?;

        let tex_coords = match entry.texturecoords.into_iter().next() {
            Some(coords) => {
                matching("texturecoords", &coords, 2, vertex_count)?;
                Some(coords)
            }
            None => None,
        };
        let normals = match entry.normals {
            Some(normals) => {
                matching("normals", &normals, 3, vertex_count)?;
                Some(normals)
            }
            None => None,
        };

        let mut indices = Vec::with_capacity(entry.faces.len() * 3);
        for (face, corners) in entry.faces.iter().enumerate() {
            if corners.len() != 3 {
                return Err(MeshError::NonTriangularFace {
                    face,
                    len: corners.len(),
                });
            }
            if let Some(&index) = corners.iter().find(|&&index| index as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    face,
                    index,
                    vertex_count,
                });
            }
            indices.extend_from_slice(corners);
        }

        Ok(Self {
            positions: entry.vertices,
            tex_coords,
            normals,
            indices,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// One buffer per attribute. Normals are re-normalized; indices use `u16`
    /// whenever every vertex fits.
    pub fn to_geometry(&self, names: &MeshAttributeNames) -> GeometryDescription {
        let mut geometry = GeometryDescription::default();
        push_attribute(&mut geometry, &names.position, 3, self.positions.clone());
        if let Some(coords) = &self.tex_coords {
            push_attribute(&mut geometry, &names.tex_coord, 2, coords.clone());
        }
        if let Some(normals) = &self.normals {
            let unit = normals
                .chunks_exact(3)
                .flat_map(|n| Vec3::new(n[0], n[1], n[2]).normalize_or_zero().to_array())
                .collect();
            push_attribute(&mut geometry, &names.normal, 3, unit);
        }

        geometry.indices = Some(if self.vertex_count() <= usize::from(u16::MAX) + 1 {
            IndexData::Uint16(self.indices.iter().map(|&index| index as u16).collect())
        } else {
            IndexData::Uint32(self.indices.clone())
        });
        geometry.index_usage = BufferUsage::Static;
        geometry
    }
}

fn push_attribute(geometry: &mut GeometryDescription, name: &str, components: u32, data: Vec<f32>) {
    geometry.attributes.push(AttributeBinding {
        buffer: geometry.buffers.len(),
        layout: AttributeLayout::new(name, components, components * 4, 0),
    });
    geometry.buffers.push(VertexBufferData::new(data));
}

fn per_vertex(attribute: &'static str, data: &[f32], components: usize) -> Result<usize, MeshError> {
    if data.len() % components != 0 {
        return Err(MeshError::Ragged {
            attribute,
            len: data.len(),
            components,
        });
    }
    Ok(data.len() / components)
}

fn matching(
    attribute: &'static str,
    data: &[f32],
    components: usize,
    expected: usize,
) -> Result<(), MeshError> {
    let found = per_vertex(attribute, data, components)?;
    if found != expected {
        return Err(MeshError::CountMismatch {
            attribute,
            found,
            expected,
        });
    }
    Ok(())
}
