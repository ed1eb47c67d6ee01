//! Schema for `scene.toml`, the manifest describing one renderable scene.
//!
//! Types:
//!
//! - `SceneManifest` names the shader pair, where geometry comes from (a JSON
//!   mesh or inline buffers), textures, draw policy, camera, rotation, uniform
//!   names, and clear color. Every section except `shaders` has defaults.
//! - `MeshSpec`, `BufferSpec`, `AttributeSpec`, `IndexSpec`, `TextureSpec`
//!   describe the geometry and image inputs.
//! - `DrawSpec`, `CameraSpec`, `RotationSpec`, `UniformSpec` carry the frame
//!   policy and convert into renderer types.
//!
//! Functions:
//!
//! - `SceneManifest::validate` returns human-readable issues so loaders can
//!   report every misconfiguration at once instead of failing on the first.
use std::path::PathBuf;

use glam::Vec3;
use renderer::{
    AttributeBinding, AttributeLayout, Camera, DrawMode, GeometryDescription, IndexData,
    RotationPolicy, UniformNames, VertexBufferData, DEFAULT_CLEAR_COLOR, DEFAULT_ROTATION_PERIOD,
    MAX_TEXTURE_UNITS,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mesh::MeshAttributeNames;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found at {0}")]
    Missing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    Validation(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SceneManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub shaders: ShaderFiles,
    #[serde(default)]
    pub mesh: Option<MeshSpec>,
    #[serde(default)]
    pub buffers: Vec<BufferSpec>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub indices: Option<IndexSpec>,
    #[serde(default)]
    pub textures: Vec<TextureSpec>,
    #[serde(default)]
    pub draw: DrawSpec,
    #[serde(default)]
    pub camera: CameraSpec,
    #[serde(default)]
    pub rotation: RotationSpec,
    #[serde(default)]
    pub uniforms: UniformSpec,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

fn default_clear_color() -> [f32; 4] {
    DEFAULT_CLEAR_COLOR
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ShaderFiles {
    pub vertex: String,
    pub fragment: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MeshSpec {
    pub file: String,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default = "default_tex_coord")]
    pub tex_coord: String,
    #[serde(default = "default_normal")]
    pub normal: String,
}

fn default_position() -> String {
    MeshAttributeNames::default().position
}

fn default_tex_coord() -> String {
    MeshAttributeNames::default().tex_coord
}

fn default_normal() -> String {
    MeshAttributeNames::default().normal
}

impl MeshSpec {
    pub fn attribute_names(&self) -> MeshAttributeNames {
        MeshAttributeNames {
            position: self.position.clone(),
            tex_coord: self.tex_coord.clone(),
            normal: self.normal.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BufferSpec {
    pub data: Vec<f32>,
    #[serde(default)]
    pub dynamic: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(default)]
    pub buffer: usize,
    pub components: u32,
    /// Bytes between records; 0 means tightly packed.
    #[serde(default)]
    pub stride: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub normalized: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    U16,
    U32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    #[serde(default, rename = "type")]
    pub index_type: IndexType,
    pub data: Vec<u32>,
}

impl IndexSpec {
    pub fn to_index_data(&self) -> IndexData {
        match self.index_type {
            IndexType::U16 => IndexData::Uint16(self.data.iter().map(|&index| index as u16).collect()),
            IndexType::U32 => IndexData::Uint32(self.data.clone()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TextureSpec {
    pub path: String,
    #[serde(default = "default_flip_y")]
    pub flip_y: bool,
}

fn default_flip_y() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrawModeSpec {
    #[default]
    Arrays,
    Indexed,
}

impl From<DrawModeSpec> for DrawMode {
    fn from(mode: DrawModeSpec) -> Self {
        match mode {
            DrawModeSpec::Arrays => DrawMode::Arrays,
            DrawModeSpec::Indexed => DrawMode::Indexed,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawSpec {
    #[serde(default)]
    pub mode: DrawModeSpec,
    /// Vertices or indices per draw; everything when absent.
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct CameraSpec {
    #[serde(default = "default_eye")]
    pub eye: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
    #[serde(default = "default_up")]
    pub up: [f32; 3],
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
}

fn default_eye() -> [f32; 3] {
    Camera::default().eye.to_array()
}

fn default_up() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

fn default_fov() -> f32 {
    Camera::default().fov_y_degrees
}

fn default_near() -> f32 {
    Camera::default().near
}

fn default_far() -> f32 {
    Camera::default().far
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self::from(Camera::default())
    }
}

impl From<Camera> for CameraSpec {
    fn from(camera: Camera) -> Self {
        Self {
            eye: camera.eye.to_array(),
            target: camera.target.to_array(),
            up: camera.up.to_array(),
            fov_degrees: camera.fov_y_degrees,
            near: camera.near,
            far: camera.far,
        }
    }
}

impl From<CameraSpec> for Camera {
    fn from(spec: CameraSpec) -> Self {
        Camera {
            eye: Vec3::from_array(spec.eye),
            target: Vec3::from_array(spec.target),
            up: Vec3::from_array(spec.up),
            fov_y_degrees: spec.fov_degrees,
            near: spec.near,
            far: spec.far,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RotationSpec {
    Static,
    SingleAxis {
        #[serde(default = "default_primary")]
        axis: [f32; 3],
        #[serde(default = "default_period")]
        period: f64,
    },
    TwoAxis {
        #[serde(default = "default_primary")]
        primary: [f32; 3],
        #[serde(default = "default_secondary")]
        secondary: [f32; 3],
        #[serde(default = "default_period")]
        period: f64,
        #[serde(default = "default_divisor")]
        secondary_divisor: u32,
    },
}

fn default_primary() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

fn default_secondary() -> [f32; 3] {
    [1.0, 0.0, 0.0]
}

fn default_period() -> f64 {
    DEFAULT_ROTATION_PERIOD
}

fn default_divisor() -> u32 {
    4
}

impl Default for RotationSpec {
    fn default() -> Self {
        RotationSpec::TwoAxis {
            primary: default_primary(),
            secondary: default_secondary(),
            period: default_period(),
            secondary_divisor: default_divisor(),
        }
    }
}

impl RotationSpec {
    pub fn period(&self) -> Option<f64> {
        match *self {
            RotationSpec::Static => None,
            RotationSpec::SingleAxis { period, .. } | RotationSpec::TwoAxis { period, .. } => Some(period),
        }
    }

    /// Same policy with its period replaced; static rotation is left alone.
    pub fn with_period(self, new_period: f64) -> Self {
        match self {
            RotationSpec::Static => RotationSpec::Static,
            RotationSpec::SingleAxis { axis, .. } => RotationSpec::SingleAxis {
                axis,
                period: new_period,
            },
            RotationSpec::TwoAxis {
                primary,
                secondary,
                secondary_divisor,
                ..
            } => RotationSpec::TwoAxis {
                primary,
                secondary,
                period: new_period,
                secondary_divisor,
            },
        }
    }
}

impl From<RotationSpec> for RotationPolicy {
    fn from(spec: RotationSpec) -> Self {
        match spec {
            RotationSpec::Static => RotationPolicy::Static,
            RotationSpec::SingleAxis { axis, period } => RotationPolicy::SingleAxis {
                axis: Vec3::from_array(axis),
                period,
            },
            RotationSpec::TwoAxis {
                primary,
                secondary,
                period,
                secondary_divisor,
            } => RotationPolicy::TwoAxis {
                primary: Vec3::from_array(primary),
                secondary: Vec3::from_array(secondary),
                period,
                secondary_divisor,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct UniformSpec {
    #[serde(default = "default_world")]
    pub world: String,
    #[serde(default = "default_view")]
    pub view: String,
    #[serde(default = "default_projection")]
    pub projection: String,
}

fn default_world() -> String {
    UniformNames::default().world
}

fn default_view() -> String {
    UniformNames::default().view
}

fn default_projection() -> String {
    UniformNames::default().projection
}

impl Default for UniformSpec {
    fn default() -> Self {
        Self {
            world: default_world(),
            view: default_view(),
            projection: default_projection(),
        }
    }
}

impl From<UniformSpec> for UniformNames {
    fn from(spec: UniformSpec) -> Self {
        UniformNames {
            world: spec.world,
            view: spec.view,
            projection: spec.projection,
        }
    }
}

impl SceneManifest {
    pub fn from_toml(raw: &str) -> Result<Self, ManifestError> {
        let manifest: SceneManifest = toml::from_str(raw)?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(ManifestError::Validation(issues));
        }
        Ok(manifest)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.shaders.vertex.trim().is_empty() {
            issues.push("shaders.vertex must name a file".to_string());
        }
        if self.shaders.fragment.trim().is_empty() {
            issues.push("shaders.fragment must name a file".to_string());
        }

        match (&self.mesh, self.buffers.is_empty()) {
            (Some(_), false) => {
                issues.push("declare either a mesh file or inline buffers, not both".to_string())
            }
            (None, true) => issues.push("scene has no geometry: add [mesh] or [[buffers]]".to_string()),
            _ => {}
        }
        if self.mesh.is_some() && (!self.attributes.is_empty() || self.indices.is_some()) {
            issues.push("mesh scenes take attributes and indices from the mesh file".to_string());
        }
        if self.mesh.is_none() && !self.buffers.is_empty() && self.attributes.is_empty() {
            issues.push("inline buffers need at least one [[attributes]] entry".to_string());
        }
        for attribute in &self.attributes {
            if attribute.buffer >= self.buffers.len() {
                issues.push(format!(
                    "attribute '{}' references buffer {} but only {} are declared",
                    attribute.name,
                    attribute.buffer,
                    self.buffers.len()
                ));
            }
            if !(1..=4).contains(&attribute.components) {
                issues.push(format!(
                    "attribute '{}' has {} components; expected 1 to 4",
                    attribute.name, attribute.components
                ));
            }
        }
        if let Some(indices) = &self.indices {
            if indices.data.len() % 3 != 0 {
                issues.push(format!(
                    "index count {} is not a multiple of 3",
                    indices.data.len()
                ));
            }
            if indices.index_type == IndexType::U16 {
                if let Some(index) = indices.data.iter().find(|&&index| index > u32::from(u16::MAX)) {
                    issues.push(format!("index {index} does not fit the u16 index type"));
                }
            }
        }
        if self.draw.mode == DrawModeSpec::Indexed && self.mesh.is_none() && self.indices.is_none() {
            issues.push("indexed drawing needs [indices] or a mesh file".to_string());
        }

        if self.textures.len() > MAX_TEXTURE_UNITS {
            issues.push(format!(
                "{} textures declared; at most {MAX_TEXTURE_UNITS} are supported",
                self.textures.len()
            ));
        }
        for texture in &self.textures {
            if texture.path.trim().is_empty() {
                issues.push("texture entries must name a file".to_string());
            }
        }

        let camera = &self.camera;
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            issues.push(format!(
                "camera.fov_degrees {} must lie between 0 and 180",
                camera.fov_degrees
            ));
        }
        if !(camera.near > 0.0 && camera.far > camera.near) {
            issues.push(format!(
                "camera clip range {}..{} must satisfy 0 < near < far",
                camera.near, camera.far
            ));
        }
        if camera.eye == camera.target {
            issues.push("camera.eye and camera.target must differ".to_string());
        }

        if let Some(period) = self.rotation.period() {
            if !(period.is_finite() && period > 0.0) {
                issues.push(format!("rotation.period {period} must be positive"));
            }
        }
        if let RotationSpec::TwoAxis {
            secondary_divisor: 0,
            ..
        } = self.rotation
        {
            issues.push("rotation.secondary_divisor must be at least 1".to_string());
        }
        issues
    }

    /// Geometry built from the inline `buffers`, `attributes`, and `indices`.
    pub fn inline_geometry(&self) -> GeometryDescription {
        GeometryDescription {
            buffers: self
                .buffers
                .iter()
                .map(|buffer| VertexBufferData {
                    data: buffer.data.clone(),
                    usage: if buffer.dynamic {
                        renderer::BufferUsage::Dynamic
                    } else {
                        renderer::BufferUsage::Static
                    },
                })
                .collect(),
            attributes: self
                .attributes
                .iter()
                .map(|attribute| {
                    let layout = AttributeLayout::new(
                        attribute.name.as_str(),
                        attribute.components,
                        attribute.stride,
                        attribute.offset,
                    );
                    AttributeBinding {
                        buffer: attribute.buffer,
                        layout: if attribute.normalized {
                            layout.normalized()
                        } else {
                            layout
                        },
                    }
                })
                .collect(),
            indices: self.indices.as_ref().map(IndexSpec::to_index_data),
            ..GeometryDescription::default()
        }
    }
}
