//! A scene directory: `scene.toml` plus the shaders, mesh, and images it names.
//!
//! `ScenePack::load` reads and validates the manifest; `ScenePack::resolve`
//! fetches every referenced resource in one fail-fast batch and assembles the
//! renderer's `SceneDescription`.
use std::fs;
use std::path::{Path, PathBuf};

use renderer::{SceneDescription, ShaderSource, TextureImage};
use thiserror::Error;
use tracing::{debug, info};

use crate::loader::{Resource, ResourceError, ResourceLoader, ResourceRequest, Resources};
use crate::manifest::{ManifestError, SceneManifest};
use crate::mesh::{MeshData, MeshError};

pub const MANIFEST_FILE: &str = "scene.toml";

const VERTEX_ID: &str = "shader.vertex";
const FRAGMENT_ID: &str = "shader.fragment";
const MESH_ID: &str = "mesh";

#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("mesh '{file}' is invalid: {source}")]
    Mesh {
        file: String,
        #[source]
        source: MeshError,
    },

    #[error("resource '{0}' was not loaded with the expected kind")]
    MissingResource(String),
}

#[derive(Debug, Clone)]
pub struct ScenePack {
    root: PathBuf,
    manifest: SceneManifest,
}

impl ScenePack {
    /// Accepts either a scene directory or a path to its manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let (root, manifest_path) = if path.is_dir() {
            (path.to_path_buf(), path.join(MANIFEST_FILE))
        } else {
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (root, path.to_path_buf())
        };
        if !manifest_path.exists() {
            return Err(ManifestError::Missing(manifest_path));
        }

        let raw = fs::read_to_string(&manifest_path)?;
        let manifest = SceneManifest::from_toml(&raw)?;
        debug!(path = %manifest_path.display(), "scene manifest loaded");
        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &SceneManifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut SceneManifest {
        &mut self.manifest
    }

    /// Display name: the manifest's, else the directory's.
    pub fn name(&self) -> String {
        self.manifest
            .name
            .clone()
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "scene".to_string())
    }

    /// Every resource the manifest references, keyed by stable ids.
    pub fn requests(&self) -> Vec<ResourceRequest> {
        let mut requests = vec![
            ResourceRequest::text(VERTEX_ID, self.manifest.shaders.vertex.as_str()),
            ResourceRequest::text(FRAGMENT_ID, self.manifest.shaders.fragment.as_str()),
        ];
        if let Some(mesh) = &self.manifest.mesh {
            requests.push(ResourceRequest::json(MESH_ID, mesh.file.as_str()));
        }
        for (unit, texture) in self.manifest.textures.iter().enumerate() {
            requests.push(ResourceRequest::image(texture_id(unit), texture.path.as_str()));
        }
        requests
    }

    /// Loads every resource relative to the pack root and builds the scene.
    pub async fn resolve(&self) -> Result<SceneDescription, SceneError> {
        let loader = ResourceLoader::new(&self.root)
            .map_err(|err| ResourceError::new(self.root.display().to_string(), err))?;
        self.resolve_with(&loader).await
    }

    pub async fn resolve_with(&self, loader: &ResourceLoader) -> Result<SceneDescription, SceneError> {
        let requests = self.requests();
        info!(scene = %self.name(), resources = requests.len(), "loading scene resources");
        let resources = loader.load(&requests).await?;
        self.describe(resources)
    }

    fn describe(&self, mut resources: Resources) -> Result<SceneDescription, SceneError> {
        let manifest = &self.manifest;
        let shaders = ShaderSource::new(
            required_text(&resources, VERTEX_ID)?,
            required_text(&resources, FRAGMENT_ID)?,
        );

        let geometry = match &manifest.mesh {
            Some(mesh) => {
                let value = match resources.take(MESH_ID) {
                    Some(Resource::Json(value)) => value,
                    _ => return Err(SceneError::MissingResource(MESH_ID.to_string())),
                };
                let data = MeshData::from_value(value).map_err(|source| SceneError::Mesh {
                    file: mesh.file.clone(),
                    source,
                })?;
                data.to_geometry(&mesh.attribute_names())
            }
            None => manifest.inline_geometry(),
        };

        let mut textures = Vec::with_capacity(manifest.textures.len());
        for (unit, spec) in manifest.textures.iter().enumerate() {
            let id = texture_id(unit);
            let pixels = match resources.take(&id) {
                Some(Resource::Image(pixels)) => pixels,
                _ => return Err(SceneError::MissingResource(id)),
            };
            let mut image = TextureImage::new(spec.path.as_str(), pixels);
            image.flip_y = spec.flip_y;
            textures.push(image);
        }

        let mut description = SceneDescription::new(self.name(), shaders, geometry);
        description.textures = textures;
        description.draw_mode = manifest.draw.mode.into();
        description.draw_count = manifest.draw.count;
        description.camera = manifest.camera.into();
        description.rotation = manifest.rotation.into();
        description.uniforms = manifest.uniforms.clone().into();
        description.clear_color = manifest.clear_color;
        Ok(description)
    }
}

fn texture_id(unit: usize) -> String {
    format!("texture.{unit}")
}

fn required_text(resources: &Resources, id: &str) -> Result<String, SceneError> {
    resources
        .text(id)
        .map(str::to_string)
        .ok_or_else(|| SceneError::MissingResource(id.to_string()))
}
