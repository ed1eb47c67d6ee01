//! Scene inputs for the renderer: fetching, mesh decoding, and `scene.toml`.
//!
//! ```text
//!   scene.toml ──▶ ScenePack::load ──▶ requests() ──▶ ResourceLoader::load
//!                                                        │ (join, fail-fast)
//!                                                        ▼
//!                      SceneDescription ◀── describe ◀── Resources
//! ```

mod loader;
mod manifest;
mod mesh;
mod pack;

pub use loader::{
    check_status, Locator, Resource, ResourceCause, ResourceError, ResourceKind, ResourceLoader,
    ResourceRequest, Resources,
};
pub use manifest::{
    AttributeSpec, BufferSpec, CameraSpec, DrawModeSpec, DrawSpec, IndexSpec, IndexType,
    ManifestError, MeshSpec, RotationSpec, SceneManifest, ShaderFiles, TextureSpec, UniformSpec,
};
pub use mesh::{MeshAttributeNames, MeshData, MeshError};
pub use pack::{SceneError, ScenePack, MANIFEST_FILE};
