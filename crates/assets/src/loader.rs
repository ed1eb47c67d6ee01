//! Concurrent fetching of scene inputs from disk or over plain HTTP.
//!
//! Types:
//!
//! - `ResourceRequest` names one input by id, locator, and expected kind.
//! - `Locator` splits `http(s)://` URLs from filesystem paths resolved against
//!   the loader's base directory.
//! - `Resource` holds decoded text, JSON, or an RGBA image.
//! - `Resources` is the id-keyed result of a successful `load`.
//! - `ResourceError` pairs the failing locator with a `ResourceCause`.
//!
//! Functions:
//!
//! - `ResourceLoader::load` fetches every request concurrently and fails fast:
//!   the first error rejects the whole set and drops the fetches still in flight.
//! - `check_status` treats only 2xx responses as success.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use image::RgbaImage;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Text,
    Json,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub id: String,
    pub locator: String,
    pub kind: ResourceKind,
}

impl ResourceRequest {
    pub fn new(id: impl Into<String>, locator: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
            kind,
        }
    }

    pub fn text(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self::new(id, locator, ResourceKind::Text)
    }

    pub fn json(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self::new(id, locator, ResourceKind::Json)
    }

    pub fn image(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self::new(id, locator, ResourceKind::Image)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Http(Url),
    File(PathBuf),
}

impl Locator {
    pub fn resolve(base: &Path, locator: &str) -> Result<Self, ResourceCause> {
        let trimmed = locator.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Url::parse(trimmed)
                .map(Locator::Http)
                .map_err(|err| ResourceCause::InvalidUrl(err.to_string()));
        }
        let path = Path::new(trimmed.strip_prefix("file://").unwrap_or(trimmed));
        if path.is_absolute() {
            Ok(Locator::File(path.to_path_buf()))
        } else {
            Ok(Locator::File(base.join(path)))
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Http(url) => write!(f, "{url}"),
            Locator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Resource {
    Text(String),
    Json(serde_json::Value),
    Image(RgbaImage),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Text(_) => ResourceKind::Text,
            Resource::Json(_) => ResourceKind::Json,
            Resource::Image(_) => ResourceKind::Image,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceCause {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("resource is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("undecodable image: {0}")]
    Image(#[from] image::ImageError),
}

/// A single failed fetch; rejects the whole load.
#[derive(Debug, Error)]
#[error("failed to load {url}: {cause}")]
pub struct ResourceError {
    pub url: String,
    #[source]
    pub cause: ResourceCause,
}

impl ResourceError {
    pub fn new(url: impl Into<String>, cause: impl Into<ResourceCause>) -> Self {
        Self {
            url: url.into(),
            cause: cause.into(),
        }
    }
}

/// Resources keyed by request id.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    entries: HashMap<String, Resource>,
}

impl Resources {
    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.entries.get(id)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        match self.entries.get(id)? {
            Resource::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn json(&self, id: &str) -> Option<&serde_json::Value> {
        match self.entries.get(id)? {
            Resource::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn image(&self, id: &str) -> Option<&RgbaImage> {
        match self.entries.get(id)? {
            Resource::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn take(&mut self, id: &str) -> Option<Resource> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Success iff the status is in `200..=299`.
pub fn check_status(status: u16) -> Result<(), ResourceCause> {
    if (200..=299).contains(&status) {
        Ok(())
    } else {
        Err(ResourceCause::Status(status))
    }
}

#[derive(Debug, Clone)]
pub struct ResourceLoader {
    http: Client,
    base_dir: PathBuf,
}

impl ResourceLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        Ok(Self::with_client(base_dir, http))
    }

    pub fn with_client(base_dir: impl Into<PathBuf>, http: Client) -> Self {
        Self {
            http,
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Fetches every request concurrently. The first failure wins and the
    /// remaining fetches are dropped.
    pub async fn load(&self, requests: &[ResourceRequest]) -> Result<Resources, ResourceError> {
        let fetches = requests.iter().map(|request| async move {
            let resource = self.fetch(request).await?;
            Ok::<_, ResourceError>((request.id.clone(), resource))
        });
        let loaded = try_join_all(fetches).await?;
        debug!(count = loaded.len(), "resources loaded");
        Ok(Resources {
            entries: loaded.into_iter().collect(),
        })
    }

    pub async fn fetch(&self, request: &ResourceRequest) -> Result<Resource, ResourceError> {
        let locator = Locator::resolve(&self.base_dir, &request.locator)
            .map_err(|cause| ResourceError::new(request.locator.as_str(), cause))?;
        let url = locator.to_string();
        let bytes = self
            .read_bytes(&locator)
            .await
            .map_err(|cause| ResourceError::new(url.as_str(), cause))?;
        debug!(%url, bytes = bytes.len(), kind = ?request.kind, "fetched resource");
        decode(request.kind, bytes).map_err(|cause| ResourceError::new(url, cause))
    }

    async fn read_bytes(&self, locator: &Locator) -> Result<Vec<u8>, ResourceCause> {
        match locator {
            Locator::File(path) => Ok(tokio::fs::read(path).await?),
            Locator::Http(url) => {
                let response = self.http.get(url.clone()).send().await?;
                check_status(response.status().as_u16())?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

fn decode(kind: ResourceKind, bytes: Vec<u8>) -> Result<Resource, ResourceCause> {
    match kind {
        ResourceKind::Text => Ok(Resource::Text(String::from_utf8(bytes)?)),
        ResourceKind::Json => Ok(Resource::Json(serde_json::from_slice(&bytes)?)),
        ResourceKind::Image => Ok(Resource::Image(image::load_from_memory(&bytes)?.to_rgba8())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_2xx_is_success() {
        assert!(check_status(200).is_ok());
        assert!(check_status(299).is_ok());
        assert!(matches!(check_status(199), Err(ResourceCause::Status(199))));
        assert!(matches!(check_status(304), Err(ResourceCause::Status(304))));
        assert!(matches!(check_status(404), Err(ResourceCause::Status(404))));
    }

    #[test]
    fn resolves_relative_paths_against_base() {
        let base = Path::new("/srv/scenes/cube");
        assert_eq!(
            Locator::resolve(base, "shader.vs.glsl").unwrap(),
            Locator::File(PathBuf::from("/srv/scenes/cube/shader.vs.glsl"))
        );
        assert_eq!(
            Locator::resolve(base, "/tmp/mesh.json").unwrap(),
            Locator::File(PathBuf::from("/tmp/mesh.json"))
        );
        assert!(matches!(
            Locator::resolve(base, "https://example.com/Susan.json").unwrap(),
            Locator::Http(url) if url.path() == "/Susan.json"
        ));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode(ResourceKind::Json, b"{ \"meshes\": [".to_vec()).unwrap_err();
        assert!(matches!(err, ResourceCause::Json(_)));
    }
}
