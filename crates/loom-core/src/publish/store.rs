//! Artifact store abstraction and a filesystem-backed implementation.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Cache header for files that must always be revalidated.
pub const NO_CACHE: &str = "no-cache";

/// Cache header for fingerprinted, immutable assets (one year).
pub const LONG_CACHE: &str = "max-age=31536000, public";

/// Options for a single upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub cache_control: String,
}

impl PutOptions {
    /// Options derived from the file's extension.
    pub fn for_file(path: &Path) -> Self {
        Self {
            cache_control: cache_control_for(path).to_string(),
        }
    }
}

/// `html` and `json` are never cached; everything else is cached for a year.
pub fn cache_control_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("json") => NO_CACHE,
        _ => LONG_CACHE,
    }
}

/// An object listed from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Object storage used to publish build artifacts.
///
/// Keys are `/`-separated; a leading `/` is not significant.
pub trait ArtifactStore: Send + Sync {
    /// Upload a local file under `key`.
    fn put(&self, key: &str, local_file: &Path, options: &PutOptions) -> Result<()>;

    /// List up to `max_keys` objects whose key starts with `prefix`.
    fn list(&self, prefix: &str, max_keys: usize) -> Result<Vec<ObjectInfo>>;

    /// URL objects are served from, when the store knows it.
    fn public_base_url(&self) -> Option<String> {
        None
    }
}

/// Directory holding cache-control sidecars, inside the store root.
const META_DIR: &str = ".loom-meta";

/// Artifact store that mirrors objects into a local directory.
///
/// Cache-control headers are kept in sidecar files under `.loom-meta/` so a
/// static file server in front of the directory can apply them.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the object stored under `key`.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(normalize_key(key))
    }

    /// Cache-control header recorded for `key`, if the object exists.
    pub fn cache_control(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.root.join(META_DIR).join(normalize_key(key))).ok()
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn put(&self, key: &str, local_file: &Path, options: &PutOptions) -> Result<()> {
        let key = normalize_key(key);
        if key.is_empty() || key.split('/').any(|segment| segment == "..") {
            return Err(Error::Publish(format!("invalid object key '{}'", key)));
        }

        let target = self.root.join(key);
        let meta = self.root.join(META_DIR).join(key);
        for path in [&target, &meta] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::copy(local_file, &target)?;
        fs::write(&meta, &options.cache_control)?;
        Ok(())
    }

    fn list(&self, prefix: &str, max_keys: usize) -> Result<Vec<ObjectInfo>> {
        let prefix = normalize_key(prefix);
        let mut objects = Vec::new();
        if !self.root.exists() {
            return Ok(objects);
        }

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != META_DIR);
        for entry in walker {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let key = relative_key(&self.root, entry.path());
            if key.starts_with(prefix) {
                objects.push(ObjectInfo {
                    key,
                    size: entry.metadata().map(|m| m.len()).unwrap_or(0),
                });
                if objects.len() >= max_keys {
                    break;
                }
            }
        }
        Ok(objects)
    }

    fn public_base_url(&self) -> Option<String> {
        Some(format!("file://{}", self.root.display()))
    }
}

fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

/// `/`-joined path of `path` relative to `root`.
pub fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
