//! Publishing of build output, job logs and template packages.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use walkdir::WalkDir;

use super::store::{ArtifactStore, PutOptions, relative_key};
use crate::error::{Error, Result};
use crate::schema::{Env, Meta};

/// Key prefix under which template packages are published.
pub const TEMPLATE_PREFIX: &str = "lowcode-templates";

/// Publishes artifacts to an [`ArtifactStore`] and derives their public URLs.
#[derive(Debug, Clone)]
pub struct Publisher {
    /// Public base URL of the store, without a trailing slash.
    pub base_url: String,
    /// First key segment for build artifacts.
    pub key_prefix: String,
    /// Number of concurrent uploads.
    pub parallelism: usize,
}

impl Publisher {
    pub fn new(base_url: impl Into<String>, key_prefix: impl Into<String>, parallelism: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_prefix: key_prefix.into(),
            parallelism: parallelism.max(1),
        }
    }

    /// Version-pinned and `latest` keys for a file under `dist/`.
    ///
    /// `relative` is the path below `dist/`, e.g. `fat/1.0.0/index.html`.
    /// For `pro` the environment segment is dropped.
    pub fn artifact_keys(&self, meta: &Meta, env: Env, relative: &str) -> (String, String) {
        let relative = if env == Env::Pro {
            relative.strip_prefix("pro/").unwrap_or(relative)
        } else {
            relative
        };

        let mut replaced = false;
        let latest_relative = relative
            .split('/')
            .map(|segment| {
                if !replaced && segment == meta.app_version {
                    replaced = true;
                    "latest"
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/");

        (
            format!("/{}/{}/{}", self.key_prefix, meta.project_name, relative),
            format!("/{}/{}/{}", self.key_prefix, meta.project_name, latest_relative),
        )
    }

    /// Public URL of the published entry page.
    pub fn entry_url(&self, meta: &Meta, env: Env) -> String {
        match env {
            Env::Pro => format!(
                "{}/{}/{}/latest/index.html",
                self.base_url, self.key_prefix, meta.project_name
            ),
            _ => format!(
                "{}/{}/{}/{}/latest/index.html",
                self.base_url, self.key_prefix, meta.project_name, env
            ),
        }
    }

    /// Upload every file under `dist_dir` to its pinned and `latest` keys.
    ///
    /// Returns the entry page URL. Fails if any upload fails.
    pub fn publish_dist(
        &self,
        store: &dyn ArtifactStore,
        dist_dir: &Path,
        meta: &Meta,
        env: Env,
    ) -> Result<String> {
        if meta.project_name.is_empty() || meta.app_version.is_empty() {
            return Err(Error::Publish(
                "meta.project_name and meta.appVersion are required".to_string(),
            ));
        }

        let files = list_files(dist_dir)?;
        tracing::info!("Publishing {} files from {}", files.len(), dist_dir.display());

        self.upload_all(&files, |file| {
            let relative = relative_key(dist_dir, file);
            let (pinned, latest) = self.artifact_keys(meta, env, &relative);
            let options = PutOptions::for_file(file);
            store.put(&pinned, file, &options)?;
            tracing::info!("Uploaded {}", pinned);
            store.put(&latest, file, &options)?;
            tracing::info!("Uploaded {}", latest);
            Ok(())
        })?;

        Ok(self.entry_url(meta, env))
    }

    /// Upload a job log. Never fails: returns an empty URL when the log is
    /// missing or the upload fails.
    pub fn upload_log(&self, store: &dyn ArtifactStore, log_path: &Path, meta: &Meta, env: Env) -> String {
        if !log_path.exists() {
            tracing::warn!("Build log not found: {}", log_path.display());
            return String::new();
        }

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let name = format!("build-{}-{}-{}.log", env, meta.app_version, millis);
        let key = format!("/{}/{}/{}", self.key_prefix, meta.project_name, name);

        match store.put(&key, log_path, &PutOptions::for_file(log_path)) {
            Ok(()) => format!("{}{}", self.base_url, key),
            Err(e) => {
                tracing::warn!("Build log upload failed: {}", e);
                String::new()
            }
        }
    }

    /// Publish a template package under `lowcode-templates/<namespace>/<version>`.
    ///
    /// Refuses to overwrite a version that already has objects. Dotfiles are
    /// included. Returns the template root URL.
    pub fn publish_template(
        &self,
        store: &dyn ArtifactStore,
        namespace: &str,
        version: &str,
        root: &Path,
    ) -> Result<String> {
        let target = format!("{}/{}/{}", TEMPLATE_PREFIX, namespace, version);

        let exists = match store.list(&format!("{}/", target), 1) {
            Ok(objects) => !objects.is_empty(),
            Err(e) => {
                tracing::warn!("Could not list {}: {}", target, e);
                false
            }
        };
        if exists {
            return Err(Error::Publish(format!("{} already exists", target)));
        }

        let files = list_files(root)?;
        self.upload_all(&files, |file| {
            let key = format!("{}/{}", target, relative_key(root, file));
            store.put(&key, file, &PutOptions::for_file(file))?;
            tracing::info!("Uploaded {}", key);
            Ok(())
        })?;

        Ok(format!("{}/{}", self.base_url, target))
    }

    /// Run `upload` for every file with bounded parallelism.
    ///
    /// Upload threads log through the caller's tracing dispatcher so their
    /// narration lands in the same job log.
    fn upload_all<F>(&self, files: &[PathBuf], upload: F) -> Result<()>
    where
        F: Fn(&Path) -> Result<()> + Sync,
    {
        let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .build()
            .map_err(|e| Error::Publish(format!("failed to start upload pool: {}", e)))?;

        pool.install(|| {
            files.par_iter().try_for_each(|file| {
                tracing::dispatcher::with_default(&dispatch, || upload(file.as_path())).map_err(|e| match e {
                    Error::Publish(_) => e,
                    other => Error::Publish(format!("{}: {}", file.display(), other)),
                })
            })
        })
    }
}

/// All regular files under `root`, sorted by path.
fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
