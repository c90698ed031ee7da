//! Staging directory management.
//!
//! Every build gets a private working directory keyed by its build id,
//! placed under a shared staging root (by default `.temp` next to the
//! template directory):
//!
//! ```text
//! templates/
//! ├── simple/            # template tree (read-only)
//! └── .temp/
//!     ├── <buildId>/     # staged copy, compiled and bundled in place
//!     │   └── dist/<env>/<appVersion>/index.html
//!     └── <buildId>.log  # job log
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::schema::Env;

/// Name of the default staging root, created next to the template directory.
pub const STAGING_ROOT_NAME: &str = ".temp";

/// Paths owned by one build.
#[derive(Debug, Clone)]
pub struct StagingDirs {
    /// Shared root holding every build's staging directory.
    pub staging_root: PathBuf,

    /// This build's staging directory.
    pub build_dir: PathBuf,

    /// This build's log file.
    pub log_path: PathBuf,
}

impl StagingDirs {
    /// Resolve the staging paths for a build.
    ///
    /// # Arguments
    /// * `template_path` - Template directory the build is seeded from
    /// * `build_id` - Caller-unique build identity
    /// * `staging_root` - Override for the shared root
    pub fn for_build(template_path: &Path, build_id: &str, staging_root: Option<&Path>) -> Self {
        let staging_root = match staging_root {
            Some(root) => root.to_path_buf(),
            None => template_path
                .parent()
                .unwrap_or(Path::new("."))
                .join(STAGING_ROOT_NAME),
        };
        Self {
            build_dir: staging_root.join(build_id),
            log_path: staging_root.join(format!("{}.log", build_id)),
            staging_root,
        }
    }

    /// The bundler's output directory.
    pub fn dist_dir(&self) -> PathBuf {
        self.build_dir.join("dist")
    }

    /// The entry artifact the bundler must produce.
    pub fn dist_entry(&self, env: Env, app_version: &str) -> PathBuf {
        self.dist_dir()
            .join(env.as_str())
            .join(app_version)
            .join("index.html")
    }

    /// Clear any previous staging directory and copy the template into it.
    pub fn stage(&self, template_path: &Path) -> Result<usize> {
        if !template_path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("template directory {} does not exist", template_path.display()),
            )));
        }
        if self.build_dir.exists() {
            fs::remove_dir_all(&self.build_dir)?;
        }
        copy_dir(template_path, &self.build_dir)
    }

    /// Remove the staging directory and the log file.
    pub fn clean(&self) -> Result<()> {
        if self.build_dir.exists() {
            fs::remove_dir_all(&self.build_dir)?;
        }
        if self.log_path.exists() {
            fs::remove_file(&self.log_path)?;
        }
        Ok(())
    }
}

/// True when `name` can be joined onto a directory as a single path
/// component without leaving it.
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Recursively copy `from` into `to`, returning the number of files copied.
pub fn copy_dir(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
