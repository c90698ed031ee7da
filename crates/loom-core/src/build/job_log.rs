//! Per-job log file.
//!
//! While a [`JobLog`] is alive, `tracing` events from the current thread are
//! written to the job's log file instead of the process subscriber. The
//! bundler's output is appended to the same file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tracing::dispatcher::DefaultGuard;
use tracing::level_filters::LevelFilter;

use crate::error::Result;

pub struct JobLog {
    path: PathBuf,
    file: Arc<File>,
    _guard: DefaultGuard,
}

impl JobLog {
    /// Create (or truncate) the log file and route this thread's events into it.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(path)?;
        let file = Arc::new(OpenOptions::new().append(true).open(path)?);

        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(false)
            .with_max_level(LevelFilter::INFO)
            .with_writer(Arc::clone(&file))
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);

        Ok(Self {
            path: path.to_path_buf(),
            file,
            _guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A handle to the log file for a child process's stdout or stderr.
    pub fn stdio(&self) -> Result<Stdio> {
        Ok(Stdio::from(self.file.try_clone()?))
    }
}
