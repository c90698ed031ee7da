//! One build's lifecycle.
//!
//! ```text
//! Start ─► Stage ─► Compile ─► Bundle ─► Verify ─┬─► Publish ─► Published
//!   │        │         │          │         │     └─► Skip ────► Done
//!   └────────┴─────────┴──────────┴─────────┴─────────────────► Failed
//! ```
//!
//! The job log is opened first and every step narrates into it. A failed step
//! never escapes as an error: it becomes a [`BuildResult`] with an empty `url`
//! and a readable `message`. Only a broken submission contract is returned as
//! [`Error`].

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use super::bundler::Bundler;
use super::job_log::JobLog;
use super::types::{BUILD_PUBLISHED, BUILD_SUCCEEDED, BuildConfig, BuildJob, BuildResult};
use crate::compile::SchemaCompiler;
use crate::error::{Error, Result};
use crate::paths::StagingDirs;
use crate::publish::{ArtifactStore, LocalArtifactStore, Publisher};
use crate::schema::Schema;

pub struct BuildOrchestrator {
    config: BuildConfig,
    compiler: SchemaCompiler,
    bundler: Bundler,
}

impl BuildOrchestrator {
    pub fn new(config: BuildConfig) -> Self {
        let bundler = Bundler::new(config.build_command.clone(), config.timeout);
        Self {
            config,
            compiler: SchemaCompiler::new(),
            bundler,
        }
    }

    /// Call `hook` with the bundler's process group id each time it starts.
    pub fn on_bundler_spawn(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.bundler = self.bundler.on_spawn(Arc::new(hook));
        self
    }

    /// Run a job, publishing to the job's local artifact store when it names one.
    pub fn run(&self, job: &BuildJob) -> Result<BuildResult> {
        let store = job.publish_to.as_ref().map(LocalArtifactStore::new);
        self.run_with_store(job, store.as_ref().map(|s| s as &dyn ArtifactStore))
    }

    /// Run a job. Publishing happens only when `store` is given.
    pub fn run_with_store(
        &self,
        job: &BuildJob,
        store: Option<&dyn ArtifactStore>,
    ) -> Result<BuildResult> {
        let started = Instant::now();
        job.validate()?;
        let schema = job.parse_schema()?;

        let dirs = StagingDirs::for_build(
            &job.template_path,
            &job.build_id,
            job.staging_root.as_deref(),
        );
        let publisher = store.map(|store| self.publisher(store));

        let log = match JobLog::open(&dirs.log_path) {
            Ok(log) => log,
            Err(e) => {
                tracing::error!("Could not open build log {}: {}", dirs.log_path.display(), e);
                return Ok(BuildResult {
                    build_id: job.build_id.clone(),
                    message: e.to_string(),
                    build_time: elapsed_ms(started),
                    ..Default::default()
                });
            }
        };

        tracing::info!(
            "Build {} started (env: {}, template: {})",
            job.build_id,
            job.env,
            job.template_path.display()
        );

        let outcome = self.execute(job, &schema, &dirs, &log);

        let mut result = BuildResult {
            build_id: job.build_id.clone(),
            ..Default::default()
        };

        match (outcome, store.zip(publisher.as_ref())) {
            (Ok(()), Some((store, publisher))) => {
                match publisher.publish_dist(store, &dirs.dist_dir(), &schema.meta, job.env) {
                    Ok(url) => {
                        tracing::info!("Published {}", url);
                        result.url = url;
                        result.message = BUILD_PUBLISHED.to_string();
                        result.success = true;
                    }
                    Err(e) => {
                        tracing::warn!("Publishing failed: {}", e);
                        result.message = format!("build succeeded but publishing failed: {}", e);
                    }
                }
            }
            (Ok(()), None) => {
                tracing::info!(
                    "Publishing not requested; output kept in {}",
                    dirs.build_dir.display()
                );
                result.message = BUILD_SUCCEEDED.to_string();
                result.success = true;
            }
            (Err(e), _) => {
                tracing::error!("Build failed: {}", e);
                result.message = e.to_string();
            }
        }

        result.build_time = elapsed_ms(started);
        tracing::info!("Build {} finished in {}ms", job.build_id, result.build_time);

        if let (Some(store), Some(publisher)) = (store, publisher.as_ref()) {
            result.log_url = publisher.upload_log(store, log.path(), &schema.meta, job.env);
            drop(log);
            if let Err(e) = dirs.clean() {
                tracing::warn!("Failed to clean {}: {}", dirs.build_dir.display(), e);
            }
        }

        Ok(result)
    }

    /// Stage, compile, bundle and verify.
    fn execute(
        &self,
        job: &BuildJob,
        schema: &Schema,
        dirs: &StagingDirs,
        log: &JobLog,
    ) -> Result<()> {
        let copied = dirs.stage(&job.template_path)?;
        tracing::info!("Staged {} files into {}", copied, dirs.build_dir.display());

        let output = self
            .compiler
            .compile(schema, &dirs.build_dir, job.env, job.is_preview)?;
        tracing::info!(
            "Compiled {} page modules and {} scaffold files",
            output.page_files.len(),
            output.scaffold_files.len()
        );

        tracing::info!("Running `{}`", self.bundler.command());
        self.bundler
            .run(&dirs.build_dir, job.env, log.stdio()?, log.stdio()?)?;

        let entry = dirs.dist_entry(job.env, &schema.meta.app_version);
        if !entry.is_file() {
            return Err(Error::Artifact(entry.display().to_string()));
        }
        let size = fs::metadata(&entry).map(|m| m.len()).unwrap_or(0);
        tracing::info!("Verified {} ({} bytes)", entry.display(), size);
        Ok(())
    }

    fn publisher(&self, store: &dyn ArtifactStore) -> Publisher {
        let base_url = self
            .config
            .public_base_url
            .clone()
            .or_else(|| store.public_base_url())
            .unwrap_or_default();
        Publisher::new(
            base_url,
            self.config.key_prefix.clone(),
            self.config.upload_parallelism,
        )
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
