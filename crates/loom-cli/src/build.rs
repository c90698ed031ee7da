//! Build command implementation for Loom CLI.
//!
//! Submits one job per schema to a task pool; every job runs in its own
//! `loom-worker` process. Results are printed as they settle.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use loom_core::{BuildConfig, BuildJob, BuildTaskPool, Env, PoolConfig};

use crate::colors;

/// Options for `loom build`.
pub struct BuildOptions {
    pub schemas: Vec<PathBuf>,
    pub template: PathBuf,
    pub env: Env,
    pub preview: bool,
    pub publish: Option<PathBuf>,
    pub staging_root: Option<PathBuf>,
    pub parallelism: usize,
    pub worker: Option<PathBuf>,
    pub build_timeout: Option<u64>,
    pub worker_timeout: Option<u64>,
    pub json: bool,
}

pub async fn execute(options: BuildOptions) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut build_config = BuildConfig::from_env();
    if let Some(secs) = options.build_timeout {
        build_config.timeout = Some(Duration::from_secs(secs));
    }
    let pool_config = PoolConfig {
        capacity: options.parallelism,
        worker_timeout: options.worker_timeout.map(Duration::from_secs),
        worker_path: options.worker.clone(),
    };
    let pool = BuildTaskPool::with_processes(&pool_config, build_config)?;

    let template = absolute(&options.template)?;
    let publish = options.publish.as_deref().map(absolute).transpose()?;

    let mut pending = FuturesUnordered::new();
    for schema_path in &options.schemas {
        let schema_json = fs::read_to_string(schema_path)?;
        let mut job = BuildJob::new(schema_json, build_id(schema_path), &template)
            .with_env(options.env)
            .with_preview(options.preview);
        if let Some(root) = &publish {
            job = job.with_publish_to(root);
        }
        if let Some(root) = &options.staging_root {
            job = job.with_staging_root(root);
        }

        if !options.json {
            println!(
                "{}Queued{} {} as {}",
                colors::DIM,
                colors::RESET,
                schema_path.display(),
                job.build_id
            );
        }
        let name = schema_path.display().to_string();
        let submitted = pool.submit(job);
        pending.push(async move { (name, submitted.await) });
    }

    let mut failed = 0;
    while let Some((name, outcome)) = pending.next().await {
        match outcome {
            Ok(result) if options.json => {
                if !result.is_success() {
                    failed += 1;
                }
                println!("{}", serde_json::to_string(&result)?);
            }
            Ok(result) if result.is_success() => {
                println!(
                    "{}✓{} {} {}({}ms){}",
                    colors::GREEN,
                    colors::RESET,
                    name,
                    colors::DIM,
                    result.build_time,
                    colors::RESET
                );
                if !result.url.is_empty() {
                    println!("    {}", result.url);
                }
            }
            Ok(result) => {
                failed += 1;
                println!("{}✗{} {}", colors::RED, colors::RESET, name);
                eprintln!("{}    Error:{} {}", colors::RED, colors::RESET, result.message);
                if !result.log_url.is_empty() {
                    eprintln!("    log: {}", result.log_url);
                }
            }
            Err(e) => {
                failed += 1;
                println!("{}✗{} {}", colors::RED, colors::RESET, name);
                eprintln!("{}    Error:{} {}", colors::RED, colors::RESET, e.with_hint());
            }
        }
    }

    if !options.json {
        println!(
            "\n{}Completed{} {} builds in {:.2}s ({} failed)",
            if failed == 0 { colors::GREEN } else { colors::YELLOW },
            colors::RESET,
            options.schemas.len(),
            start.elapsed().as_secs_f64(),
            failed
        );
    }

    if failed > 0 {
        anyhow::bail!("{} of {} builds failed", failed, options.schemas.len());
    }
    Ok(())
}

/// `<schema file stem>-<short uuid>`, unique per invocation.
fn build_id(schema_path: &Path) -> String {
    let stem = schema_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "build".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", stem, &suffix[..8])
}

/// Published URLs and job logs embed these paths.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
