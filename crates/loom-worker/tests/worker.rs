//! Worker process tests against the built `loom-worker` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use loom_core::ipc::{BuildRequest, WorkerCommand, WorkerHandle, WorkerResponse};
use loom_core::{BuildConfig, BuildJob, BuildTaskPool, Error, PoolConfig};
use tempfile::TempDir;

fn worker_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_loom-worker"))
}

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../loom-core/tests/fixtures")
}

fn job(staging: &Path, build_id: &str) -> BuildJob {
    let schema = fs::read_to_string(fixtures().join("schema.json")).unwrap();
    BuildJob::new(schema, build_id, fixtures().join("templates/simple")).with_staging_root(staging)
}

#[test]
fn test_worker_reports_bundler_before_result() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfig {
        build_command: "mkdir -p dist/$APP_ENV/1.0.0 && cp index.html dist/$APP_ENV/1.0.0/"
            .to_string(),
        ..Default::default()
    };
    let job = job(&temp.path().join("staging"), "w-frames");

    let mut worker = WorkerHandle::spawn(&worker_binary()).unwrap();
    worker
        .send_command(&WorkerCommand::Build(BuildRequest::new(&job, &config)))
        .unwrap();

    match worker.recv_response().unwrap() {
        WorkerResponse::Bundling { pgid } => assert!(pgid > 0),
        other => panic!("expected Bundling, got {:?}", other),
    }
    match worker.recv_response().unwrap() {
        WorkerResponse::Finished {
            build_id, success, ..
        } => {
            assert_eq!(build_id, "w-frames");
            assert!(success);
        }
        other => panic!("expected Finished, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_worker_timeout_stops_the_bundler() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join("bundler-survived");

    let config = BuildConfig {
        build_command: format!("sleep 3 && touch '{}'", marker.display()),
        ..Default::default()
    };
    let pool_config = PoolConfig {
        capacity: 1,
        worker_timeout: Some(Duration::from_secs(1)),
        worker_path: Some(worker_binary()),
    };
    let pool = BuildTaskPool::with_processes(&pool_config, config).unwrap();

    let err = pool
        .submit(job(&temp.path().join("staging"), "w-slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WorkerFailed { .. }));
    assert!(err.to_string().contains("exceeded"));
    assert_eq!(pool.health().running, 0);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!marker.exists(), "bundler kept running after the worker was killed");
}
