//! Worker launch strategies for the task pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::build::{BuildConfig, BuildJob, BuildResult};
use crate::error::Error;
use crate::ipc::{BuildRequest, WorkerCommand, WorkerHandle, WorkerKillHandle, WorkerResponse};

/// How one isolated unit of work ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The worker sent a build result (which may describe a failed build).
    Completed(BuildResult),
    /// The worker sent an explicit error, or could not be run at all.
    Failed { message: String },
    /// The worker exited without a terminal message.
    Exited { status: Option<i32> },
}

/// Runs one job in isolation and reports how it ended.
///
/// The returned future must always resolve; the pool relies on it to
/// release the job's slot.
pub trait WorkerLauncher: Send + Sync + 'static {
    fn launch(&self, job: BuildJob) -> BoxFuture<'static, WorkerOutcome>;
}

/// Launches each job in a fresh `loom-worker` child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    worker_path: PathBuf,
    build_config: BuildConfig,
    timeout: Option<Duration>,
}

impl ProcessLauncher {
    pub fn new(worker_path: PathBuf, build_config: BuildConfig) -> Self {
        Self {
            worker_path,
            build_config,
            timeout: None,
        }
    }

    /// Kill workers that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, job: BuildJob) -> BoxFuture<'static, WorkerOutcome> {
        let request = BuildRequest::new(&job, &self.build_config);
        let worker_path = self.worker_path.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let kill_slot: Arc<Mutex<KillSlot>> = Arc::default();
            let slot = Arc::clone(&kill_slot);

            let mut task = tokio::task::spawn_blocking(move || {
                let handle = match WorkerHandle::spawn(&worker_path) {
                    Ok(handle) => handle,
                    Err(e) => {
                        return WorkerOutcome::Failed {
                            message: e.to_string(),
                        };
                    }
                };
                let kill = WorkerKillHandle::new(&handle);
                if let Ok(mut slot) = slot.lock() {
                    if slot.timed_out {
                        kill.kill();
                    }
                    slot.handle = Some(kill.clone());
                }
                run_worker(handle, &kill, request)
            });

            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        if let Ok(mut slot) = kill_slot.lock() {
                            slot.timed_out = true;
                            if let Some(kill) = &slot.handle {
                                kill.kill();
                            }
                        }
                        let _ = task.await;
                        return WorkerOutcome::Failed {
                            message: Error::Timeout(format!(
                                "build worker exceeded {}s",
                                limit.as_secs()
                            ))
                            .to_string(),
                        };
                    }
                },
                None => task.await,
            };

            joined.unwrap_or_else(|e| WorkerOutcome::Failed {
                message: format!("worker task failed: {}", e),
            })
        })
    }
}

/// The running worker's kill handle, shared with the timeout.
#[derive(Default)]
struct KillSlot {
    handle: Option<WorkerKillHandle>,
    /// Set once the timeout fires.
    timed_out: bool,
}

/// Send the build to a live worker and wait for its terminal message.
fn run_worker(
    mut handle: WorkerHandle,
    kill: &WorkerKillHandle,
    request: BuildRequest,
) -> WorkerOutcome {
    let build_id = request.build_id.clone();
    tracing::debug!("Worker {} running build {}", handle.pid(), build_id);

    if let Err(e) = handle.send_command(&WorkerCommand::Build(request)) {
        let _ = handle.kill();
        return WorkerOutcome::Failed {
            message: e.to_string(),
        };
    }

    let mut response = handle.recv_response();
    while let Ok(WorkerResponse::Bundling { pgid }) = response {
        tracing::debug!("Build {} bundling in process group {}", build_id, pgid);
        kill.track_bundler_group(pgid);
        response = handle.recv_response();
    }

    match response {
        Ok(WorkerResponse::Finished {
            url,
            log_url,
            build_id,
            message,
            build_time,
            success,
        }) => WorkerOutcome::Completed(BuildResult {
            url,
            log_url,
            build_id,
            message,
            build_time,
            success,
        }),
        Ok(WorkerResponse::Error { message }) => {
            let _ = handle.kill();
            WorkerOutcome::Failed { message }
        }
        Ok(other) => {
            let _ = handle.kill();
            WorkerOutcome::Failed {
                message: format!("unexpected response from worker: {:?}", other),
            }
        }
        Err(e) => {
            tracing::warn!("Worker for build {} went away: {}", build_id, e);
            WorkerOutcome::Exited {
                status: handle.wait(),
            }
        }
    }
}
