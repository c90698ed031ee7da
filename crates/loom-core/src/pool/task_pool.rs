//! Bounded-concurrency scheduler for build jobs.
//!
//! At most `capacity` jobs run at once; the rest wait in a FIFO queue. Each
//! job settles its caller exactly once through a one-shot channel, and every
//! completion (result, explicit failure or crash) frees its slot and admits
//! the next waiter.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;

use super::launcher::{ProcessLauncher, WorkerLauncher, WorkerOutcome};
use crate::build::{BuildConfig, BuildJob, BuildResult};
use crate::error::{Error, Result};
use crate::ipc::WorkerHandle;

/// Default number of concurrently running jobs.
pub const DEFAULT_CAPACITY: usize = 10;

/// Pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub capacity: usize,
    /// Kill a worker that runs longer than this.
    pub worker_timeout: Option<Duration>,
    /// Worker binary; located with [`WorkerHandle::find_worker_binary`] when unset.
    pub worker_path: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            worker_timeout: None,
            worker_path: None,
        }
    }
}

/// Snapshot of the pool's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHealth {
    pub running: usize,
    pub queued: usize,
    pub capacity: usize,
}

struct QueuedJob {
    job: BuildJob,
    reply: oneshot::Sender<Result<BuildResult>>,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<QueuedJob>,
    running: usize,
}

struct PoolInner {
    capacity: usize,
    launcher: Arc<dyn WorkerLauncher>,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        // No critical section can leave the state half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start queued jobs while slots are free.
    fn try_run_next(self: &Arc<Self>) {
        loop {
            let next = {
                let mut state = self.state();
                if state.running >= self.capacity {
                    return;
                }
                let Some(next) = state.queue.pop_front() else {
                    return;
                };
                state.running += 1;
                next
            };
            self.start(next);
        }
    }

    fn start(self: &Arc<Self>, queued: QueuedJob) {
        let slot = Slot {
            inner: Arc::clone(self),
        };
        let launcher = Arc::clone(&self.launcher);

        tokio::spawn(async move {
            let QueuedJob { job, reply } = queued;
            let build_id = job.build_id.clone();
            tracing::info!("Starting build {}", build_id);

            let result = match launcher.launch(job).await {
                WorkerOutcome::Completed(result) => Ok(result),
                WorkerOutcome::Failed { message } => Err(Error::WorkerFailed { message }),
                WorkerOutcome::Exited { status } => Err(Error::WorkerCrashed { status }),
            };
            if let Err(e) = &result {
                tracing::warn!("Build {} did not complete: {}", build_id, e);
            }

            drop(slot);
            let _ = reply.send(result);
        });
    }
}

/// A running job's claim on a pool slot. Released on drop, even when the
/// job's task panics.
struct Slot {
    inner: Arc<PoolInner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state();
            state.running = state.running.saturating_sub(1);
        }
        self.inner.try_run_next();
    }
}

/// Runs build jobs in isolated workers with a concurrency ceiling.
///
/// Cloning is cheap and clones share the same queue and slots.
#[derive(Clone)]
pub struct BuildTaskPool {
    inner: Arc<PoolInner>,
}

impl BuildTaskPool {
    /// Create a pool with `capacity` slots and a custom launcher.
    pub fn new(capacity: usize, launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity: capacity.max(1),
                launcher,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Create a pool that runs each job in a `loom-worker` process.
    pub fn with_processes(config: &PoolConfig, build_config: BuildConfig) -> Result<Self> {
        let worker_path = match &config.worker_path {
            Some(path) => path.clone(),
            None => WorkerHandle::find_worker_binary()?,
        };
        tracing::debug!("Using worker binary {}", worker_path.display());
        let launcher = ProcessLauncher::new(worker_path, build_config)
            .with_timeout(config.worker_timeout);
        Ok(Self::new(config.capacity, Arc::new(launcher)))
    }

    /// Submit a job.
    ///
    /// The job is queued immediately, so jobs start in the order `submit` is
    /// called. The returned future resolves once the job settles. A broken
    /// submission contract fails without queueing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(
        &self,
        job: BuildJob,
    ) -> impl Future<Output = Result<BuildResult>> + Send + 'static + use<> {
        let admitted = self.enqueue(job);
        async move {
            let receiver = admitted?;
            receiver
                .await
                .unwrap_or(Err(Error::WorkerCrashed { status: None }))
        }
    }

    fn enqueue(&self, job: BuildJob) -> Result<oneshot::Receiver<Result<BuildResult>>> {
        job.validate()?;
        let (reply, receiver) = oneshot::channel();
        {
            let mut state = self.inner.state();
            tracing::debug!(
                "Queued build {} ({} running, {} waiting)",
                job.build_id,
                state.running,
                state.queue.len()
            );
            state.queue.push_back(QueuedJob { job, reply });
        }
        self.inner.try_run_next();
        Ok(receiver)
    }

    /// Current load. Does not change pool state.
    pub fn health(&self) -> PoolHealth {
        let state = self.inner.state();
        PoolHealth {
            running: state.running,
            queued: state.queue.len(),
            capacity: self.inner.capacity,
        }
    }
}
