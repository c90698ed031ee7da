//! Worker process management for isolated builds.
//!
//! Provides `WorkerHandle` for spawning and talking to a `loom-worker`
//! process, and `WorkerKillHandle` for terminating it from another thread.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};

use super::protocol::{WorkerCommand, WorkerResponse, read_message, write_message};

/// Environment variable naming the worker binary.
pub const WORKER_PATH_ENV: &str = "LOOM_WORKER_PATH";

const WORKER_NAME: &str = if cfg!(windows) {
    "loom-worker.exe"
} else {
    "loom-worker"
};

/// Handle to a worker process.
pub struct WorkerHandle {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    killed: bool,
}

impl WorkerHandle {
    /// Spawn the worker at `worker_path` and check it answers a ping.
    pub fn spawn(worker_path: &Path) -> Result<Self> {
        let mut child = Command::new(worker_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                Error::Ipc(format!(
                    "Failed to spawn worker process '{}': {}",
                    worker_path.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdout".to_string()))?;

        let mut handle = Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            killed: false,
        };

        handle.send_command(&WorkerCommand::Ping)?;
        match handle.recv_response()? {
            WorkerResponse::Pong => Ok(handle),
            other => Err(Error::Ipc(format!(
                "Unexpected response from worker: {:?}",
                other
            ))),
        }
    }

    /// Locate the `loom-worker` binary.
    ///
    /// Looks in the following order:
    /// 1. `LOOM_WORKER_PATH` environment variable
    /// 2. Same directory as the current executable
    /// 3. System PATH
    pub fn find_worker_binary() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(WORKER_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
            tracing::warn!("{} points to missing {}", WORKER_PATH_ENV, path.display());
        }

        if let Ok(exe_path) = std::env::current_exe()
            && let Some(exe_dir) = exe_path.parent()
        {
            let worker_path = exe_dir.join(WORKER_NAME);
            if worker_path.exists() {
                return Ok(worker_path);
            }
        }

        if let Ok(path) = which::which(WORKER_NAME) {
            return Ok(path);
        }

        Err(Error::Ipc(format!(
            "Could not find {}. Set {} or ensure it's in PATH.",
            WORKER_NAME, WORKER_PATH_ENV
        )))
    }

    /// Send a command to the worker.
    pub fn send_command(&mut self, cmd: &WorkerCommand) -> Result<()> {
        if self.killed {
            return Err(Error::Ipc("Worker has been killed".to_string()));
        }
        write_message(&mut self.stdin, cmd)
    }

    /// Receive a response from the worker.
    pub fn recv_response(&mut self) -> Result<WorkerResponse> {
        if self.killed {
            return Err(Error::Ipc("Worker has been killed".to_string()));
        }
        read_message(&mut self.stdout)
    }

    /// Wait for the worker to exit and return its exit code.
    ///
    /// `None` when the process was terminated by a signal.
    pub fn wait(&mut self) -> Option<i32> {
        match self.child.wait() {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!("Failed to wait for worker: {}", e);
                None
            }
        }
    }

    /// Kill the worker process immediately.
    pub fn kill(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }

        self.killed = true;

        let _ = write_message(&mut self.stdin, &WorkerCommand::Shutdown);
        std::thread::sleep(Duration::from_millis(10));

        if let Err(e) = self.child.kill()
            && e.kind() != std::io::ErrorKind::InvalidInput
        {
            tracing::warn!("Failed to kill worker: {}", e);
        }

        // Reap the zombie.
        let _ = self.child.wait();

        Ok(())
    }

    /// Get the process ID of the worker.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.kill();
    }
}

/// Thread-safe handle for killing a worker from another thread.
///
/// Also reaches the bundler the worker started, which runs in its own
/// process group and would otherwise outlive the worker.
#[derive(Clone)]
pub struct WorkerKillHandle {
    pid: u32,
    killed: Arc<AtomicBool>,
    /// Bundler process group reported by the worker; 0 when none.
    bundler_group: Arc<AtomicU32>,
}

impl WorkerKillHandle {
    pub fn new(worker: &WorkerHandle) -> Self {
        Self {
            pid: worker.pid(),
            killed: Arc::new(AtomicBool::new(false)),
            bundler_group: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Record the process group of the worker's current bundler.
    ///
    /// A group reported after [`kill`](Self::kill) is killed right away.
    pub fn track_bundler_group(&self, pgid: u32) {
        self.bundler_group.store(pgid, Ordering::SeqCst);
        if self.is_killed() {
            self.kill_bundler_group();
        }
    }

    /// Kill the worker process and its bundler. Safe to call more than once.
    pub fn kill(&self) {
        if !self.killed.swap(true, Ordering::SeqCst) {
            #[cfg(unix)]
            {
                // SIGKILL for immediate termination
                unsafe {
                    libc::kill(self.pid as i32, libc::SIGKILL);
                }
            }
        }
        self.kill_bundler_group();
    }

    /// Check if kill has been requested.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    fn kill_bundler_group(&self) {
        let pgid = self.bundler_group.swap(0, Ordering::SeqCst);
        if pgid == 0 {
            return;
        }
        tracing::debug!("Killing bundler process group {}", pgid);

        #[cfg(unix)]
        {
            unsafe {
                libc::kill(-(pgid as i32), libc::SIGKILL);
            }
        }
    }
}
