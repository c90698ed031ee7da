//! External bundler invocation.

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::schema::Env;

/// Interval between exit checks while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Callback receiving the process group id of a freshly started bundler.
pub type SpawnHook = Arc<dyn Fn(u32) + Send + Sync>;

/// Runs the install-and-build shell command in a staged tree.
#[derive(Clone)]
pub struct Bundler {
    command: String,
    timeout: Option<Duration>,
    on_spawn: Option<SpawnHook>,
}

impl Bundler {
    pub fn new(command: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            command: command.into(),
            timeout,
            on_spawn: None,
        }
    }

    /// Report each started command's process group to `hook`.
    pub fn on_spawn(mut self, hook: SpawnHook) -> Self {
        self.on_spawn = Some(hook);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the command in `dir` with `APP_ENV` set, inheriting the rest of the
    /// environment.
    ///
    /// Fails with [`Error::ExternalTool`] on a non-zero exit and with
    /// [`Error::Timeout`] when the timeout fires; the whole process group is
    /// killed in that case.
    pub fn run(&self, dir: &Path, env: Env, stdout: Stdio, stderr: Stdio) -> Result<()> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .current_dir(dir)
            .env("APP_ENV", env.as_str())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            Error::ExternalTool(format!("failed to start `{}`: {}", self.command, e))
        })?;

        // The shell leads its own group, so its pid is the group id.
        if let Some(hook) = &self.on_spawn {
            hook(child.id());
        }

        let status = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout)?,
            None => child.wait()?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(Error::ExternalTool(format!(
                "`{}` exited with {}",
                self.command, status
            )))
        }
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            kill_tree(child);
            let _ = child.wait();
            return Err(Error::Timeout(format!(
                "bundler did not finish within {}s",
                timeout.as_secs()
            )));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child and everything it spawned.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        // The child leads its own process group.
        unsafe {
            libc::kill(-(child.id() as i32), libc::SIGKILL);
        }
    }

    if let Err(e) = child.kill()
        && e.kind() != std::io::ErrorKind::InvalidInput
    {
        tracing::warn!("Failed to kill bundler: {}", e);
    }
}
