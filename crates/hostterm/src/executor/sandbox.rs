//! Directory-contained, time-bounded process execution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::directory::{self, DirectoryError};
use crate::limits::{self, LimitedBuffer, ResourceLimits};
use crate::result::{ExecutionResult, ExecutionStats, TIMEOUT_EXIT_CODE};

/// How long to keep draining pipes after the shell has exited or been killed.
/// Background jobs that inherited the pipes can otherwise hold them open.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 8 * 1024;

/// Runs already-approved commands inside a set of permitted directories.
///
/// The executor does not decide *whether* a command may run; that is the
/// [`Policy`](crate::policy::Policy)'s job and the caller's responsibility.
/// It decides *where* and *for how long*:
///
/// - the working directory must resolve (symlinks followed) to one of the
///   permitted roots or somewhere beneath one;
/// - the command runs under `sh -c` in its own process group and is killed,
///   group and all, when the timeout expires;
/// - stdout and stderr share one output budget.
///
/// The current directory starts at the caller's home directory and only
/// changes through [`change_directory`](Self::change_directory).
pub struct SandboxExecutor {
    allowed_directories: Vec<PathBuf>,
    limits: ResourceLimits,
    current: RwLock<PathBuf>,
}

impl fmt::Debug for SandboxExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxExecutor")
            .field("allowed_directories", &self.allowed_directories)
            .field("limits", &self.limits)
            .field("current", &self.current_directory())
            .finish()
    }
}

impl SandboxExecutor {
    /// Create an executor confined to `allowed_directories`.
    pub fn new<I, P>(allowed_directories: I, limits: ResourceLimits) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let allowed_directories = allowed_directories
            .into_iter()
            .map(|root| directory::canonical_root(root.as_ref()))
            .collect();
        let home = directory::home_dir();
        let current = std::fs::canonicalize(&home).unwrap_or(home);

        Self {
            allowed_directories,
            limits,
            current: RwLock::new(current),
        }
    }

    /// Permitted roots, canonicalised.
    pub fn allowed_directories(&self) -> &[PathBuf] {
        &self.allowed_directories
    }

    /// The limits applied to every execution.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// The directory commands run in when no explicit one is given.
    pub fn current_directory(&self) -> PathBuf {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns true if `path` (already canonical) is inside a permitted root.
    pub fn is_allowed(&self, path: &Path) -> bool {
        directory::is_within(path, &self.allowed_directories)
    }

    /// Resolve `path` against the current directory without changing it.
    pub fn resolve_directory(&self, path: &str) -> Result<PathBuf, DirectoryError> {
        self.resolve_from(&self.current_directory(), path)
    }

    /// Change the current directory.
    ///
    /// Relative paths resolve against the current directory and a leading
    /// `~` expands to the home directory. On success the resolved, canonical
    /// path is returned.
    pub fn change_directory(&self, path: &str) -> Result<PathBuf, DirectoryError> {
        let mut current = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let resolved = self.resolve_from(&current, path).inspect_err(|e| {
            tracing::warn!(path, error = %e, "directory change rejected");
        })?;
        tracing::info!(directory = %resolved.display(), "changed directory");
        *current = resolved.clone();
        Ok(resolved)
    }

    /// Run `command` in `working_directory`, or the current directory.
    ///
    /// Never fails: a rejected directory, a spawn failure, a timeout and
    /// oversized output are all reported through the returned
    /// [`ExecutionResult`].
    pub async fn execute(&self, command: &str, working_directory: Option<&str>) -> ExecutionResult {
        let resolved = match working_directory {
            Some(dir) => self.resolve_directory(dir),
            None => {
                let current = self.current_directory();
                directory::resolve_dir(&current, &current, &self.allowed_directories)
            }
        };
        let cwd = match resolved {
            Ok(cwd) => cwd,
            Err(e) => {
                tracing::warn!(command, error = %e, "refusing to execute");
                return ExecutionResult::rejected(&e);
            }
        };

        tracing::debug!(command, cwd = %cwd.display(), "spawning command");
        let started = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command, error = %e, "failed to spawn command");
                return ExecutionResult::failed(format!("Failed to start command: {e}"));
            }
        };

        let max_output = self.limits.max_output_bytes;
        let stdout = Capture::start(child.stdout.take(), max_output);
        let stderr = Capture::start(child.stderr.take(), max_output);

        let (exit_code, timed_out) =
            match tokio::time::timeout(self.limits.timeout, child.wait()).await {
                Ok(Ok(status)) => (status_code(status), false),
                Ok(Err(e)) => {
                    tracing::warn!(command, error = %e, "failed waiting for command");
                    kill_process_group(&mut child).await;
                    (1, false)
                }
                Err(_) => {
                    tracing::warn!(
                        command,
                        timeout_secs = self.limits.timeout.as_secs(),
                        "command timed out; killing process group"
                    );
                    kill_process_group(&mut child).await;
                    (TIMEOUT_EXIT_CODE, true)
                }
            };

        let stdout = stdout.finish().await;
        let stderr = stderr.finish().await;
        let output = limits::cap_output(&stdout, &stderr, max_output);
        let wall_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::debug!(
            command,
            exit_code,
            timed_out,
            truncated = output.truncated,
            wall_time_ms,
            "command finished"
        );

        ExecutionResult {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
            timed_out,
            truncated: output.truncated,
            stats: ExecutionStats { wall_time_ms },
        }
    }

    fn resolve_from(&self, base: &Path, path: &str) -> Result<PathBuf, DirectoryError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(DirectoryError::Empty);
        }
        directory::resolve_dir(
            base,
            &directory::expand_tilde(path),
            &self.allowed_directories,
        )
    }
}

/// A pipe being drained into a [`LimitedBuffer`] on a background task.
///
/// The buffer is shared rather than returned from the task so that whatever
/// arrived before a kill is still there if the task has to be abandoned.
struct Capture {
    buffer: Arc<Mutex<LimitedBuffer>>,
    task: Option<JoinHandle<()>>,
}

impl Capture {
    fn start<R>(pipe: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(LimitedBuffer::new(limit)));
        let task = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => match buffer.lock() {
                            Ok(mut guard) => {
                                guard.write(&chunk[..n]);
                            }
                            Err(poisoned) => {
                                poisoned.into_inner().write(&chunk[..n]);
                            }
                        },
                    }
                }
            })
        });
        Self { buffer, task }
    }

    async fn finish(mut self) -> LimitedBuffer {
        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err()
        {
            tracing::debug!("output pipe still open after exit; abandoning reader");
            task.abort();
        }
        match self.buffer.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Kill the child and every process in its group, then reap it.
async fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id().and_then(|id| libc::pid_t::try_from(id).ok()) {
            // SAFETY: kill(2) has no memory-safety preconditions. The negative
            // pid addresses the group created by `process_group(0)` at spawn.
            let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
            if rc != 0 {
                tracing::debug!(pid, "process group already gone");
            }
        }
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "child already exited");
    }
}
