//! Execution results

use serde::{Deserialize, Serialize};

use crate::executor::DirectoryError;

/// Exit code reported when a command is killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Statistics about command execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Wall clock time in milliseconds
    pub wall_time_ms: u64,
}

/// Result of command execution
///
/// A non-zero `exit_code` is still a completed execution; it is the
/// command's own status. `timed_out` and `truncated` flag the two ways the
/// executor itself cut a run short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Standard output, possibly truncated
    pub stdout: String,
    /// Standard error, possibly truncated
    pub stderr: String,
    /// Process exit code, or [`TIMEOUT_EXIT_CODE`] on timeout
    pub exit_code: i32,
    /// Whether the process was killed for exceeding the timeout
    pub timed_out: bool,
    /// Whether output was truncated due to limits
    pub truncated: bool,
    /// Execution statistics
    #[serde(default)]
    pub stats: ExecutionStats,
}

impl ExecutionResult {
    /// A result for a command that never ran because its working directory
    /// was rejected.
    pub(crate) fn rejected(error: &DirectoryError) -> Self {
        Self::failed(format!("Working directory not allowed: {error}"))
    }

    /// A result for a command that could not be started.
    pub(crate) fn failed(stderr: String) -> Self {
        Self {
            stdout: String::new(),
            stderr,
            exit_code: 1,
            timed_out: false,
            truncated: false,
            stats: ExecutionStats::default(),
        }
    }

    /// Returns true if the command ran to completion and exited with 0.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}
