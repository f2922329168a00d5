//! One caller's policy and executor, run in sequence.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::executor::{DirectoryError, SandboxExecutor};
use crate::policy::{PermissionMode, Policy, PolicyDecision};
use crate::result::ExecutionResult;

/// What happened to a command submitted through [`Session::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The policy allowed the command and it ran (possibly unsuccessfully).
    Completed(ExecutionResult),
    /// The policy denied the command; nothing was spawned.
    Denied(String),
    /// The command (trimmed) needs the user's approval before it can run.
    NeedsApproval(String),
}

/// Read-only view of the session's configuration, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    /// Active permission mode
    pub permission_mode: PermissionMode,
    /// Number of allowed patterns
    pub num_allowed_patterns: usize,
    /// Number of blocked patterns
    pub num_blocked_patterns: usize,
    /// Per-command timeout
    pub timeout_seconds: u64,
    /// Canonical permitted roots
    pub allowed_directories: Vec<PathBuf>,
}

/// A [`Policy`] and a [`SandboxExecutor`] owned by one serving session.
///
/// Session approvals and the current directory belong to this instance, so
/// independent sessions never see each other's state.
#[derive(Debug)]
pub struct Session {
    policy: Policy,
    executor: SandboxExecutor,
}

impl Session {
    /// Build a session from a validated config.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config.policy(), config.executor()))
    }

    /// Build a session from an existing policy and executor.
    pub fn from_parts(policy: Policy, executor: SandboxExecutor) -> Self {
        Self { policy, executor }
    }

    /// The policy engine.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The sandboxed executor.
    pub fn executor(&self) -> &SandboxExecutor {
        &self.executor
    }

    /// Decide whether `command` may run, without running it.
    pub fn decide(&self, command: &str) -> PolicyDecision {
        self.policy.decide(command)
    }

    /// Allow `command` for the rest of this session.
    pub fn approve_for_session(&self, command: &str) {
        self.policy.approve_for_session(command);
    }

    /// Check `command` against the policy and run it if allowed.
    pub async fn run(&self, command: &str, working_directory: Option<&str>) -> ExecutionOutcome {
        match self.policy.decide(command) {
            PolicyDecision::Allow(reason) => {
                tracing::debug!(command, %reason, "command allowed");
                ExecutionOutcome::Completed(self.executor.execute(command, working_directory).await)
            }
            PolicyDecision::Deny(reason) => {
                tracing::info!(command, %reason, "command denied");
                ExecutionOutcome::Denied(reason)
            }
            PolicyDecision::NeedsApproval => {
                ExecutionOutcome::NeedsApproval(command.trim().to_string())
            }
        }
    }

    /// Approve `command` for the session, then run it. Blocked rules still
    /// apply, so an approved command can still be denied.
    pub async fn approve_and_run(
        &self,
        command: &str,
        working_directory: Option<&str>,
    ) -> ExecutionOutcome {
        self.policy.approve_for_session(command);
        self.run(command, working_directory).await
    }

    /// Change the executor's current directory.
    pub fn change_directory(&self, path: &str) -> Result<PathBuf, DirectoryError> {
        self.executor.change_directory(path)
    }

    /// The executor's current directory.
    pub fn current_directory(&self) -> PathBuf {
        self.executor.current_directory()
    }

    /// Mode, rule counts, timeout and permitted roots.
    pub fn policy_summary(&self) -> PolicySummary {
        PolicySummary {
            permission_mode: self.policy.mode(),
            num_allowed_patterns: self.policy.allowed_patterns().len(),
            num_blocked_patterns: self.policy.blocked_patterns().len(),
            timeout_seconds: self.executor.limits().timeout.as_secs(),
            allowed_directories: self.executor.allowed_directories().to_vec(),
        }
    }
}
