//! hostterm: Policy-Gated Host Shell Execution
//!
//! hostterm lets a remote caller run shell commands on the host, in two
//! steps that never reach into each other:
//!
//! 1. a [`Policy`](policy::Policy) decides whether a command string may run
//!    (ordered blocked/allowed patterns, a permission mode, and per-session
//!    approvals);
//! 2. a [`SandboxExecutor`] runs approved commands inside permitted
//!    directories, under a wall-clock timeout and an output cap.
//!
//! [`Session`] pairs the two for transports that just want to submit a
//! command and get an [`ExecutionOutcome`] back.

mod config;
mod executor;
mod limits;
pub mod policy;
mod result;
mod session;

pub use config::{Config, ConfigError, ConfigOverrides};
pub use executor::{DirectoryError, SandboxExecutor};
pub use limits::{
    DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECONDS, ResourceLimits, TRUNCATION_NOTICE,
};
pub use result::{ExecutionResult, ExecutionStats, TIMEOUT_EXIT_CODE};
pub use session::{ExecutionOutcome, PolicySummary, Session};
