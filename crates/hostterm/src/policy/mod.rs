//! Command policy for host shell execution.
//!
//! A [`Policy`] decides, before anything is spawned, whether a command string
//! may run. It knows nothing about directories, timeouts or processes; those
//! belong to the [`SandboxExecutor`](crate::SandboxExecutor), which in turn
//! never consults the policy. Callers run the two in sequence.
//!
//! ## Example
//!
//! ```rust
//! use hostterm::policy::{CommandPattern, PermissionMode, Policy, PolicyDecision};
//!
//! let policy = Policy::new(
//!     PermissionMode::Ask,
//!     vec![CommandPattern::literal("ls", "List files")],
//!     vec![CommandPattern::regex(r"^rm\s+-rf", "Recursive delete")],
//! );
//!
//! assert!(policy.decide("ls -la").is_allowed());
//! assert!(!policy.decide("rm -rf /").is_allowed());
//! assert_eq!(policy.decide("make"), PolicyDecision::NeedsApproval);
//!
//! policy.approve_for_session("make");
//! assert!(policy.decide("make").is_allowed());
//! ```

mod defaults;
mod handler;
mod pattern;

pub use defaults::{default_allowed_commands, default_blocked_commands};
pub use handler::{NEEDS_APPROVAL, PermissionMode, Policy, PolicyDecision};
pub use pattern::CommandPattern;
