//! The permission-decision engine.

use std::collections::HashSet;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::pattern::CommandPattern;

/// Reason string reported for commands that need interactive approval.
pub const NEEDS_APPROVAL: &str = "NEEDS_APPROVAL";

/// Fallback behaviour for commands that match neither list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Only commands on the allowed list run.
    #[default]
    Allowlist,
    /// Unlisted commands need approval from the caller.
    Ask,
    /// Everything not blocked runs.
    AllowAll,
}

impl PermissionMode {
    /// The config-file spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Allowlist => "allowlist",
            PermissionMode::Ask => "ask",
            PermissionMode::AllowAll => "allow_all",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "allowlist" => Ok(PermissionMode::Allowlist),
            "ask" => Ok(PermissionMode::Ask),
            "allow_all" => Ok(PermissionMode::AllowAll),
            other => Err(format!(
                "unknown permission mode '{other}' (expected allowlist, ask or allow_all)"
            )),
        }
    }
}

/// The result of a policy check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The command may run.
    Allow(String),
    /// The command must not run.
    Deny(String),
    /// No rule matched in [`PermissionMode::Ask`]; the caller should confirm
    /// with the user before approving the command.
    NeedsApproval,
}

impl PolicyDecision {
    /// Returns true if the command may run.
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allow(_))
    }

    /// Returns true if the command is waiting on interactive approval.
    pub fn needs_approval(&self) -> bool {
        matches!(self, PolicyDecision::NeedsApproval)
    }

    /// The reason for the decision. [`PolicyDecision::NeedsApproval`]
    /// reports the [`NEEDS_APPROVAL`] sentinel.
    pub fn reason(&self) -> &str {
        match self {
            PolicyDecision::Allow(reason) | PolicyDecision::Deny(reason) => reason,
            PolicyDecision::NeedsApproval => NEEDS_APPROVAL,
        }
    }
}

/// Ordered allow/block rules plus the session's approvals.
///
/// Rules are evaluated blocked-first, then by mode:
///
/// 1. empty commands are denied;
/// 2. the first matching blocked pattern denies, in every mode;
/// 3. [`PermissionMode::AllowAll`] allows;
/// 4. commands approved for this session are allowed;
/// 5. the first matching allowed pattern allows, for single-line commands;
/// 6. otherwise [`PermissionMode::Ask`] needs approval and
///    [`PermissionMode::Allowlist`] denies.
///
/// The pattern lists are fixed at construction. Session approvals sit behind
/// a lock so a shared `Policy` can be approved into from any thread.
pub struct Policy {
    mode: PermissionMode,
    allowed: Vec<CommandPattern>,
    blocked: Vec<CommandPattern>,
    session_approved: RwLock<HashSet<String>>,
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("mode", &self.mode)
            .field("allowed", &self.allowed.len())
            .field("blocked", &self.blocked.len())
            .field("session_approved", &self.session_approved_count())
            .finish()
    }
}

impl Policy {
    /// Create a policy from ordered allowed and blocked patterns.
    pub fn new(
        mode: PermissionMode,
        allowed: Vec<CommandPattern>,
        blocked: Vec<CommandPattern>,
    ) -> Self {
        for pattern in blocked.iter().filter(|p| !p.is_valid()) {
            tracing::warn!(
                pattern = pattern.pattern(),
                "blocked rule has an invalid regex and will not block anything"
            );
        }
        Self {
            mode,
            allowed,
            blocked,
            session_approved: RwLock::new(HashSet::new()),
        }
    }

    /// The fallback mode.
    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Allowed patterns, in evaluation order.
    pub fn allowed_patterns(&self) -> &[CommandPattern] {
        &self.allowed
    }

    /// Blocked patterns, in evaluation order.
    pub fn blocked_patterns(&self) -> &[CommandPattern] {
        &self.blocked
    }

    /// Decide whether `command` may run.
    pub fn decide(&self, command: &str) -> PolicyDecision {
        let command = command.trim();
        if command.is_empty() {
            return PolicyDecision::Deny("No command provided".to_string());
        }

        if let Some(rule) = self.blocked.iter().find(|p| p.matches(command)) {
            tracing::debug!(command, rule = rule.pattern(), "command blocked");
            return PolicyDecision::Deny(blocked_reason(rule));
        }

        if self.mode == PermissionMode::AllowAll {
            return PolicyDecision::Allow("Allowed (allow_all mode)".to_string());
        }

        if self.is_session_approved(command) {
            return PolicyDecision::Allow("Approved for this session".to_string());
        }

        // A prefix only vouches for the first line; `sh -c` runs the rest.
        if !is_multiline(command)
            && let Some(rule) = self.allowed.iter().find(|p| p.matches(command))
        {
            return PolicyDecision::Allow(format!("Allowed: {}", rule.description()));
        }

        match self.mode {
            PermissionMode::Ask => PolicyDecision::NeedsApproval,
            _ => PolicyDecision::Deny("Command not in allowlist".to_string()),
        }
    }

    /// Allow this exact command for the rest of the session.
    ///
    /// Blocked rules still apply to approved commands.
    pub fn approve_for_session(&self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }
        let inserted = match self.session_approved.write() {
            Ok(mut guard) => guard.insert(command.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(command.to_string()),
        };
        if inserted {
            tracing::info!(command, "command approved for session");
        }
    }

    /// Number of distinct commands approved so far.
    pub fn session_approved_count(&self) -> usize {
        match self.session_approved.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn is_session_approved(&self, command: &str) -> bool {
        match self.session_approved.read() {
            Ok(guard) => guard.contains(command),
            Err(poisoned) => poisoned.into_inner().contains(command),
        }
    }
}

fn is_multiline(command: &str) -> bool {
    command.contains(['\n', '\r'])
}

fn blocked_reason(rule: &CommandPattern) -> String {
    let mut reason = format!("Command blocked: {}", rule.description());
    if rule.is_regex() {
        reason.push_str("\nBlocked regex: ");
        reason.push_str(rule.pattern());
    }
    reason
}
