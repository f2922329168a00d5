//! Approval flow example.
//!
//! In `ask` mode, commands that match neither rule list come back as
//! needing approval. Once approved they run for the rest of the session,
//! but blocked rules still win.
//!
//! Run with: cargo run -p hostterm --example approval_and_policy

use hostterm::policy::{CommandPattern, PermissionMode, PolicyDecision};
use hostterm::{Config, ConfigOverrides, ExecutionOutcome, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_overrides(ConfigOverrides {
        permission_mode: Some(PermissionMode::Ask),
        additional_blocked_commands: vec![CommandPattern::regex(
            r"(^|[;&|]\s*)curl\s",
            "Network access is not allowed",
        )],
        allowed_directories: Some(vec!["/tmp".into()]),
        ..Default::default()
    })?;
    let session = Session::new(&config)?;
    session.change_directory("/tmp")?;

    let summary = session.policy_summary();
    println!(
        "mode={} allowed={} blocked={} timeout={}s\n",
        summary.permission_mode,
        summary.num_allowed_patterns,
        summary.num_blocked_patterns,
        summary.timeout_seconds
    );

    for command in ["pwd", "echo approved", "curl example.com", "sudo ls"] {
        match session.decide(command) {
            PolicyDecision::Allow(reason) => println!("{command:20} allow  ({reason})"),
            PolicyDecision::Deny(reason) => println!("{command:20} deny   ({reason})"),
            PolicyDecision::NeedsApproval => println!("{command:20} ask"),
        }
    }

    println!("\n=== Approving 'echo approved' ===");
    if let ExecutionOutcome::Completed(result) = session.approve_and_run("echo approved", None).await
    {
        print!("{}", result.stdout);
    }
    println!("now: {}", session.decide("echo approved").reason());

    println!("\n=== Approval does not override a block ===");
    if let ExecutionOutcome::Denied(reason) = session.approve_and_run("sudo ls", None).await {
        println!("{reason}");
    }

    Ok(())
}
