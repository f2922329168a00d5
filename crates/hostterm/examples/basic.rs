//! Basic session usage example.
//!
//! Runs a few commands through a default session confined to the home
//! directory and `/tmp`.
//!
//! Run with: cargo run -p hostterm --example basic

use hostterm::{Config, ConfigOverrides, ExecutionOutcome, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut dirs = Config::default().allowed_directories;
    dirs.push("/tmp".into());
    let config = Config::from_overrides(ConfigOverrides {
        allowed_directories: Some(dirs),
        timeout_seconds: Some(10),
        ..Default::default()
    })?;
    let session = Session::new(&config)?;

    println!("=== Allowed command ===");
    print_outcome(session.run("ls -la", Some("/tmp")).await);

    println!("=== Changing directory ===");
    let cwd = session.change_directory("/tmp")?;
    println!("now in {}", cwd.display());
    print_outcome(session.run("pwd", None).await);

    println!("=== Not on the allowlist ===");
    print_outcome(session.run("make build", None).await);

    println!("=== Blocked ===");
    print_outcome(session.run("cat /etc/shadow", None).await);

    println!("=== Directory outside the sandbox ===");
    if let Err(e) = session.change_directory("/etc") {
        println!("cd /etc: {e}");
    }

    Ok(())
}

fn print_outcome(outcome: ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Completed(result) => {
            print!("{}", result.stdout);
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }
            println!(
                "exit code: {} ({} ms)\n",
                result.exit_code, result.stats.wall_time_ms
            );
        }
        ExecutionOutcome::Denied(reason) => println!("denied: {reason}\n"),
        ExecutionOutcome::NeedsApproval(command) => println!("needs approval: {command}\n"),
    }
}
