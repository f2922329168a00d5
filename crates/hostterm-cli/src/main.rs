//! hostterm CLI - try commands against the default policy
//!
//! Usage:
//!   hostterm -c "command"       Decide, then run the command if allowed
//!   hostterm --check "command"  Print the policy decision only
//!   hostterm                    Read a command from stdin
//!
//! The session uses the default configuration: allowlist mode, rooted at the
//! home directory. Set `HOSTTERM_CONFIG` to a JSON config file to change it.

use std::io::{self, Read};
use std::process::ExitCode;

use hostterm::policy::PolicyDecision;
use hostterm::{Config, ExecutionOutcome, Session};
use tracing_subscriber::EnvFilter;

enum Mode {
    Run(String),
    Check(String),
}

fn parse_args() -> anyhow::Result<Mode> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [flag, command, ..] if flag == "-c" => Ok(Mode::Run(command.clone())),
        [flag, command, ..] if flag == "--check" => Ok(Mode::Check(command.clone())),
        [] => {
            let mut command = String::new();
            io::stdin().read_to_string(&mut command)?;
            Ok(Mode::Run(command))
        }
        _ => anyhow::bail!("usage: hostterm [-c COMMAND | --check COMMAND]"),
    }
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::var_os("HOSTTERM_CONFIG") {
        Some(path) => Ok(Config::from_file(path)?),
        None => Ok(Config::default()),
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let mode = parse_args()?;
    let session = Session::new(&load_config()?)?;

    let command = match mode {
        Mode::Check(command) => {
            match session.decide(&command) {
                PolicyDecision::Allow(reason) => println!("allow: {reason}"),
                PolicyDecision::Deny(reason) => println!("deny: {reason}"),
                decision @ PolicyDecision::NeedsApproval => println!("{}", decision.reason()),
            }
            return Ok(ExitCode::SUCCESS);
        }
        Mode::Run(command) => command,
    };

    match session.run(&command, None).await {
        ExecutionOutcome::Completed(result) => {
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            if result.timed_out {
                eprintln!("hostterm: command timed out");
            }
            Ok(ExitCode::from(u8::try_from(result.exit_code).unwrap_or(1)))
        }
        ExecutionOutcome::Denied(reason) => {
            eprintln!("hostterm: command not allowed: {reason}");
            Ok(ExitCode::from(126))
        }
        ExecutionOutcome::NeedsApproval(command) => {
            eprintln!("hostterm: {command}: needs approval");
            Ok(ExitCode::from(126))
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("hostterm: {e}");
            ExitCode::FAILURE
        }
    }
}
