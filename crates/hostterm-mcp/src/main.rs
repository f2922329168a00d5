//! hostterm MCP Server
//!
//! Serves policy-gated host shell execution over MCP stdio. Settings come
//! from an optional JSON config file, then command-line flags on top.

use std::path::PathBuf;

use clap::Parser;
use hostterm::policy::PermissionMode;
use hostterm::{Config, ConfigOverrides};
use hostterm_mcp::HosttermServer;
use rmcp::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// hostterm MCP Server - run host shell commands behind an allowlist
#[derive(Parser, Debug)]
#[command(name = "hostterm-mcp")]
#[command(about = "MCP server for policy-gated host shell execution")]
struct Args {
    /// JSON config file with overrides on top of the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Permission mode: allowlist, ask or allow_all
    #[arg(long)]
    mode: Option<PermissionMode>,

    /// Per-command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Cap on captured stdout + stderr, in bytes
    #[arg(long)]
    max_output: Option<usize>,

    /// Permitted directory root (repeatable); replaces the configured roots
    #[arg(long = "allow-dir")]
    allow_dirs: Vec<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let base = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        let config = base.merge(ConfigOverrides {
            permission_mode: self.mode,
            timeout_seconds: self.timeout,
            max_output_bytes: self.max_output,
            allowed_directories: (!self.allow_dirs.is_empty()).then_some(self.allow_dirs),
            ..Default::default()
        });
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr so nothing interferes with MCP stdio
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = Args::parse().into_config()?;
    tracing::info!(
        mode = %config.permission_mode,
        timeout_secs = config.timeout_seconds,
        directories = ?config.allowed_directories,
        "Starting hostterm MCP server"
    );

    let server = HosttermServer::new(&config)?;

    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("Failed to start MCP service: {}", e);
        })?;

    tracing::info!("hostterm MCP server running");

    service.waiting().await?;

    tracing::info!("hostterm MCP server shutting down");

    Ok(())
}
