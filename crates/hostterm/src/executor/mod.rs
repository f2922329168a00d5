//! Sandboxed execution of approved commands on the host.
//!
//! - [`SandboxExecutor`]: runs commands under a timeout and output cap,
//!   confined to a set of permitted directory roots
//! - [`DirectoryError`]: why a working directory was rejected

mod directory;
mod sandbox;

pub(crate) use directory::home_dir;
pub use directory::DirectoryError;
pub use sandbox::SandboxExecutor;
