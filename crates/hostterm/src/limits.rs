//! Resource limits for command execution

use std::time::Duration;

/// Default wall-clock timeout.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Default cap on captured output, shared by stdout and stderr.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100_000;

/// Appended to any stream that was cut short.
pub const TRUNCATION_NOTICE: &str = "\n... [output truncated] ...";

/// Resource limits for command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Wall-clock timeout, measured from spawn
    pub timeout: Duration,
    /// Maximum output (stdout + stderr) in bytes
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Buffer that limits how much data can be written
#[derive(Debug, Clone)]
pub(crate) struct LimitedBuffer {
    buffer: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl LimitedBuffer {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    /// Keep as much of `data` as fits. Reports the full length as written so
    /// producers keep draining.
    pub(crate) fn write(&mut self, data: &[u8]) -> usize {
        let remaining = self.limit.saturating_sub(self.buffer.len());
        let to_write = data.len().min(remaining);
        self.buffer.extend_from_slice(&data[..to_write]);
        self.dropped += data.len() - to_write;
        data.len()
    }

    pub(crate) fn was_truncated(&self) -> bool {
        self.dropped > 0
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

/// Captured output after the shared budget has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CappedOutput {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) truncated: bool,
}

/// Apply one `max_bytes` budget across both streams. Stdout is served first
/// and stderr gets what is left.
pub(crate) fn cap_output(
    stdout: &LimitedBuffer,
    stderr: &LimitedBuffer,
    max_bytes: usize,
) -> CappedOutput {
    let (stdout, used, stdout_cut) = cap_stream(stdout, max_bytes);
    let (stderr, _, stderr_cut) = cap_stream(stderr, max_bytes.saturating_sub(used));
    CappedOutput {
        stdout,
        stderr,
        truncated: stdout_cut || stderr_cut,
    }
}

fn cap_stream(buffer: &LimitedBuffer, budget: usize) -> (String, usize, bool) {
    let bytes = buffer.as_bytes();
    if bytes.len() <= budget && !buffer.was_truncated() {
        return (String::from_utf8_lossy(bytes).into_owned(), bytes.len(), false);
    }
    let kept = truncate_utf8(bytes, budget);
    let text = String::from_utf8_lossy(kept);
    (format!("{text}{TRUNCATION_NOTICE}"), kept.len(), true)
}

/// Cut raw output at or before `max_bytes`, backing off to the start of a
/// UTF-8 sequence so a valid character is never split. Budgets count raw
/// bytes, not the lossily decoded text.
fn truncate_utf8(bytes: &[u8], max_bytes: usize) -> &[u8] {
    if bytes.len() <= max_bytes {
        return bytes;
    }
    let end = (max_bytes.saturating_sub(3)..=max_bytes)
        .rev()
        .find(|&i| i == 0 || !is_continuation(bytes[i]))
        .unwrap_or(max_bytes);
    &bytes[..end]
}

fn is_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}
