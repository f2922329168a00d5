//! Integration tests for the hostterm MCP server.
//!
//! These tests spawn the real server binary and talk JSON-RPC to it over
//! stdio, the same way an MCP client does.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

/// The server process plus a persistent reader over its stdout
struct McpServerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl McpServerProcess {
    fn spawn_with_args(args: &[&str]) -> Self {
        let binary = env!("CARGO_BIN_EXE_hostterm-mcp");
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap_or_else(|e| panic!("Failed to spawn MCP server at {binary:?}: {e}"));

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = BufReader::new(child.stdout.take().expect("stdout not captured"));
        let mut server = Self {
            child,
            stdin,
            stdout,
            next_id: 1,
        };
        server.initialize();
        server
    }

    /// Spawn a server confined to `root`, already cd'd into it.
    fn spawn_in(root: &Path, extra: &[&str]) -> Self {
        let root = root.to_str().expect("utf-8 temp path");
        let mut args = vec!["--allow-dir", root];
        args.extend_from_slice(extra);
        let mut server = Self::spawn_with_args(&args);
        let text = server.call_tool_text("change_directory", json!({ "path": root }));
        assert!(text.starts_with("Changed directory"), "{text}");
        server
    }

    fn send(&mut self, message: &Value) {
        let line = serde_json::to_string(message).expect("serialize message");
        writeln!(self.stdin, "{line}").expect("write message");
        self.stdin.flush().expect("flush stdin");
    }

    /// Send a request and wait for the response with the matching id.
    fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }));

        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line).expect("read response");
            assert!(n > 0, "server closed stdout while waiting for response {id}");
            let message: Value = serde_json::from_str(&line)
                .unwrap_or_else(|e| panic!("parse response '{}': {e}", line.trim()));
            if message["id"] == id {
                return message;
            }
        }
    }

    fn initialize(&mut self) {
        let response = self.request(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "hostterm-mcp-test", "version": "0.1.0" }
            }),
        );
        assert!(
            response.get("result").is_some(),
            "Expected result in initialize response, got: {response}"
        );
        self.send(&json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }));
        std::thread::sleep(Duration::from_millis(50));
    }

    fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        let response = self.request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        );
        response
            .get("result")
            .cloned()
            .unwrap_or_else(|| panic!("Expected result from {name}, got: {response}"))
    }

    fn call_tool_text(&mut self, name: &str, arguments: Value) -> String {
        let result = self.call_tool(name, arguments);
        result["content"][0]["text"]
            .as_str()
            .expect("text content")
            .to_string()
    }
}

impl Drop for McpServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn scratch() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

#[test]
fn test_mcp_list_tools() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &[]);

    let response = server.request("tools/list", json!({}));
    let tools = response["result"]["tools"]
        .as_array()
        .expect("tools should be an array");
    let mut names: Vec<_> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        [
            "approve_command",
            "change_directory",
            "execute_command",
            "get_current_directory",
            "get_permissions"
        ]
    );
    for tool in tools {
        assert!(tool.get("description").is_some(), "{tool}");
        assert!(tool.get("inputSchema").is_some(), "{tool}");
    }
}

#[test]
fn test_mcp_execute_allowed_command() {
    let root = scratch();
    std::fs::write(root.path().join("notes.txt"), "hello world\n").unwrap();
    let mut server = McpServerProcess::spawn_in(root.path(), &[]);

    let result = server.call_tool("execute_command", json!({ "command": "cat notes.txt" }));
    assert_ne!(result["isError"], true, "{result}");
    let text = result["content"][0]["text"].as_str().expect("text content");
    assert!(text.contains("hello world"), "{text}");
}

#[test]
fn test_mcp_execute_nonzero_exit() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &[]);

    let text = server.call_tool_text(
        "execute_command",
        json!({ "command": "ls does_not_exist_xyz" }),
    );
    assert!(text.contains("--- stderr ---") || text.contains("exit code"), "{text}");
    assert!(!text.contains("(exit code: 0)"), "{text}");
}

#[test]
fn test_mcp_blocked_command() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &["--mode", "allow_all"]);

    let result = server.call_tool("execute_command", json!({ "command": "sudo ls" }));
    assert_eq!(result["isError"], true, "{result}");
    let text = result["content"][0]["text"].as_str().expect("text content");
    assert!(text.to_lowercase().contains("not allowed"), "{text}");
}

#[test]
fn test_mcp_unlisted_command_in_allowlist_mode() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &[]);

    let result = server.call_tool("execute_command", json!({ "command": "touch created" }));
    assert_eq!(result["isError"], true, "{result}");
    assert!(!root.path().join("created").exists());
}

#[test]
fn test_mcp_empty_command() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &[]);

    let result = server.call_tool("execute_command", json!({ "command": "   " }));
    assert_eq!(result["isError"], true, "{result}");
    let text = result["content"][0]["text"].as_str().expect("text content");
    assert!(text.to_lowercase().contains("no command"), "{text}");
}

#[test]
fn test_mcp_approval_flow() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &["--mode", "ask"]);

    let text = server.call_tool_text("execute_command", json!({ "command": "touch created" }));
    assert!(text.starts_with("NEEDS_APPROVAL"), "{text}");
    assert!(text.contains("approve_command"), "{text}");
    assert!(!root.path().join("created").exists());

    let result = server.call_tool("approve_command", json!({ "command": "touch created" }));
    assert_ne!(result["isError"], true, "{result}");
    assert!(root.path().join("created").exists());

    // Approved for the rest of the session
    std::fs::remove_file(root.path().join("created")).unwrap();
    let result = server.call_tool("execute_command", json!({ "command": "touch created" }));
    assert_ne!(result["isError"], true, "{result}");
    assert!(root.path().join("created").exists());
}

#[test]
fn test_mcp_approve_blocked_command_still_denied() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &["--mode", "ask"]);

    let result = server.call_tool("approve_command", json!({ "command": "sudo ls" }));
    assert_eq!(result["isError"], true, "{result}");
}

#[test]
fn test_mcp_directories() {
    let root = scratch();
    std::fs::create_dir(root.path().join("sub")).unwrap();
    let mut server = McpServerProcess::spawn_in(root.path(), &[]);
    let canonical = std::fs::canonicalize(root.path()).unwrap();

    let cwd = server.call_tool_text("get_current_directory", json!({}));
    assert_eq!(Path::new(&cwd), canonical);

    let text = server.call_tool_text("change_directory", json!({ "path": "sub" }));
    assert!(text.ends_with("sub"), "{text}");

    let result = server.call_tool("change_directory", json!({ "path": "/etc" }));
    assert_eq!(result["isError"], true, "{result}");

    let result = server.call_tool("change_directory", json!({ "path": "" }));
    assert_eq!(result["isError"], true, "{result}");

    let text = server.call_tool_text(
        "execute_command",
        json!({ "command": "pwd", "working_directory": "/etc" }),
    );
    assert!(text.contains("not allowed"), "{text}");
}

#[test]
fn test_mcp_get_permissions() {
    let root = scratch();
    let mut server =
        McpServerProcess::spawn_in(root.path(), &["--mode", "ask", "--timeout", "10"]);

    let text = server.call_tool_text("get_permissions", json!({}));
    let summary: Value = serde_json::from_str(&text).expect("permissions are JSON");
    assert_eq!(summary["permission_mode"], "ask");
    assert_eq!(summary["timeout_seconds"], 10);
    assert!(summary["num_allowed_patterns"].as_u64().unwrap() > 0);
    assert!(summary["num_blocked_patterns"].as_u64().unwrap() > 0);
    assert_eq!(summary["allowed_directories"].as_array().unwrap().len(), 1);
}

#[test]
fn test_mcp_config_file() {
    let root = scratch();
    let config_path = root.path().join("hostterm.json");
    std::fs::write(
        &config_path,
        r#"{
            "allowed_commands": [{"pattern": "pwd"}, {"pattern": "ls"}],
            "blocked_commands": [{"pattern": "ls"}],
            "max_output_bytes": 50
        }"#,
    )
    .unwrap();
    let mut server = McpServerProcess::spawn_in(
        root.path(),
        &["--config", config_path.to_str().expect("utf-8 temp path")],
    );

    let text = server.call_tool_text("get_permissions", json!({}));
    let summary: Value = serde_json::from_str(&text).expect("permissions are JSON");
    assert_eq!(summary["num_allowed_patterns"], 2);
    assert_eq!(summary["num_blocked_patterns"], 1);

    let result = server.call_tool("execute_command", json!({ "command": "ls" }));
    assert_eq!(result["isError"], true, "{result}");
}

#[test]
fn test_mcp_timeout() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(
        root.path(),
        &["--mode", "allow_all", "--timeout", "1"],
    );

    let started = std::time::Instant::now();
    let text = server.call_tool_text("execute_command", json!({ "command": "sleep 10" }));
    assert!(text.contains("timed out"), "{text}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_mcp_unknown_tool() {
    let root = scratch();
    let mut server = McpServerProcess::spawn_in(root.path(), &[]);

    let response = server.request(
        "tools/call",
        json!({ "name": "does_not_exist", "arguments": {} }),
    );
    assert!(response.get("error").is_some(), "{response}");
}
