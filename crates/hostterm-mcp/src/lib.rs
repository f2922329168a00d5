//! hostterm MCP Server
//!
//! Exposes policy-gated host shell execution to MCP clients over stdio.
//!
//! Tools:
//! - `execute_command`: decide and run a command
//! - `approve_command`: record the user's approval for a command, then run it
//! - `change_directory` / `get_current_directory`: move around the sandbox
//! - `get_permissions`: report the active policy
//!
//! One server process serves one client, so it owns exactly one [`Session`].

use std::sync::Arc;

use hostterm::{Config, ConfigError, ExecutionOutcome, ExecutionResult, Session};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::*,
    schemars::{self, JsonSchema},
    service::{RequestContext, RoleServer},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Parameters for `execute_command` and `approve_command`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteParams {
    /// The shell command to run. It is interpreted by `sh -c`.
    pub command: String,

    /// Directory to run in, absolute or relative to the current directory.
    /// Defaults to the current directory.
    #[serde(default)]
    pub working_directory: Option<String>,
}

/// Parameters for `change_directory`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChangeDirectoryParams {
    /// Target directory, absolute, relative, or starting with `~`.
    pub path: String,
}

/// Parameters for tools that take none
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NoParams {}

/// MCP server that runs host commands through a [`Session`]
#[derive(Clone)]
pub struct HosttermServer {
    session: Arc<Session>,
}

impl std::fmt::Debug for HosttermServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HosttermServer").finish_non_exhaustive()
    }
}

impl HosttermServer {
    /// Create a server with a fresh session built from `config`.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            session: Arc::new(Session::new(config)?),
        })
    }

    /// The session this server runs commands in.
    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn execute_command(&self, params: ExecuteParams) -> CallToolResult {
        let outcome = self
            .session
            .run(&params.command, params.working_directory.as_deref())
            .await;
        outcome_to_result(outcome)
    }

    async fn approve_command(&self, params: ExecuteParams) -> CallToolResult {
        let outcome = self
            .session
            .approve_and_run(&params.command, params.working_directory.as_deref())
            .await;
        outcome_to_result(outcome)
    }

    fn change_directory(&self, params: ChangeDirectoryParams) -> CallToolResult {
        match self.session.change_directory(&params.path) {
            Ok(dir) => CallToolResult::success(vec![Content::text(format!(
                "Changed directory to {}",
                dir.display()
            ))]),
            Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
        }
    }

    fn get_current_directory(&self) -> CallToolResult {
        let dir = self.session.current_directory();
        CallToolResult::success(vec![Content::text(dir.display().to_string())])
    }

    fn get_permissions(&self) -> Result<CallToolResult, McpError> {
        let summary = serde_json::to_string_pretty(&self.session.policy_summary())
            .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;
        Ok(CallToolResult::success(vec![Content::text(summary)]))
    }

    fn tools() -> Vec<Tool> {
        vec![
            tool::<ExecuteParams>(
                "execute_command",
                "Execute Host Command",
                "Run a shell command on the host machine. Commands are checked against an \
                allowlist and a blocklist first. Read-only inspection commands (ls, cat, \
                grep, git status, ...) are allowed by default. If the result says \
                NEEDS_APPROVAL, ask the user whether to run the command and, if they agree, \
                call approve_command with the same command.",
            ),
            tool::<ExecuteParams>(
                "approve_command",
                "Approve and Execute Command",
                "Run a command the user has explicitly approved. The approval lasts for the \
                rest of this session. Blocked commands are still refused. Only call this \
                after the user has confirmed.",
            ),
            tool::<ChangeDirectoryParams>(
                "change_directory",
                "Change Directory",
                "Change the directory commands run in. The target must be inside one of the \
                allowed directories.",
            ),
            tool::<NoParams>(
                "get_current_directory",
                "Get Current Directory",
                "Return the directory commands currently run in.",
            ),
            tool::<NoParams>(
                "get_permissions",
                "Get Permissions",
                "Return the permission mode, number of allowed and blocked patterns, \
                timeout, and allowed directories.",
            ),
        ]
    }
}

fn tool<P: JsonSchema>(name: &'static str, title: &'static str, description: &'static str) -> Tool {
    let schema = schemars::schema_for!(P);
    let schema_json = serde_json::to_value(schema).unwrap_or_default();
    let input_schema = match schema_json {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    };

    Tool {
        name: name.into(),
        title: Some(title.into()),
        description: Some(description.into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

fn parse_params<P: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<P, McpError> {
    let args = serde_json::Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(args)
        .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {e}"), None))
}

fn outcome_to_result(outcome: ExecutionOutcome) -> CallToolResult {
    match outcome {
        ExecutionOutcome::Completed(result) => {
            CallToolResult::success(vec![Content::text(format_output(&result))])
        }
        ExecutionOutcome::Denied(reason) => CallToolResult::error(vec![Content::text(format!(
            "Command not allowed: {reason}"
        ))]),
        ExecutionOutcome::NeedsApproval(command) => {
            CallToolResult::success(vec![Content::text(format!(
                "{}: `{command}` is not on the allowlist. Ask the user whether to run it, \
                 and if they agree call approve_command with the same command.",
                hostterm::policy::NEEDS_APPROVAL
            ))])
        }
    }
}

/// Render a result for the model: stdout, then stderr, then annotations.
pub fn format_output(result: &ExecutionResult) -> String {
    let mut output = String::new();

    if !result.stdout.is_empty() {
        output.push_str(&result.stdout);
    }

    if !result.stderr.is_empty() {
        if !output.is_empty() {
            output.push_str("\n--- stderr ---\n");
        }
        output.push_str(&result.stderr);
    }

    if result.timed_out {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str("(command timed out and was killed)");
    } else if output.is_empty() {
        output = format!("(no output, exit code: {})", result.exit_code);
    } else if result.exit_code != 0 {
        output.push_str(&format!("\n(exit code: {})", result.exit_code));
    }

    output
}

impl ServerHandler for HosttermServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "hostterm runs shell commands on the user's machine. Every command is \
                checked against a policy: blocked commands are always refused, allowlisted \
                commands run immediately, and anything else may need the user's approval. \
                Never call approve_command without asking the user first."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = %request.name, "tool call");
        match request.name.as_ref() {
            "execute_command" => Ok(self.execute_command(parse_params(request.arguments)?).await),
            "approve_command" => Ok(self.approve_command(parse_params(request.arguments)?).await),
            "change_directory" => Ok(self.change_directory(parse_params(request.arguments)?)),
            "get_current_directory" => Ok(self.get_current_directory()),
            "get_permissions" => self.get_permissions(),
            _ => Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use hostterm::ExecutionStats;

    fn result(stdout: &str, stderr: &str, exit_code: i32, timed_out: bool) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            timed_out,
            truncated: false,
            stats: ExecutionStats::default(),
        }
    }

    #[test]
    fn test_execute_params_defaults() {
        let json = r#"{"command": "ls"}"#;
        let params: ExecuteParams = serde_json::from_str(json).expect("parse failed");
        assert_eq!(params.command, "ls");
        assert!(params.working_directory.is_none());
    }

    #[test]
    fn test_execute_params_with_directory() {
        let json = r#"{"command": "pwd", "working_directory": "/tmp"}"#;
        let params: ExecuteParams = serde_json::from_str(json).expect("parse failed");
        assert_eq!(params.working_directory.as_deref(), Some("/tmp"));
    }

    #[test]
    fn test_parse_params_missing_arguments() {
        assert!(parse_params::<ExecuteParams>(None).is_err());
        assert!(parse_params::<NoParams>(None).is_ok());
    }

    #[test]
    fn test_tools_have_object_schemas() {
        let tools = HosttermServer::tools();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(
            names,
            [
                "execute_command",
                "approve_command",
                "change_directory",
                "get_current_directory",
                "get_permissions"
            ]
        );
        for tool in &tools {
            assert_eq!(
                tool.input_schema.get("type").and_then(|t| t.as_str()),
                Some("object"),
                "{}",
                tool.name
            );
        }
    }

    #[test]
    fn test_format_output() {
        assert_eq!(format_output(&result("hi\n", "", 0, false)), "hi\n");
        assert_eq!(
            format_output(&result("", "", 0, false)),
            "(no output, exit code: 0)"
        );
        assert_eq!(
            format_output(&result("out", "err", 2, false)),
            "out\n--- stderr ---\nerr\n(exit code: 2)"
        );
        assert_eq!(
            format_output(&result("partial", "", -1, true)),
            "partial\n(command timed out and was killed)"
        );
    }

    #[test]
    fn test_denied_is_tool_error() {
        let result = outcome_to_result(ExecutionOutcome::Denied("Command not in allowlist".into()));
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn test_needs_approval_is_not_an_error() {
        let result = outcome_to_result(ExecutionOutcome::NeedsApproval("make".into()));
        assert_eq!(result.is_error, Some(false));
    }
}
