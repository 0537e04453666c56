//! Server process lifecycle management.
//!
//! Handles spawning tool server child processes, the initialize handshake,
//! stderr capture, and shutdown. Each server runs as a separate OS process
//! communicating via JSON-RPC over stdio.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;

use crate::server_registry::ServerDescriptor;

use super::errors::McpError;
use super::session::{Connector, ServerRequestHandler, ServerSession};
use super::transport::{extract_result, StdioTransport};
use super::types::{
    GetPromptResult, InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult,
    PromptDescriptor, ReadResourceResult, ResourceContents, ResourceDescriptor,
    ServerCapabilities, ServerInfo, ToolCallOutput, ToolDescriptor, PROTOCOL_VERSION,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default timeout for the initialize handshake.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for listing / reading requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for graceful shutdown before force-killing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lines of stderr retained for failure diagnostics.
const STDERR_TAIL_LINES: usize = 50;

/// Upper bound on cursor pages followed for one listing.
const MAX_LIST_PAGES: usize = 64;

// ─── Stderr Capture ──────────────────────────────────────────────────────────

/// Rolling tail of a server's stderr.
///
/// Stderr is drained continuously so a chatty server can never block on a
/// full pipe; the last few lines are kept for handshake failure messages.
#[derive(Clone, Default)]
struct StderrTail {
    lines: Arc<std::sync::Mutex<VecDeque<String>>>,
}

impl StderrTail {
    fn spawn_drain(server: &str, stderr: ChildStderr) -> Self {
        let tail = Self::default();
        let sink = tail.clone();
        let server = server.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(server = %server, stderr = %line, "server stderr");
                sink.push(line);
            }
        });
        tail
    }

    fn push(&self, line: String) {
        if let Ok(mut buf) = self.lines.lock() {
            if buf.len() == STDERR_TAIL_LINES {
                buf.pop_front();
            }
            buf.push_back(line);
        }
    }

    /// Joined tail, truncated to 2000 chars to keep log messages readable.
    fn snapshot(&self) -> String {
        let joined = match self.lines.lock() {
            Ok(buf) => buf.iter().cloned().collect::<Vec<_>>().join("\n"),
            Err(_) => String::new(),
        };
        if joined.chars().count() > 2000 {
            let mut cut: String = joined.chars().take(2000).collect();
            cut.push_str("...(truncated)");
            cut
        } else {
            joined
        }
    }
}

/// Format a stderr suffix for error messages (empty string if no stderr).
fn format_stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" | stderr: {}", stderr.trim())
    }
}

// ─── StdioSession ────────────────────────────────────────────────────────────

/// A running tool server process with its transport and negotiated state.
pub struct StdioSession {
    name: String,
    process: Mutex<Child>,
    transport: StdioTransport,
    init: InitializeResult,
    request_timeout: Duration,
}

impl StdioSession {
    /// Issue one request and decode its result.
    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<T, McpError> {
        let response = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.request(method, params))
                .await
                .map_err(|_| McpError::Timeout {
                    server: self.name.clone(),
                    method: method.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })??,
            None => self.transport.request(method, params).await?,
        };

        let value = extract_result(response)?;
        serde_json::from_value(value).map_err(|e| McpError::InvalidResult {
            server: self.name.clone(),
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    /// Follow `nextCursor` until the listing is exhausted.
    async fn list_paged<P, T>(
        &self,
        method: &str,
        into_page: impl Fn(P) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>, McpError>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let page: P = self.rpc(method, params, Some(self.request_timeout)).await?;
            let (mut batch, next) = into_page(page);
            items.append(&mut batch);
            match next {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(items),
            }
        }

        tracing::warn!(
            server = %self.name,
            method,
            pages = MAX_LIST_PAGES,
            "listing truncated at page limit"
        );
        Ok(items)
    }
}

#[async_trait]
impl ServerSession for StdioSession {
    fn capabilities(&self) -> &ServerCapabilities {
        &self.init.capabilities
    }

    fn server_info(&self) -> Option<&ServerInfo> {
        self.init.server_info.as_ref()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        self.list_paged("tools/list", |page: ListToolsResult| {
            (page.tools, page.next_cursor)
        })
        .await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        // Call deadlines are owned by the session manager.
        self.rpc("tools/call", Some(params), None).await
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, McpError> {
        self.list_paged("prompts/list", |page: ListPromptsResult| {
            (page.prompts, page.next_cursor)
        })
        .await
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<GetPromptResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        self.rpc("prompts/get", Some(params), Some(self.request_timeout))
            .await
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, McpError> {
        self.list_paged("resources/list", |page: ListResourcesResult| {
            (page.resources, page.next_cursor)
        })
        .await
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, McpError> {
        let result: ReadResourceResult = self
            .rpc(
                "resources/read",
                Some(serde_json::json!({ "uri": uri })),
                Some(self.request_timeout),
            )
            .await?;
        Ok(result.contents)
    }

    /// Close stdin, wait for a graceful exit, then force-kill.
    async fn close(&self) {
        self.transport.close().await;

        let mut process = self.process.lock().await;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, process.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.name, %status, "server exited");
            }
            _ => {
                tracing::warn!(server = %self.name, "server did not exit, killing");
                let _ = process.kill().await;
            }
        }
    }
}

// ─── Spawning ────────────────────────────────────────────────────────────────

/// Spawn a single tool server process and perform the initialization handshake.
pub async fn spawn_server(
    descriptor: &ServerDescriptor,
    init_timeout: Duration,
    request_timeout: Duration,
    request_handler: Option<Arc<dyn ServerRequestHandler>>,
) -> Result<StdioSession, McpError> {
    let name = descriptor.name.as_str();

    let mut cmd = Command::new(&descriptor.command);
    cmd.args(&descriptor.args);
    cmd.envs(&descriptor.env);
    if let Some(dir) = &descriptor.cwd {
        cmd.current_dir(dir);
    }

    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
        name: name.to_string(),
        reason: format!("{e}"),
    })?;

    let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdin".into(),
    })?;

    let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdout".into(),
    })?;

    let stderr_tail = match child.stderr.take() {
        Some(stderr) => StderrTail::spawn_drain(name, stderr),
        None => StderrTail::default(),
    };

    let mut transport = StdioTransport::new(name, stdin, BufReader::new(stdout));
    if let Some(handler) = request_handler {
        transport = transport.with_request_handler(handler);
    }

    let init = match tokio::time::timeout(init_timeout, initialize(&transport, name)).await {
        Ok(Ok(init)) => init,
        Ok(Err(e)) => {
            let _ = child.kill().await;
            return Err(init_failure(name, &stderr_tail, e.to_string()).await);
        }
        Err(_) => {
            let _ = child.kill().await;
            let reason = format!(
                "initialization timed out after {}s",
                init_timeout.as_secs()
            );
            return Err(init_failure(name, &stderr_tail, reason).await);
        }
    };

    tracing::info!(
        server = name,
        protocol = ?init.protocol_version,
        server_name = ?init.server_info.as_ref().and_then(|i| i.name.as_deref()),
        "server initialized"
    );

    Ok(StdioSession {
        name: name.to_string(),
        process: Mutex::new(child),
        transport,
        init,
        request_timeout,
    })
}

/// Build an `InitFailed` error carrying whatever the server wrote to stderr.
async fn init_failure(name: &str, stderr_tail: &StderrTail, reason: String) -> McpError {
    // Let the drain task pick up the last lines of a dying process.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stderr_ctx = stderr_tail.snapshot();
    if !stderr_ctx.is_empty() {
        tracing::warn!(
            server = name,
            stderr = %stderr_ctx,
            "server stderr captured on failure"
        );
    }
    McpError::InitFailed {
        name: name.to_string(),
        reason: format!("{reason}{}", format_stderr_suffix(&stderr_ctx)),
    }
}

/// Perform the MCP initialization handshake.
async fn initialize(
    transport: &StdioTransport,
    server_name: &str,
) -> Result<InitializeResult, McpError> {
    let params = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    });

    let response = transport.request("initialize", Some(params)).await?;
    let result = extract_result(response)?;

    let init: InitializeResult =
        serde_json::from_value(result).map_err(|e| McpError::InitFailed {
            name: server_name.to_string(),
            reason: format!("failed to parse initialize response: {e}"),
        })?;

    transport.notify("notifications/initialized", None).await?;
    Ok(init)
}

// ─── Connector ───────────────────────────────────────────────────────────────

/// Production connector: spawns the descriptor's command over stdio.
#[derive(Clone)]
pub struct StdioConnector {
    init_timeout: Duration,
    request_timeout: Duration,
    request_handler: Option<Arc<dyn ServerRequestHandler>>,
}

impl StdioConnector {
    pub fn new(init_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            init_timeout,
            request_timeout,
            request_handler: None,
        }
    }

    /// Every spawned session answers server requests through `handler`.
    pub fn with_request_handler(mut self, handler: Arc<dyn ServerRequestHandler>) -> Self {
        self.request_handler = Some(handler);
        self
    }
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self::new(DEFAULT_INIT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<Box<dyn ServerSession>, McpError> {
        let session = spawn_server(
            descriptor,
            self.init_timeout,
            self.request_timeout,
            self.request_handler.clone(),
        )
        .await?;
        Ok(Box::new(session))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
