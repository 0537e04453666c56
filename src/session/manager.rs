//! Session manager.
//!
//! Owns every live tool server connection, keyed by server name. Connect and
//! disconnect for a given name are serialised by a per-name lock; work on
//! different names runs concurrently. Reads clone the connection `Arc` and
//! drop the map lock before any I/O.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::errors::SessionError;
use super::types::{
    ConnectAllReport, ConnectOutcome, Listing, ServerFailure, ServerItem, ServerStatus,
};
use crate::mcp_client::types::{
    GetPromptResult, PromptDescriptor, ResourceContents, ResourceDescriptor, ToolCallOutput,
    ToolDescriptor,
};
use crate::mcp_client::{Connector, McpError, ServerSession};
use crate::server_registry::ServerRegistry;

/// Default per-call timeout for `tools/call`.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

// ─── ServerConnection ────────────────────────────────────────────────────────

/// One live server: its session, cached tool catalog and connect time.
pub struct ServerConnection {
    name: String,
    session: Box<dyn ServerSession>,
    tools: RwLock<Vec<ToolDescriptor>>,
    connected_at: DateTime<Utc>,
}

impl ServerConnection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub async fn cached_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().await.clone()
    }

    /// Re-list the server's tools and replace the cache.
    async fn refresh_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let tools = match self.session.list_tools().await {
            Ok(tools) => tools,
            Err(e) if e.is_method_not_found() => Vec::new(),
            Err(e) => return Err(self.protocol_error(e)),
        };
        *self.tools.write().await = tools.clone();
        Ok(tools)
    }

    fn protocol_error(&self, e: McpError) -> SessionError {
        SessionError::Protocol {
            server: self.name.clone(),
            reason: e.to_string(),
        }
    }
}

// ─── SessionManager ──────────────────────────────────────────────────────────

pub struct SessionManager {
    registry: ServerRegistry,
    connector: Arc<dyn Connector>,
    active: RwLock<HashMap<String, Arc<ServerConnection>>>,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    call_timeout: Duration,
}

impl SessionManager {
    pub fn new(registry: ServerRegistry, connector: Arc<dyn Connector>) -> Self {
        Self {
            registry,
            connector,
            active: RwLock::new(HashMap::new()),
            name_locks: Mutex::new(HashMap::new()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    // ─── Connect / Disconnect ────────────────────────────────────────────

    /// Connect to a configured server.
    ///
    /// The connection is registered only after the handshake succeeds, so a
    /// failure leaves no trace in the active map.
    pub async fn connect(&self, name: &str) -> Result<ConnectOutcome, SessionError> {
        let descriptor = self
            .registry
            .get(name)
            .ok_or_else(|| SessionError::UnknownServer {
                server: name.to_string(),
            })?;

        let lock = self.name_lock(name).await;
        let _guard = lock.lock().await;

        if self.active.read().await.contains_key(name) {
            tracing::debug!(server = name, "already connected");
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        tracing::info!(server = name, command = %descriptor.command, "connecting to server");
        let session = self.connector.connect(descriptor).await.map_err(|e| {
            tracing::error!(server = name, error = %e, "server connect failed");
            SessionError::Connection {
                server: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let tools = match session.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if !e.is_method_not_found() {
                    tracing::warn!(
                        server = name,
                        error = %e,
                        "tool listing failed after connect, continuing with empty catalog"
                    );
                }
                Vec::new()
            }
        };

        tracing::info!(server = name, tools = tools.len(), "server connected");

        let connection = Arc::new(ServerConnection {
            name: name.to_string(),
            session,
            tools: RwLock::new(tools),
            connected_at: Utc::now(),
        });
        self.active
            .write()
            .await
            .insert(name.to_string(), connection);

        Ok(ConnectOutcome::Connected)
    }

    /// Connect every configured server concurrently.
    pub async fn connect_all(&self) -> ConnectAllReport {
        let names = self.registry.names();
        let results =
            futures::future::join_all(names.iter().map(|name| self.connect(name))).await;

        let mut report = ConnectAllReport::default();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(_) => report.connected.push(name),
                Err(e) => report.failures.push(ServerFailure {
                    server: name,
                    error: e.to_string(),
                }),
            }
        }
        report
    }

    /// Disconnect one server, or every connected server when `name` is `None`.
    ///
    /// Returns the names that were disconnected.
    pub async fn disconnect(&self, name: Option<&str>) -> Result<Vec<String>, SessionError> {
        match name {
            Some(name) => {
                self.disconnect_one(name).await?;
                Ok(vec![name.to_string()])
            }
            None => {
                let mut closed = Vec::new();
                for name in self.connected_servers().await {
                    match self.disconnect_one(&name).await {
                        Ok(()) => closed.push(name),
                        // Raced with another disconnect of the same name.
                        Err(SessionError::NotConnected { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(closed)
            }
        }
    }

    async fn disconnect_one(&self, name: &str) -> Result<(), SessionError> {
        if !self.registry.contains(name) {
            return Err(SessionError::UnknownServer {
                server: name.to_string(),
            });
        }
        let lock = self.name_lock(name).await;
        let _guard = lock.lock().await;

        let connection = self.connection(name).await?;

        // Close before the name leaves the map, so a reconnect can never
        // overlap a still-running transport.
        connection.session.close().await;
        self.active.write().await.remove(name);

        tracing::info!(server = name, "server disconnected");
        Ok(())
    }

    /// Tear down every connection. Call once at process exit.
    pub async fn shutdown(&self) {
        match self.disconnect(None).await {
            Ok(closed) => tracing::info!(servers = closed.len(), "session manager shut down"),
            Err(e) => tracing::warn!(error = %e, "error during shutdown"),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Names of active connections, sorted.
    pub async fn connected_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.active.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_connected(&self, name: &str) -> bool {
        self.active.read().await.contains_key(name)
    }

    /// Every configured server with its connection state.
    pub async fn server_statuses(&self) -> Vec<ServerStatus> {
        let active: HashMap<String, Arc<ServerConnection>> = self.active.read().await.clone();

        let mut statuses = Vec::with_capacity(self.registry.len());
        for name in self.registry.names() {
            let status = match active.get(&name) {
                Some(conn) => ServerStatus {
                    connected: true,
                    tool_count: Some(conn.tools.read().await.len()),
                    connected_at: Some(conn.connected_at),
                    server_info: conn.session.server_info().cloned(),
                    name,
                },
                None => ServerStatus {
                    name,
                    connected: false,
                    tool_count: None,
                    connected_at: None,
                    server_info: None,
                },
            };
            statuses.push(status);
        }
        statuses
    }

    /// List tools live from one server, or from every connected server.
    ///
    /// A named listing also refreshes that server's cached catalog.
    pub async fn list_tools(
        &self,
        server: Option<&str>,
    ) -> Result<Listing<ToolDescriptor>, SessionError> {
        self.gather(server, |conn| async move { conn.refresh_tools().await })
            .await
    }

    pub async fn list_prompts(
        &self,
        server: Option<&str>,
    ) -> Result<Listing<PromptDescriptor>, SessionError> {
        self.gather(server, |conn| async move {
            if conn.session.capabilities().prompts.is_none() {
                return Ok(Vec::new());
            }
            match conn.session.list_prompts().await {
                Ok(prompts) => Ok(prompts),
                Err(e) if e.is_method_not_found() => Ok(Vec::new()),
                Err(e) => Err(conn.protocol_error(e)),
            }
        })
        .await
    }

    pub async fn list_resources(
        &self,
        server: Option<&str>,
    ) -> Result<Listing<ResourceDescriptor>, SessionError> {
        self.gather(server, |conn| async move {
            if conn.session.capabilities().resources.is_none() {
                return Ok(Vec::new());
            }
            match conn.session.list_resources().await {
                Ok(resources) => Ok(resources),
                Err(e) if e.is_method_not_found() => Ok(Vec::new()),
                Err(e) => Err(conn.protocol_error(e)),
            }
        })
        .await
    }

    /// Render a prompt template on a server.
    pub async fn get_prompt(
        &self,
        server: &str,
        prompt: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<GetPromptResult, SessionError> {
        let conn = self.connection(server).await?;
        if conn.session.capabilities().prompts.is_none() {
            return Ok(GetPromptResult::default());
        }
        match conn.session.get_prompt(prompt, arguments).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_method_not_found() => Ok(GetPromptResult::default()),
            Err(e) => Err(conn.protocol_error(e)),
        }
    }

    pub async fn read_resource(
        &self,
        server: &str,
        uri: &str,
    ) -> Result<Vec<ResourceContents>, SessionError> {
        let conn = self.connection(server).await?;
        if conn.session.capabilities().resources.is_none() {
            return Ok(Vec::new());
        }
        match conn.session.read_resource(uri).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.is_method_not_found() => Ok(Vec::new()),
            Err(e) => Err(conn.protocol_error(e)),
        }
    }

    // ─── Tool Calls ──────────────────────────────────────────────────────

    /// Invoke a tool on a connected server.
    ///
    /// The tool name is matched against the cached catalog (exact match
    /// first, then case-insensitive). Missing required arguments are reported
    /// without contacting the server. No retries.
    pub async fn call_tool(
        &self,
        server: &str,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, SessionError> {
        let conn = self.connection(server).await?;

        let tool = {
            let tools = conn.tools.read().await;
            tools
                .iter()
                .find(|t| t.name == tool_name)
                .or_else(|| tools.iter().find(|t| t.name.eq_ignore_ascii_case(tool_name)))
                .cloned()
                .ok_or_else(|| SessionError::ToolNotFound {
                    server: server.to_string(),
                    tool: tool_name.to_string(),
                    available: tools.iter().map(|t| t.name.clone()).collect(),
                })?
        };

        let arguments = match arguments {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            serde_json::Value::Object(map) => serde_json::Value::Object(map),
            _ => {
                return Err(SessionError::InvalidArguments {
                    server: server.to_string(),
                    tool: tool.name,
                })
            }
        };

        let missing: Vec<String> = tool
            .required_properties()
            .into_iter()
            .filter(|key| arguments.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::MissingArguments {
                server: server.to_string(),
                tool: tool.name,
                missing,
            });
        }

        tracing::info!(server, tool = %tool.name, "calling tool");
        let start = Instant::now();

        let result =
            tokio::time::timeout(self.call_timeout, conn.session.call_tool(&tool.name, arguments))
                .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let execution_error = |reason: String| {
            tracing::warn!(server, tool = %tool.name, elapsed_ms, reason = %reason, "tool call failed");
            SessionError::ToolExecution {
                server: server.to_string(),
                tool: tool.name.clone(),
                reason,
            }
        };

        match result {
            Err(_) => Err(execution_error(format!(
                "timed out after {}s",
                self.call_timeout.as_secs_f64()
            ))),
            Ok(Err(e)) => Err(execution_error(e.to_string())),
            Ok(Ok(output)) if output.is_error => Err(execution_error(output.text_content())),
            Ok(Ok(output)) => {
                tracing::info!(server, tool = %tool.name, elapsed_ms, "tool call succeeded");
                Ok(output)
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Look up an active connection, distinguishing unknown from disconnected.
    async fn connection(&self, name: &str) -> Result<Arc<ServerConnection>, SessionError> {
        if let Some(conn) = self.active.read().await.get(name) {
            return Ok(Arc::clone(conn));
        }
        if self.registry.contains(name) {
            Err(SessionError::NotConnected {
                server: name.to_string(),
            })
        } else {
            Err(SessionError::UnknownServer {
                server: name.to_string(),
            })
        }
    }

    async fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.name_locks.lock().await;
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Run `op` against one named server, or against every active
    /// connection concurrently with per-server failures collected.
    async fn gather<T, F, Fut>(
        &self,
        server: Option<&str>,
        op: F,
    ) -> Result<Listing<T>, SessionError>
    where
        F: Fn(Arc<ServerConnection>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, SessionError>>,
    {
        let tag = |server: &str, items: Vec<T>| {
            items
                .into_iter()
                .map(|item| ServerItem {
                    server: server.to_string(),
                    item,
                })
                .collect::<Vec<_>>()
        };

        if let Some(name) = server {
            let conn = self.connection(name).await?;
            let items = op(conn).await?;
            return Ok(Listing {
                items: tag(name, items),
                failures: Vec::new(),
            });
        }

        let mut connections: Vec<Arc<ServerConnection>> =
            self.active.read().await.values().cloned().collect();
        connections.sort_by(|a, b| a.name.cmp(&b.name));

        let results = futures::future::join_all(
            connections.iter().map(|conn| op(Arc::clone(conn))),
        )
        .await;

        let mut listing = Listing::default();
        for (conn, result) in connections.iter().zip(results) {
            match result {
                Ok(items) => listing.items.extend(tag(&conn.name, items)),
                Err(e) => {
                    tracing::warn!(server = %conn.name, error = %e, "server listing failed");
                    listing.failures.push(ServerFailure {
                        server: conn.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(listing)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
