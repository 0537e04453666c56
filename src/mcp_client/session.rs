//! Protocol session seam.
//!
//! `ServerSession` is one initialized connection to a tool server;
//! `Connector` turns a `ServerDescriptor` into a live session. The session
//! manager only ever sees these traits, so the stdio implementation in
//! `lifecycle` can be swapped for in-memory fakes in tests.
//! `ServerRequestHandler` covers the other direction: requests a server
//! sends to the client.

use async_trait::async_trait;

use crate::server_registry::ServerDescriptor;

use super::errors::McpError;
use super::types::{
    GetPromptResult, JsonRpcError, PromptDescriptor, ResourceContents, ResourceDescriptor,
    ServerCapabilities, ServerInfo, ToolCallOutput, ToolDescriptor,
};

/// An initialized protocol session with a single tool server.
#[async_trait]
pub trait ServerSession: Send + Sync {
    /// Capabilities negotiated during `initialize`.
    fn capabilities(&self) -> &ServerCapabilities;

    /// Server-reported identity, if any.
    fn server_info(&self) -> Option<&ServerInfo>;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, McpError>;

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, McpError>;

    async fn get_prompt(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<GetPromptResult, McpError>;

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, McpError>;

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, McpError>;

    /// Release the transport. Must be idempotent.
    async fn close(&self);
}

/// Launches a server and performs the initialize handshake.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<Box<dyn ServerSession>, McpError>;
}

/// Answers requests a server sends to the client, such as
/// `sampling/createMessage`.
#[async_trait]
pub trait ServerRequestHandler: Send + Sync {
    async fn handle(
        &self,
        server: &str,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError>;
}
