//! MCP Client: JSON-RPC over stdio transport for tool servers.
//!
//! This module handles:
//! - Spawning tool server child processes and capturing their stderr
//! - JSON-RPC 2.0 communication over process stdio
//! - The `initialize` handshake and typed protocol results
//! - Graceful shutdown with a force-kill fallback
//!
//! The session manager consumes it through the `ServerSession` and
//! `Connector` traits.

pub mod errors;
pub mod lifecycle;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use errors::McpError;
pub use lifecycle::{StdioConnector, StdioSession};
pub use session::{Connector, ServerRequestHandler, ServerSession};
pub use types::{
    Content, JsonRpcError, GetPromptResult, PromptDescriptor, ResourceContents, ResourceDescriptor,
    ServerCapabilities, ToolCallOutput, ToolDescriptor,
};
