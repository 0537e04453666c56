//! MCP Client error types.

use thiserror::Error;

/// Errors raised while talking to a tool server over its stdio transport.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },

    /// The initialization handshake failed.
    #[error("server '{name}' initialization failed: {reason}")]
    InitFailed { name: String, reason: String },

    /// JSON-RPC communication error (malformed message, I/O error, closed pipe).
    #[error("transport error for server '{server}': {reason}")]
    TransportError { server: String, reason: String },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A result payload did not match the expected protocol shape.
    #[error("unexpected '{method}' result from server '{server}': {reason}")]
    InvalidResult {
        server: String,
        method: String,
        reason: String,
    },

    /// A request did not complete in time.
    #[error("'{method}' on server '{server}' timed out after {timeout_ms}ms")]
    Timeout {
        server: String,
        method: String,
        timeout_ms: u64,
    },
}

impl McpError {
    /// Whether the server rejected the method as unsupported.
    ///
    /// Capability negotiation is advisory, so callers treat this as
    /// "feature absent" for optional methods like `prompts/list`.
    pub fn is_method_not_found(&self) -> bool {
        matches!(
            self,
            McpError::ServerError { code, .. }
                if *code == super::types::error_codes::METHOD_NOT_FOUND
        )
    }
}
