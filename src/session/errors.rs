//! Session manager error types.

use thiserror::Error;

/// Errors returned by session manager operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The name is not in the server registry.
    #[error("unknown server '{server}'")]
    UnknownServer { server: String },

    /// Spawning or initializing the server failed.
    #[error("failed to connect to server '{server}': {reason}")]
    Connection { server: String, reason: String },

    /// The server is configured but has no active connection.
    #[error("server '{server}' is not connected")]
    NotConnected { server: String },

    /// The server does not offer the requested tool.
    #[error("tool '{tool}' not found on server '{server}' (available: {})", available.join(", "))]
    ToolNotFound {
        server: String,
        tool: String,
        available: Vec<String>,
    },

    /// Required arguments are absent from the call.
    #[error("tool '{tool}' is missing required arguments: {}", missing.join(", "))]
    MissingArguments {
        server: String,
        tool: String,
        missing: Vec<String>,
    },

    /// Arguments were supplied but are not a JSON object.
    #[error("tool '{tool}' arguments must be a JSON object")]
    InvalidArguments { server: String, tool: String },

    /// The call reached the server but did not produce a usable result.
    #[error("tool '{tool}' on server '{server}' failed: {reason}")]
    ToolExecution {
        server: String,
        tool: String,
        reason: String,
    },

    /// A non-call protocol request failed.
    #[error("protocol error from server '{server}': {reason}")]
    Protocol { server: String, reason: String },
}

impl SessionError {
    /// Stable machine-readable tag for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::UnknownServer { .. } => "unknown_server",
            SessionError::Connection { .. } => "connection_error",
            SessionError::NotConnected { .. } => "not_connected",
            SessionError::ToolNotFound { .. } => "tool_not_found",
            SessionError::MissingArguments { .. } => "missing_arguments",
            SessionError::InvalidArguments { .. } => "invalid_arguments",
            SessionError::ToolExecution { .. } => "tool_execution_error",
            SessionError::Protocol { .. } => "protocol_error",
        }
    }
}
