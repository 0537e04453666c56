//! mcp-relay: connects tool servers to the Anthropic Messages API.
//!
//! Modules, leaves first:
//! - `server_registry`: named launch descriptors from the JSON config
//! - `mcp_client`: stdio JSON-RPC transport and server lifecycle
//! - `schema`: tool schema → API tool definition translation
//! - `session`: live connections, tool listing and calls
//! - `inference`: Messages API client
//! - `agent_core`: prompt orchestration and tool routing
//! - `http` / `cli`: the two user-facing surfaces

pub mod agent_core;
pub mod cli;
pub mod http;
pub mod inference;
pub mod interpolate;
pub mod logging;
pub mod mcp_client;
pub mod schema;
pub mod server_registry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

pub use logging::{init_tracing, LogFormat, LogTarget};

/// Resolve the platform-standard data directory for mcp-relay.
///
/// Logs and the remembered config path live here.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("mcp-relay");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcp-relay")
}
