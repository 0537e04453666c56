//! Session Manager: live connections to the configured tool servers.
//!
//! The manager is the only owner of server connections. Everything else
//! (orchestrator, HTTP routes, REPL) addresses servers by name through it.

pub mod errors;
pub mod manager;
pub mod types;

pub use errors::SessionError;
pub use manager::{ServerConnection, SessionManager, DEFAULT_CALL_TIMEOUT};
pub use types::{
    ConnectAllReport, ConnectOutcome, Listing, ServerFailure, ServerItem, ServerStatus,
};
