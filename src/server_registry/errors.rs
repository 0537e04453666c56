//! Server configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the server configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is missing or unreadable.
    #[error("failed to read server config {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    /// The file is not a valid configuration document.
    #[error("failed to parse server config {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// An enabled server entry has no launch command.
    #[error("server '{server}' has no command")]
    MissingCommand { server: String },
}
