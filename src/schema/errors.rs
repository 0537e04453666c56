//! Schema translation error types.

use thiserror::Error;

/// A tool descriptor that cannot be expressed as an API tool definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tool '{tool}': {reason}")]
pub struct SchemaError {
    pub tool: String,
    pub reason: String,
}

impl SchemaError {
    pub(crate) fn new(tool: &str, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}
