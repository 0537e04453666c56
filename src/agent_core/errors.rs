//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that abort a whole prompt.
///
/// Everything scoped to a single tool call is reported on that call's
/// record instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The model request failed: connection, timeout, non-2xx or bad body.
    #[error("model API error: {message}")]
    ModelApi { message: String },
}

impl From<InferenceError> for OrchestratorError {
    fn from(e: InferenceError) -> Self {
        let message = match e.api_message() {
            Some(api) => format!("{e} ({api})"),
            None => e.to_string(),
        };
        OrchestratorError::ModelApi { message }
    }
}
