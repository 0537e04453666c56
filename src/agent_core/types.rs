//! Shared types across the agent core.

use serde::Serialize;

use crate::mcp_client::types::ToolCallOutput;

/// What happened to one tool call the model requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolCallOutcome {
    Success { result: ToolCallOutput },
    Error { kind: String, message: String },
}

/// One model-issued tool call and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    /// The model's `tool_use` id.
    pub id: String,
    /// The name the model used (possibly server-qualified).
    pub name: String,
    /// The server the call was routed to, if routing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub input: serde_json::Value,
    pub outcome: ToolCallOutcome,
}

impl ToolCallRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolCallOutcome::Success { .. })
    }

    pub fn error_kind(&self) -> Option<&str> {
        match &self.outcome {
            ToolCallOutcome::Error { kind, .. } => Some(kind),
            ToolCallOutcome::Success { .. } => None,
        }
    }
}

/// Everything a prompt produced.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorResult {
    /// The model response id.
    pub id: String,
    pub model: String,
    /// Text blocks joined by newlines.
    pub text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Non-fatal problems: skipped servers and tools.
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}
