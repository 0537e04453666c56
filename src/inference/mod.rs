//! Inference Client: Anthropic Messages API boundary.
//!
//! This module handles all communication with the hosted model:
//! - Request/response types for `POST /v1/messages`
//! - Model configuration loading (YAML file, environment, defaults)
//! - The `ModelApi` trait the orchestrator depends on
//!
//! Swapping the model is a config change, not a code change.

pub mod client;
pub mod config;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{MessagesClient, ModelApi};
pub use config::{load_model_config, ModelConfig};
pub use errors::InferenceError;
pub use types::{
    ContentBlock, InputSchema, MessageParam, MessagesRequest, MessagesResponse, Role,
    ToolDefinition,
};
