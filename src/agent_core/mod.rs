//! Agent Core: prompt orchestration for mcp-relay.
//!
//! Submodules:
//! - `orchestrator`: One prompt, one model round-trip, tool calls dispatched
//! - `routing`: Exposed tool name → owning server, with collision handling
//! - `sampling`: Answers `sampling/createMessage` from tool servers
//! - `types`: Tool call records and prompt results
//! - `errors`: Orchestrator error types

pub mod errors;
pub mod orchestrator;
pub mod routing;
pub mod sampling;
pub mod types;

// Re-exports for convenience
pub use errors::OrchestratorError;
pub use orchestrator::{OrchestratorSettings, PromptOrchestrator};
pub use routing::{NameClash, RoutingError, RoutingTable};
pub use sampling::SamplingHandler;
pub use types::{OrchestratorResult, ToolCallOutcome, ToolCallRecord};
