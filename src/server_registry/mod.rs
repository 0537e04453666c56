//! Server Registry: named launch descriptors for tool servers.

pub mod config;
pub mod errors;
pub mod path_cache;

pub use config::{ServerDescriptor, ServerRegistry};
pub use errors::ConfigError;
