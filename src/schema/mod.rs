//! Schema Translator: tool-server tool schemas to model API tool definitions.

pub mod errors;
pub mod translator;

pub use errors::SchemaError;
pub use translator::{is_valid_tool_name, translate, translate_as};
