//! Command-line surface: REPL parsing, execution and rendering.

pub mod parser;
pub mod render;
pub mod repl;

pub use parser::{parse_command, Command, ParseError};
pub use repl::Repl;
