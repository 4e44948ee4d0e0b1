//! # Diagnet Frontend
//!
//! Knowledge feed grammar, ingestion reports, and canonical rendering for the
//! diagnet diagnosis engine.

pub mod ast;
pub mod errors;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use ast::*;
pub use errors::{FrontendError, LineDefect, SourcePosition};
pub use parser::{parse_knowledge, parse_knowledge_line};
pub use render::{render_entry, render_knowledge};
