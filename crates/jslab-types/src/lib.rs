//! Shared types for the JSLab evaluation engine.
//!
//! This crate defines the AST node types, source spans, error types,
//! and other shared data structures used by every pipeline stage.

mod error;
mod span;
pub mod ast;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, JslabError, Severity, MAX_ERRORS};
pub use span::{Position, SourceFile, Span};

/// Result type used throughout the JSLab front end.
pub type Result<T> = std::result::Result<T, JslabError>;
