//! JSLab parser: converts a token stream into an AST.

mod parse_decl;
mod parse_expr;
mod parse_pattern;
mod parse_stmt;
mod parser;

pub use parser::{parse_source, ParseResult, Parser};
