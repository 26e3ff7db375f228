//! Source rewriter for console submissions.
//!
//! Turns the raw text of one submission into code that runs against the
//! persistent execution context:
//!
//! 1. parse (a bare `{...}` is first tried as an object literal),
//! 2. reject bindings of protected names,
//! 3. rewrite top-level declarations and imports onto the context,
//! 4. return the last expression and wrap everything in an async IIFE,
//! 5. print the result together with a v3 source map.
//!
//! Nothing is executed here; failures are reported with positions in the
//! submitted text.

pub mod checker;
pub mod error;
pub mod printer;
pub mod rewriter;
pub mod source_map;

use std::collections::HashSet;

use jslab_parser::parse_source;
use jslab_types::ast::Program;
use jslab_types::{ErrorCode, JslabError, SourceFile, Span};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

pub use checker::{check_program, RESERVED_PREFIX};
pub use error::{DeclKind, RewriteError};
pub use printer::{print_program, Printer};
pub use rewriter::Rewriter;
pub use source_map::{Mapping, SourceMap};

/// Source name used for text typed into the command window.
pub const CONSOLE_SOURCE: &str = "console";

/// Prefix of the pseudo file name under which rewritten code runs.
pub const EVAL_FILE_PREFIX: &str = "jsl-eval-";

/// Hex digits of the digest kept in an eval id.
const EVAL_ID_LEN: usize = 12;

/// Names protected by default.
pub const DEFAULT_FORBIDDEN: &[&str] = &["jsl", "config", "language", "app_path", "packed"];

/// Rewriter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteOptions {
    pub forbidden_names: Vec<String>,
    /// Dotted path of the context object in rewritten code.
    pub context_path: String,
    /// Log submitted text at debug level.
    pub log_pre_transformed: bool,
    /// Log rewritten text and its map at debug level.
    pub log_transformed: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            forbidden_names: DEFAULT_FORBIDDEN.iter().map(|s| s.to_string()).collect(),
            context_path: "jsl.context".into(),
            log_pre_transformed: false,
            log_transformed: false,
        }
    }
}

/// Output of a successful rewrite.
#[derive(Debug, Clone)]
pub struct RewriteResult {
    pub code: String,
    pub map: SourceMap,
    /// Top-level names the submission binds on the context, in order.
    pub names: Vec<String>,
    /// Short digest identifying this rewrite.
    pub eval_id: String,
    /// Pseudo file name the code runs under (`jsl-eval-<eval_id>`).
    pub file: String,
}

/// The parser/printer boundary.
pub trait SourceRewriter {
    /// Rewrite `source`, attributing positions to `source_name`.
    fn rewrite_named(&self, source: &str, source_name: &str)
        -> Result<RewriteResult, RewriteError>;

    /// Rewrite text typed into the command window.
    fn rewrite(&self, source: &str) -> Result<RewriteResult, RewriteError> {
        self.rewrite_named(source, CONSOLE_SOURCE)
    }
}

/// The shipped rewriter.
#[derive(Debug, Clone)]
pub struct ScriptRewriter {
    options: RewriteOptions,
    forbidden: HashSet<String>,
}

impl ScriptRewriter {
    pub fn new(options: RewriteOptions) -> Self {
        let forbidden = options.forbidden_names.iter().cloned().collect();
        Self { options, forbidden }
    }

    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    /// Protect additional names, e.g. the host's library catalogue.
    pub fn forbid<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden.extend(names.into_iter().map(Into::into));
    }

    pub fn is_forbidden(&self, name: &str) -> bool {
        self.forbidden.contains(name)
    }
}

impl Default for ScriptRewriter {
    fn default() -> Self {
        Self::new(RewriteOptions::default())
    }
}

impl SourceRewriter for ScriptRewriter {
    #[instrument(level = "debug", skip(self, source))]
    fn rewrite_named(
        &self,
        source: &str,
        source_name: &str,
    ) -> Result<RewriteResult, RewriteError> {
        if self.options.log_pre_transformed {
            debug!(%source, "pre-transformed code");
        }
        let original = SourceFile::new(source_name, source);
        let (program, shift) = parse_submission(&original)?;
        check_program(&program, &self.forbidden, &original, shift)?;

        let mut rewriter = Rewriter::new(&self.options.context_path);
        let program = rewriter.rewrite_program(program);
        let names = rewriter.into_names();

        let mut map = SourceMap::new("", source_name);
        map.source_content = Some(source.to_string());
        let mut printer = Printer::new(map).with_line_one_shift(shift);
        printer.program(&program);
        let (code, mut map) = printer.finish();

        let eval_id = eval_id(source_name, source, &code);
        let file = format!("{EVAL_FILE_PREFIX}{eval_id}");
        map.file = file.clone();

        debug!(?names, mappings = map.mappings().len(), %file, "rewrote submission");
        if self.options.log_transformed {
            debug!(%code, map = %map.to_json(), "transformed code");
        }
        Ok(RewriteResult {
            code,
            map,
            names,
            eval_id,
            file,
        })
    }
}

/// Rewrite with default options.
pub fn rewrite(source: &str) -> Result<RewriteResult, RewriteError> {
    ScriptRewriter::default().rewrite(source)
}

/// Short SHA-256 digest of a rewrite and its origin.
pub fn eval_id(source_name: &str, source: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(code.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..EVAL_ID_LEN].to_string()
}

/// Parse a submission. Returns the program and the column shift applied to
/// line 1 (1 when the text was parenthesised as an object literal).
fn parse_submission(original: &SourceFile) -> Result<(Program, u32), RewriteError> {
    let trimmed = original.source.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        let wrapped = SourceFile::new(original.name.clone(), format!("({}\n)", original.source));
        let as_object = parse_source(&wrapped);
        if let Some(program) = as_object.program {
            return Ok((program, 1));
        }
        // Not an object literal; a block statement is the other reading.
        let as_block = parse_source(original);
        if let Some(program) = as_block.program {
            return Ok((program, 0));
        }
        return Err(syntax_error(as_object.errors.first(), original, 1));
    }
    let result = parse_source(original);
    match result.program {
        Some(program) => Ok((program, 0)),
        None => Err(syntax_error(result.errors.first(), original, 0)),
    }
}

fn syntax_error(first: Option<&JslabError>, original: &SourceFile, shift: u32) -> RewriteError {
    let mut error = match first {
        Some(e) => e.clone(),
        None => JslabError::new(
            original.name.clone(),
            ErrorCode::UNEXPECTED_TOKEN,
            "invalid syntax",
            Span::point(1, 1),
            "",
        ),
    };
    error.span = error.span.unshift_line(1, shift);
    error.file = original.name.clone();
    error.source_line = original
        .line(error.span.start_line)
        .unwrap_or_default()
        .to_string();
    RewriteError::Syntax(error)
}
