use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors reported before fail-fast.
pub const MAX_ERRORS: usize = 20;

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Policy,
    Module,
}

/// Numeric error code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_DELIMITER: Self = Self(101);
    pub const UNTERMINATED_STRING: Self = Self(102);
    pub const INVALID_NUMBER: Self = Self(103);
    pub const INVALID_ESCAPE: Self = Self(104);
    pub const UNEXPECTED_CHARACTER: Self = Self(105);
    pub const INVALID_ASSIGNMENT_TARGET: Self = Self(106);
    pub const UNSUPPORTED_SYNTAX: Self = Self(107);

    // ── Policy errors (E200–E299) ──
    pub const FORBIDDEN_NAME: Self = Self(200);
    pub const RESERVED_PREFIX: Self = Self(201);

    // ── Module / script errors (E400–E499) ──
    pub const SCRIPT_NOT_FOUND: Self = Self(400);
    pub const SCRIPT_UNREADABLE: Self = Self(401);
    pub const LINE_RANGE_OUT_OF_BOUNDS: Self = Self(402);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Policy,
            400..=499 => ErrorCategory::Module,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Policy => write!(f, "policy"),
            Self::Module => write!(f, "module"),
        }
    }
}

/// A structured diagnostic produced before any code runs.
///
/// The console renders these directly; positions always refer to the text
/// the user submitted, never to rewritten code.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{span}: {code} [{category}] {message}")]
pub struct JslabError {
    /// Source file name (or the console's pseudo file name).
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    /// Derived from `code`.
    pub category: ErrorCategory,
    /// Human-readable error message.
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The exact source line for context.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl JslabError {
    /// Create a new error.
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Render as the console shows it: message plus location.
    pub fn render(&self) -> String {
        let kind = match self.category {
            ErrorCategory::Syntax => "SyntaxError",
            ErrorCategory::Policy => "PolicyError",
            ErrorCategory::Module => "ScriptError",
        };
        format!(
            "{kind}: {} (line: {}, column: {})",
            self.message, self.span.start_line, self.span.start_col
        )
    }
}

/// Collected diagnostics of one front-end pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<JslabError>,
    pub warnings: Vec<JslabError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    /// Create an empty result (no errors).
    pub fn empty() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            total_errors: 0,
            total_warnings: 0,
        }
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the MAX_ERRORS limit.
    pub fn push_error(&mut self, error: JslabError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Add a warning.
    pub fn push_warning(&mut self, warning: JslabError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// The first recorded error, if any.
    pub fn first(&self) -> Option<&JslabError> {
        self.errors.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_category() {
        assert_eq!(
            ErrorCode::UNEXPECTED_TOKEN.category(),
            ErrorCategory::Syntax
        );
        assert_eq!(ErrorCode::FORBIDDEN_NAME.category(), ErrorCategory::Policy);
        assert_eq!(
            ErrorCode::LINE_RANGE_OUT_OF_BOUNDS.category(),
            ErrorCategory::Module
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::FORBIDDEN_NAME), "E200");
        assert_eq!(format!("{}", ErrorCode::UNEXPECTED_TOKEN), "E100");
    }

    #[test]
    fn test_render_uses_category_prefix() {
        let err = JslabError::new(
            "console",
            ErrorCode::FORBIDDEN_NAME,
            "Variable name 'config' is reserved",
            Span::new(1, 5, 1, 11),
            "var config = 1",
        );
        assert_eq!(
            err.render(),
            "PolicyError: Variable name 'config' is reserved (line: 1, column: 5)"
        );
    }

    #[test]
    fn test_error_json_serialization() {
        let err = JslabError::new(
            "console",
            ErrorCode::UNEXPECTED_TOKEN,
            "expected ')', got ';'",
            Span::new(2, 7, 2, 8),
            "f(1;",
        )
        .with_suggestion("close the call");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":100"));
        assert!(json.contains("\"category\":\"syntax\""));
        assert!(json.contains("\"start_line\":2"));
        assert!(json.contains("\"suggestion\""));

        let back: JslabError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, err.code);
        assert_eq!(back.span, err.span);
    }

    #[test]
    fn test_compile_errors_max_limit() {
        let mut errs = CompileErrors::empty();
        for i in 0..25 {
            errs.push_error(JslabError::new(
                "console",
                ErrorCode::UNEXPECTED_TOKEN,
                format!("Error {i}"),
                Span::point(i as u32 + 1, 1),
                "",
            ));
        }
        assert_eq!(errs.errors.len(), 20);
        assert_eq!(errs.total_errors, 25);
        assert!(errs.has_errors());
        assert_eq!(errs.first().map(|e| e.message.as_str()), Some("Error 0"));
    }
}
