use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based line/column location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Region of a submission, 1-based at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        let (start_line, start_col) =
            (self.start_line, self.start_col).min((other.start_line, other.start_col));
        let (end_line, end_col) = (self.end_line, self.end_col).max((other.end_line, other.end_col));
        Span::new(start_line, start_col, end_line, end_col)
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_col)
    }

    /// Shift columns on `line` left by `delta`, clamping at column 1.
    ///
    /// Undoes text inserted in front of the submission before parsing (the
    /// parenthesised object-literal reading).
    pub fn unshift_line(self, line: u32, delta: u32) -> Span {
        let fix = |l: u32, c: u32| if l == line { c.saturating_sub(delta).max(1) } else { c };
        Span::new(
            self.start_line,
            fix(self.start_line, self.start_col),
            self.end_line,
            fix(self.end_line, self.end_col),
        )
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A named submission or script, with its lines indexed for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    /// Byte ranges of each line, without the terminator.
    lines: Vec<(usize, usize)>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut lines = Vec::new();
        let mut start = 0;
        for (i, _) in source.match_indices('\n') {
            lines.push((start, i));
            start = i + 1;
        }
        lines.push((start, source.len()));
        Self {
            name: name.into(),
            source,
            lines,
        }
    }

    /// Text of a 1-based line, `\r` stripped.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = usize::try_from(line_number.checked_sub(1)?).ok()?;
        let &(start, end) = self.lines.get(idx)?;
        Some(self.source[start..end].trim_end_matches('\r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_orders_by_line_then_column() {
        let a = Span::new(1, 5, 1, 10);
        assert_eq!(a.merge(Span::new(2, 3, 2, 8)), Span::new(1, 5, 2, 8));
        assert_eq!(a.merge(Span::new(1, 3, 1, 8)), Span::new(1, 3, 1, 10));
        assert_eq!(Span::new(2, 1, 2, 4).merge(Span::new(1, 9, 1, 12)), Span::new(1, 9, 2, 4));
    }

    #[test]
    fn test_unshift_only_touches_given_line() {
        let s = Span::new(1, 4, 2, 6).unshift_line(1, 1);
        assert_eq!(s, Span::new(1, 3, 2, 6));
        let clamped = Span::point(1, 1).unshift_line(1, 1);
        assert_eq!(clamped, Span::point(1, 1));
    }

    #[test]
    fn test_display_is_start() {
        let s = Span::new(3, 7, 3, 15);
        assert_eq!(s.to_string(), "3:7");
        assert_eq!(s.start(), Position::new(3, 7));
    }

    #[test]
    fn test_lines() {
        let src = SourceFile::new("test.jsl", "one\r\ntwo\n\nfour");
        assert_eq!(src.line(1), Some("one"));
        assert_eq!(src.line(2), Some("two"));
        assert_eq!(src.line(3), Some(""));
        assert_eq!(src.line(4), Some("four"));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(5), None);
        assert_eq!(SourceFile::new("empty", "").line(1), Some(""));
    }
}
