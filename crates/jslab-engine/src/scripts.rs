//! Script files: path resolution and line selection for `runScript`.

use crate::config::PathsSection;
use crate::error::EngineError;
use jslab_types::{ErrorCode, JslabError, Span};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 1-based lines of a script to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineRange {
    /// Exactly this line.
    Line(usize),
    /// Lines `start` up to but excluding `end`.
    Span(usize, usize),
}

/// What `runLast` repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRun {
    pub path: PathBuf,
    pub range: Option<LineRange>,
    pub silent: bool,
}

fn script_error(path: &Path, code: ErrorCode, message: String, line: u32) -> EngineError {
    EngineError::Script(JslabError::new(
        path.display().to_string(),
        code,
        message,
        Span::point(line, 1),
        "",
    ))
}

/// Find `path` in the current directory, the include directories, then the
/// saved paths. The first match wins.
pub fn resolve(path: &Path, paths: &PathsSection) -> Result<PathBuf, EngineError> {
    if path.is_absolute() {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(not_found(path))
        };
    }
    let mut found: Vec<PathBuf> = Vec::new();
    let roots = std::iter::once(paths.current_dir())
        .chain(paths.includes.iter().cloned())
        .chain(paths.saved.iter().cloned());
    for root in roots {
        let candidate = root.join(path);
        if candidate.is_file() && !found.contains(&candidate) {
            found.push(candidate);
        }
    }
    match found.len() {
        0 => Err(not_found(path)),
        1 => Ok(found.remove(0)),
        _ => {
            warn!(
                script = %path.display(),
                candidates = found.len(),
                chosen = %found[0].display(),
                "script name is ambiguous"
            );
            Ok(found.remove(0))
        }
    }
}

fn not_found(path: &Path) -> EngineError {
    script_error(
        path,
        ErrorCode::SCRIPT_NOT_FOUND,
        format!("script not found: {}", path.display()),
        1,
    )
}

pub fn read(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| {
        script_error(
            path,
            ErrorCode::SCRIPT_UNREADABLE,
            format!("cannot read {}: {e}", path.display()),
            1,
        )
    })
}

/// The selected lines of `text`, or all of it without a range.
pub fn select_lines(text: &str, range: Option<LineRange>, path: &Path) -> Result<String, EngineError> {
    let Some(range) = range else {
        return Ok(text.to_string());
    };
    let lines: Vec<&str> = text.lines().collect();
    let (start, end) = match range {
        LineRange::Line(n) => (n, n + 1),
        LineRange::Span(start, end) => (start, end),
    };
    if start == 0 || end <= start || end > lines.len() + 1 {
        return Err(script_error(
            path,
            ErrorCode::LINE_RANGE_OUT_OF_BOUNDS,
            "line range out of bounds".into(),
            u32::try_from(start.max(1)).unwrap_or(u32::MAX),
        ));
    }
    debug!(start, end, "selected script lines");
    Ok(lines[start - 1..end - 1].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TEXT: &str = "a = 1\nb = 2\nc = 3\n";

    #[test]
    fn whole_text_without_range() {
        assert_eq!(select_lines(TEXT, None, Path::new("s.js")).unwrap(), TEXT);
    }

    #[test]
    fn half_open_ranges() {
        let path = Path::new("s.js");
        assert_eq!(select_lines(TEXT, Some(LineRange::Span(1, 3)), path).unwrap(), "a = 1\nb = 2");
        assert_eq!(select_lines(TEXT, Some(LineRange::Span(3, 4)), path).unwrap(), "c = 3");
        assert_eq!(select_lines(TEXT, Some(LineRange::Line(2)), path).unwrap(), "b = 2");
    }

    #[test]
    fn out_of_bounds_ranges() {
        let path = Path::new("s.js");
        for range in [
            LineRange::Line(0),
            LineRange::Line(4),
            LineRange::Span(2, 2),
            LineRange::Span(1, 5),
        ] {
            let err = select_lines(TEXT, Some(range), path).unwrap_err();
            assert_eq!(err.to_string(), "line range out of bounds");
            match err {
                EngineError::Script(e) => assert_eq!(e.code, ErrorCode::LINE_RANGE_OUT_OF_BOUNDS),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn resolves_against_current_then_includes() {
        let current = tempfile::tempdir().unwrap();
        let include = tempfile::tempdir().unwrap();
        fs::write(include.path().join("lib.js"), "1").unwrap();
        fs::write(include.path().join("both.js"), "include").unwrap();
        fs::write(current.path().join("both.js"), "current").unwrap();
        let paths = PathsSection {
            current: Some(current.path().to_path_buf()),
            includes: vec![include.path().to_path_buf()],
            saved: Vec::new(),
        };
        assert_eq!(
            resolve(Path::new("lib.js"), &paths).unwrap(),
            include.path().join("lib.js")
        );
        assert_eq!(
            resolve(Path::new("both.js"), &paths).unwrap(),
            current.path().join("both.js")
        );
        let missing = resolve(Path::new("nope.js"), &paths).unwrap_err();
        assert!(missing.to_string().starts_with("script not found"));
    }

    #[test]
    fn line_range_deserializes_from_number_or_pair() {
        let line: LineRange = serde_json::from_str("3").unwrap();
        assert_eq!(line, LineRange::Line(3));
        let span: LineRange = serde_json::from_str("[2, 5]").unwrap();
        assert_eq!(span, LineRange::Span(2, 5));
    }
}
