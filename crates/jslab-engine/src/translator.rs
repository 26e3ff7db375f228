//! Error Translator: runtime failures back in terms of submitted text.
//!
//! Stacks arrive as `Name: message` followed by frames of the form
//! `    at <fn> (<file>:<line>:<column>)`. Only the first frame with a
//! location outside the prelude matters. When it lies inside rewritten code
//! (`jsl-eval-<id>`), its position is mapped through that rewrite's source
//! map.
//!
//! The engine positions a frame at the start of the statement, call or
//! operand being evaluated. When the message names the identifier that
//! failed, the mapped position is that of the identifier instead.

use jslab_eval::{Thrown, PRELUDE_FILE};
use jslab_rewrite::{SourceMap, EVAL_FILE_PREFIX};
use std::collections::VecDeque;
use tracing::debug;

/// One `at` line of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl StackFrame {
    /// Parse `    at fn (file:line:column)`, or `    at file:line:column`
    /// for a frame with no function (parse errors).
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix("at ")?;
        let (function, location) = match rest.find(" (") {
            Some(open) => (rest[..open].to_string(), rest[open + 2..].strip_suffix(')')?),
            None => (String::new(), rest),
        };
        let (location, column) = location.rsplit_once(':')?;
        let (file, line) = location.rsplit_once(':')?;
        Some(Self {
            function,
            file: file.to_string(),
            line: line.parse().ok()?,
            column: column.parse().ok()?,
        })
    }

    pub fn is_evaluated_code(&self) -> bool {
        self.file.starts_with(EVAL_FILE_PREFIX)
    }
}

/// First located frame of a stack string. Native frames and the prelude's
/// are skipped.
pub fn first_frame(stack: &str) -> Option<StackFrame> {
    stack
        .lines()
        .skip(1)
        .filter_map(StackFrame::parse)
        .find(|f| f.file != PRELUDE_FILE)
}

/// Identifier a runtime error message names as the failing one.
pub fn failing_name(thrown: &Thrown) -> Option<&str> {
    let message = thrown.message.as_str();
    let name = match thrown.name.as_deref()? {
        "ReferenceError" => message
            .strip_suffix(" is not defined")
            .or_else(|| message.strip_suffix(" is not initialized"))
            .map(|name| name.trim_matches('\'')),
        "TypeError" => {
            let rest = message
                .strip_prefix("cannot read property '")
                .or_else(|| message.strip_prefix("cannot set property '"))?;
            rest.split_once('\'').map(|(name, _)| name)
        }
        _ => None,
    };
    name.filter(|name| !name.is_empty())
}

struct Registered {
    file: String,
    map: SourceMap,
}

/// Recently used source maps plus the rendering rules for errors.
pub struct ErrorTranslator {
    maps: VecDeque<Registered>,
    retention: usize,
    show_stack: bool,
}

impl ErrorTranslator {
    pub fn new(retention: usize, show_stack: bool) -> Self {
        Self {
            maps: VecDeque::new(),
            retention: retention.max(1),
            show_stack,
        }
    }

    pub fn set_show_stack(&mut self, show: bool) {
        self.show_stack = show;
    }

    /// Keep `map` for code running under `file`; the oldest map is dropped
    /// once the registry is full.
    pub fn register(&mut self, file: &str, map: SourceMap) {
        self.maps.retain(|r| r.file != file);
        self.maps.push_back(Registered {
            file: file.to_string(),
            map,
        });
        while self.maps.len() > self.retention {
            self.maps.pop_front();
        }
    }

    pub fn map_for(&self, file: &str) -> Option<&SourceMap> {
        self.maps.iter().find(|r| r.file == file).map(|r| &r.map)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Render a thrown value for the user.
    pub fn translate(&self, thrown: &Thrown) -> String {
        let header = thrown.summary();
        let Some(stack) = thrown.stack.as_deref().filter(|_| thrown.name.is_some()) else {
            return header;
        };
        let mut message = header;
        if let Some(frame) = first_frame(stack) {
            message.push_str(&self.location(&frame, failing_name(thrown)));
        }
        if self.show_stack {
            message.push('\n');
            message.push_str(stack);
        }
        message
    }

    fn location(&self, frame: &StackFrame, name: Option<&str>) -> String {
        if frame.is_evaluated_code() {
            if let Some(map) = self.map_for(&frame.file) {
                let original = name
                    .and_then(|n| map.name_position_after(frame.line, frame.column, n))
                    .or_else(|| map.original_position_for(frame.line, frame.column));
                if let Some(original) = original {
                    return format!(
                        "\n    at ({}) line: {}, column: {}",
                        map.source, original.line, original.column
                    );
                }
            }
            debug!(file = %frame.file, "no source map for frame");
        }
        let function = if frame.function.is_empty() {
            String::new()
        } else {
            format!("{} ", frame.function)
        };
        format!(
            "\n    at {function}({}) line: {}, column: {}",
            frame.file, frame.line, frame.column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jslab_types::Position;

    fn thrown(stack: &str) -> Thrown {
        Thrown {
            name: Some("TypeError".into()),
            message: "bad".into(),
            stack: Some(stack.into()),
            display: "TypeError: bad".into(),
        }
    }

    fn error(name: &str, message: &str, stack: &str) -> Thrown {
        Thrown {
            name: Some(name.into()),
            message: message.into(),
            stack: Some(format!("{name}: {message}\n{stack}")),
            display: format!("{name}: {message}"),
        }
    }

    fn map(file: &str) -> SourceMap {
        let mut map = SourceMap::new(file, "console");
        map.add_mapping(Position::new(2, 3), Position::new(1, 1));
        map.add_mapping(Position::new(3, 3), Position::new(2, 1));
        map
    }

    #[test]
    fn parses_frames() {
        let frame = StackFrame::parse("    at compute (lib/util.js:12:7)").unwrap();
        assert_eq!(frame.function, "compute");
        assert_eq!(frame.file, "lib/util.js");
        assert_eq!((frame.line, frame.column), (12, 7));
        assert!(!frame.is_evaluated_code());
        assert!(StackFrame::parse("TypeError: bad").is_none());

        let bare = StackFrame::parse("    at lib/broken.js:3:9").unwrap();
        assert_eq!(bare.function, "");
        assert_eq!((bare.file.as_str(), bare.line, bare.column), ("lib/broken.js", 3, 9));
    }

    #[test]
    fn evaluated_frames_are_mapped() {
        let mut translator = ErrorTranslator::new(4, false);
        translator.register("jsl-eval-abc", map("jsl-eval-abc"));
        let message = translator.translate(&thrown(
            "TypeError: bad\n    at <anonymous> (jsl-eval-abc:3:10)\n    at <anonymous> (jsl-eval-abc:1:1)",
        ));
        assert_eq!(message, "TypeError: bad\n    at (console) line: 2, column: 1");
    }

    #[test]
    fn native_and_prelude_frames_are_skipped() {
        let stack = format!(
            "TypeError: bad\n    at push (native)\n    at then ({PRELUDE_FILE}:40:12)\n    at helper (/lib/m.js:4:2)"
        );
        let frame = first_frame(&stack).unwrap();
        assert_eq!(frame.file, "/lib/m.js");
        assert!(first_frame("TypeError: bad\n    at push (native)").is_none());
    }

    #[test]
    fn failing_names_come_from_messages() {
        let reference = error("ReferenceError", "nope is not defined", "");
        assert_eq!(failing_name(&reference), Some("nope"));
        let property = error("TypeError", "cannot read property 'x' of null", "");
        assert_eq!(failing_name(&property), Some("x"));
        let other = error("TypeError", "not a function", "");
        assert_eq!(failing_name(&other), None);
        let range = error("RangeError", "invalid array length", "");
        assert_eq!(failing_name(&range), None);
    }

    #[test]
    fn named_failures_map_to_the_identifier() {
        let mut map = SourceMap::new("jsl-eval-n", "console");
        map.add_mapping(Position::new(2, 3), Position::new(1, 1));
        map.add_named_mapping(Position::new(2, 12), Position::new(1, 5), "nope");
        let mut translator = ErrorTranslator::new(4, false);
        translator.register("jsl-eval-n", map);

        let named = error("ReferenceError", "nope is not defined", "    at <anonymous> (jsl-eval-n:2:3)");
        assert_eq!(
            translator.translate(&named),
            "ReferenceError: nope is not defined\n    at (console) line: 1, column: 5"
        );
        let unnamed = error("ReferenceError", "other is not defined", "    at <anonymous> (jsl-eval-n:2:3)");
        assert_eq!(
            translator.translate(&unnamed),
            "ReferenceError: other is not defined\n    at (console) line: 1, column: 1"
        );
    }

    #[test]
    fn library_frames_pass_through() {
        let translator = ErrorTranslator::new(4, false);
        let message = translator.translate(&thrown("TypeError: bad\n    at helper (/lib/m.js:4:2)"));
        assert_eq!(message, "TypeError: bad\n    at helper (/lib/m.js) line: 4, column: 2");
    }

    #[test]
    fn show_stack_appends_raw_stack() {
        let translator = ErrorTranslator::new(4, true);
        let stack = "TypeError: bad\n    at helper (/lib/m.js:4:2)";
        let message = translator.translate(&thrown(stack));
        assert!(message.ends_with(&format!("\n{stack}")));
    }

    #[test]
    fn non_errors_render_as_uncaught() {
        let translator = ErrorTranslator::new(4, true);
        let value = Thrown {
            name: None,
            message: "42".into(),
            stack: None,
            display: "42".into(),
        };
        assert_eq!(translator.translate(&value), "Uncaught 42");
    }

    #[test]
    fn retention_drops_oldest_maps() {
        let mut translator = ErrorTranslator::new(2, false);
        translator.register("jsl-eval-1", map("jsl-eval-1"));
        translator.register("jsl-eval-2", map("jsl-eval-2"));
        translator.register("jsl-eval-3", map("jsl-eval-3"));
        assert_eq!(translator.len(), 2);
        assert!(translator.map_for("jsl-eval-1").is_none());
        assert!(translator.map_for("jsl-eval-3").is_some());
    }
}
