//! Console rendering of values.
//!
//! Output follows the familiar inspector layout: `[ 1, 2 ]`, `{ a: 1 }`,
//! `[Function: f]`, `Promise { <pending> }`. Nesting beyond `max_depth`
//! collapses to `[Object]`/`[Array]`; cycles print `[Circular]`.
//!
//! Rendering may run script code (getters, `toString`). Anything that
//! throws falls back to a placeholder and leaves no exception pending.

use crate::error::Thrown;
use rquickjs::promise::PromiseState;
use rquickjs::{Coerced, Ctx, Object, Value as JsValue};
use serde::{Deserialize, Serialize};

/// Width under which a structure stays on one line.
const LINE_WIDTH: usize = 72;

/// Array elements shown before `... N more items`.
const MAX_ARRAY_ITEMS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub max_depth: usize,
    /// Arrays/objects with more entries count as large structures.
    pub large_structure_threshold: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            max_depth: 4,
            large_structure_threshold: 100,
        }
    }
}

/// Render `value`. Top-level strings are quoted only when
/// `quote_top_strings` is set (results are, printed messages are not).
pub fn display_value<'js>(value: &JsValue<'js>, opts: &DisplayOptions, quote_top_strings: bool) -> String {
    let mut seen = Vec::new();
    render(value, opts, 0, quote_top_strings, &mut seen)
}

/// Snapshot of a thrown value as text.
pub(crate) fn thrown<'js>(value: &JsValue<'js>, opts: &DisplayOptions) -> Thrown {
    let display = display_value(value, opts, false);
    match value.as_object().filter(|_| value.is_error()) {
        Some(obj) => {
            let name = string_prop(obj, "name").unwrap_or_else(|| "Error".into());
            let message = string_prop(obj, "message").unwrap_or_default();
            Thrown {
                stack: Some(error_text(obj, &name, &message)),
                name: Some(name),
                message,
                display,
            }
        }
        None => Thrown {
            name: None,
            message: display.clone(),
            stack: None,
            display,
        },
    }
}

/// Entries counted against the large-structure threshold.
pub(crate) fn entry_count<'js>(value: &JsValue<'js>) -> usize {
    if value.is_array() {
        return array_len(value);
    }
    match value.as_object() {
        Some(obj) if !value.is_function() => obj.keys::<String>().count(),
        _ => 0,
    }
}

/// Name of the constructor an object was made by, from its prototype chain.
pub fn constructor_name(obj: &Object<'_>) -> Option<String> {
    let ctx = obj.ctx();
    let proto = obj.get_prototype()?;
    let ctor: JsValue = attempt(ctx, proto.get("constructor"))?;
    let name: JsValue = attempt(ctx, ctor.as_object()?.get("name"))?;
    let name = name.as_string()?.to_string().ok()?;
    (!name.is_empty()).then_some(name)
}

fn render<'js>(
    value: &JsValue<'js>,
    opts: &DisplayOptions,
    depth: usize,
    quote: bool,
    seen: &mut Vec<JsValue<'js>>,
) -> String {
    if value.is_undefined() {
        return "undefined".into();
    }
    if value.is_null() {
        return "null".into();
    }
    if let Some(b) = value.as_bool() {
        return b.to_string();
    }
    if let Some(n) = value.as_number() {
        if n == 0.0 && n.is_sign_negative() {
            return "-0".into();
        }
        return to_js_string(value).unwrap_or_else(|| n.to_string());
    }
    if let Some(s) = value.as_string() {
        let s = s.to_string().unwrap_or_default();
        return if quote { quote_string(&s) } else { s };
    }
    if let Some(symbol) = value.as_symbol() {
        let description = attempt(value.ctx(), symbol.description())
            .and_then(|d| d.as_string().and_then(|s| s.to_string().ok()))
            .unwrap_or_default();
        return format!("Symbol({description})");
    }
    if value.is_big_int() {
        return format!("{}n", to_js_string(value).unwrap_or_default());
    }
    if value.as_object().is_none() {
        return format!("[{}]", value.type_name());
    }
    if seen.iter().any(|s| s == value) {
        return "[Circular]".into();
    }
    seen.push(value.clone());
    let out = render_object(value, opts, depth, seen);
    seen.pop();
    out
}

fn render_object<'js>(
    value: &JsValue<'js>,
    opts: &DisplayOptions,
    depth: usize,
    seen: &mut Vec<JsValue<'js>>,
) -> String {
    let Some(obj) = value.as_object() else {
        return String::new();
    };
    if value.is_function() {
        let name = string_prop(obj, "name").unwrap_or_default();
        let is_class = to_js_string(value).is_some_and(|src| src.starts_with("class"));
        return match (is_class, name.is_empty()) {
            (true, true) => "[class (anonymous)]".into(),
            (true, false) => format!("[class {name}]"),
            (false, true) => "[Function (anonymous)]".into(),
            (false, false) => format!("[Function: {name}]"),
        };
    }
    if value.is_error() {
        let name = string_prop(obj, "name").unwrap_or_else(|| "Error".into());
        let message = string_prop(obj, "message").unwrap_or_default();
        return error_text(obj, &name, &message);
    }
    if let Some(promise) = value.as_promise() {
        let ctx = value.ctx();
        let inner = match promise.state() {
            PromiseState::Pending => "<pending>".to_string(),
            PromiseState::Resolved => match promise.result::<JsValue>().and_then(|r| attempt(ctx, r)) {
                Some(v) => render(&v, opts, depth + 1, true, seen),
                None => "<unknown>".into(),
            },
            PromiseState::Rejected => {
                let _ = promise.result::<JsValue>();
                let reason = ctx.catch();
                format!("<rejected> {}", render(&reason, opts, depth + 1, true, seen))
            }
        };
        return format!("Promise {{ {inner} }}");
    }
    if value.is_array() {
        if depth > opts.max_depth {
            return "[Array]".into();
        }
        let len = array_len(value);
        let mut parts = Vec::with_capacity(len.min(MAX_ARRAY_ITEMS) + 1);
        for i in 0..len.min(MAX_ARRAY_ITEMS) {
            let item = attempt(value.ctx(), obj.get::<_, JsValue>(i as u32));
            parts.push(match item {
                Some(item) => render(&item, opts, depth + 1, true, seen),
                None => "<unknown>".into(),
            });
        }
        if len > MAX_ARRAY_ITEMS {
            parts.push(format!("... {} more items", len - MAX_ARRAY_ITEMS));
        }
        if parts.is_empty() {
            return "[]".into();
        }
        return wrap("[", "]", &parts, depth);
    }

    let name = constructor_name(obj);
    match name.as_deref() {
        Some("Date") => {
            if let Some(iso) = call_method(obj, "toISOString") {
                return iso;
            }
        }
        Some("RegExp") => {
            if let Some(text) = to_js_string(value) {
                return text;
            }
        }
        _ => {}
    }
    let prefix = name
        .filter(|n| n != "Object")
        .map(|n| format!("{n} "))
        .unwrap_or_default();
    if depth > opts.max_depth {
        return match prefix.trim_end() {
            "" => "[Object]".into(),
            name => format!("[{name}]"),
        };
    }
    let keys: Vec<String> = obj.keys::<String>().filter_map(Result::ok).collect();
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let rendered = match attempt(value.ctx(), obj.get::<_, JsValue>(key.as_str())) {
            Some(v) => render(&v, opts, depth + 1, true, seen),
            None => "<unknown>".into(),
        };
        parts.push(format!("{}: {rendered}", property_key(&key)));
    }
    if parts.is_empty() {
        return format!("{prefix}{{}}");
    }
    format!("{prefix}{}", wrap("{", "}", &parts, depth))
}

/// `Name: message` followed by the engine's stack frames, if any.
fn error_text(obj: &Object<'_>, name: &str, message: &str) -> String {
    let header = if message.is_empty() {
        name.to_string()
    } else {
        format!("{name}: {message}")
    };
    match string_prop(obj, "stack") {
        Some(frames) if !frames.trim().is_empty() => format!("{header}\n{}", frames.trim_end()),
        _ => header,
    }
}

/// Lay out entries on one line, or one per line when too wide.
fn wrap(open: &str, close: &str, parts: &[String], depth: usize) -> String {
    let width: usize = parts.iter().map(|p| p.len() + 2).sum::<usize>() + depth * 2;
    if width <= LINE_WIDTH && !parts.iter().any(|p| p.contains('\n')) {
        return format!("{open} {} {close}", parts.join(", "));
    }
    let indent = "  ".repeat(depth + 1);
    let body = parts
        .iter()
        .map(|p| format!("{indent}{p}"))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("{open}\n{body}\n{}{close}", "  ".repeat(depth))
}

/// `length` read as a number; huge sparse arrays do not fit an `i32`.
fn array_len(value: &JsValue<'_>) -> usize {
    value
        .as_object()
        .and_then(|obj| attempt(value.ctx(), obj.get::<_, f64>("length")))
        .map_or(0, |n| n as usize)
}

/// A property coerced to a string; `None` when absent or undefined.
fn string_prop(obj: &Object<'_>, key: &str) -> Option<String> {
    let value: JsValue = attempt(obj.ctx(), obj.get(key))?;
    if value.is_undefined() {
        return None;
    }
    to_js_string(&value)
}

/// `String(value)`.
fn to_js_string(value: &JsValue<'_>) -> Option<String> {
    let s: Coerced<String> = attempt(value.ctx(), value.get())?;
    Some(s.0)
}

fn call_method(obj: &Object<'_>, name: &str) -> Option<String> {
    let ctx = obj.ctx();
    let method: JsValue = attempt(ctx, obj.get(name))?;
    let text: JsValue = attempt(ctx, method.as_function()?.call((rquickjs::function::This(obj.clone()),)))?;
    text.as_string()?.to_string().ok()
}

/// `Some` on success; on failure the pending exception is discarded.
fn attempt<'js, T>(ctx: &Ctx<'js>, result: rquickjs::Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(rquickjs::Error::Exception) => {
            ctx.catch();
            None
        }
        Err(_) => None,
    }
}

fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let ident = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if ident || (!key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())) {
        key.to_string()
    } else {
        quote_string(key)
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn render_js(code: &str, quote: bool) -> String {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let value: JsValue = ctx.eval(code).unwrap();
            display_value(&value, &DisplayOptions::default(), quote)
        })
    }

    fn show(code: &str) -> String {
        render_js(code, true)
    }

    #[test]
    fn test_primitives() {
        assert_eq!(show("-0"), "-0");
        assert_eq!(show("0.1 + 0.2"), "0.30000000000000004");
        assert_eq!(show("1e21"), "1e+21");
        assert_eq!(show("'hi'"), "'hi'");
        assert_eq!(render_js("'hi'", false), "hi");
        assert_eq!(show("undefined"), "undefined");
        assert_eq!(show("Symbol('s')"), "Symbol(s)");
        assert_eq!(show("10n ** 20n"), "100000000000000000000n");
    }

    #[test]
    fn test_array_and_object_layout() {
        assert_eq!(show("[1, 'a']"), "[ 1, 'a' ]");
        assert_eq!(show("({ a: 1, 'b-c': null })"), "{ a: 1, 'b-c': null }");
        assert_eq!(show("[]"), "[]");
        assert_eq!(show("({})"), "{}");
        assert_eq!(show("class Point { constructor() { this.x = 1; } }; new Point()"), "Point { x: 1 }");
    }

    #[test]
    fn test_functions_and_classes() {
        assert_eq!(show("(function f() {})"), "[Function: f]");
        assert_eq!(show("(() => 1)"), "[Function (anonymous)]");
        assert_eq!(show("(class Shape {})"), "[class Shape]");
    }

    #[test]
    fn test_errors_lead_with_name_and_message() {
        let out = show("new RangeError('bad')");
        assert!(out.starts_with("RangeError: bad"), "{out}");
    }

    #[test]
    fn test_depth_limit_collapses() {
        let out = show("let v = { x: 1 }; for (let i = 0; i < 6; i++) v = { n: v }; v");
        assert!(out.contains("[Object]"), "{out}");
    }

    #[test]
    fn test_cycle_prints_circular() {
        assert_eq!(show("const o = {}; o.self = o; o"), "{ self: [Circular] }");
    }

    #[test]
    fn test_long_arrays_are_truncated_and_wrapped() {
        let out = show("Array.from({ length: 150 }, (_, i) => i)");
        assert!(out.ends_with("... 50 more items\n]"), "{out}");
    }

    #[test]
    fn test_sparse_array_reports_its_length() {
        let out = show("const a = [1]; a[1e9] = 1; a");
        assert!(out.ends_with("... 999999901 more items\n]"), "{out}");
    }

    #[test]
    fn test_settled_promises_show_their_value() {
        assert_eq!(show("Promise.resolve([1])"), "Promise { [ 1 ] }");
        assert_eq!(show("new Promise(() => {})"), "Promise { <pending> }");
        assert_eq!(show("const p = Promise.reject(2); p.catch(() => {}); p"), "Promise { <rejected> 2 }");
    }

    #[test]
    fn test_throwing_getter_does_not_leak_an_exception() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let value: JsValue = ctx
                .eval("({ get bad() { throw new Error('no'); }, ok: 1 })")
                .unwrap();
            let out = display_value(&value, &DisplayOptions::default(), true);
            assert_eq!(out, "{ bad: <unknown>, ok: 1 }");
            let next: i32 = ctx.eval("1 + 1").unwrap();
            assert_eq!(next, 2);
        });
    }
}
