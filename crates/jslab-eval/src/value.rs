//! Values crossing the host boundary.
//!
//! Primitives are copied out of the engine. Everything else (objects,
//! functions, symbols, bigints) stays in the engine heap and is reached
//! through a [`Handle`], which pins it until the last clone is dropped.

use crate::display::constructor_name;
use rquickjs::{Context, Ctx, Persistent, Value as JsValue};
use std::fmt;
use std::rc::Rc;

/// An engine value pinned outside any `Context::with` scope.
pub(crate) type Saved = Persistent<JsValue<'static>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Handle),
}

/// Returned by `then`/`catch`/`finally` on a swept promise.
pub const INERT_SENTINEL: Value = Value::Bool(false);

/// A pinned reference to an engine heap value.
#[derive(Clone)]
pub struct Handle {
    // Released before `_context`, which keeps the runtime alive.
    value: Saved,
    _context: Context,
    facts: Rc<Facts>,
}

/// What the host needs to know about a handle without entering the engine.
#[derive(Debug)]
struct Facts {
    type_of: &'static str,
    callable: bool,
    kind: String,
}

impl Handle {
    fn new<'js>(context: &Context, ctx: &Ctx<'js>, value: JsValue<'js>) -> Self {
        let facts = Facts {
            type_of: type_of(&value),
            callable: value.is_function(),
            kind: kind_of(&value),
        };
        Self {
            value: Persistent::save(ctx, value),
            _context: context.clone(),
            facts: Rc::new(facts),
        }
    }

    pub fn type_of(&self) -> &'static str {
        self.facts.type_of
    }

    pub fn is_callable(&self) -> bool {
        self.facts.callable
    }

    /// Constructor name, `Array`, `Function`, `Symbol` or `BigInt`.
    pub fn kind(&self) -> &str {
        &self.facts.kind
    }

    /// The referenced value, inside a scope of the runtime that owns it.
    pub(crate) fn restore<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<JsValue<'js>> {
        self.value.clone().restore(ctx)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({} {})", self.facts.type_of, self.facts.kind)
    }
}

fn type_of(value: &JsValue<'_>) -> &'static str {
    if value.is_function() {
        "function"
    } else if value.is_symbol() {
        "symbol"
    } else if value.is_big_int() {
        "bigint"
    } else {
        "object"
    }
}

fn kind_of(value: &JsValue<'_>) -> String {
    if value.is_function() {
        return "Function".into();
    }
    if value.is_symbol() {
        return "Symbol".into();
    }
    if value.is_big_int() {
        return "BigInt".into();
    }
    if value.is_array() {
        return "Array".into();
    }
    value
        .as_object()
        .and_then(constructor_name)
        .unwrap_or_else(|| "Object".into())
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Copy a primitive out of the engine, or pin anything else.
    pub(crate) fn from_js<'js>(context: &Context, ctx: &Ctx<'js>, value: JsValue<'js>) -> Self {
        if value.is_null() {
            return Value::Null;
        }
        if let Some(b) = value.as_bool() {
            return Value::Bool(b);
        }
        if let Some(n) = value.as_number() {
            return Value::Number(n);
        }
        if let Some(s) = value.as_string() {
            return match s.to_string() {
                Ok(s) => Value::String(s),
                Err(_) => Value::Undefined,
            };
        }
        if value.is_object() || value.is_symbol() || value.is_big_int() {
            return Value::Object(Handle::new(context, ctx, value));
        }
        Value::Undefined
    }

    /// The engine value for `self`. Handles from another runtime fail.
    pub(crate) fn to_js<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<JsValue<'js>> {
        Ok(match self {
            Value::Undefined => JsValue::new_undefined(ctx.clone()),
            Value::Null => JsValue::new_null(ctx.clone()),
            Value::Bool(b) => JsValue::new_bool(ctx.clone(), *b),
            Value::Number(n) => JsValue::new_number(ctx.clone(), *n),
            Value::String(s) => rquickjs::String::from_str(ctx.clone(), s)?.into_value(),
            Value::Object(h) => h.restore(ctx)?,
        })
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Object(h) => Some(h),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Object(h) if h.is_callable())
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(h) => h.type_of(),
        }
    }

    /// `Number(value)` for primitives; `NaN` for handles.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined | Value::Object(_) => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(h) => write!(f, "{h:?}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
