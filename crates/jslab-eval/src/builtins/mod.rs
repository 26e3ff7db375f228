//! Host functions installed into every execution context. The language
//! library itself (`Object`, `Array`, `JSON`, `Math`, ...) is the engine's.

mod console;
mod jsl;
mod prelude;
mod schedule;

pub(crate) use prelude::INERT_KEY;
pub use prelude::PRELUDE_FILE;

use crate::display::display_value;
use crate::interp::Host;
use rquickjs::function::Rest;
use rquickjs::{Coerced, Ctx, Exception, Function, Value as JsValue};
use std::rc::Rc;

/// Signature shared by every native function.
pub(crate) type Builtin =
    for<'js> fn(&Rc<Host>, &Ctx<'js>, Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>>;

pub(crate) fn install<'js>(ctx: &Ctx<'js>, host: &Rc<Host>) -> rquickjs::Result<()> {
    console::install(ctx, host)?;
    schedule::install(ctx, host)?;
    jsl::install(ctx, host)?;
    host.install_module_functions(ctx)?;
    prelude::install(ctx, host)?;

    for name in ["undefined", "NaN", "Infinity", "globalThis"] {
        host.record_capability(name, true);
    }
    Ok(())
}

/// Function object backed by `f`.
pub(crate) fn native<'js>(
    ctx: &Ctx<'js>,
    host: &Rc<Host>,
    name: &str,
    f: Builtin,
) -> rquickjs::Result<Function<'js>> {
    let host = Rc::clone(host);
    Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| {
        f(&host, &ctx, args.0)
    })?
    .with_name(name)
}

/// Argument `i`, or `undefined`.
pub(crate) fn arg<'js>(ctx: &Ctx<'js>, args: &[JsValue<'js>], i: usize) -> JsValue<'js> {
    args.get(i)
        .cloned()
        .unwrap_or_else(|| JsValue::new_undefined(ctx.clone()))
}

pub(crate) fn undefined<'js>(ctx: &Ctx<'js>) -> JsValue<'js> {
    JsValue::new_undefined(ctx.clone())
}

pub(crate) fn number<'js>(ctx: &Ctx<'js>, n: f64) -> JsValue<'js> {
    JsValue::new_number(ctx.clone(), n)
}

/// `String(value)`.
pub(crate) fn to_text(value: &JsValue<'_>) -> rquickjs::Result<String> {
    Ok(value.get::<Coerced<String>>()?.0)
}

/// `Number(value)`.
pub(crate) fn to_number(value: &JsValue<'_>) -> rquickjs::Result<f64> {
    Ok(value.get::<Coerced<f64>>()?.0)
}

/// Argument 0 when it is callable; a `TypeError` naming `what` otherwise.
pub(crate) fn callback<'js>(
    host: &Host,
    ctx: &Ctx<'js>,
    args: &[JsValue<'js>],
    what: &str,
) -> rquickjs::Result<JsValue<'js>> {
    let f = arg(ctx, args, 0);
    if f.is_function() {
        return Ok(f);
    }
    let got = display_value(&f, &host.display_options(), false);
    Err(Exception::throw_type(
        ctx,
        &format!("{what}: callback must be a function, got {got}"),
    ))
}
