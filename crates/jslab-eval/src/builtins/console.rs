//! `console`, `disp`, `clear` and `checkStop`.

use super::{arg, native, undefined, Builtin};
use crate::display::display_value;
use crate::interp::{Host, OutputLevel};
use rquickjs::{qjs, Ctx, Exception, Object, Value as JsValue};
use std::rc::Rc;

pub(super) fn install<'js>(ctx: &Ctx<'js>, host: &Rc<Host>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    let methods: [(&str, Builtin); 5] = [
        ("log", log),
        ("info", info),
        ("warn", warn),
        ("error", error),
        ("debug", log),
    ];
    for (name, f) in methods {
        console.set(name, native(ctx, host, name, f)?)?;
    }
    host.register_capability(ctx, "console", console, true)?;

    let functions: [(&str, Builtin); 3] = [("disp", disp), ("clear", clear), ("checkStop", check_stop)];
    for (name, f) in functions {
        let value = native(ctx, host, name, f)?;
        host.register_capability(ctx, name, value, true)?;
    }
    Ok(())
}

/// Arguments joined by spaces; strings print bare.
fn format_args(host: &Host, args: &[JsValue<'_>]) -> String {
    let options = host.display_options();
    args.iter()
        .map(|v| display_value(v, &options, false))
        .collect::<Vec<_>>()
        .join(" ")
}

fn emit<'js>(host: &Host, ctx: &Ctx<'js>, level: OutputLevel, args: &[JsValue<'js>]) -> rquickjs::Result<JsValue<'js>> {
    host.print(level, format_args(host, args));
    Ok(undefined(ctx))
}

fn log<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    emit(host, ctx, OutputLevel::Log, &args)
}

fn info<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    emit(host, ctx, OutputLevel::Info, &args)
}

fn warn<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    emit(host, ctx, OutputLevel::Warn, &args)
}

fn error<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    emit(host, ctx, OutputLevel::Error, &args)
}

/// `disp(value)`: print one value the way results are echoed.
fn disp<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let text = display_value(&arg(ctx, &args, 0), &host.display_options(), false);
    host.print(OutputLevel::Log, text);
    Ok(undefined(ctx))
}

/// `clear()`: the workspace is cleared once the current evaluation ends.
fn clear<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, _args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    host.request(|r| {
        r.clear_workspace = true;
        r.suppress_echo = true;
        r.suppress_result = true;
    });
    Ok(undefined(ctx))
}

/// `checkStop()`: `false`, or an uncatchable unwind once a stop is
/// requested.
pub(super) fn check_stop<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, _args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    if !host.stop_requested() {
        return Ok(JsValue::new_bool(ctx.clone(), false));
    }
    let stop = Exception::from_message(ctx.clone(), "interrupted")?;
    // SAFETY: `stop` is a live error object owned by `ctx`; the call only
    // sets a flag on it.
    unsafe { qjs::JS_SetUncatchableError(ctx.as_raw().as_ptr(), stop.as_raw()) };
    Err(stop.throw())
}
