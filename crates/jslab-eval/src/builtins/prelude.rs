//! The tracked `Promise` and the wait/nb* helpers, written in script and
//! wired to the ledger through a handful of natives.

use super::{arg, console, native, number, schedule, to_number, undefined, Builtin};
use crate::interp::Host;
use crate::ledger::ResourceKind;
use rquickjs::context::EvalOptions;
use rquickjs::{Ctx, Function, Object, Persistent, Value as JsValue};
use std::rc::Rc;

/// Own property flagging a swept promise.
pub(crate) const INERT_KEY: &str = "__jsl_inert";

/// File name stack frames of the prelude carry.
pub const PRELUDE_FILE: &str = "jslab:prelude";

const PRELUDE: &str = include_str!("prelude.js");

pub(super) fn install<'js>(ctx: &Ctx<'js>, host: &Rc<Host>) -> rquickjs::Result<()> {
    let natives = Object::new(ctx.clone())?;
    natives.set("inertKey", INERT_KEY)?;
    let functions: [(&str, Builtin); 5] = [
        ("track", track),
        ("untrack", untrack),
        ("setTimeout", schedule::set_timeout),
        ("setImmediate", schedule::set_immediate),
        ("checkStop", console::check_stop),
    ];
    for (name, f) in functions {
        natives.set(name, native(ctx, host, name, f)?)?;
    }

    let mut options = EvalOptions::default();
    options.filename = Some(PRELUDE_FILE.to_string());
    let factory: Function = ctx.eval_with_options(PRELUDE, options)?;
    let helpers: Object = factory.call((natives,))?;
    host.record_capability("Promise", false);
    for entry in helpers.props::<String, JsValue>() {
        let (name, value) = entry?;
        host.register_capability(ctx, &name, value, true)?;
    }
    Ok(())
}

fn track<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let promise = Persistent::save(ctx, arg(ctx, &args, 0));
    let id = host.ledger.borrow_mut().register_promise(promise);
    Ok(number(ctx, id as f64))
}

fn untrack<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let id = to_number(&arg(ctx, &args, 0))?;
    if id >= 0.0 && id.fract() == 0.0 {
        host.ledger
            .borrow_mut()
            .deregister(ResourceKind::Promise, id as u64);
    }
    Ok(undefined(ctx))
}
