//! The `jsl` object rewritten code targets: `jsl.context` is the global
//! execution context, `jsl.omit` implements object rest and `jsl.import`
//! loads a module namespace.

use super::{arg, native, to_text};
use crate::display::display_value;
use crate::interp::Host;
use rquickjs::{Ctx, Exception, Object, Value as JsValue};
use std::rc::Rc;

pub(super) fn install<'js>(ctx: &Ctx<'js>, host: &Rc<Host>) -> rquickjs::Result<()> {
    let jsl = Object::new(ctx.clone())?;
    jsl.set("context", ctx.globals())?;
    jsl.set("omit", native(ctx, host, "omit", omit)?)?;
    jsl.set("import", native(ctx, host, "import", import)?)?;
    host.register_capability(ctx, "jsl", jsl, true)
}

/// `jsl.omit(obj, keys)`: shallow copy of the own enumerable properties of
/// `obj` without `keys`.
fn omit<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let source = arg(ctx, &args, 0);
    if source.is_null() || source.is_undefined() {
        let shown = display_value(&source, &host.display_options(), false);
        return Err(Exception::throw_type(
            ctx,
            &format!("Cannot destructure '{shown}' as it is {shown}."),
        ));
    }
    let mut exclude = Vec::new();
    if let Some(keys) = args.get(1).and_then(JsValue::as_array) {
        for key in keys.iter::<JsValue>() {
            exclude.push(to_text(&key?)?);
        }
    }
    let rest = Object::new(ctx.clone())?;
    if let Some(obj) = source.as_object() {
        for key in obj.keys::<String>() {
            let key = key?;
            if exclude.contains(&key) {
                continue;
            }
            let value: JsValue = obj.get(key.as_str())?;
            rest.set(key, value)?;
        }
    } else if let Some(s) = source.as_string() {
        // Strings spread into their indexed characters.
        for (i, ch) in s.to_string()?.chars().enumerate() {
            let key = i.to_string();
            if !exclude.contains(&key) {
                rest.set(key, ch.to_string())?;
            }
        }
    }
    Ok(rest.into_value())
}

/// `jsl.import(spec)`: a promise of the module namespace. Load failures
/// reject it rather than throwing.
fn import<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let spec = to_text(&arg(ctx, &args, 0))?;
    let (promise, resolve, reject) = ctx.promise()?;
    match host.import_namespace(ctx, &spec) {
        Ok(namespace) => resolve.call::<_, ()>((namespace,))?,
        Err(rquickjs::Error::Exception) => reject.call::<_, ()>((ctx.catch(),))?,
        Err(e) => return Err(e),
    }
    Ok(promise.into_value())
}
