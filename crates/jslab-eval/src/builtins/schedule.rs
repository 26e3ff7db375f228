//! Scheduling surface: timers, immediates, animation frames, idle
//! callbacks, listeners, subprocesses and cleanup hooks. Everything
//! registers in the ledger so a sweep can cancel it.

use super::{arg, callback, native, number, to_number, to_text, undefined, Builtin};
use crate::interp::Host;
use crate::ledger::{ResourceKind, Task};
use crate::value::Saved;
use rquickjs::{Coerced, Ctx, Exception, Persistent, Value as JsValue};
use std::process::{Command, Stdio};
use std::rc::Rc;
use tracing::debug;

pub(super) fn install<'js>(ctx: &Ctx<'js>, host: &Rc<Host>) -> rquickjs::Result<()> {
    let functions: [(&str, Builtin); 19] = [
        ("setTimeout", set_timeout),
        ("clearTimeout", clear_timeout),
        ("setInterval", set_interval),
        ("clearInterval", clear_interval),
        ("setImmediate", set_immediate),
        ("clearImmediate", clear_immediate),
        ("requestAnimationFrame", request_animation_frame),
        ("cancelAnimationFrame", cancel_animation_frame),
        ("requestIdleCallback", request_idle_callback),
        ("cancelIdleCallback", cancel_idle_callback),
        ("addEventListener", add_event_listener),
        ("removeEventListener", remove_event_listener),
        ("dispatchEvent", dispatch_event),
        ("spawn", spawn),
        ("killProcess", kill_process),
        ("addForCleanup", add_for_cleanup),
        ("clearTimeoutIf", clear_timeout_if),
        ("clearIntervalIf", clear_interval_if),
        ("clearImmediateIf", clear_immediate_if),
    ];
    for (name, f) in functions {
        let value = native(ctx, host, name, f)?;
        host.register_capability(ctx, name, value, true)?;
    }
    let now = native(ctx, host, "performanceNow", performance_now)?;
    host.register_capability(ctx, "performanceNow", now, true)
}

/// Delay in whole milliseconds; bad values mean "now".
fn delay_ms(n: f64) -> u64 {
    if n.is_nan() || n <= 0.0 {
        0
    } else {
        n.min(f64::from(u32::MAX)) as u64
    }
}

fn id_of(n: Option<f64>) -> Option<u64> {
    match n {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Some(n as u64),
        _ => None,
    }
}

fn pin<'js>(ctx: &Ctx<'js>, values: impl IntoIterator<Item = JsValue<'js>>) -> Vec<Saved> {
    values.into_iter().map(|v| Persistent::save(ctx, v)).collect()
}

/// Register a task and, for timed kinds, put it on the timer heap.
fn register<'js>(
    host: &Host,
    ctx: &Ctx<'js>,
    kind: ResourceKind,
    task: Task<Saved>,
    delay: Option<u64>,
) -> JsValue<'js> {
    let id = host.ledger.borrow_mut().register_task(kind, task);
    match kind {
        ResourceKind::AnimationFrame => {
            let at = host.next_frame_ms();
            host.timers.borrow_mut().schedule_at(id, kind, at);
        }
        ResourceKind::Timeout | ResourceKind::Interval => {
            host.schedule(id, kind, delay.unwrap_or(0));
        }
        _ => {}
    }
    number(ctx, id as f64)
}

fn cancel(host: &Host, kinds: &[ResourceKind], args: &[JsValue<'_>]) -> bool {
    let Some(id) = id_of(args.first().and_then(JsValue::as_number)) else {
        return false;
    };
    let mut ledger = host.ledger.borrow_mut();
    kinds.iter().any(|&kind| ledger.deregister(kind, id))
}

// ── Timers ──────────────────────────────────────────────────────────────

fn timed<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
    kind: ResourceKind,
    what: &str,
) -> rquickjs::Result<JsValue<'js>> {
    let f = callback(host, ctx, &args, what)?;
    let delay = delay_ms(to_number(&arg(ctx, &args, 1))?);
    let period_ms = (kind == ResourceKind::Interval).then(|| delay.max(1));
    let task = Task {
        callback: Persistent::save(ctx, f),
        args: pin(ctx, args.into_iter().skip(2)),
        period_ms,
    };
    Ok(register(host, ctx, kind, task, Some(period_ms.unwrap_or(delay))))
}

pub(super) fn set_timeout<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    timed(host, ctx, args, ResourceKind::Timeout, "setTimeout")
}

fn set_interval<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    timed(host, ctx, args, ResourceKind::Interval, "setInterval")
}

pub(super) fn set_immediate<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let f = callback(host, ctx, &args, "setImmediate")?;
    let task = Task {
        callback: Persistent::save(ctx, f),
        args: pin(ctx, args.into_iter().skip(1)),
        period_ms: None,
    };
    Ok(register(host, ctx, ResourceKind::Immediate, task, None))
}

fn request_animation_frame<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let f = callback(host, ctx, &args, "requestAnimationFrame")?;
    let task = Task {
        callback: Persistent::save(ctx, f),
        args: Vec::new(),
        period_ms: None,
    };
    Ok(register(host, ctx, ResourceKind::AnimationFrame, task, None))
}

fn request_idle_callback<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let f = callback(host, ctx, &args, "requestIdleCallback")?;
    let task = Task {
        callback: Persistent::save(ctx, f),
        args: Vec::new(),
        period_ms: None,
    };
    Ok(register(host, ctx, ResourceKind::IdleCallback, task, None))
}

// Clearing an unknown or already-finished id is a no-op, so the
// `clear*` family always answers `undefined`.

fn clear_timeout<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    cancel(host, &[ResourceKind::Timeout, ResourceKind::Interval], &args);
    Ok(undefined(ctx))
}

fn clear_interval<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    cancel(host, &[ResourceKind::Interval, ResourceKind::Timeout], &args);
    Ok(undefined(ctx))
}

fn clear_immediate<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    cancel(host, &[ResourceKind::Immediate], &args);
    Ok(undefined(ctx))
}

fn cancel_animation_frame<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    cancel(host, &[ResourceKind::AnimationFrame], &args);
    Ok(undefined(ctx))
}

fn cancel_idle_callback<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    cancel(host, &[ResourceKind::IdleCallback], &args);
    Ok(undefined(ctx))
}

/// `clearTimeoutIf(id)`: like `clearTimeout`, reporting whether anything
/// was cancelled.
fn clear_timeout_if<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let cancelled = cancel(host, &[ResourceKind::Timeout], &args);
    Ok(JsValue::new_bool(ctx.clone(), cancelled))
}

fn clear_interval_if<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let cancelled = cancel(host, &[ResourceKind::Interval], &args);
    Ok(JsValue::new_bool(ctx.clone(), cancelled))
}

fn clear_immediate_if<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let cancelled = cancel(host, &[ResourceKind::Immediate], &args);
    Ok(JsValue::new_bool(ctx.clone(), cancelled))
}

fn performance_now<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, _args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    Ok(number(ctx, host.now_ms() as f64))
}

// ── Listeners ───────────────────────────────────────────────────────────

fn add_event_listener<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let name = to_text(&arg(ctx, &args, 0))?;
    let f = arg(ctx, &args, 1);
    if !f.is_function() {
        return Err(Exception::throw_type(ctx, "addEventListener: listener must be a function"));
    }
    host.ledger
        .borrow_mut()
        .add_listener(&name, Persistent::save(ctx, f));
    Ok(undefined(ctx))
}

fn remove_event_listener<'js>(
    host: &Rc<Host>,
    ctx: &Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let name = to_text(&arg(ctx, &args, 0))?;
    let listener = Persistent::save(ctx, arg(ctx, &args, 1));
    let removed = host.ledger.borrow_mut().remove_listener(&name, &listener);
    Ok(JsValue::new_bool(ctx.clone(), removed))
}

/// `dispatchEvent(name, data)`: run listeners synchronously. Returns
/// whether any listener ran.
fn dispatch_event<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let name = to_text(&arg(ctx, &args, 0))?;
    let count = host.dispatch(ctx, &name, arg(ctx, &args, 1))?;
    Ok(JsValue::new_bool(ctx.clone(), count > 0))
}

// ── Subprocesses & cleanup ──────────────────────────────────────────────

fn spawn<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let program = to_text(&arg(ctx, &args, 0))?;
    let mut argv = Vec::new();
    if let Some(list) = args.get(1).and_then(JsValue::as_array) {
        for item in list.iter::<Coerced<String>>() {
            argv.push(item?.0);
        }
    }
    let cwd = host.options.borrow().cwd.clone();
    let child = Command::new(&program)
        .args(&argv)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Exception::throw_message(ctx, &format!("spawn {program}: {e}")))?;
    let pid = host.ledger.borrow_mut().register_subprocess(child);
    debug!(pid, program = %program, "spawned subprocess");
    Ok(number(ctx, f64::from(pid)))
}

fn kill_process<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let pid = to_number(&arg(ctx, &args, 0))?;
    let killed = (0.0..=f64::from(u32::MAX)).contains(&pid)
        && host.ledger.borrow_mut().kill_subprocess(pid as u32);
    Ok(JsValue::new_bool(ctx.clone(), killed))
}

/// `addForCleanup(obj, fn)`: run `fn(obj)` at the next sweep, or
/// `obj._jslabCleanup()` when `fn` is not callable.
fn add_for_cleanup<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let target = Persistent::save(ctx, arg(ctx, &args, 0));
    let f = arg(ctx, &args, 1);
    let f = f.is_function().then(|| Persistent::save(ctx, f));
    host.ledger.borrow_mut().add_cleanup(target, f);
    Ok(undefined(ctx))
}
