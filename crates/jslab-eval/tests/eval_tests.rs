//! Integration tests for the host evaluator.
//!
//! Covers:
//! - expression and statement evaluation against the shared context
//! - built-in objects (strings, arrays, JSON, errors)
//! - the event loop on a manual clock
//! - ledger bookkeeping and the sweep
//! - cooperative cancellation
//! - host events (output, uncaught callback errors)
//! - engine limits (stack depth, array length, heap size)

use jslab_eval::{
    Clock, EvalError, HostEvent, Interp, InterpOptions, ManualClock, OutputLevel, Value,
};
use std::rc::Rc;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Interpreter on a manual clock, plus the clock to advance it.
fn interp() -> (Interp, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let interp = Interp::with_clock(InterpOptions::default(), clock.clone()).unwrap();
    (interp, clock)
}

fn uncaught(interp: &mut Interp, code: &str) -> jslab_eval::Thrown {
    match interp.evaluate(code, "test.js") {
        Err(EvalError::Uncaught(t)) => t,
        other => panic!("expected {code:?} to throw, got {other:?}"),
    }
}

fn eval(interp: &mut Interp, code: &str) -> Value {
    match interp.evaluate(code, "test.js") {
        Ok(v) => v,
        Err(e) => panic!("evaluation of {code:?} failed: {e}"),
    }
}

fn eval_number(interp: &mut Interp, code: &str) -> f64 {
    match eval(interp, code) {
        Value::Number(n) => n,
        other => panic!("expected a number from {code:?}, got {other:?}"),
    }
}

fn eval_string(interp: &mut Interp, code: &str) -> String {
    match eval(interp, code) {
        Value::String(s) => s.to_string(),
        other => panic!("expected a string from {code:?}, got {other:?}"),
    }
}

fn global_number(interp: &Interp, name: &str) -> f64 {
    match interp.get_global(name) {
        Some(Value::Number(n)) => n,
        other => panic!("expected global {name} to be a number, got {other:?}"),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Evaluation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn arithmetic_and_completion_value() {
    let (mut i, _) = interp();
    assert_eq!(eval_number(&mut i, "1 + 2 * 3"), 7.0);
    assert_eq!(eval_number(&mut i, "let a = 4; a ** 2"), 16.0);
}

#[test]
fn context_properties_persist_between_evaluations() {
    let (mut i, _) = interp();
    eval(&mut i, "jsl.context.total = 10; 0");
    assert_eq!(eval_number(&mut i, "total + 5"), 15.0);
    eval(&mut i, "total = 1; 0");
    assert_eq!(global_number(&i, "total"), 1.0);
}

#[test]
fn function_declarations_are_hoisted() {
    let (mut i, _) = interp();
    let n = eval_number(
        &mut i,
        "function f() { return g() + 1; } function g() { return 5; } f()",
    );
    assert_eq!(n, 6.0);
}

#[test]
fn closures_capture_bindings() {
    let (mut i, _) = interp();
    let n = eval_number(
        &mut i,
        r#"
        const counter = () => { let c = 0; return () => { c += 1; return c; }; };
        const next = counter();
        next(); next(); next()
        "#,
    );
    assert_eq!(n, 3.0);
}

#[test]
fn classes_and_super_calls() {
    let (mut i, _) = interp();
    let n = eval_number(
        &mut i,
        r#"
        class A { constructor(x) { this.x = x; } value() { return this.x; } }
        class B extends A { constructor() { super(4); } value() { return super.value() * 2; } }
        new B().value()
        "#,
    );
    assert_eq!(n, 8.0);
}

#[test]
fn destructuring_with_defaults_and_rest() {
    let (mut i, _) = interp();
    let s = eval_string(
        &mut i,
        r#"
        const { a, b = 2, ...rest } = { a: 1, c: 3, d: 4 };
        const [x, y = 9] = [7];
        [a, b, Object.keys(rest).join(""), x, y].join(",")
        "#,
    );
    assert_eq!(s, "1,2,cd,7,9");
}

#[test]
fn string_and_array_builtins() {
    let (mut i, _) = interp();
    assert_eq!(
        eval_string(&mut i, r#""a-b-c".split("-").map(s => s.toUpperCase()).join("")"#),
        "ABC"
    );
    assert_eq!(eval_string(&mut i, "[3, 1, 2].sort().join()"), "1,2,3");
    assert_eq!(eval_string(&mut i, r#""abc".padStart(5, "*")"#), "**abc");
    assert_eq!(
        eval_number(&mut i, "[1, 2, 3, 4].filter(n => n % 2 === 0).reduce((a, b) => a + b, 0)"),
        6.0
    );
}

#[test]
fn json_round_trip() {
    let (mut i, _) = interp();
    assert_eq!(
        eval_string(&mut i, "JSON.stringify({ a: 1, b: [1.5, null, 'x'] })"),
        r#"{"a":1,"b":[1.5,null,"x"]}"#
    );
    assert_eq!(
        eval_number(&mut i, r#"JSON.parse('{"k": [10, 20]}').k[1]"#),
        20.0
    );
}

#[test]
fn thrown_errors_carry_name_and_message() {
    let (mut i, _) = interp();
    match i.evaluate("null.x", "test.js") {
        Err(EvalError::Uncaught(t)) => {
            assert_eq!(t.name.as_deref(), Some("TypeError"));
            assert_eq!(t.message, "cannot read property 'x' of null");
        }
        other => panic!("expected uncaught TypeError, got {other:?}"),
    }
    match i.evaluate("throw 42", "test.js") {
        Err(EvalError::Uncaught(t)) => {
            assert_eq!(t.name, None);
            assert_eq!(t.summary(), "Uncaught 42");
        }
        other => panic!("expected uncaught value, got {other:?}"),
    }
}

#[test]
fn thrown_errors_carry_script_positions() {
    let (mut i, _) = interp();
    let t = uncaught(&mut i, "1;\nnull.x");
    let stack = t.stack.unwrap_or_default();
    assert!(stack.starts_with("TypeError: cannot read property 'x' of null\n"), "{stack}");
    assert!(stack.contains("test.js:2:"), "{stack}");
}

#[test]
fn large_integer_strings_parse_exactly() {
    let (mut i, _) = interp();
    assert!(matches!(
        eval(&mut i, "parseInt('99999999999999999999999') === 1e23"),
        Value::Bool(true)
    ));
    assert_eq!(eval_string(&mut i, "String(parseInt('99999999999999999999999'))"), "1e+23");
}

#[test]
fn undeclared_identifier_is_reference_error() {
    let (mut i, _) = interp();
    match i.evaluate("missingName + 1", "test.js") {
        Err(EvalError::Uncaught(t)) => {
            assert_eq!(t.name.as_deref(), Some("ReferenceError"));
            assert_eq!(t.message, "missingName is not defined");
        }
        other => panic!("expected ReferenceError, got {other:?}"),
    }
}

#[test]
fn syntax_errors_do_not_execute() {
    let (mut i, _) = interp();
    let result = i.evaluate("jsl.context.ran = true; (", "test.js");
    assert!(matches!(result, Err(EvalError::Parse(_))));
    assert!(i.get_global("ran").is_none());
}

// ══════════════════════════════════════════════════════════════════════════════
// Event loop
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn intervals_fire_as_time_advances() {
    let (mut i, clock) = interp();
    eval(
        &mut i,
        "jsl.context.n = 0; setInterval(() => { jsl.context.n += 1; }, 10); 0",
    );
    assert_eq!(i.stats().intervals, 1);
    clock.advance_by(35);
    i.pump().unwrap();
    assert_eq!(global_number(&i, "n"), 3.0);
}

#[test]
fn await_drives_timers() {
    let (mut i, clock) = interp();
    let n = eval_number(
        &mut i,
        "(async () => { await waitMSeconds(50); return 7; })()",
    );
    assert_eq!(n, 7.0);
    assert!(clock.now_ms() >= 50);
}

#[test]
fn promise_combinators() {
    let (mut i, _) = interp();
    let s = eval_string(
        &mut i,
        "Promise.all([1, Promise.resolve(2), waitMSeconds(5).then(() => 3)]).then(a => a.join(','))",
    );
    assert_eq!(s, "1,2,3");
    let n = eval_number(
        &mut i,
        "Promise.race([waitMSeconds(20).then(() => 1), waitMSeconds(5).then(() => 2)])",
    );
    assert_eq!(n, 2.0);
}

#[test]
fn rejected_await_surfaces_as_uncaught() {
    let (mut i, _) = interp();
    match i.evaluate("(async () => { await Promise.reject(new RangeError('bad')); })()", "t.js") {
        Err(EvalError::Uncaught(t)) => assert_eq!(t.summary(), "RangeError: bad"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn immediates_run_before_timers() {
    let (mut i, clock) = interp();
    eval(
        &mut i,
        r#"
        jsl.context.order = [];
        setTimeout(() => order.push("timeout"), 0);
        setImmediate(() => order.push("immediate"));
        Promise.resolve().then(() => order.push("micro"));
        0
        "#,
    );
    clock.advance_by(1);
    i.pump().unwrap();
    assert_eq!(eval_string(&mut i, "order.join()"), "micro,immediate,timeout");
}

#[test]
fn nbwhile_repeats_until_truthy() {
    let (mut i, _) = interp();
    eval(
        &mut i,
        "jsl.context.k = 0; nbwhile(() => { jsl.context.k += 1; return k >= 4; }); 0",
    );
    i.pump().unwrap();
    assert_eq!(global_number(&i, "k"), 4.0);
    assert_eq!(i.stats().immediates, 0);
}

// ══════════════════════════════════════════════════════════════════════════════
// Ledger & sweep
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn sweep_cancels_everything_registered() {
    let (mut i, clock) = interp();
    eval(
        &mut i,
        r#"
        jsl.context.n = 0;
        setInterval(() => { jsl.context.n += 1; }, 10);
        setTimeout(() => { jsl.context.n += 100; }, 50);
        requestAnimationFrame(() => { jsl.context.n += 1000; });
        addEventListener("tick", () => {});
        jsl.context.p = new Promise(() => {});
        0
        "#,
    );
    let stats = i.stats();
    assert_eq!(stats.intervals, 1);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.animation_frames, 1);
    assert_eq!(stats.listeners, 1);
    assert_eq!(stats.promises, 1);

    let report = i.sweep();
    assert_eq!(report.intervals, 1);
    assert_eq!(report.timeouts, 1);
    assert_eq!(report.promises, 1);
    assert!(i.stats().is_idle());

    clock.advance_by(200);
    i.pump().unwrap();
    assert_eq!(global_number(&i, "n"), 0.0);
}

#[test]
fn inert_promise_chaining_returns_sentinel() {
    let (mut i, _) = interp();
    eval(
        &mut i,
        r#"
        jsl.context.hit = 0;
        jsl.context.p = new Promise(r => { jsl.context.res = r; });
        p.then(() => { jsl.context.hit = 1; });
        0
        "#,
    );
    i.sweep();
    assert!(matches!(eval(&mut i, "p.then(x => x)"), Value::Bool(false)));
    assert!(matches!(eval(&mut i, "p.catch(x => x)"), Value::Bool(false)));
    // Settling later runs nothing.
    eval(&mut i, "res(1); 0");
    i.pump().unwrap();
    assert_eq!(global_number(&i, "hit"), 0.0);
}

#[test]
fn settled_promises_deregister() {
    let (mut i, _) = interp();
    eval(&mut i, "new Promise(r => r(1)); 0");
    assert_eq!(i.stats().promises, 0);
}

#[test]
fn cleanup_callbacks_run_in_order_and_failures_are_swallowed() {
    let (mut i, _) = interp();
    eval(
        &mut i,
        r#"
        jsl.context.log = [];
        addForCleanup({}, () => { log.push("a"); });
        addForCleanup({}, () => { throw new Error("boom"); });
        addForCleanup({ _jslabCleanup: () => { log.push("b"); } });
        0
        "#,
    );
    let report = i.sweep();
    assert_eq!(report.cleanups, 3);
    assert_eq!(report.cleanup_failures, 1);
    assert_eq!(eval_string(&mut i, "log.join()"), "a,b");
}

#[test]
fn listeners_receive_dispatched_events() {
    let (mut i, _) = interp();
    eval(&mut i, "addEventListener('ping', d => { jsl.context.got = d; }); 0");
    let count = i.dispatch_event("ping", Value::Number(3.0)).unwrap();
    assert_eq!(count, 1);
    assert_eq!(global_number(&i, "got"), 3.0);
}

// ══════════════════════════════════════════════════════════════════════════════
// Cancellation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn check_stop_raises_stopped() {
    let (mut i, _) = interp();
    assert!(matches!(eval(&mut i, "checkStop()"), Value::Bool(false)));
    i.stop_flag().request();
    let result = i.evaluate("for (;;) { checkStop(); }", "test.js");
    assert!(matches!(result, Err(EvalError::Stopped)));
}

#[test]
fn stop_interrupts_a_busy_loop() {
    let (mut i, _) = interp();
    let flag = i.stop_flag();
    i.set_host_hook(Box::new(move |_| flag.request()));
    let result = i.evaluate("console.log('start'); for (;;) {}", "test.js");
    assert!(matches!(result, Err(EvalError::Stopped)));
}

#[test]
fn stop_skips_catch_and_finally() {
    let (mut i, _) = interp();
    let flag = i.stop_flag();
    i.set_host_hook(Box::new(move |_| flag.request()));
    let result = i.evaluate(
        r#"
        try {
            console.log('go');
            checkStop();
        } catch (e) {
            jsl.context.caught = true;
        } finally {
            jsl.context.fin = true;
        }
        "#,
        "test.js",
    );
    assert!(result.unwrap_err().is_stopped());
    i.stop_flag().reset();
    assert!(i.get_global("caught").is_none());
    assert!(i.get_global("fin").is_none());
    assert_eq!(eval_number(&mut i, "2 + 2"), 4.0);
}

#[test]
fn stop_is_not_catchable() {
    let (mut i, _) = interp();
    i.stop_flag().request();
    let result = i.evaluate(
        "try { checkStop(); } catch (e) { jsl.context.caught = true; } finally { jsl.context.fin = true; }",
        "test.js",
    );
    assert!(result.unwrap_err().is_stopped());
    assert!(i.get_global("caught").is_none());
}

// ══════════════════════════════════════════════════════════════════════════════
// Host events
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn console_output_is_emitted_and_suppresses_echo() {
    let (mut i, _) = interp();
    eval(&mut i, "console.log('hi', 1, [1, 2]); console.warn('careful')");
    let events = i.drain_events();
    assert_eq!(
        events,
        vec![
            HostEvent::Output {
                level: OutputLevel::Log,
                text: "hi 1 [ 1, 2 ]".into()
            },
            HostEvent::Output {
                level: OutputLevel::Warn,
                text: "careful".into()
            },
        ]
    );
    let requests = i.take_requests();
    assert!(requests.suppress_echo);
    assert!(requests.suppress_result);
}

#[test]
fn callback_errors_are_reported_not_propagated() {
    let (mut i, clock) = interp();
    eval(&mut i, "setTimeout(() => { throw new Error('late'); }, 5); 0");
    clock.advance_by(10);
    i.pump().unwrap();
    let events = i.drain_events();
    match events.as_slice() {
        [HostEvent::Uncaught(t)] => assert_eq!(t.summary(), "Error: late"),
        other => panic!("expected one uncaught event, got {other:?}"),
    }
}

#[test]
fn clear_requests_workspace_clear() {
    let (mut i, _) = interp();
    eval(&mut i, "clear()");
    assert!(i.take_requests().clear_workspace);
}

#[test]
fn nb_helpers_reject_non_functions() {
    let (mut i, _) = interp();
    let t = uncaught(&mut i, "nbrun(5)");
    assert_eq!(t.summary(), "TypeError: nbrun: callback must be a function, got 5");
    let t = uncaught(&mut i, "setTimeout('code', 5)");
    assert_eq!(t.summary(), "TypeError: setTimeout: callback must be a function, got code");
}

// ══════════════════════════════════════════════════════════════════════════════
// Engine limits
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn runaway_recursion_is_a_range_error() {
    let (mut i, _) = interp();
    let t = uncaught(&mut i, "function down(n) { return down(n + 1) + 1; } down(0)");
    assert_eq!(t.summary(), "RangeError: Maximum call stack size exceeded");
    assert_eq!(eval_number(&mut i, "1 + 1"), 2.0);
}

#[test]
fn array_length_limits() {
    let (mut i, _) = interp();
    let t = uncaught(&mut i, "[1, 2, 3].length = 1e12");
    assert_eq!(t.summary(), "RangeError: invalid array length");
    assert_eq!(
        eval_number(&mut i, "const sparse = []; sparse[1e9] = 1; sparse.length"),
        1e9 + 1.0
    );
    assert_eq!(eval_number(&mut i, "[1, 2, 3].length"), 3.0);
}

#[test]
fn heap_exhaustion_is_recoverable() {
    let clock = Rc::new(ManualClock::new());
    let options = InterpOptions {
        memory_limit_bytes: 64 * 1024 * 1024,
        ..InterpOptions::default()
    };
    let mut i = Interp::with_clock(options, clock).unwrap();
    let t = uncaught(&mut i, "'x'.repeat(2 ** 28)");
    assert!(t.summary().contains("out of memory"), "{}", t.summary());
    assert_eq!(eval_number(&mut i, "[1, 2, 3].reduce((a, b) => a + b)"), 6.0);
}
