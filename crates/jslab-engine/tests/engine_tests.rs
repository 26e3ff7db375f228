//! Integration tests for the execution controller and session.
//!
//! Covers:
//! - persistence, implicit results and hoisting across submissions
//! - forbidden names and busy rejection leaving the workspace untouched
//! - translated runtime errors, including late callback errors
//! - stack, array and heap limits leaving the controller usable
//! - stop, sweep and promise inertness
//! - workspace snapshots, clearing and script isolation
//! - the threaded session and its command channel

use jslab_engine::{
    Command, Controller, EngineConfig, EngineError, EvalState, Event, EventLog, LineRange, Session,
    Submission,
};
use jslab_eval::{ManualClock, OutputLevel, Value};
use jslab_rewrite::RewriteError;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

struct Harness {
    controller: Controller,
    events: EventLog,
    clock: Rc<ManualClock>,
}

fn harness_with(config: EngineConfig) -> Harness {
    let events = EventLog::new();
    let clock = Rc::new(ManualClock::new());
    let controller = Controller::with_parts(
        config,
        Rc::new(events.clone()),
        clock.clone(),
        EvalState::new(),
    )
    .unwrap();
    Harness {
        controller,
        events,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

impl Harness {
    fn eval(&mut self, code: &str) -> Value {
        match self.controller.evaluate(&Submission::console(code)) {
            Ok(v) => v,
            Err(e) => panic!("evaluation of {code:?} failed: {e}"),
        }
    }

    fn eval_err(&mut self, code: &str) -> EngineError {
        match self.controller.evaluate(&Submission::console(code)) {
            Ok(v) => panic!("evaluation of {code:?} should fail, got {v:?}"),
            Err(e) => e,
        }
    }

    fn number(&mut self, code: &str) -> f64 {
        match self.eval(code) {
            Value::Number(n) => n,
            other => panic!("expected a number from {code:?}, got {other:?}"),
        }
    }

    fn workspace_names(&self) -> Vec<String> {
        self.controller
            .workspace()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    fn errors(&self) -> Vec<String> {
        self.events
            .take()
            .into_iter()
            .filter_map(|e| match e {
                Event::ErrorReported { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

fn runtime_message(err: EngineError) -> String {
    match err {
        EngineError::Runtime(message) => message,
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

fn wait_for(session: &Session, mut pred: impl FnMut(&Event) -> bool) -> Vec<Event> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        if let Some(event) = session.next_event(Duration::from_millis(50)) {
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }
    panic!("timed out waiting for event; saw {seen:?}");
}

// ══════════════════════════════════════════════════════════════════════════════
// Evaluation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn variables_persist_across_submissions() {
    let mut h = harness();
    assert!(h.eval("var x = 1").is_undefined());
    assert_eq!(h.number("x"), 1.0);
    h.eval("x = x + 1;");
    assert_eq!(h.number("x * 10"), 20.0);
}

#[test]
fn trailing_expression_is_the_result() {
    let mut h = harness();
    assert_eq!(h.number("1+1"), 2.0);
    assert!(h.eval("var y = 2;").is_undefined());
    assert_eq!(h.number("y"), 2.0);
}

#[test]
fn results_are_stored_as_ans_and_echoed() {
    let mut h = harness();
    h.events.take();
    h.eval("6 * 7");
    assert_eq!(h.number("ans"), 42.0);
    let events = h.events.take();
    assert_eq!(events.first(), Some(&Event::Started { session: None }));
    assert_eq!(events.last(), Some(&Event::Finished));
    assert!(events.contains(&Event::ResultReady {
        value: "42".into(),
        is_large_structure: false,
    }));
}

#[test]
fn undefined_results_leave_ans_alone() {
    let mut h = harness();
    h.eval("5");
    h.eval("var z = 3;");
    assert_eq!(h.number("ans"), 5.0);
}

#[test]
fn large_structures_are_flagged() {
    let mut h = harness();
    h.events.take();
    h.eval("var big = []; for (let i = 0; i < 150; i++) big.push(i); big");
    let flagged = h.events.take().into_iter().any(|e| {
        matches!(
            e,
            Event::ResultReady {
                is_large_structure: true,
                ..
            }
        )
    });
    assert!(flagged);
}

#[test]
fn console_output_suppresses_the_echo() {
    let mut h = harness();
    h.events.take();
    h.eval("console.log('hi', 1); 5");
    let events = h.events.take();
    assert!(events.contains(&Event::Output {
        level: OutputLevel::Log,
        text: "hi 1".into(),
    }));
    assert!(!events.iter().any(|e| matches!(e, Event::ResultReady { .. })));
}

#[test]
fn hidden_submissions_do_not_echo() {
    let mut h = harness();
    h.events.take();
    let mut submission = Submission::console("3");
    submission.display = false;
    h.controller.evaluate(&submission).unwrap();
    assert!(!h
        .events
        .take()
        .iter()
        .any(|e| matches!(e, Event::ResultReady { .. })));
    assert_eq!(h.number("ans"), 3.0);
}

#[test]
fn var_read_before_declaration_is_a_reference_error() {
    let mut h = harness();
    let message = runtime_message(h.eval_err("var w = z + 1; var z = 5"));
    assert!(message.starts_with("ReferenceError: z is not defined"), "{message}");

    h.eval("var z = 5");
    h.eval("var w = z + 1; var z = 7");
    assert_eq!(h.number("w"), 6.0);
    assert_eq!(h.number("z"), 7.0);
}

#[test]
fn functions_are_callable_before_their_declaration() {
    let mut h = harness();
    h.eval("var r = g(); function g() { return 41 }");
    assert_eq!(h.number("r + 1"), 42.0);
    assert_eq!(h.number("g()"), 41.0);
}

#[test]
fn redefined_functions_replace_earlier_ones() {
    let mut h = harness();
    h.eval("function pick() { return 1 }");
    h.eval("function pick() { return 2 }");
    assert_eq!(h.number("pick()"), 2.0);
    assert_eq!(h.workspace_names(), vec!["pick", "ans"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Rejections
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn forbidden_names_are_rejected_before_running() {
    let mut h = harness();
    h.eval("var keep = 1;");
    let names_before = h.controller.interp().global_names();
    let err = h.eval_err("var config = 1");
    match err {
        EngineError::Rewrite(RewriteError::Forbidden { name, .. }) => assert_eq!(name, "config"),
        other => panic!("expected a forbidden-name error, got {other:?}"),
    }
    assert_eq!(h.controller.interp().global_names(), names_before);
}

#[test]
fn library_names_are_protected() {
    let mut h = harness();
    let err = h.eval_err("function setTimeout() {}");
    assert!(matches!(
        err,
        EngineError::Rewrite(RewriteError::Forbidden { .. })
    ));
}

#[test]
fn syntax_errors_do_not_execute_anything() {
    let mut h = harness();
    let err = h.eval_err("var ok = 1;\nvar bad = ;");
    match &err {
        EngineError::Rewrite(RewriteError::Syntax(e)) => assert_eq!(e.span.start_line, 2),
        other => panic!("expected a syntax error, got {other:?}"),
    }
    assert!(h.workspace_names().is_empty());
    assert_eq!(h.errors().len(), 1);
}

#[test]
fn busy_submissions_fail_fast() {
    let mut h = harness();
    h.eval("var a = 1;");
    let before = h.controller.workspace();
    h.events.take();

    let guard = h.controller.state().try_begin().expect("slot free");
    let err = h.eval_err("var b = 2;");
    assert!(err.is_busy());
    assert_eq!(err.to_string(), "busy");
    assert_eq!(h.controller.workspace(), before);
    assert_eq!(h.events.take(), vec![Event::Busy]);
    drop(guard);

    h.eval("var b = 2;");
    assert_eq!(h.workspace_names(), vec!["a", "b"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Error translation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn runtime_errors_point_at_the_submitted_line() {
    let mut h = harness();
    let message = runtime_message(h.eval_err("var a = 1;\nnope();"));
    assert!(message.starts_with("ReferenceError: nope is not defined"), "{message}");
    assert!(message.contains("at (console) line: 2,"), "{message}");
}

#[test]
fn undefined_names_point_at_the_identifier() {
    let mut h = harness();
    let message = runtime_message(h.eval_err("{a: nope2}"));
    assert!(message.starts_with("ReferenceError: nope2 is not defined"), "{message}");
    assert!(message.ends_with("at (console) line: 1, column: 5"), "{message}");

    let message = runtime_message(h.eval_err("var x = 1,\n    y = nope3;"));
    assert!(message.ends_with("at (console) line: 2, column: 9"), "{message}");

    let message = runtime_message(h.eval_err("var a = 1;\nnope();"));
    assert!(message.ends_with("at (console) line: 2, column: 1"), "{message}");
}

#[test]
fn property_errors_point_at_the_property() {
    let mut h = harness();
    let message = runtime_message(h.eval_err("var empty = null;\nvar v = 1 + empty.field;"));
    assert!(
        message.starts_with("TypeError: cannot read property 'field' of null"),
        "{message}"
    );
    assert!(message.ends_with("at (console) line: 2, column: 19"), "{message}");
}

#[test]
fn thrown_non_errors_render_as_uncaught() {
    let mut h = harness();
    let message = runtime_message(h.eval_err("throw 42"));
    assert_eq!(message, "Uncaught 42");
}

#[test]
fn show_stack_appends_the_raw_stack() {
    let mut config = EngineConfig::default();
    config.debug.show_stack = true;
    let mut h = harness_with(config);
    let message = runtime_message(h.eval_err("null.x"));
    assert!(message.contains("line: 1"), "{message}");
    assert!(message.contains("(jsl-eval-"), "{message}");
}

#[test]
fn late_callback_errors_are_translated() {
    let mut h = harness();
    h.eval("setTimeout(() => {\n  throw new Error('late');\n}, 5);");
    h.events.take();
    h.clock.advance_by(10);
    h.controller.pump();
    let errors = h.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].starts_with("Error: late"), "{}", errors[0]);
    assert!(errors[0].contains("line: 2"), "{}", errors[0]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Limits
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn runaway_recursion_is_reported_and_recovered() {
    let mut h = harness();
    let message = runtime_message(h.eval_err("function down(n) { return down(n + 1); }\ndown(0)"));
    assert!(
        message.starts_with("RangeError: Maximum call stack size exceeded"),
        "{message}"
    );
    assert_eq!(h.number("var after = 20; after + 1"), 21.0);
}

#[test]
fn oversized_arrays_are_range_errors() {
    let mut h = harness();
    let message = runtime_message(h.eval_err("[1, 2, 3].length = 1e12"));
    assert!(message.starts_with("RangeError: invalid array length"), "{message}");
    assert_eq!(h.number("var sparse = []; sparse[1e9] = 1; sparse.length"), 1e9 + 1.0);
}

#[test]
fn heap_exhaustion_leaves_the_controller_usable() {
    let mut config = EngineConfig::default();
    config.engine.memory_limit_mb = 64;
    let mut h = harness_with(config);
    h.eval("var kept = [1, 2, 3];");
    let message = runtime_message(h.eval_err("var huge = 'x'.repeat(2 ** 28);"));
    assert!(message.contains("out of memory"), "{message}");
    assert!(!h.workspace_names().contains(&"huge".to_string()));
    assert_eq!(h.number("kept.reduce((a, b) => a + b)"), 6.0);
    h.events.take();
    h.eval("setTimeout(() => { var spare = 1; }, 5);");
    h.clock.advance_by(10);
    h.controller.pump();
    assert!(h.errors().is_empty());
}

#[test]
fn large_integer_literals_keep_their_value() {
    let mut h = harness();
    let expected: f64 = "99999999999999999999999".parse().unwrap();
    assert_eq!(h.number("parseInt('99999999999999999999999')"), expected);
    assert_eq!(h.number("Number('99999999999999999999999')"), expected);
}

// ══════════════════════════════════════════════════════════════════════════════
// Cancellation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn stop_sweeps_running_intervals() {
    let mut h = harness();
    h.eval("var n = 0; setInterval(() => { n++ }, 10);");
    assert_eq!(h.controller.interp().stats().intervals, 1);
    h.clock.advance_by(35);
    h.controller.pump();
    assert_eq!(h.number("n"), 3.0);

    h.events.take();
    h.controller.request_stop();
    h.controller.pump();
    assert!(h.events.take().iter().any(|e| matches!(e, Event::Stopped { .. })));
    assert_eq!(h.controller.interp().stats().intervals, 0);
    assert!(!h.controller.state().is_stop_requested());

    h.clock.advance_by(100);
    h.controller.pump();
    assert_eq!(h.number("n"), 3.0);
}

#[test]
fn stop_detaches_listeners_and_cancels_timers() {
    let mut h = harness();
    h.eval("addEventListener('halt', () => {}); setTimeout(() => {}, 50); requestAnimationFrame(() => {});");
    let stats = h.controller.interp().stats();
    assert_eq!(stats.listeners, 1);
    assert_eq!(stats.pending_timers(), 2);

    h.controller.request_stop();
    h.controller.pump();
    let stats = h.controller.interp().stats();
    assert_eq!(stats.pending_timers(), 0);
    assert_eq!(stats.listeners, 0);
}

#[test]
fn stopped_promises_never_run_their_continuations() {
    let mut h = harness();
    h.eval("var fired = false; var release; var p = new Promise(r => { release = r }); p.then(() => { fired = true }); var done = 1;");
    h.controller.request_stop();
    h.controller.pump();
    h.eval("release(1);");
    h.clock.advance_by(10);
    h.controller.pump();
    assert!(matches!(h.eval("fired"), Value::Bool(false)));
    assert!(matches!(h.eval("p.then(x => x)"), Value::Bool(false)));
}

#[test]
fn runtime_errors_sweep_pending_timers() {
    let mut h = harness();
    h.eval("var hits = 0; setInterval(() => { hits++ }, 10);");
    h.eval_err("undefinedThing.call()");
    assert_eq!(h.controller.interp().stats().intervals, 0);
    h.clock.advance_by(50);
    h.controller.pump();
    assert_eq!(h.number("hits"), 0.0);
}

#[test]
fn awaited_timers_complete_within_the_evaluation() {
    let mut h = harness();
    assert_eq!(h.number("await waitMSeconds(20); 9"), 9.0);
    assert!(h.controller.interp().now_ms() >= 20);
}

// ══════════════════════════════════════════════════════════════════════════════
// Workspace
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn workspace_lists_new_names_in_order() {
    let mut h = harness();
    h.events.take();
    h.eval("var a=1, b=2;");
    assert_eq!(h.workspace_names(), vec!["a", "b"]);
    let published = h.events.take().into_iter().find_map(|e| match e {
        Event::WorkspaceChanged { entries } => Some(entries),
        _ => None,
    });
    let entries = published.expect("workspace published");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].type_name, "number");
    assert_eq!(entries[0].kind_label, "Number");

    h.controller.clear_workspace();
    assert!(h.workspace_names().is_empty());
    assert!(h.events.take().contains(&Event::WorkspaceChanged { entries: vec![] }));
}

#[test]
fn clear_from_code_runs_after_the_evaluation() {
    let mut h = harness();
    h.eval("var a = 1; setTimeout(() => {}, 100);");
    h.eval("var b = 2; clear()");
    assert!(h.workspace_names().is_empty());
    assert_eq!(h.controller.interp().stats().timeouts, 0);
}

#[test]
fn clear_workspace_keeps_the_library() {
    let mut h = harness();
    h.eval("var v = 1;");
    h.controller.clear_workspace();
    assert_eq!(h.number("Math.max(1, 4)"), 4.0);
    assert_eq!(h.workspace_names(), vec!["ans"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Scripts
// ══════════════════════════════════════════════════════════════════════════════

fn script_harness(dir: &Path) -> Harness {
    let mut config = EngineConfig::default();
    config.paths.current = Some(dir.to_path_buf());
    harness_with(config)
}

#[test]
fn scripts_run_with_line_ranges() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("calc.js"), "var s1 = 1;\nvar s2 = 2;\nvar s3 = 3;\n").unwrap();
    let mut h = script_harness(dir.path());

    h.controller
        .run_script(Path::new("calc.js"), Some(LineRange::Span(2, 4)), true)
        .unwrap();
    assert_eq!(h.workspace_names(), vec!["s2", "s3"]);

    let err = h
        .controller
        .run_script(Path::new("calc.js"), Some(LineRange::Line(9)), true)
        .unwrap_err();
    assert_eq!(err.to_string(), "line range out of bounds");
}

#[test]
fn run_last_repeats_the_previous_script() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("count.js"), "var runs = (typeof runs === 'number' ? runs : 0) + 1;").unwrap();
    let mut h = script_harness(dir.path());
    assert!(h.controller.run_last().is_err());
    h.controller.run_script(Path::new("count.js"), None, false).unwrap();
    h.controller.run_last().unwrap();
    assert_eq!(h.number("runs"), 2.0);
}

#[test]
fn missing_scripts_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = script_harness(dir.path());
    h.events.take();
    let err = h.controller.run_script(Path::new("ghost.js"), None, false).unwrap_err();
    assert!(matches!(err, EngineError::Script(_)));
    assert_eq!(h.errors(), vec!["script not found: ghost.js".to_string()]);
}

#[test]
fn switching_scripts_isolates_their_workspaces() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.js"),
        "var fromA = 1;\nfunction helper() { return 'a' }",
    )
    .unwrap();
    fs::write(
        dir.path().join("b.js"),
        "var sawA = jsl.context.fromA === undefined;\nfunction helper() { return 'b' }",
    )
    .unwrap();
    let mut h = script_harness(dir.path());

    h.controller.run_script(Path::new("a.js"), None, true).unwrap();
    h.controller.run_script(Path::new("b.js"), None, true).unwrap();

    assert!(matches!(h.eval("sawA"), Value::Bool(true)));
    assert_eq!(h.number("fromA"), 1.0);
    assert!(matches!(h.eval("helper()"), Value::String(s) if &*s == "b"));
    assert!(h.controller.active_script().is_some());
}

// ══════════════════════════════════════════════════════════════════════════════
// Commands & session
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn commands_drive_the_controller() {
    let mut h = harness();
    h.controller.handle(Command::EvalCommand {
        text: "var c = 3; c * 2".into(),
        show_output: true,
        session_name: Some("main".into()),
    });
    let events = h.events.take();
    assert_eq!(
        events.first(),
        Some(&Event::Started {
            session: Some("main".into())
        })
    );
    assert!(events.contains(&Event::ResultReady {
        value: "6".into(),
        is_large_structure: false,
    }));

    h.controller.handle(Command::ClearWorkspace);
    assert!(h.workspace_names().is_empty());
}

#[test]
fn session_evaluates_on_its_own_thread() {
    let session = Session::spawn(EngineConfig::default()).unwrap();
    session
        .send(Command::EvalCommand {
            text: "6 * 7".into(),
            show_output: true,
            session_name: None,
        })
        .unwrap();
    let events = wait_for(&session, |e| matches!(e, Event::Finished));
    assert!(events.contains(&Event::ResultReady {
        value: "42".into(),
        is_large_structure: false,
    }));
    session.shutdown();
}

#[test]
fn session_stop_interrupts_a_busy_loop() {
    let session = Session::spawn(EngineConfig::default()).unwrap();
    session
        .send(Command::EvalCommand {
            text: "while (true) { checkStop() }".into(),
            show_output: true,
            session_name: None,
        })
        .unwrap();
    wait_for(&session, |e| matches!(e, Event::Started { .. }));
    assert!(session.is_evaluating());

    let busy = session.send(Command::EvalCommand {
        text: "1".into(),
        show_output: true,
        session_name: None,
    });
    assert!(matches!(busy, Err(EngineError::Busy)));

    session.send(Command::StopLoop { flag: true }).unwrap();
    let events = wait_for(&session, |e| matches!(e, Event::Finished));
    assert!(events.contains(&Event::Stopped {
        message: "Evaluation stopped".into(),
    }));
    assert!(!session.is_evaluating());
}
