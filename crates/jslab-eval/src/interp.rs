//! The execution context and its host-facing API.
//!
//! [`Interp`] owns one QuickJS runtime with a single persistent context.
//! Everything natives reach (the ledger, timers, loaded modules, the
//! capability table, buffered host events) lives in [`Host`], which every
//! native shares through an `Rc`.

use crate::builtins;
use crate::cancel::{StopFlag, SweepReport};
use crate::capability::CapabilityTable;
use crate::clock::{Clock, RealClock};
use crate::display::{self, display_value, DisplayOptions};
use crate::error::{EvalError, Interrupt, JsResult, Thrown};
use crate::event_loop::{call_saved, TimerQueue};
use crate::ledger::{LedgerStats, ResourceLedger};
use crate::modules::ModuleCache;
use crate::value::{Saved, Value};
use jslab_parser::parse_source;
use jslab_types::{ErrorCode, JslabError, SourceFile, Span};
use rquickjs::context::EvalOptions;
use rquickjs::{Context, Ctx, Filter, Runtime, Value as JsValue};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

/// Severity of a line printed by evaluated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// Something the host should know about right away.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Output { level: OutputLevel, text: String },
    /// A callback running outside any evaluation threw.
    Uncaught(Thrown),
}

pub type HostHook = Box<dyn FnMut(HostEvent)>;

/// Flags evaluated code raises for the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostRequests {
    /// Output was printed; do not echo the result.
    pub suppress_echo: bool,
    /// Do not store the result as the last answer.
    pub suppress_result: bool,
    /// `clear()` was called.
    pub clear_workspace: bool,
}

#[derive(Debug, Clone)]
pub struct InterpOptions {
    /// Longest sleep between stop-flag polls while waiting on timers.
    pub idle_poll_ms: u64,
    /// Native stack available to script code. Exceeding it throws
    /// `RangeError`. Read once, when the runtime is created.
    pub max_stack_bytes: usize,
    /// Heap limit of the runtime; `0` means unlimited. Read once, when the
    /// runtime is created.
    pub memory_limit_bytes: usize,
    pub display: DisplayOptions,
    /// Base directory for relative module paths.
    pub cwd: PathBuf,
    pub include_dirs: Vec<PathBuf>,
}

impl Default for InterpOptions {
    fn default() -> Self {
        Self {
            idle_poll_ms: 10,
            max_stack_bytes: 512 * 1024,
            memory_limit_bytes: 256 * 1024 * 1024,
            display: DisplayOptions::default(),
            cwd: PathBuf::from("."),
            include_dirs: Vec::new(),
        }
    }
}

/// State shared between the interpreter and its natives.
pub(crate) struct Host {
    pub(crate) stop: RefCell<StopFlag>,
    /// Set while a sweep runs; the stop flag is ignored meanwhile.
    pub(crate) sweeping: Cell<bool>,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) options: RefCell<InterpOptions>,
    pub(crate) ledger: RefCell<ResourceLedger<Saved>>,
    pub(crate) timers: RefCell<TimerQueue>,
    pub(crate) modules: RefCell<ModuleCache>,
    pub(crate) capabilities: RefCell<CapabilityTable>,
    pub(crate) requests: Cell<HostRequests>,
    hook: RefCell<Option<HostHook>>,
    events: RefCell<Vec<HostEvent>>,
}

impl Host {
    fn new(options: InterpOptions, clock: Rc<dyn Clock>) -> Self {
        Self {
            stop: RefCell::new(StopFlag::new()),
            sweeping: Cell::new(false),
            clock,
            options: RefCell::new(options),
            ledger: RefCell::new(ResourceLedger::new()),
            timers: RefCell::new(TimerQueue::default()),
            modules: RefCell::new(ModuleCache::default()),
            capabilities: RefCell::new(CapabilityTable::default()),
            requests: Cell::new(HostRequests::default()),
            hook: RefCell::new(None),
            events: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn stop_requested(&self) -> bool {
        !self.sweeping.get() && self.stop.borrow().is_requested()
    }

    pub(crate) fn check_stop(&self) -> JsResult<()> {
        if self.stop_requested() {
            Err(Interrupt::Stopped)
        } else {
            Ok(())
        }
    }

    pub(crate) fn display_options(&self) -> DisplayOptions {
        self.options.borrow().display.clone()
    }

    /// Classify an engine failure. A pending exception is taken off the
    /// context; once the stop flag is up every failure counts as the stop.
    pub(crate) fn interrupt<'js>(&self, ctx: &Ctx<'js>, error: rquickjs::Error) -> Interrupt {
        let thrown = match error {
            rquickjs::Error::Exception => {
                let value = ctx.catch();
                if self.stop_requested() {
                    return Interrupt::Stopped;
                }
                self.thrown(&value)
            }
            other => {
                if self.stop_requested() {
                    return Interrupt::Stopped;
                }
                Thrown::error("InternalError", other.to_string())
            }
        };
        Interrupt::Throw(thrown)
    }

    /// Snapshot of a thrown value as text.
    pub(crate) fn thrown<'js>(&self, value: &JsValue<'js>) -> Thrown {
        display::thrown(value, &self.display_options())
    }

    pub(crate) fn emit(&self, event: HostEvent) {
        let mut hook = self.hook.borrow_mut();
        match hook.as_mut() {
            Some(hook) => hook(event),
            None => self.events.borrow_mut().push(event),
        }
    }

    pub(crate) fn report_uncaught(&self, thrown: Thrown) {
        debug!(error = %thrown.summary(), "uncaught error in callback");
        self.emit(HostEvent::Uncaught(thrown));
    }

    pub(crate) fn print(&self, level: OutputLevel, text: String) {
        self.request(|r| {
            r.suppress_echo = true;
            r.suppress_result = true;
        });
        self.emit(HostEvent::Output { level, text });
    }

    pub(crate) fn request(&self, f: impl FnOnce(&mut HostRequests)) {
        let mut requests = self.requests.get();
        f(&mut requests);
        self.requests.set(requests);
    }

    pub(crate) fn stats(&self) -> LedgerStats {
        let modules = self.modules.borrow().len();
        self.ledger.borrow().stats(modules)
    }

    /// Compile and run `code` as a sloppy-mode global script.
    pub(crate) fn run_source<'js>(&self, ctx: &Ctx<'js>, code: &str, file: &str) -> JsResult<JsValue<'js>> {
        self.check_stop()?;
        let mut options = EvalOptions::default();
        options.strict = false;
        options.filename = Some(file.to_string());
        ctx.eval_with_options(code, options)
            .map_err(|e| self.interrupt(ctx, e))
    }

    /// Call every listener for `name` with `data`, in registration order.
    pub(crate) fn dispatch<'js>(&self, ctx: &Ctx<'js>, name: &str, data: JsValue<'js>) -> rquickjs::Result<usize> {
        let listeners = self.ledger.borrow().listeners_for(name);
        for listener in &listeners {
            call_saved(ctx, listener, Some(data.clone()), &[])?;
        }
        Ok(listeners.len())
    }

    /// Drop every pinned engine value. Must run before the runtime goes.
    fn release(&self) {
        let ledger = self.ledger.replace(ResourceLedger::new());
        drop(ledger);
        self.timers.borrow_mut().clear();
        self.modules.borrow_mut().clear();
    }
}

/// The persistent execution context and everything evaluated code can
/// reach.
pub struct Interp {
    host: Rc<Host>,
    context: Context,
    runtime: Runtime,
}

impl Interp {
    /// Interpreter on the wall clock.
    pub fn new(options: InterpOptions) -> Result<Self, EvalError> {
        Self::with_clock(options, Rc::new(RealClock::new()))
    }

    pub fn with_clock(options: InterpOptions, clock: Rc<dyn Clock>) -> Result<Self, EvalError> {
        let runtime = Runtime::new()?;
        runtime.set_max_stack_size(options.max_stack_bytes);
        if options.memory_limit_bytes > 0 {
            runtime.set_memory_limit(options.memory_limit_bytes);
        }
        let context = Context::full(&runtime)?;
        let host = Rc::new(Host::new(options, clock));

        let weak = Rc::downgrade(&host);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            weak.upgrade().is_some_and(|host| host.stop_requested())
        })));
        context.with(|ctx| builtins::install(&ctx, &host))?;
        debug!(
            capabilities = host.capabilities.borrow().len(),
            "execution context ready"
        );
        Ok(Self {
            host,
            context,
            runtime,
        })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Host API
    // ══════════════════════════════════════════════════════════════════════

    pub fn stop_flag(&self) -> StopFlag {
        self.host.stop.borrow().clone()
    }

    /// Share an externally owned stop flag.
    pub fn set_stop_flag(&mut self, flag: StopFlag) {
        *self.host.stop.borrow_mut() = flag;
    }

    pub fn options(&self) -> Ref<'_, InterpOptions> {
        self.host.options.borrow()
    }

    pub fn options_mut(&mut self) -> RefMut<'_, InterpOptions> {
        self.host.options.borrow_mut()
    }

    pub fn now_ms(&self) -> u64 {
        self.host.now_ms()
    }

    /// Receive host events as they happen instead of buffering them.
    pub fn set_host_hook(&mut self, hook: HostHook) {
        *self.host.hook.borrow_mut() = Some(hook);
    }

    /// Events buffered while no hook was installed.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        self.host.events.take()
    }

    pub fn take_requests(&mut self) -> HostRequests {
        self.host.requests.take()
    }

    pub fn capabilities(&self) -> Ref<'_, CapabilityTable> {
        self.host.capabilities.borrow()
    }

    /// Own string-keyed properties of the global object, in creation order.
    pub fn global_names(&self) -> Vec<String> {
        self.context.with(|ctx| {
            ctx.globals()
                .own_keys::<String>(Filter::new().string())
                .filter_map(Result::ok)
                .collect()
        })
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.context.with(|ctx| {
            let globals = ctx.globals();
            let found = globals
                .contains_key(name)
                .and_then(|present| present.then(|| globals.get::<_, JsValue>(name)).transpose());
            match found {
                Ok(value) => value.map(|v| Value::from_js(&self.context, &ctx, v)),
                Err(e) => {
                    let _ = self.host.interrupt(&ctx, e);
                    None
                }
            }
        })
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.context.with(|ctx| {
            let result = value.to_js(&ctx).and_then(|v| ctx.globals().set(name, v));
            if let Err(e) = result {
                let error = self.host.interrupt(&ctx, e);
                warn!(name, ?error, "could not set context property");
            }
        });
    }

    /// Remove a context property, keeping the order of the rest.
    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        let value = self.get_global(name)?;
        self.context.with(|ctx| {
            if let Err(e) = ctx.globals().remove(name) {
                let error = self.host.interrupt(&ctx, e);
                warn!(name, ?error, "could not remove context property");
            }
        });
        Some(value)
    }

    pub fn stats(&self) -> LedgerStats {
        self.host.stats()
    }

    /// Registry sizes, when anything changed since the last call.
    pub fn take_stats_change(&mut self) -> Option<LedgerStats> {
        let changed = self.host.ledger.borrow_mut().take_changed();
        changed.then(|| self.stats())
    }

    /// Render a value the way the console prints results.
    pub fn display(&self, value: &Value) -> String {
        let options = self.host.display_options();
        self.with_value(value, |v| display_value(v, &options, true))
            .unwrap_or_else(|| "<unknown>".to_string())
    }

    /// Whether a result counts as a large structure for the host.
    pub fn is_large_structure(&self, value: &Value) -> bool {
        let threshold = self.host.options.borrow().display.large_structure_threshold;
        value.as_handle().is_some()
            && self
                .with_value(value, display::entry_count)
                .is_some_and(|count| count > threshold)
    }

    /// Run `code` as a script, returning the value of its last expression
    /// statement.
    pub fn run_script(&mut self, code: &str, file: &str) -> Result<Value, EvalError> {
        check_syntax(code, file)?;
        self.context.with(|ctx| {
            let completion = self.host.run_source(&ctx, code, file)?;
            Ok(Value::from_js(&self.context, &ctx, completion))
        })
    }

    /// Run `code` and drive the event loop until its value settles.
    #[instrument(level = "debug", skip(self, code))]
    pub fn evaluate(&mut self, code: &str, file: &str) -> Result<Value, EvalError> {
        check_syntax(code, file)?;
        self.context.with(|ctx| {
            let completion = self.host.run_source(&ctx, code, file)?;
            let settled = self.host.await_value(&ctx, completion)?;
            Ok(Value::from_js(&self.context, &ctx, settled))
        })
    }

    /// Dispatch a host event to script listeners.
    pub fn dispatch_event(&mut self, name: &str, data: Value) -> Result<usize, EvalError> {
        self.context.with(|ctx| {
            let result = data
                .to_js(&ctx)
                .and_then(|data| self.host.dispatch(&ctx, name, data));
            result.map_err(|e| EvalError::from(self.host.interrupt(&ctx, e)))
        })
    }

    /// Neutralize every tracked resource.
    pub fn sweep(&mut self) -> SweepReport {
        self.context.with(|ctx| self.host.sweep(&ctx))
    }

    /// Run whatever the event loop has ready without waiting.
    pub fn pump(&mut self) -> Result<(), Interrupt> {
        self.context.with(|ctx| self.host.pump(&ctx))
    }

    /// Forget every loaded module.
    pub fn clear_modules(&mut self) -> usize {
        let mut modules = self.host.modules.borrow_mut();
        let count = modules.len();
        modules.clear();
        if count > 0 {
            self.host.ledger.borrow_mut().mark_changed();
        }
        count
    }

    /// `require(spec)` from the host side.
    pub fn require(&mut self, spec: &str) -> Result<Value, EvalError> {
        self.context.with(|ctx| {
            let exports = self
                .host
                .require(&ctx, spec)
                .map_err(|e| self.host.interrupt(&ctx, e))?;
            Ok(Value::from_js(&self.context, &ctx, exports))
        })
    }

    /// Drop `spec` from the module cache so the next `require` reloads it.
    pub fn unrequire(&mut self, spec: &str) -> bool {
        self.host.unrequire(spec)
    }

    pub fn resolve_module(&self, spec: &str) -> Option<PathBuf> {
        self.host.resolve_module(spec)
    }

    /// Run `f` on the engine value behind `value`. `None` when the value
    /// belongs to another runtime.
    fn with_value<R>(&self, value: &Value, f: impl for<'js> FnOnce(&JsValue<'js>) -> R) -> Option<R> {
        self.context.with(|ctx| match value.to_js(&ctx) {
            Ok(v) => Some(f(&v)),
            Err(_) => {
                ctx.catch();
                None
            }
        })
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        self.runtime.set_interrupt_handler(None);
        self.host.release();
    }
}

/// Reject text the console grammar cannot parse, with a located error.
pub(crate) fn check_syntax(code: &str, file: &str) -> Result<(), EvalError> {
    let source = SourceFile::new(file, code);
    let parsed = parse_source(&source);
    if parsed.program.is_some() {
        return Ok(());
    }
    Err(EvalError::Parse(match parsed.errors.first() {
        Some(e) => e.clone(),
        None => JslabError::new(file, ErrorCode::UNEXPECTED_TOKEN, "invalid syntax", Span::point(1, 1), ""),
    }))
}
