//! Execution Controller.
//!
//! Owns the interpreter and sequences one submission at a time:
//!
//! ```text
//! busy check → stash workspace → rewrite → restore → evaluate
//!            → publish result or translated error → workspace, stats
//! ```
//!
//! Everything the host sees goes out through an [`EventSink`].

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::protocol::{Command, Event, EventSink};
use crate::scripts::{self, LineRange, ScriptRun};
use crate::state::EvalState;
use crate::translator::ErrorTranslator;
use crate::workspace::{Differ, Stash, WorkspaceEntry};
use jslab_eval::{
    Clock, EvalError, HostEvent, HostRequests, Interp, Interrupt, RealClock, SweepReport, Thrown,
    Value,
};
use jslab_rewrite::{ScriptRewriter, SourceRewriter, CONSOLE_SOURCE};
use jslab_types::{ErrorCode, JslabError, Span};
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, error, info, instrument, warn};

/// Informational message for a stopped evaluation.
pub const STOPPED_MESSAGE: &str = "Evaluation stopped";

// ══════════════════════════════════════════════════════════════════════════
// Submissions
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    CommandWindow,
    Script(PathBuf),
}

impl Origin {
    /// Source name recorded in the source map.
    pub fn source_name(&self) -> String {
        match self {
            Origin::CommandWindow => CONSOLE_SOURCE.to_string(),
            Origin::Script(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_name())
    }
}

/// One piece of text to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    /// Echo the result to the host.
    pub display: bool,
    pub origin: Origin,
    pub session: Option<String>,
}

impl Submission {
    /// Text typed into the command window.
    pub fn console(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            display: true,
            origin: Origin::CommandWindow,
            session: None,
        }
    }

    pub fn script(text: impl Into<String>, path: impl Into<PathBuf>, display: bool) -> Self {
        Self {
            text: text.into(),
            display,
            origin: Origin::Script(path.into()),
            session: None,
        }
    }

    pub fn with_session(mut self, session: Option<String>) -> Self {
        self.session = session;
        self
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Controller
// ══════════════════════════════════════════════════════════════════════════

pub struct Controller {
    interp: Interp,
    rewriter: Box<dyn SourceRewriter>,
    translator: ErrorTranslator,
    differ: Differ,
    state: EvalState,
    config: EngineConfig,
    sink: Rc<dyn EventSink>,
    /// Errors thrown by callbacks, waiting to be translated.
    late_errors: Rc<RefCell<Vec<Thrown>>>,
    active_script: Option<PathBuf>,
    last_script: Option<ScriptRun>,
}

impl Controller {
    pub fn new(config: EngineConfig, sink: Rc<dyn EventSink>) -> Result<Self, EngineError> {
        Self::with_parts(config, sink, Rc::new(RealClock::new()), EvalState::new())
    }

    /// Build around an explicit clock and shared evaluation state.
    pub fn with_parts(
        config: EngineConfig,
        sink: Rc<dyn EventSink>,
        clock: Rc<dyn Clock>,
        state: EvalState,
    ) -> Result<Self, EngineError> {
        let mut interp = Interp::with_clock(config.interp_options(), clock)
            .map_err(|e| EngineError::Startup(e.to_string()))?;
        interp.set_stop_flag(state.stop_flag());

        let mut rewriter = ScriptRewriter::new(config.rewrite_options());
        rewriter.forbid(interp.capabilities().protected_names());

        let late_errors: Rc<RefCell<Vec<Thrown>>> = Rc::default();
        let hook_sink = Rc::clone(&sink);
        let hook_errors = Rc::clone(&late_errors);
        interp.set_host_hook(Box::new(move |event: HostEvent| match event {
            HostEvent::Output { level, text } => hook_sink.emit(Event::Output { level, text }),
            HostEvent::Uncaught(thrown) => hook_errors.borrow_mut().push(thrown),
        }));

        let differ = Differ::capture(&interp);
        info!(
            capabilities = interp.capabilities().len(),
            baseline = differ.baseline_len(),
            "execution context ready"
        );
        Ok(Self {
            interp,
            rewriter: Box::new(rewriter),
            translator: ErrorTranslator::new(
                config.engine.source_map_retention,
                config.debug.show_stack,
            ),
            differ,
            state,
            config,
            sink,
            late_errors,
            active_script: None,
            last_script: None,
        })
    }

    /// Swap the parser/printer boundary.
    pub fn set_rewriter(&mut self, rewriter: Box<dyn SourceRewriter>) {
        self.rewriter = rewriter;
    }

    pub fn interp(&self) -> &Interp {
        &self.interp
    }

    pub fn interp_mut(&mut self) -> &mut Interp {
        &mut self.interp
    }

    pub fn state(&self) -> &EvalState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workspace(&self) -> Vec<WorkspaceEntry> {
        self.differ.snapshot(&self.interp)
    }

    pub fn active_script(&self) -> Option<&Path> {
        self.active_script.as_deref()
    }

    // ── Evaluation ──────────────────────────────────────────────────────

    /// Evaluate one submission. Fails fast with [`EngineError::Busy`] when
    /// another evaluation holds the slot.
    #[instrument(level = "debug", skip(self, submission), fields(origin = %submission.origin))]
    pub fn evaluate(&mut self, submission: &Submission) -> Result<Value, EngineError> {
        let Some(guard) = self.state.try_begin() else {
            warn!("evaluation rejected: busy");
            self.sink.emit(Event::Busy);
            return Err(EngineError::Busy);
        };
        self.state.reset_stop();
        self.interp.take_requests();
        self.sink.emit(Event::Started {
            session: submission.session.clone(),
        });
        info!("evaluation started");

        let switch_stash = self.switch_script(&submission.origin);
        let mut redeclared = Vec::new();
        let result = self.run(submission, &mut redeclared);
        if let Some(stash) = switch_stash {
            let restored = stash.restore(&mut self.interp, &redeclared);
            debug!(restored = restored.len(), "restored stashed workspace");
        }

        let requests = self.interp.take_requests();
        match &result {
            Ok(value) => self.publish_result(value, submission.display, requests),
            Err(EngineError::Stopped) => {
                info!("evaluation stopped");
                self.sink.emit(Event::Stopped {
                    message: STOPPED_MESSAGE.into(),
                });
            }
            Err(e) => {
                debug!(error = %e, "evaluation failed");
                self.sink.emit(Event::ErrorReported {
                    message: e.to_string(),
                });
            }
        }
        self.forward_late_errors();
        self.publish_workspace();
        self.publish_stats();
        drop(guard);
        self.sink.emit(Event::Finished);
        info!(ok = result.is_ok(), "evaluation finished");

        if requests.clear_workspace {
            self.clear_workspace();
        }
        result
    }

    fn run(
        &mut self,
        submission: &Submission,
        redeclared: &mut Vec<String>,
    ) -> Result<Value, EngineError> {
        let names = self.differ.user_names(&self.interp);
        let saved = Stash::take(&mut self.interp, &names);
        let rewritten = match self
            .rewriter
            .rewrite_named(&submission.text, &submission.origin.source_name())
        {
            Ok(r) => r,
            Err(e) => {
                saved.restore(&mut self.interp, &[]);
                return Err(e.into());
            }
        };
        saved.restore(&mut self.interp, &rewritten.names);
        redeclared.clone_from(&rewritten.names);

        self.translator.register(&rewritten.file, rewritten.map);
        match self.interp.evaluate(&rewritten.code, &rewritten.file) {
            Ok(value) => Ok(value),
            Err(e) => Err(self.failure(e)),
        }
    }

    /// Turn an evaluator failure into an engine error. Every failure sweeps.
    fn failure(&mut self, error: EvalError) -> EngineError {
        let failure = match error {
            EvalError::Stopped => EngineError::Stopped,
            EvalError::Uncaught(thrown) => EngineError::Runtime(self.translator.translate(&thrown)),
            EvalError::Parse(e) => {
                error!(error = %e.render(), "rewritten code failed to parse");
                EngineError::Runtime(e.render())
            }
        };
        self.sweep();
        failure
    }

    fn publish_result(&mut self, value: &Value, display: bool, requests: HostRequests) {
        if requests.suppress_result || value.is_undefined() {
            return;
        }
        let name = self.config.engine.result_name.clone();
        self.interp.set_global(&name, value.clone());
        if display && !requests.suppress_echo {
            self.sink.emit(Event::ResultReady {
                value: self.interp.display(value),
                is_large_structure: self.interp.is_large_structure(value),
            });
        }
    }

    /// Stash the workspace when a different script becomes active.
    fn switch_script(&mut self, origin: &Origin) -> Option<Stash> {
        let Origin::Script(path) = origin else {
            return None;
        };
        if !self.config.workspace.isolate_scripts || self.active_script.as_ref() == Some(path) {
            return None;
        }
        let previous = self.active_script.replace(path.clone())?;
        let names = self.differ.user_names(&self.interp);
        info!(
            from = %previous.display(),
            to = %path.display(),
            stashed = names.len(),
            "active script changed"
        );
        Some(Stash::take(&mut self.interp, &names))
    }

    // ── Scripts ─────────────────────────────────────────────────────────

    pub fn run_script(
        &mut self,
        path: &Path,
        range: Option<LineRange>,
        silent: bool,
    ) -> Result<Value, EngineError> {
        let text = scripts::resolve(path, &self.config.paths)
            .and_then(|resolved| {
                let text = scripts::read(&resolved)?;
                scripts::select_lines(&text, range, &resolved).map(|t| (resolved, t))
            });
        let (resolved, text) = match text {
            Ok(found) => found,
            Err(e) => {
                self.sink.emit(Event::ErrorReported {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        self.last_script = Some(ScriptRun {
            path: path.to_path_buf(),
            range,
            silent,
        });
        debug!(script = %resolved.display(), "running script");
        self.evaluate(&Submission::script(text, resolved, !silent))
    }

    /// Run the last script again with the same range and echo setting.
    pub fn run_last(&mut self) -> Result<Value, EngineError> {
        let Some(last) = self.last_script.clone() else {
            let e = EngineError::Script(JslabError::new(
                "",
                ErrorCode::SCRIPT_NOT_FOUND,
                "no script has been run",
                Span::point(1, 1),
                "",
            ));
            self.sink.emit(Event::ErrorReported {
                message: e.to_string(),
            });
            return Err(e);
        };
        self.run_script(&last.path, last.range, last.silent)
    }

    pub fn set_path(&mut self, dir: PathBuf) {
        info!(dir = %dir.display(), "working directory changed");
        self.interp.options_mut().cwd = dir.clone();
        self.config.paths.current = Some(dir);
    }

    pub fn set_saved_paths(&mut self, dirs: Vec<PathBuf>) {
        debug!(count = dirs.len(), "saved paths replaced");
        self.config.paths.saved = dirs;
    }

    // ── Cancellation & clearing ─────────────────────────────────────────

    pub fn request_stop(&self) {
        self.state.request_stop();
    }

    /// Neutralize every registered resource.
    pub fn sweep(&mut self) -> SweepReport {
        let report = self.interp.sweep();
        self.state.reset_stop();
        report
    }

    /// Sweep, forget modules and remove every workspace name.
    pub fn clear_workspace(&mut self) {
        let report = self.sweep();
        let modules = self.interp.clear_modules();
        let removed = self.differ.clear(&mut self.interp);
        self.active_script = None;
        info!(removed, modules, swept = report.total(), "workspace cleared");
        self.publish_workspace();
        self.publish_stats();
    }

    /// Run callbacks that are due while no evaluation is in flight.
    pub fn pump(&mut self) {
        if let Err(Interrupt::Stopped) = self.interp.pump() {
            let report = self.sweep();
            info!(swept = report.total(), "event loop stopped");
            self.sink.emit(Event::Stopped {
                message: STOPPED_MESSAGE.into(),
            });
        }
        self.forward_late_errors();
        self.publish_stats();
    }

    pub fn shutdown(&mut self) {
        let report = self.sweep();
        info!(swept = report.total(), "controller shut down");
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Execute one inbound command. Failures are reported as events.
    pub fn handle(&mut self, command: Command) {
        let result = match command {
            Command::EvalCommand {
                text,
                show_output,
                session_name,
            } => {
                let mut submission = Submission::console(text).with_session(session_name);
                submission.display = show_output;
                self.evaluate(&submission).map(drop)
            }
            Command::RunScript {
                path,
                line_range,
                silent,
            } => self.run_script(&path, line_range, silent).map(drop),
            Command::StopLoop { flag } => {
                if flag {
                    self.request_stop();
                } else {
                    self.state.reset_stop();
                }
                Ok(())
            }
            Command::ClearWorkspace => {
                self.clear_workspace();
                Ok(())
            }
            Command::RunLast => self.run_last().map(drop),
            Command::SetPath { dir } => {
                self.set_path(dir);
                Ok(())
            }
            Command::SetSavedPaths { dirs } => {
                self.set_saved_paths(dirs);
                Ok(())
            }
            Command::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!(error = %e, "command failed");
        }
    }

    // ── Publishing ──────────────────────────────────────────────────────

    fn forward_late_errors(&mut self) {
        let errors = std::mem::take(&mut *self.late_errors.borrow_mut());
        for thrown in errors {
            let message = self.translator.translate(&thrown);
            warn!(%message, "uncaught error in callback");
            self.sink.emit(Event::ErrorReported { message });
        }
    }

    fn publish_workspace(&mut self) {
        self.sink.emit(Event::WorkspaceChanged {
            entries: self.workspace(),
        });
    }

    fn publish_stats(&mut self) {
        if let Some(stats) = self.interp.take_stats_change() {
            self.sink.emit(Event::stats(stats));
        }
    }
}
