//! Session thread.
//!
//! The interpreter is single-threaded, so a session owns it on a dedicated
//! worker thread. The host talks to the worker through a [`Command`] channel
//! and listens on an [`Event`] channel. Only the [`EvalState`] flags are
//! shared directly, so a stop request reaches an evaluation that is busy and
//! not reading commands.

use crate::config::EngineConfig;
use crate::controller::Controller;
use crate::error::EngineError;
use crate::protocol::{Command, Event, EventSink};
use crate::state::EvalState;
use jslab_eval::RealClock;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

// ══════════════════════════════════════════════════════════════════════════
// Handle
// ══════════════════════════════════════════════════════════════════════════

/// Host-side handle of a running session.
pub struct Session {
    id: u64,
    commands: mpsc::Sender<Command>,
    events: mpsc::Receiver<Event>,
    state: EvalState,
    thread: Option<JoinHandle<()>>,
}

impl Session {
    /// Start a worker thread with its own execution context.
    pub fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (event_tx, event_rx) = mpsc::channel::<Event>();
        let state = EvalState::new();

        let worker_state = state.clone();
        let thread = std::thread::Builder::new()
            .name(format!("jslab-session-{id}"))
            .spawn(move || session_main(config, cmd_rx, event_tx, worker_state))?;
        info!(session = id, "session started");

        Ok(Self {
            id,
            commands: cmd_tx,
            events: event_rx,
            state,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a command. Evaluating commands are refused with
    /// [`EngineError::Busy`] while an evaluation is in flight; stop
    /// requests take effect immediately.
    pub fn send(&self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::StopLoop { flag: true } => {
                self.state.request_stop();
                Ok(())
            }
            Command::StopLoop { flag: false } => {
                self.state.reset_stop();
                Ok(())
            }
            command if command.evaluates() && self.state.is_evaluating() => Err(EngineError::Busy),
            command => self.commands.send(command).map_err(|_| EngineError::Closed),
        }
    }

    pub fn request_stop(&self) {
        self.state.request_stop();
    }

    pub fn is_evaluating(&self) -> bool {
        self.state.is_evaluating()
    }

    pub fn events(&self) -> &mpsc::Receiver<Event> {
        &self.events
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<Event> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Events already delivered, without waiting.
    pub fn pending_events(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.state.request_stop();
        let _ = self.commands.send(Command::Shutdown);
        if thread.join().is_err() {
            warn!(session = self.id, "session thread panicked");
        }
        info!(session = self.id, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.finish();
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Worker
// ══════════════════════════════════════════════════════════════════════════

fn session_main(
    config: EngineConfig,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
    state: EvalState,
) {
    let poll = Duration::from_millis(config.engine.idle_poll_ms.max(1));
    let sink: Rc<dyn EventSink> = Rc::new(events);
    let mut controller =
        match Controller::with_parts(config, Rc::clone(&sink), Rc::new(RealClock::new()), state) {
            Ok(controller) => controller,
            Err(e) => {
                error!(error = %e, "session could not start");
                sink.emit(Event::ErrorReported {
                    message: e.to_string(),
                });
                return;
            }
        };

    loop {
        match commands.recv_timeout(poll) {
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => controller.handle(command),
            Err(RecvTimeoutError::Timeout) => {}
        }
        controller.pump();
    }
    controller.shutdown();
}
