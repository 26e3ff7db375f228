//! JSLab engine: the host side of an incremental evaluation session.
//!
//! ```text
//! Command ─► Session thread ─► Controller ─► rewrite ─► Interp
//!                                  │
//!                                  ├─ ErrorTranslator (source maps)
//!                                  ├─ Differ (workspace snapshot)
//!                                  └─► Event ─► host
//! ```
//!
//! [`Controller`] can also be driven directly on the current thread, which
//! is how the tests and the one-shot CLI commands use it.

pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod scripts;
pub mod session;
pub mod state;
pub mod translator;
pub mod workspace;

pub use config::EngineConfig;
pub use controller::{Controller, Origin, Submission, STOPPED_MESSAGE};
pub use error::EngineError;
pub use protocol::{Command, Event, EventLog, EventSink};
pub use scripts::LineRange;
pub use session::Session;
pub use state::{EvalGuard, EvalState};
pub use translator::{ErrorTranslator, StackFrame};
pub use workspace::{Differ, Stash, WorkspaceEntry};

pub use jslab_eval::{LedgerStats, OutputLevel, Value};
