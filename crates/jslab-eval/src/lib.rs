//! JSLab host evaluator.
//!
//! Runs rewritten console submissions in a persistent QuickJS context and
//! owns everything that outlives a single evaluation:
//!
//! - the execution context and its capability table,
//! - the event loop (promise jobs, immediates, timers, animation frames,
//!   idle callbacks) driven by an injectable [`Clock`],
//! - the Resource Ledger tracking every timer, promise, listener,
//!   subprocess and cleanup callback evaluated code creates,
//! - the Cancellation Coordinator: a shared [`StopFlag`] polled by the
//!   engine's interrupt handler, every loop turn and `checkStop()`, and
//!   [`Interp::sweep`].
//!
//! ```text
//! rewritten code → Interp::evaluate → await completion → Value | EvalError
//! ```

mod builtins;
pub mod cancel;
pub mod capability;
pub mod clock;
pub mod display;
pub mod error;
pub mod event_loop;
pub mod interp;
pub mod ledger;
pub mod modules;
pub mod value;

pub use builtins::PRELUDE_FILE;
pub use cancel::{StopFlag, SweepReport};
pub use capability::{Capability, CapabilityTable};
pub use clock::{Clock, ManualClock, RealClock};
pub use display::{constructor_name, display_value, DisplayOptions};
pub use error::{EvalError, Interrupt, JsResult, Thrown};
pub use interp::{HostEvent, HostHook, HostRequests, Interp, InterpOptions, OutputLevel};
pub use ledger::{LedgerStats, ResourceKind};
pub use value::{Handle, Value, INERT_SENTINEL};
