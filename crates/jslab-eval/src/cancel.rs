//! Cancellation Coordinator.
//!
//! The host raises a shared flag. The engine's interrupt handler sees it
//! while script code runs, `checkStop()` and every event-loop turn see it
//! between callbacks, and the resulting uncatchable error unwinds to the
//! host as `Stopped`. The sweep then neutralizes every resource the ledger
//! knows about.

use crate::builtins::INERT_KEY;
use crate::interp::Host;
use crate::ledger::{Cleanup, ResourceKind};
use crate::value::Saved;
use rquickjs::function::This;
use rquickjs::{Ctx, Value as JsValue};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stop request shared between the evaluating thread and its controllers.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one sweep neutralized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub listeners: usize,
    pub immediates: usize,
    pub animation_frames: usize,
    pub idle_callbacks: usize,
    pub intervals: usize,
    pub timeouts: usize,
    pub promises: usize,
    pub subprocesses: usize,
    pub cleanups: usize,
    pub cleanup_failures: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.listeners
            + self.immediates
            + self.animation_frames
            + self.idle_callbacks
            + self.intervals
            + self.timeouts
            + self.promises
            + self.subprocesses
            + self.cleanups
    }
}

impl Host {
    /// Neutralize every tracked resource, in order: listeners; immediates,
    /// animation frames and idle callbacks; intervals and timeouts;
    /// promises; subprocesses; cleanup callbacks.
    ///
    /// Runs with interrupts suppressed so cleanup callbacks complete even
    /// while the stop flag is still raised.
    pub(crate) fn sweep<'js>(&self, ctx: &Ctx<'js>) -> SweepReport {
        self.sweeping.set(true);
        let report = self.sweep_all(ctx);
        self.sweeping.set(false);
        info!(?report, "swept resources");
        report
    }

    fn sweep_all<'js>(&self, ctx: &Ctx<'js>) -> SweepReport {
        let mut ledger = self.ledger.borrow_mut();
        let mut report = SweepReport {
            listeners: ledger.drain_listeners().len(),
            ..SweepReport::default()
        };

        report.immediates = ledger.drain_tasks(ResourceKind::Immediate).len();
        report.animation_frames = ledger.drain_tasks(ResourceKind::AnimationFrame).len();
        report.idle_callbacks = ledger.drain_tasks(ResourceKind::IdleCallback).len();

        report.intervals = ledger.drain_tasks(ResourceKind::Interval).len();
        report.timeouts = ledger.drain_tasks(ResourceKind::Timeout).len();
        self.timers.borrow_mut().clear();

        let promises = ledger.drain_promises();
        report.promises = promises.len();
        report.subprocesses = ledger.terminate_subprocesses();
        let cleanups = ledger.drain_cleanups();
        drop(ledger);

        for promise in promises {
            if let Err(e) = make_inert(ctx, promise) {
                debug!(error = %e, "could not mark promise inert");
            }
        }

        for cleanup in cleanups {
            report.cleanups += 1;
            if let Err(e) = run_cleanup(ctx, &cleanup) {
                report.cleanup_failures += 1;
                let error = match e {
                    rquickjs::Error::Exception => self.thrown(&ctx.catch()).summary(),
                    other => other.to_string(),
                };
                warn!(%error, "cleanup callback failed");
            }
        }
        report
    }
}

/// Mark a tracked promise so `then`/`catch`/`finally` return the inert
/// sentinel and reactions already attached never run.
fn make_inert<'js>(ctx: &Ctx<'js>, promise: Saved) -> rquickjs::Result<()> {
    let promise = promise.restore(ctx)?;
    if let Some(obj) = promise.as_object() {
        obj.set(INERT_KEY, true)?;
    }
    Ok(())
}

/// `callback(target)`, or `target._jslabCleanup()` without a callback.
fn run_cleanup<'js>(ctx: &Ctx<'js>, cleanup: &Cleanup<Saved>) -> rquickjs::Result<()> {
    let target = cleanup.target.clone().restore(ctx)?;
    let callback = match &cleanup.callback {
        Some(cb) => cb.clone().restore(ctx)?,
        None => JsValue::new_undefined(ctx.clone()),
    };
    if let Some(f) = callback.as_function() {
        f.call::<_, ()>((target,))?;
        return Ok(());
    }
    let Some(obj) = target.as_object() else {
        return Ok(());
    };
    let method: JsValue = obj.get("_jslabCleanup")?;
    if let Some(f) = method.as_function() {
        f.call::<_, ()>((This(target.clone()),))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_shared() {
        let flag = StopFlag::new();
        let other = flag.clone();
        other.request();
        assert!(flag.is_requested());
        flag.reset();
        assert!(!other.is_requested());
    }

    #[test]
    fn test_report_total() {
        let report = SweepReport {
            intervals: 2,
            promises: 1,
            cleanups: 1,
            cleanup_failures: 1,
            ..SweepReport::default()
        };
        assert_eq!(report.total(), 4);
    }
}
