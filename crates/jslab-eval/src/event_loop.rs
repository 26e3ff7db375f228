//! Event loop: promise jobs, immediates, timers, animation frames and idle
//! callbacks, in that priority.
//!
//! The loop never runs on its own. Awaiting a completion drives it until
//! the awaited promise settles, and the host pumps it between evaluations.
//! The stop flag is polled on every turn.

use crate::error::{Interrupt, JsResult};
use crate::interp::Host;
use crate::ledger::ResourceKind;
use crate::value::Saved;
use rquickjs::function::Rest;
use rquickjs::promise::PromiseState;
use rquickjs::{Ctx, Exception, Function, Object, Value as JsValue};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Cadence of animation frames.
pub const FRAME_MS: u64 = 16;

/// Upper bound on work done by one pump.
const MAX_PUMP_TURNS: usize = 10_000;

/// `timeRemaining()` reported to idle callbacks.
const IDLE_BUDGET_MS: f64 = 50.0;

/// Entry for a pending timer.
#[derive(Debug, Clone)]
pub(crate) struct TimerEntry {
    fire_at_ms: u64,
    /// Insertion order, breaking ties between equal deadlines.
    seq: u64,
    id: u64,
    kind: ResourceKind,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at_ms == other.fire_at_ms && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest deadline first.
        other
            .fire_at_ms
            .cmp(&self.fire_at_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deadlines of timeouts, intervals and animation frames. Registrations
/// live in the ledger; an entry whose registration is gone is skipped.
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    seq: u64,
}

impl TimerQueue {
    pub(crate) fn schedule_at(&mut self, id: u64, kind: ResourceKind, fire_at_ms: u64) {
        self.seq += 1;
        self.heap.push(TimerEntry {
            fire_at_ms,
            seq: self.seq,
            id,
            kind,
        });
    }

    fn peek(&self) -> Option<&TimerEntry> {
        self.heap.peek()
    }

    fn pop(&mut self) -> Option<TimerEntry> {
        self.heap.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Call a pinned callback with `leading` followed by the pinned `rest`.
/// Values that are not functions are ignored.
pub(crate) fn call_saved<'js>(
    ctx: &Ctx<'js>,
    callback: &Saved,
    leading: Option<JsValue<'js>>,
    rest: &[Saved],
) -> rquickjs::Result<JsValue<'js>> {
    let callback = callback.clone().restore(ctx)?;
    let Some(f) = callback.as_function() else {
        return Ok(JsValue::new_undefined(ctx.clone()));
    };
    let mut args = Vec::with_capacity(rest.len() + 1);
    args.extend(leading);
    for arg in rest {
        args.push(arg.clone().restore(ctx)?);
    }
    f.call((Rest(args),))
}

impl Host {
    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Put `id` on the timer heap `delay_ms` from now.
    pub(crate) fn schedule(&self, id: u64, kind: ResourceKind, delay_ms: u64) {
        let at = self.now_ms() + delay_ms;
        self.timers.borrow_mut().schedule_at(id, kind, at);
    }

    /// Next animation frame boundary after now.
    pub(crate) fn next_frame_ms(&self) -> u64 {
        (self.now_ms() / FRAME_MS + 1) * FRAME_MS
    }

    /// Run one unit of ready work. When nothing is ready and `wait` is set,
    /// sleep toward the next timer instead. Returns `false` when there was
    /// nothing to do (and, with `wait`, nothing left to wait for).
    pub(crate) fn run_turn<'js>(&self, ctx: &Ctx<'js>, wait: bool) -> JsResult<bool> {
        self.check_stop()?;
        if ctx.execute_pending_job() {
            // Reactions settle their own promises; anything left pending
            // here was raised by the engine itself.
            let stray = ctx.catch();
            self.check_stop()?;
            if stray.is_error() {
                trace!(error = %self.thrown(&stray).summary(), "promise job failed");
            }
            return Ok(true);
        }
        let immediate = self.ledger.borrow().first_task(ResourceKind::Immediate);
        if let Some(id) = immediate {
            self.fire_task(ctx, ResourceKind::Immediate, id, None)?;
            return Ok(true);
        }
        self.ledger.borrow_mut().reap_subprocesses();

        let now = self.now_ms();
        self.prune_timers();
        let due = self
            .timers
            .borrow()
            .peek()
            .is_some_and(|entry| entry.fire_at_ms <= now);
        if due {
            let entry = self.timers.borrow_mut().pop();
            if let Some(entry) = entry {
                self.fire_timer(ctx, entry)?;
            }
            return Ok(true);
        }
        let idle = self.ledger.borrow().first_task(ResourceKind::IdleCallback);
        if let Some(id) = idle {
            let deadline = idle_deadline(ctx).map_err(|e| self.interrupt(ctx, e))?;
            self.fire_task(ctx, ResourceKind::IdleCallback, id, Some(deadline))?;
            return Ok(true);
        }
        let next = self.timers.borrow().peek().map(|entry| entry.fire_at_ms);
        if let Some(fire_at_ms) = next {
            if wait {
                let poll = self.options.borrow().idle_poll_ms.max(1);
                self.clock.sleep_until(fire_at_ms.min(now + poll));
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run everything that is ready now without waiting.
    pub(crate) fn pump<'js>(&self, ctx: &Ctx<'js>) -> JsResult<()> {
        for _ in 0..MAX_PUMP_TURNS {
            if !self.run_turn(ctx, false)? {
                break;
            }
        }
        Ok(())
    }

    /// Drive the loop until `value` settles. Non-promises are returned
    /// unchanged; thenables are adopted first.
    pub(crate) fn await_value<'js>(&self, ctx: &Ctx<'js>, value: JsValue<'js>) -> JsResult<JsValue<'js>> {
        let promise = if let Some(promise) = value.as_promise() {
            promise.clone()
        } else if let Some(obj) = value.as_object() {
            let then: JsValue = obj.get("then").map_err(|e| self.interrupt(ctx, e))?;
            if !then.is_function() {
                return Ok(value);
            }
            let (promise, resolve, _) = ctx.promise().map_err(|e| self.interrupt(ctx, e))?;
            resolve
                .call::<_, ()>((value,))
                .map_err(|e| self.interrupt(ctx, e))?;
            promise
        } else {
            return Ok(value);
        };
        loop {
            match promise.state() {
                PromiseState::Resolved | PromiseState::Rejected => {
                    return match promise.result::<JsValue>() {
                        Some(Ok(v)) => Ok(v),
                        Some(Err(e)) => Err(self.interrupt(ctx, e)),
                        None => Ok(JsValue::new_undefined(ctx.clone())),
                    };
                }
                PromiseState::Pending => {}
            }
            if !self.run_turn(ctx, true)? {
                let e = Exception::throw_message(ctx, "await on a promise that can never settle");
                return Err(self.interrupt(ctx, e));
            }
        }
    }

    /// Drop heap entries whose registration is gone.
    fn prune_timers(&self) {
        let mut timers = self.timers.borrow_mut();
        let ledger = self.ledger.borrow();
        while let Some(entry) = timers.peek() {
            if ledger.contains(entry.kind, entry.id) {
                break;
            }
            timers.pop();
        }
    }

    fn fire_timer<'js>(&self, ctx: &Ctx<'js>, entry: TimerEntry) -> JsResult<()> {
        let extra = match entry.kind {
            ResourceKind::AnimationFrame => {
                Some(JsValue::new_number(ctx.clone(), entry.fire_at_ms as f64))
            }
            _ => None,
        };
        if entry.kind == ResourceKind::Interval {
            let period = self
                .ledger
                .borrow()
                .task(ResourceKind::Interval, entry.id)
                .and_then(|t| t.period_ms);
            if let Some(period) = period {
                self.timers.borrow_mut().schedule_at(
                    entry.id,
                    ResourceKind::Interval,
                    entry.fire_at_ms + period.max(1),
                );
            }
        }
        self.fire_task(ctx, entry.kind, entry.id, extra)
    }

    /// Invoke a registered callback. One-shot kinds deregister first.
    /// Errors thrown by the callback are reported, not propagated.
    fn fire_task<'js>(
        &self,
        ctx: &Ctx<'js>,
        kind: ResourceKind,
        id: u64,
        extra: Option<JsValue<'js>>,
    ) -> JsResult<()> {
        let Some(task) = self.ledger.borrow().task(kind, id) else {
            return Ok(());
        };
        if kind != ResourceKind::Interval {
            self.ledger.borrow_mut().deregister(kind, id);
        }
        trace!(?kind, id, "firing callback");
        match call_saved(ctx, &task.callback, extra, &task.args) {
            Ok(_) => Ok(()),
            Err(e) => match self.interrupt(ctx, e) {
                Interrupt::Stopped => Err(Interrupt::Stopped),
                Interrupt::Throw(thrown) => {
                    self.report_uncaught(thrown);
                    Ok(())
                }
            },
        }
    }
}

/// Argument passed to idle callbacks.
fn idle_deadline<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<JsValue<'js>> {
    let deadline = Object::new(ctx.clone())?;
    deadline.set("didTimeout", false)?;
    let remaining = Function::new(ctx.clone(), || IDLE_BUDGET_MS)?.with_name("timeRemaining")?;
    deadline.set("timeRemaining", remaining)?;
    Ok(deadline.into_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fire_at_ms: u64, seq: u64) -> TimerEntry {
        TimerEntry {
            fire_at_ms,
            seq,
            id: seq,
            kind: ResourceKind::Timeout,
        }
    }

    #[test]
    fn test_heap_pops_earliest_first() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(300, 1));
        heap.push(entry(100, 2));
        heap.push(entry(200, 3));
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.fire_at_ms)).collect();
        assert_eq!(order, [100, 200, 300]);
    }

    #[test]
    fn test_equal_deadlines_keep_insertion_order() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(50, 2));
        heap.push(entry(50, 1));
        heap.push(entry(50, 3));
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.seq)).collect();
        assert_eq!(order, [1, 2, 3]);
    }

    #[test]
    fn test_queue_orders_by_deadline_then_schedule_order() {
        let mut queue = TimerQueue::default();
        queue.schedule_at(7, ResourceKind::Interval, 40);
        queue.schedule_at(8, ResourceKind::Timeout, 10);
        queue.schedule_at(9, ResourceKind::AnimationFrame, 10);
        let ids: Vec<u64> = std::iter::from_fn(|| queue.pop().map(|e| e.id)).collect();
        assert_eq!(ids, [8, 9, 7]);
        queue.schedule_at(1, ResourceKind::Timeout, 5);
        queue.clear();
        assert!(queue.peek().is_none());
    }
}
