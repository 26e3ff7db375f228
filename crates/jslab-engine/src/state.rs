//! Evaluation state shared between the session thread and its handle.

use jslab_eval::StopFlag;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The `evaluating` and `stop-requested` flags. Cloning shares them.
#[derive(Debug, Clone, Default)]
pub struct EvalState {
    evaluating: Arc<AtomicBool>,
    stop: StopFlag,
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluating.load(Ordering::SeqCst)
    }

    /// Claim the evaluation slot, or `None` when it is taken.
    pub fn try_begin(&self) -> Option<EvalGuard> {
        self.evaluating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| EvalGuard {
                evaluating: Arc::clone(&self.evaluating),
            })
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    pub fn reset_stop(&self) {
        self.stop.reset();
    }
}

/// Holds the evaluation slot; releases it on drop.
#[derive(Debug)]
pub struct EvalGuard {
    evaluating: Arc<AtomicBool>,
}

impl Drop for EvalGuard {
    fn drop(&mut self) {
        self.evaluating.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_guard_at_a_time() {
        let state = EvalState::new();
        let guard = state.try_begin().unwrap();
        assert!(state.is_evaluating());
        assert!(state.try_begin().is_none());
        drop(guard);
        assert!(!state.is_evaluating());
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn clones_share_the_stop_flag() {
        let state = EvalState::new();
        let handle = state.clone();
        handle.request_stop();
        assert!(state.is_stop_requested());
        assert!(state.stop_flag().is_requested());
        state.reset_stop();
        assert!(!handle.is_stop_requested());
    }
}
