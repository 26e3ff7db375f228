//! Engine-level failures.

use jslab_rewrite::RewriteError;
use jslab_types::JslabError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Another submission is still evaluating.
    #[error("busy")]
    Busy,
    /// Syntax error or forbidden name; nothing was executed.
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    /// Evaluated code threw. The message is already translated.
    #[error("{0}")]
    Runtime(String),
    #[error("Evaluation stopped")]
    Stopped,
    /// A script could not be resolved, read or sliced.
    #[error("{}", .0.message)]
    Script(JslabError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The session thread is gone.
    #[error("session closed")]
    Closed,
    /// The JavaScript runtime could not be started.
    #[error("could not start the execution context: {0}")]
    Startup(String),
}

impl EngineError {
    pub fn is_busy(&self) -> bool {
        matches!(self, EngineError::Busy)
    }
}
