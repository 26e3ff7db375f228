//! Runtime error types for the JSLab evaluator.

use jslab_types::JslabError;

/// Non-local exit from evaluated code, as seen by the host.
///
/// `Throw` carries the escaped value already rendered; `Stopped` means the
/// stop flag unwound every frame and was never observable by script code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    Throw(Thrown),
    Stopped,
}

/// Result alias used by the host-side event loop.
pub type JsResult<T> = Result<T, Interrupt>;

/// A thrown value that escaped to the host, already rendered to text so it
/// can cross thread boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thrown {
    /// `name` of an Error object; `None` for other thrown values.
    pub name: Option<String>,
    pub message: String,
    /// `Name: message` followed by `    at fn (file:line:column)` frames.
    pub stack: Option<String>,
    /// Console rendering of the thrown value.
    pub display: String,
}

impl Thrown {
    /// An error raised by the host itself rather than by script code.
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let display = format!("{name}: {message}");
        Self {
            name: Some(name.to_string()),
            message,
            stack: None,
            display,
        }
    }

    /// `Name: message` for errors, `Uncaught <value>` otherwise.
    pub fn summary(&self) -> String {
        match &self.name {
            Some(name) if self.message.is_empty() => name.clone(),
            Some(name) => format!("{name}: {}", self.message),
            None => format!("Uncaught {}", self.display),
        }
    }
}

/// Failure of a host-level evaluation request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    /// The text handed to the evaluator does not parse.
    #[error("{}", .0.render())]
    Parse(JslabError),
    /// Script code threw and nothing caught it.
    #[error("{}", .0.summary())]
    Uncaught(Thrown),
    /// The stop flag was observed.
    #[error("evaluation stopped")]
    Stopped,
    /// The JavaScript runtime could not be created or used.
    #[error("JavaScript engine failure: {0}")]
    Engine(String),
}

impl EvalError {
    pub fn is_stopped(&self) -> bool {
        matches!(self, EvalError::Stopped)
    }
}

impl From<Interrupt> for EvalError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Stopped => EvalError::Stopped,
            Interrupt::Throw(thrown) => EvalError::Uncaught(thrown),
        }
    }
}

impl From<rquickjs::Error> for EvalError {
    fn from(error: rquickjs::Error) -> Self {
        EvalError::Engine(error.to_string())
    }
}
