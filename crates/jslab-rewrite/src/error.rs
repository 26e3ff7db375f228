use jslab_types::JslabError;
use serde::Serialize;
use std::fmt;

/// Where a rejected identifier was being bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Variable,
    Function,
    Class,
    Import,
    Assignment,
}

impl DeclKind {
    /// Noun phrase used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            DeclKind::Variable => "a variable name",
            DeclKind::Function => "a function name",
            DeclKind::Class => "a class name",
            DeclKind::Import => "an import binding",
            DeclKind::Assignment => "an assignment target",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            DeclKind::Variable => "variable",
            DeclKind::Function => "function",
            DeclKind::Class => "class",
            DeclKind::Import => "import",
            DeclKind::Assignment => "assignment",
        };
        f.write_str(word)
    }
}

/// Rejection of a submission before anything runs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RewriteError {
    /// The text does not parse.
    #[error("{}", .0.render())]
    Syntax(JslabError),
    /// A declaration site binds a protected name.
    #[error("{}", error.render())]
    Forbidden {
        name: String,
        kind: DeclKind,
        error: JslabError,
    },
}

impl RewriteError {
    /// The structured diagnostic, positioned in the submitted text.
    pub fn diagnostic(&self) -> &JslabError {
        match self {
            RewriteError::Syntax(e) => e,
            RewriteError::Forbidden { error, .. } => error,
        }
    }
}
