//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! [rewrite]
//! forbidden_names = ["jsl", "config"]
//!
//! [engine]
//! result_name = "ans"
//!
//! [debug]
//! show_stack = true
//! ```
//!
//! Every section and field is optional; missing values take defaults.

use crate::error::EngineError;
use jslab_eval::{DisplayOptions, InterpOptions};
use jslab_rewrite::{RewriteOptions, DEFAULT_FORBIDDEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rewrite: RewriteSection,
    pub engine: EngineSection,
    pub workspace: WorkspaceSection,
    pub display: DisplayOptions,
    pub paths: PathsSection,
    pub debug: DebugSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteSection {
    pub forbidden_names: Vec<String>,
    pub context_path: String,
}

impl Default for RewriteSection {
    fn default() -> Self {
        Self {
            forbidden_names: DEFAULT_FORBIDDEN.iter().map(|s| s.to_string()).collect(),
            context_path: "jsl.context".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Context name the last result is stored under.
    pub result_name: String,
    /// How many recent source maps stay available for late errors.
    pub source_map_retention: usize,
    pub idle_poll_ms: u64,
    /// Native stack the script may use; deeper recursion is a RangeError.
    pub max_stack_kb: usize,
    /// Heap limit of the execution context, 0 for none.
    pub memory_limit_mb: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            result_name: "ans".into(),
            source_map_retention: 16,
            idle_poll_ms: 10,
            max_stack_kb: 512,
            memory_limit_mb: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Stash the workspace when a different script becomes active.
    pub isolate_scripts: bool,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            isolate_scripts: true,
        }
    }
}

/// Directories consulted when resolving script paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub current: Option<PathBuf>,
    pub includes: Vec<PathBuf>,
    pub saved: Vec<PathBuf>,
}

impl PathsSection {
    /// The working directory, falling back to the process's.
    pub fn current_dir(&self) -> PathBuf {
        match &self.current {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSection {
    pub enabled: bool,
    /// Append the raw stack to translated error messages.
    pub show_stack: bool,
    pub log_pre_transformed: bool,
    pub log_transformed: bool,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            forbidden_names: self.rewrite.forbidden_names.clone(),
            context_path: self.rewrite.context_path.clone(),
            log_pre_transformed: self.debug.log_pre_transformed,
            log_transformed: self.debug.log_transformed,
        }
    }

    pub fn interp_options(&self) -> InterpOptions {
        InterpOptions {
            idle_poll_ms: self.engine.idle_poll_ms,
            max_stack_bytes: self.engine.max_stack_kb * 1024,
            memory_limit_bytes: self.engine.memory_limit_mb * 1024 * 1024,
            display: self.display.clone(),
            cwd: self.paths.current_dir(),
            include_dirs: self.paths.includes.clone(),
            ..InterpOptions::default()
        }
    }
}
