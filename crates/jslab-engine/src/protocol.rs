//! Command and event messages exchanged with the host.
//!
//! Both enums serialize as tagged JSON objects, e.g.
//! `{"command":"evalCommand","text":"1+1","showOutput":true}` and
//! `{"event":"resultReady","value":"2","isLargeStructure":false}`.

use crate::scripts::LineRange;
use crate::workspace::WorkspaceEntry;
use jslab_eval::{LedgerStats, OutputLevel};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc;

// ══════════════════════════════════════════════════════════════════════════
// Inbound
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    EvalCommand {
        text: String,
        #[serde(default = "default_true")]
        show_output: bool,
        #[serde(default)]
        session_name: Option<String>,
    },
    RunScript {
        path: PathBuf,
        #[serde(default)]
        line_range: Option<LineRange>,
        #[serde(default)]
        silent: bool,
    },
    /// `true` requests a stop; `false` withdraws a pending request.
    StopLoop {
        flag: bool,
    },
    ClearWorkspace,
    RunLast,
    SetPath {
        dir: PathBuf,
    },
    SetSavedPaths {
        dirs: Vec<PathBuf>,
    },
    Shutdown,
}

fn default_true() -> bool {
    true
}

impl Command {
    /// Whether the command runs code and so needs the evaluation slot.
    pub fn evaluates(&self) -> bool {
        matches!(
            self,
            Command::EvalCommand { .. } | Command::RunScript { .. } | Command::RunLast
        )
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Outbound
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    Started {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },
    Finished,
    Stopped {
        message: String,
    },
    Busy,
    ResultReady {
        value: String,
        is_large_structure: bool,
    },
    ErrorReported {
        message: String,
    },
    StatsChanged {
        pending_timers: usize,
        pending_promises: usize,
        registries: LedgerStats,
    },
    WorkspaceChanged {
        entries: Vec<WorkspaceEntry>,
    },
    Output {
        level: OutputLevel,
        text: String,
    },
}

impl Event {
    pub fn stats(stats: LedgerStats) -> Self {
        Event::StatsChanged {
            pending_timers: stats.pending_timers(),
            pending_promises: stats.promises,
            registries: stats,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Sinks
// ══════════════════════════════════════════════════════════════════════════

/// Receiver of outbound events.
pub trait EventSink {
    fn emit(&self, event: Event);
}

impl EventSink for mpsc::Sender<Event> {
    fn emit(&self, event: Event) {
        // A closed channel means the host stopped listening.
        let _ = self.send(event);
    }
}

/// Collects events in memory.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted since the last call.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: Command =
            serde_json::from_value(json!({"command": "evalCommand", "text": "1+1"})).unwrap();
        assert_eq!(
            cmd,
            Command::EvalCommand {
                text: "1+1".into(),
                show_output: true,
                session_name: None,
            }
        );
        let cmd: Command = serde_json::from_value(
            json!({"command": "runScript", "path": "a.js", "lineRange": [1, 3], "silent": true}),
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::RunScript {
                path: "a.js".into(),
                line_range: Some(LineRange::Span(1, 3)),
                silent: true,
            }
        );
        assert!(cmd.evaluates());
        let cmd: Command = serde_json::from_value(json!({"command": "stopLoop", "flag": true})).unwrap();
        assert!(!cmd.evaluates());
    }

    #[test]
    fn events_serialize_with_camel_case_fields() {
        let event = Event::ResultReady {
            value: "2".into(),
            is_large_structure: false,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "resultReady", "value": "2", "isLargeStructure": false})
        );
        let stats = LedgerStats {
            intervals: 2,
            promises: 1,
            ..LedgerStats::default()
        };
        let value = serde_json::to_value(Event::stats(stats)).unwrap();
        assert_eq!(value["event"], "statsChanged");
        assert_eq!(value["pendingTimers"], 2);
        assert_eq!(value["pendingPromises"], 1);
    }

    #[test]
    fn event_log_drains() {
        let log = EventLog::new();
        log.emit(Event::Finished);
        log.emit(Event::Busy);
        assert_eq!(log.len(), 2);
        assert_eq!(log.take(), vec![Event::Finished, Event::Busy]);
        assert!(log.is_empty());
    }
}
