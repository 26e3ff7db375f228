//! Workspace Differ.
//!
//! The workspace is whatever evaluated code added to the execution context:
//! the context's names minus the baseline captured at startup, in the order
//! they were first defined.

use indexmap::{IndexMap, IndexSet};
use jslab_eval::{Interp, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One row of the workspace table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEntry {
    pub name: String,
    /// `typeof` of the value.
    #[serde(rename = "type")]
    pub type_name: String,
    pub kind_label: String,
}

impl WorkspaceEntry {
    pub fn new(name: &str, value: &Value) -> Self {
        Self {
            name: name.to_string(),
            type_name: value.type_of().to_string(),
            kind_label: kind_label(value),
        }
    }
}

/// Constructor name for the workspace table; `/` for null, `none` for
/// undefined.
pub fn kind_label(value: &Value) -> String {
    match value {
        Value::Undefined => "none".into(),
        Value::Null => "/".into(),
        Value::Bool(_) => "Boolean".into(),
        Value::Number(_) => "Number".into(),
        Value::String(_) => "String".into(),
        Value::Object(h) if h.is_callable() => "Function".into(),
        Value::Object(h) => h.kind().to_string(),
    }
}

/// Names in `current` that are not in `baseline`, in `current`'s order.
pub fn diff(baseline: &IndexSet<String>, current: &[String]) -> Vec<String> {
    current
        .iter()
        .filter(|name| !baseline.contains(*name))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Differ {
    baseline: IndexSet<String>,
}

impl Differ {
    pub fn new<I, S>(baseline: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            baseline: baseline.into_iter().map(Into::into).collect(),
        }
    }

    /// Treat everything currently in the context as baseline.
    pub fn capture(interp: &Interp) -> Self {
        Self::new(interp.global_names())
    }

    pub fn is_baseline(&self, name: &str) -> bool {
        self.baseline.contains(name)
    }

    pub fn baseline_len(&self) -> usize {
        self.baseline.len()
    }

    pub fn user_names(&self, interp: &Interp) -> Vec<String> {
        diff(&self.baseline, &interp.global_names())
    }

    pub fn snapshot(&self, interp: &Interp) -> Vec<WorkspaceEntry> {
        self.user_names(interp)
            .into_iter()
            .filter_map(|name| {
                let value = interp.get_global(&name)?;
                Some(WorkspaceEntry::new(&name, &value))
            })
            .collect()
    }

    /// Remove every workspace name from the context.
    pub fn clear(&self, interp: &mut Interp) -> usize {
        let names = self.user_names(interp);
        for name in &names {
            interp.remove_global(name);
        }
        names.len()
    }
}

/// Workspace entries taken out of the context, to be put back later.
#[derive(Debug, Default)]
pub struct Stash {
    entries: IndexMap<String, Value>,
    /// Entries that held functions when saved.
    saved_functions: HashSet<String>,
}

impl Stash {
    /// Remove `names` from the context and keep their values.
    pub fn take(interp: &mut Interp, names: &[String]) -> Self {
        let mut stash = Stash::default();
        for name in names {
            if let Some(value) = interp.remove_global(name) {
                if value.is_callable() {
                    stash.saved_functions.insert(name.clone());
                }
                stash.entries.insert(name.clone(), value);
            }
        }
        stash
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_saved_function(&self, name: &str) -> bool {
        self.saved_functions.contains(name)
    }

    /// Put back entries the context does not define again. A saved function
    /// is also dropped when `redeclared` names it, even if the new
    /// definition never ran.
    pub fn restore(self, interp: &mut Interp, redeclared: &[String]) -> Vec<String> {
        let mut restored = Vec::new();
        for (name, value) in self.entries {
            if interp.get_global(&name).is_some() {
                continue;
            }
            if self.saved_functions.contains(&name) && redeclared.contains(&name) {
                continue;
            }
            interp.set_global(&name, value);
            restored.push(name);
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jslab_eval::InterpOptions;

    fn value(interp: &mut Interp, code: &str) -> Value {
        interp.run_script(code, "test").unwrap()
    }

    #[test]
    fn diff_keeps_discovery_order() {
        let baseline: IndexSet<String> = ["console", "Math"].iter().map(|s| s.to_string()).collect();
        let current: Vec<String> = ["console", "b", "Math", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(diff(&baseline, &current), vec!["b", "a"]);
    }

    #[test]
    fn kind_labels() {
        let mut interp = Interp::new(InterpOptions::default()).unwrap();
        assert_eq!(kind_label(&Value::Undefined), "none");
        assert_eq!(kind_label(&Value::Null), "/");
        assert_eq!(kind_label(&Value::Number(1.0)), "Number");
        assert_eq!(kind_label(&Value::string("s")), "String");
        let array = value(&mut interp, "[1, 2]");
        assert_eq!(kind_label(&array), "Array");
        let object = value(&mut interp, "({ a: 1 })");
        assert_eq!(kind_label(&object), "Object");
        let func = value(&mut interp, "(x) => x");
        assert_eq!(kind_label(&func), "Function");
        let point = value(&mut interp, "class Point {}\nnew Point()");
        assert_eq!(kind_label(&point), "Point");
    }

    #[test]
    fn snapshot_lists_only_new_names() {
        let mut interp = Interp::new(InterpOptions::default()).unwrap();
        let differ = Differ::capture(&interp);
        interp.set_global("a", Value::Number(1.0));
        interp.set_global("b", Value::string("two"));
        let snapshot = differ.snapshot(&interp);
        assert_eq!(
            snapshot,
            vec![
                WorkspaceEntry {
                    name: "a".into(),
                    type_name: "number".into(),
                    kind_label: "Number".into(),
                },
                WorkspaceEntry {
                    name: "b".into(),
                    type_name: "string".into(),
                    kind_label: "String".into(),
                },
            ]
        );
        assert_eq!(differ.clear(&mut interp), 2);
        assert!(differ.snapshot(&interp).is_empty());
        assert!(interp.get_global("console").is_some());
    }

    #[test]
    fn restore_skips_redefined_names() {
        let mut interp = Interp::new(InterpOptions::default()).unwrap();
        let differ = Differ::capture(&interp);
        interp.set_global("kept", Value::Number(1.0));
        interp.set_global("shadowed", Value::Number(2.0));
        let f = value(&mut interp, "(function f() {})");
        interp.set_global("f", f);

        let stash = Stash::take(&mut interp, &differ.user_names(&interp));
        assert_eq!(stash.len(), 3);
        assert!(stash.is_saved_function("f"));
        assert!(differ.user_names(&interp).is_empty());

        interp.set_global("shadowed", Value::Number(20.0));
        let restored = stash.restore(&mut interp, &["f".to_string()]);
        assert_eq!(restored, vec!["kept"]);
        assert_eq!(interp.get_global("shadowed").map(|v| v.to_number()), Some(20.0));
        assert!(interp.get_global("f").is_none());
    }

    #[test]
    fn entry_serializes_with_type_key() {
        let entry = WorkspaceEntry::new("x", &Value::Null);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"name": "x", "type": "object", "kindLabel": "/"}));
    }
}
