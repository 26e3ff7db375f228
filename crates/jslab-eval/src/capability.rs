//! Capability table: the catalogue of names injected into the execution
//! context at startup.

use crate::interp::Host;
use indexmap::IndexMap;
use rquickjs::{Ctx, IntoJs};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capability {
    /// Protected names may not be redeclared by evaluated code.
    pub protected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    entries: IndexMap<String, Capability>,
}

impl CapabilityTable {
    pub fn register(&mut self, name: &str, protected: bool) {
        self.entries.insert(name.to_string(), Capability { protected });
    }

    pub fn get(&self, name: &str) -> Option<Capability> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every registered name, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn protected_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, c)| c.protected)
            .map(|(n, _)| n.as_str())
    }
}

impl Host {
    /// Inject `value` as a top-level context name and record it in the
    /// capability table.
    pub(crate) fn register_capability<'js>(
        &self,
        ctx: &Ctx<'js>,
        name: &str,
        value: impl IntoJs<'js>,
        protected: bool,
    ) -> rquickjs::Result<()> {
        ctx.globals().set(name, value)?;
        self.record_capability(name, protected);
        Ok(())
    }

    /// Record a name the engine already defines.
    pub(crate) fn record_capability(&self, name: &str, protected: bool) {
        self.capabilities.borrow_mut().register(name, protected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Interp, InterpOptions};

    #[test]
    fn test_protected_names_keep_order() {
        let mut table = CapabilityTable::default();
        table.register("plot", true);
        table.register("sin", false);
        table.register("figure", true);
        assert_eq!(table.protected_names().collect::<Vec<_>>(), ["plot", "figure"]);
        assert_eq!(table.len(), 3);
        assert!(!table.get("sin").unwrap_or_default().protected);
    }

    #[test]
    fn test_reregister_updates_flag() {
        let mut table = CapabilityTable::default();
        table.register("disp", false);
        table.register("disp", true);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("disp"), Some(Capability { protected: true }));
    }

    #[test]
    fn test_context_names_are_recorded() {
        let interp = Interp::new(InterpOptions::default()).unwrap();
        let table = interp.capabilities();
        for name in ["console", "setTimeout", "jsl", "require", "globalThis", "waitSeconds"] {
            assert_eq!(table.get(name), Some(Capability { protected: true }), "{name}");
        }
        assert_eq!(table.get("Promise"), Some(Capability { protected: false }));
        assert!(!table.contains("Math"));
    }
}
