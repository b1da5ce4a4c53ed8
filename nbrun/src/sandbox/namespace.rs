//! Per-run execution namespace.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rhai::{Dynamic, Scope};

/// Value of `__name__` for a top-level run.
pub const MAIN_MARKER: &str = "__main__";

/// Longest variable rendering kept for introspection.
const MAX_VALUE_CHARS: usize = 200;

/// Scope a script runs in, plus the names the sandbox seeded into it.
#[derive(Debug)]
pub struct Namespace {
    scope: Scope<'static>,
    seeded: BTreeSet<String>,
}

impl Namespace {
    /// Fresh namespace with `__name__`, `WORKDIR` and the host's extra bindings,
    /// all as constants.
    pub fn new(workdir: &Path, bindings: &BTreeMap<String, String>) -> Self {
        let mut ns = Self {
            scope: Scope::new(),
            seeded: BTreeSet::new(),
        };
        ns.seed("__name__", MAIN_MARKER.to_string());
        ns.seed("WORKDIR", workdir.display().to_string());
        for (name, value) in bindings {
            ns.seed(name, value.clone());
        }
        ns
    }

    fn seed(&mut self, name: &str, value: String) {
        self.scope.push_constant(name.to_string(), value);
        self.seeded.insert(name.to_string());
    }

    pub fn scope_mut(&mut self) -> &mut Scope<'static> {
        &mut self.scope
    }

    /// Current value of `name`, if the script (or the seed) defined it.
    pub fn get(&self, name: &str) -> Option<Dynamic> {
        self.scope.get_value::<Dynamic>(name)
    }

    /// Script-defined top-level variables rendered with `Debug`.
    ///
    /// Seeded constants are omitted. When a name was shadowed, the latest
    /// binding wins. Long renderings are cut at 200 characters.
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (name, is_constant, value) in self.scope.iter() {
            if is_constant && self.seeded.contains(name) {
                continue;
            }
            out.insert(name.to_string(), truncate(format!("{value:?}")));
        }
        out
    }
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_VALUE_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_VALUE_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Engine;

    #[test]
    fn seeds_main_marker_and_bindings() {
        let mut bindings = BTreeMap::new();
        bindings.insert("DATASET".to_string(), "admissions.csv".to_string());
        let ns = Namespace::new(Path::new("/work"), &bindings);

        let marker = ns.get("__name__").expect("marker");
        assert_eq!(marker.into_string().expect("string"), MAIN_MARKER);
        let dataset = ns.get("DATASET").expect("dataset");
        assert_eq!(dataset.into_string().expect("string"), "admissions.csv");
        assert!(ns.variables().is_empty());
    }

    #[test]
    fn top_level_assignments_are_visible_after_run() {
        let engine = Engine::new();
        let mut ns = Namespace::new(Path::new("/work"), &BTreeMap::new());
        engine
            .run_with_scope(ns.scope_mut(), "let total = 40 + 2; let name = \"icu\"; let total = total * 2;")
            .expect("run");

        let vars = ns.variables();
        assert_eq!(vars.get("total").map(String::as_str), Some("84"));
        assert_eq!(vars.get("name").map(String::as_str), Some("\"icu\""));
        assert!(!vars.contains_key("__name__"));
    }

    #[test]
    fn long_values_are_truncated() {
        let text = truncate("x".repeat(500));
        assert_eq!(text.chars().count(), MAX_VALUE_CHARS + 1);
        assert!(text.ends_with('…'));
    }
}
