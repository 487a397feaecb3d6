// src/core/call_graph/classifiers/mod.rs
//! Framework-aware classification of units
//!
//! A classifier recognises entry points (routes, handlers, jobs) and spots
//! connections that plain call analysis cannot see, such as a `fetch` to a
//! route or an event emitted by name. The registry asks classifiers in
//! order; the first to claim an entry point wins.

mod background_tasks;
mod events;
mod express;
mod next_routes;

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::parser::Unit;
use super::{node_id, EdgeKind, EntryPoint};

pub use background_tasks::BackgroundTaskClassifier;
pub use events::EventClassifier;
pub use express::ExpressClassifier;
pub use next_routes::NextRouteClassifier;

/// Source extensions recognised in path patterns
const SOURCE_EXT: &str = r"(?:ts|tsx|js|jsx|mjs|cjs|mts|cts)";

/// What a connection hint points at
#[derive(Debug, Clone, PartialEq)]
pub enum HintTarget {
    /// A route, event name or task id, resolved by the classifier or by entry-point metadata
    Literal(String),
    /// A name in scope of the unit, resolved like a call
    Symbol(String),
}

/// An edge suggested by a classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionHint {
    pub kind: EdgeKind,
    pub target: HintTarget,
    pub label: Option<String>,
    pub order: Option<usize>,
}

impl ConnectionHint {
    pub fn literal(kind: EdgeKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: HintTarget::Literal(target.into()),
            label: None,
            order: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// The units defined in every project file, by relative path
#[derive(Debug, Clone, Default)]
pub struct KnownFiles {
    files: BTreeMap<String, Vec<String>>,
}

impl KnownFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_path: &str, unit_name: &str) {
        self.files
            .entry(file_path.to_string())
            .or_default()
            .push(unit_name.to_string());
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|k| k.as_str())
    }

    pub fn units_in(&self, file_path: &str) -> &[String] {
        self.files.get(file_path).map(|u| u.as_slice()).unwrap_or(&[])
    }

    /// Node id of `name` in `file_path`, when the file defines it
    pub fn find(&self, file_path: &str, name: &str) -> Option<String> {
        self.units_in(file_path)
            .iter()
            .any(|u| u == name)
            .then(|| node_id(file_path, name))
    }
}

/// Recognises entry points and non-call connections for one framework
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// `file_path` is project-relative with forward slashes
    fn detect_entry_point(&self, _unit: &Unit, _file_path: &str) -> Option<EntryPoint> {
        None
    }

    fn detect_connections(&self, _unit: &Unit, _file_path: &str) -> Vec<ConnectionHint> {
        Vec::new()
    }

    /// Node id for a literal hint this classifier produced
    fn resolve_connection(&self, _hint: &ConnectionHint, _known: &KnownFiles) -> Option<String> {
        None
    }
}

/// Ordered collection of classifiers
pub struct ClassifierRegistry {
    classifiers: Vec<Box<dyn Classifier>>,
}

impl ClassifierRegistry {
    pub fn empty() -> Self {
        Self {
            classifiers: Vec::new(),
        }
    }

    pub fn register(&mut self, classifier: Box<dyn Classifier>) {
        self.classifiers.push(classifier);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    /// First classifier to claim the unit wins
    pub fn detect_entry_point(&self, unit: &Unit, file_path: &str) -> Option<EntryPoint> {
        self.classifiers
            .iter()
            .find_map(|c| c.detect_entry_point(unit, file_path))
    }

    /// Hints from every classifier, paired with the classifier that made them
    pub fn detect_connections(
        &self,
        unit: &Unit,
        file_path: &str,
    ) -> Vec<(&dyn Classifier, ConnectionHint)> {
        self.classifiers
            .iter()
            .flat_map(|c| {
                c.detect_connections(unit, file_path)
                    .into_iter()
                    .map(move |hint| (c.as_ref(), hint))
            })
            .collect()
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(NextRouteClassifier));
        registry.register(Box::new(BackgroundTaskClassifier));
        registry.register(Box::new(EventClassifier));
        registry.register(Box::new(ExpressClassifier));
        registry
    }
}

/// File stem of a project-relative path
fn file_stem(file_path: &str) -> Option<&str> {
    Path::new(file_path).file_stem().and_then(|s| s.to_str())
}

fn path_regex(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("{ext}", SOURCE_EXT)).expect("Invalid classifier path pattern")
}

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^["'`]([^"'`]*)["'`]$"#).expect("Invalid quote pattern"));

/// Contents of a plain string literal
fn string_literal(text: &str) -> Option<&str> {
    QUOTED
        .captures(text.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
pub(crate) fn test_unit(name: &str, file_path: &str, body: &str) -> Unit {
    use crate::core::parser::UnitKind;
    use std::path::PathBuf;

    Unit {
        name: name.to_string(),
        kind: UnitKind::Function,
        file_path: PathBuf::from(file_path),
        params: "()".to_string(),
        body: body.to_string(),
        declaration: format!("export function {}() {}", name, body),
        line_range: (1, 1),
        is_async: false,
        exported: true,
        default_export: false,
        docs: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClaimEverything;

    impl Classifier for ClaimEverything {
        fn name(&self) -> &'static str {
            "claim-everything"
        }

        fn detect_entry_point(&self, _unit: &Unit, _file_path: &str) -> Option<EntryPoint> {
            Some(EntryPoint::EventHandler {
                event: "*".to_string(),
            })
        }
    }

    #[test]
    fn test_default_registry_order() {
        let registry = ClassifierRegistry::default();
        assert_eq!(
            registry.names(),
            vec!["next-route", "background-task", "event", "express"]
        );
    }

    #[test]
    fn test_first_claim_wins() {
        let mut registry = ClassifierRegistry::empty();
        registry.register(Box::new(BackgroundTaskClassifier));
        registry.register(Box::new(ClaimEverything));

        let job = test_unit("handler", "src/jobs/send-email.ts", "{}");
        assert_eq!(
            registry.detect_entry_point(&job, "src/jobs/send-email.ts"),
            Some(EntryPoint::BackgroundTask {
                task_id: "send-email".to_string()
            })
        );

        let other = test_unit("helper", "src/lib/util.ts", "{}");
        assert_eq!(
            registry.detect_entry_point(&other, "src/lib/util.ts"),
            Some(EntryPoint::EventHandler {
                event: "*".to_string()
            })
        );
    }

    #[test]
    fn test_known_files_lookup() {
        let mut known = KnownFiles::new();
        known.insert("src/a.ts", "f");
        assert_eq!(known.find("src/a.ts", "f"), Some("src/a.ts:f".to_string()));
        assert_eq!(known.find("src/a.ts", "g"), None);
        assert!(known.units_in("src/b.ts").is_empty());
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal("'/api/users'"), Some("/api/users"));
        assert_eq!(string_literal("`x`"), Some("x"));
        assert_eq!(string_literal("path"), None);
    }
}
