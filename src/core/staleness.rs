use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use super::call_graph::{GraphNode, GraphSnapshot};
use super::hasher;
use super::parser::SourceParser;
use super::snapshot::load_snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleReason {
    Changed,
    NotFound,
    FileNotFound,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::Changed => write!(f, "changed"),
            StaleReason::NotFound => write!(f, "not-found"),
            StaleReason::FileNotFound => write!(f, "file-not-found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleDependency {
    pub path: String,
    pub name: String,
    pub old_hash: String,
    /// Empty when the unit or its file is gone
    pub new_hash: String,
    pub reason: StaleReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleRecord {
    pub node_id: String,
    pub reason: String,
    pub dependencies: Vec<StaleDependency>,
}

/// A node that could not be checked, or a snapshot that could not be read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckError {
    pub node_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessReport {
    pub total: usize,
    pub up_to_date: Vec<String>,
    pub stale: Vec<StaleRecord>,
    pub errors: Vec<CheckError>,
}

/// What the command surface should tell the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No snapshot, or an empty one: build first
    NothingToCheck,
    AllCurrent,
    Stale(usize),
    /// Some nodes could not be checked
    Incomplete { stale: usize, errors: usize },
}

impl StalenessReport {
    pub fn outcome(&self) -> CheckOutcome {
        if self.total == 0 {
            CheckOutcome::NothingToCheck
        } else if !self.errors.is_empty() {
            CheckOutcome::Incomplete {
                stale: self.stale.len(),
                errors: self.errors.len(),
            }
        } else if self.stale.is_empty() {
            CheckOutcome::AllCurrent
        } else {
            CheckOutcome::Stale(self.stale.len())
        }
    }
}

enum NodeStatus {
    Current,
    Stale(StaleDependency),
}

/// Compares a recorded graph against the current working tree
pub struct StalenessChecker {
    root: PathBuf,
    parser: SourceParser,
    root_prefixes: Vec<String>,
}

impl StalenessChecker {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            parser: SourceParser::new(config.parsing.max_file_size)?,
            root_prefixes: config.resolution.root_prefixes.clone(),
        })
    }

    /// Load the snapshot at `snapshot_path` and check every node in it.
    ///
    /// A missing or unreadable snapshot yields an empty report with one error.
    pub fn check<P: AsRef<Path>>(&mut self, snapshot_path: P) -> StalenessReport {
        match load_snapshot(snapshot_path) {
            Ok(snapshot) => self.check_snapshot(&snapshot),
            Err(e) => {
                warn!("{}", e);
                StalenessReport {
                    errors: vec![CheckError {
                        node_id: None,
                        message: e.to_string(),
                    }],
                    ..Default::default()
                }
            }
        }
    }

    pub fn check_snapshot(&mut self, snapshot: &GraphSnapshot) -> StalenessReport {
        let mut report = StalenessReport {
            total: snapshot.nodes.len(),
            ..Default::default()
        };

        for node in &snapshot.nodes {
            match self.check_node(node) {
                Ok(NodeStatus::Current) => report.up_to_date.push(node.id.clone()),
                Ok(NodeStatus::Stale(dependency)) => {
                    debug!("{} is stale: {}", node.id, dependency.reason);
                    report.stale.push(StaleRecord {
                        node_id: node.id.clone(),
                        reason: format!("{} {}", node.name, dependency.reason),
                        dependencies: vec![dependency],
                    });
                }
                Err(e) => report.errors.push(CheckError {
                    node_id: Some(node.id.clone()),
                    message: e.to_string(),
                }),
            }
        }

        info!(
            "Checked {} nodes: {} current, {} stale, {} errors",
            report.total,
            report.up_to_date.len(),
            report.stale.len(),
            report.errors.len()
        );
        report
    }

    fn check_node(&mut self, node: &GraphNode) -> Result<NodeStatus> {
        let path = self.resolve_recorded_path(&node.file_path);
        let stale = |new_hash: String, reason| {
            NodeStatus::Stale(StaleDependency {
                path: node.file_path.clone(),
                name: node.name.clone(),
                old_hash: node.content_hash.clone(),
                new_hash,
                reason,
            })
        };

        if !path.is_file() {
            return Ok(stale(String::new(), StaleReason::FileNotFound));
        }

        let Some(unit) = self.parser.extract_one(&path, &node.name)? else {
            return Ok(stale(String::new(), StaleReason::NotFound));
        };

        if hasher::changed(&node.content_hash, &unit) {
            Ok(stale(hasher::hash_unit(&unit), StaleReason::Changed))
        } else {
            Ok(NodeStatus::Current)
        }
    }

    /// Map a recorded path onto this checkout.
    ///
    /// Relative paths join the root. Absolute paths from another machine are
    /// re-rooted at the first known project prefix they contain.
    pub fn resolve_recorded_path(&self, recorded: &str) -> PathBuf {
        let path = Path::new(recorded);
        if path.is_relative() {
            return self.root.join(path);
        }
        if path.exists() {
            return path.to_path_buf();
        }

        let normalized = recorded.replace('\\', "/");
        for prefix in &self.root_prefixes {
            if let Some(index) = normalized.find(&format!("/{}", prefix)) {
                return self.root.join(&normalized[index + 1..]);
            }
        }
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::GraphBuilder;
    use crate::core::snapshot::save_snapshot;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    const ADD: &str = "export function add(a: number, b: number) {\n  return a + b;\n}\n";

    /// Build and save a snapshot of `src/math.ts`, returning its path
    fn recorded(temp: &TempDir) -> PathBuf {
        temp.child("src/math.ts").write_str(ADD).unwrap();
        let mut builder = GraphBuilder::new(temp.path(), &Config::default()).unwrap();
        let outcome = builder.build(&[PathBuf::from("src/math.ts")]);
        let path = temp.child(".docgraph/graph.json").path().to_path_buf();
        save_snapshot(&outcome.snapshot, &path).unwrap();
        path
    }

    fn checker(temp: &TempDir) -> StalenessChecker {
        StalenessChecker::new(temp.path(), &Config::default()).unwrap()
    }

    #[test]
    fn test_unchanged_source_is_current() {
        let temp = TempDir::new().unwrap();
        let snapshot = recorded(&temp);

        let report = checker(&temp).check(&snapshot);
        assert_eq!(report.total, 1);
        assert_eq!(report.up_to_date, vec!["src/math.ts:add"]);
        assert!(report.stale.is_empty());
        assert_eq!(report.outcome(), CheckOutcome::AllCurrent);
    }

    #[test]
    fn test_duplicate_name_is_current_after_build() {
        let temp = TempDir::new().unwrap();
        temp.child("src/dup.ts")
            .write_str("function f() { return 1; }\nfunction f() { return 2; }\n")
            .unwrap();
        let mut builder = GraphBuilder::new(temp.path(), &Config::default()).unwrap();
        let outcome = builder.build(&[PathBuf::from("src/dup.ts")]);
        let snapshot = temp.child(".docgraph/graph.json").path().to_path_buf();
        save_snapshot(&outcome.snapshot, &snapshot).unwrap();

        let report = checker(&temp).check(&snapshot);
        assert_eq!(report.up_to_date, vec!["src/dup.ts:f"]);
        assert!(report.stale.is_empty());
        assert_eq!(report.outcome(), CheckOutcome::AllCurrent);
    }

    #[test]
    fn test_reformatting_and_moving_is_current() {
        let temp = TempDir::new().unwrap();
        let snapshot = recorded(&temp);
        temp.child("src/math.ts")
            .write_str("// arithmetic\n\nexport function add(a: number,  b: number) {\r\n\treturn a + b;\r\n}\n")
            .unwrap();

        let report = checker(&temp).check(&snapshot);
        assert_eq!(report.up_to_date.len(), 1);
    }

    #[test]
    fn test_edited_body_is_changed() {
        let temp = TempDir::new().unwrap();
        let snapshot = recorded(&temp);
        let old_hash = load_snapshot(&snapshot).unwrap().nodes[0].content_hash.clone();

        temp.child("src/math.ts")
            .write_str("export function add(a: number, b: number) {\n  return a + b + 1;\n}\n")
            .unwrap();

        let report = checker(&temp).check(&snapshot);
        assert_eq!(report.stale.len(), 1);
        let dependency = &report.stale[0].dependencies[0];
        assert_eq!(dependency.reason, StaleReason::Changed);
        assert_eq!(dependency.old_hash, old_hash);
        assert!(!dependency.new_hash.is_empty());
        assert_ne!(dependency.new_hash, old_hash);
        assert_eq!(report.outcome(), CheckOutcome::Stale(1));
    }

    #[test]
    fn test_renamed_unit_is_not_found() {
        let temp = TempDir::new().unwrap();
        let snapshot = recorded(&temp);
        temp.child("src/math.ts")
            .write_str("export function sum(a: number, b: number) {\n  return a + b;\n}\n")
            .unwrap();

        let report = checker(&temp).check(&snapshot);
        let dependency = &report.stale[0].dependencies[0];
        assert_eq!(dependency.reason, StaleReason::NotFound);
        assert!(dependency.new_hash.is_empty());
    }

    #[test]
    fn test_deleted_file_is_file_not_found() {
        let temp = TempDir::new().unwrap();
        let snapshot = recorded(&temp);
        std::fs::remove_file(temp.child("src/math.ts").path()).unwrap();

        let report = checker(&temp).check(&snapshot);
        let dependency = &report.stale[0].dependencies[0];
        assert_eq!(dependency.reason, StaleReason::FileNotFound);
        assert!(!dependency.old_hash.is_empty());
        assert!(dependency.new_hash.is_empty());
    }

    #[test]
    fn test_missing_snapshot_is_one_report_error() {
        let temp = TempDir::new().unwrap();
        let report = checker(&temp).check(temp.child("missing.json").path());
        assert_eq!(report.total, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].node_id.is_none());
        assert_eq!(report.outcome(), CheckOutcome::NothingToCheck);
    }

    #[test]
    fn test_node_failure_does_not_abort_scan() {
        let temp = TempDir::new().unwrap();
        let snapshot_path = recorded(&temp);
        let mut snapshot = load_snapshot(&snapshot_path).unwrap();

        // A recorded file that now has an unsupported extension fails to parse
        temp.child("src/notes.txt").write_str("plain text").unwrap();
        let mut broken = snapshot.nodes[0].clone();
        broken.id = "src/notes.txt:x".to_string();
        broken.file_path = "src/notes.txt".to_string();
        snapshot.nodes.insert(0, broken);

        let report = checker(&temp).check_snapshot(&snapshot);
        assert_eq!(report.total, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].node_id.as_deref(), Some("src/notes.txt:x"));
        assert_eq!(report.up_to_date, vec!["src/math.ts:add"]);
        assert_eq!(
            report.outcome(),
            CheckOutcome::Incomplete { stale: 0, errors: 1 }
        );
    }

    #[test]
    fn test_foreign_absolute_paths_are_rerooted() {
        let temp = TempDir::new().unwrap();
        let snapshot_path = recorded(&temp);
        let mut snapshot = load_snapshot(&snapshot_path).unwrap();
        snapshot.nodes[0].file_path = "/home/ci/build/checkout/src/math.ts".to_string();

        let checker = checker(&temp);
        assert_eq!(
            checker.resolve_recorded_path(&snapshot.nodes[0].file_path),
            temp.path().join("src/math.ts")
        );

        let mut checker = checker;
        let report = checker.check_snapshot(&snapshot);
        assert_eq!(report.up_to_date.len(), 1);
    }
}
