// src/core/engine.rs
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DocgraphError;
use super::call_graph::{GraphBuilder, GraphStats};
use super::hasher::{hash_unit, short_hash};
use super::parser::SourceParser;
use super::resolver::clear_alias_cache;
use super::snapshot::save_snapshot;
use super::staleness::{CheckOutcome, StalenessChecker};

const CONFIG_FILE_NAME: &str = "docgraph.toml";

/// Orchestrates discovery, graph building and staleness checks for the CLI
pub struct Engine {
    config: Config,
    root: PathBuf,
}

impl Engine {
    /// Create an engine rooted at the current directory
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);

        let root = std::env::current_dir()?;
        Ok(Self::with_root(config, root))
    }

    pub fn with_root(config: Config, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    pub fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = path.unwrap_or_else(|| self.root.clone());
        let config_path = target_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            warn!("⚠️ {} already exists, leaving it untouched", config_path.display());
            return Ok(());
        }

        std::fs::create_dir_all(&target_dir)?;
        let mut config = Config::default();
        if let Some(name) = target_dir
            .canonicalize()
            .ok()
            .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().to_string()))
        {
            config.project.name = name;
        }
        config
            .save(&config_path)
            .map_err(|e| anyhow!("Failed to write {}: {}", config_path.display(), e))?;

        info!("Initialized docgraph in {}", target_dir.display());
        Ok(())
    }

    /// Discover sources, build the graph and write the snapshot
    pub fn build(&self, sources: Vec<PathBuf>, output: Option<PathBuf>) -> Result<GraphStats> {
        let source_dirs = if sources.is_empty() {
            self.config.project.source_dirs.clone()
        } else {
            sources
        };

        info!("🔍 Discovering sources in {:?}", source_dirs);
        let files = self.discover_files(&source_dirs)?;
        info!("Found {} source files", files.len());

        clear_alias_cache();
        let mut builder = GraphBuilder::new(&self.root, &self.config)
            .map_err(|e| anyhow!("Failed to create graph builder: {}", e))?;
        let outcome = builder.build(&files);

        for issue in &outcome.issues {
            warn!("  - {}: {}", issue.file.display(), issue.message);
        }

        let snapshot_path = self.snapshot_path(output);
        save_snapshot(&outcome.snapshot, &snapshot_path)
            .map_err(|e| anyhow!("Failed to write snapshot: {}", e))?;

        let stats = outcome.snapshot.get_statistics();
        info!("📊 Graph written to {}", snapshot_path.display());
        info!("  - {} units across {} files", stats.total_nodes, stats.files);
        info!("  - {} edges ({} async)", stats.total_edges, stats.async_edges);
        info!("  - {} entry points", stats.entry_points);
        for node in outcome.snapshot.entry_points() {
            if let Some(entry) = &node.entry_point {
                debug!(
                    "    {} ({}) -> {} callees",
                    node.id,
                    entry.describe(),
                    outcome.snapshot.get_callees(&node.id).len()
                );
            }
        }
        if !outcome.issues.is_empty() {
            warn!("⚠️ {} files or declarations were skipped", outcome.issues.len());
        }

        Ok(stats)
    }

    /// Compare the recorded graph with the working tree
    pub fn check(&self, snapshot: Option<PathBuf>, fail_on_stale: bool) -> Result<CheckOutcome> {
        let snapshot_path = self.snapshot_path(snapshot);
        let mut checker = StalenessChecker::new(&self.root, &self.config)
            .map_err(|e| anyhow!("Failed to create staleness checker: {}", e))?;
        let report = checker.check(&snapshot_path);

        for error in &report.errors {
            match &error.node_id {
                Some(id) => warn!("  - {}: {}", id, error.message),
                None => warn!("{}", error.message),
            }
        }
        for record in &report.stale {
            for dependency in &record.dependencies {
                warn!(
                    "  - {} [{}] {} -> {}",
                    record.node_id,
                    dependency.reason,
                    short_hash(&dependency.old_hash),
                    if dependency.new_hash.is_empty() {
                        "-"
                    } else {
                        short_hash(&dependency.new_hash)
                    }
                );
            }
        }

        let outcome = report.outcome();
        match outcome {
            CheckOutcome::NothingToCheck => {
                warn!("Nothing to check yet. Run `docgraph build` first.");
            }
            CheckOutcome::AllCurrent => {
                info!("✅ All {} units are up to date", report.total);
            }
            CheckOutcome::Stale(count) => {
                warn!("❌ {} of {} units are stale", count, report.total);
            }
            CheckOutcome::Incomplete { stale, errors } => {
                warn!(
                    "⚠️ {} units stale, {} could not be checked",
                    stale, errors
                );
            }
        }

        if fail_on_stale && matches!(outcome, CheckOutcome::Stale(_) | CheckOutcome::Incomplete { .. }) {
            return Err(anyhow!("Stale units found"));
        }
        Ok(outcome)
    }

    /// Print the units of one file
    pub fn symbols(&self, file: &Path) -> Result<()> {
        let path = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.root.join(file)
        };

        let mut parser = SourceParser::new(self.config.parsing.max_file_size)?;
        let extraction = parser.extract_file(&path)?;

        for (unit, calls) in extraction.units.iter().zip(&extraction.calls) {
            let summary = unit
                .docs
                .as_ref()
                .and_then(|d| d.description.as_deref())
                .and_then(|d| d.lines().next())
                .unwrap_or("");
            println!(
                "{:>5}-{:<5} {:<18} {:<32} {}  {}",
                unit.line_range.0,
                unit.line_range.1,
                unit.kind.to_string(),
                unit.name,
                short_hash(&hash_unit(unit)),
                summary
            );
            for call in calls {
                if call.guards.is_empty() {
                    println!("{:>12} -> {}", "", call.expression);
                } else {
                    println!("{:>12} -> {} [if {}]", "", call.expression, call.guards.join(" && "));
                }
            }
        }
        for issue in &extraction.issues {
            warn!("line {}: {}", issue.line, issue.message);
        }

        Ok(())
    }

    /// Walk source directories for parseable files, honouring ignore patterns
    pub fn discover_files(&self, dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut overrides = OverrideBuilder::new(&self.root);
        for pattern in &self.config.project.ignore_patterns {
            overrides
                .add(&format!("!{}", pattern))
                .map_err(|e| anyhow!("Invalid ignore pattern '{}': {}", pattern, e))?;
        }
        let overrides = overrides.build()?;

        let mut files = Vec::new();
        for dir in dirs {
            let dir = self.root.join(dir);
            if !dir.exists() {
                warn!("Source directory {} does not exist", dir.display());
                continue;
            }

            let walker = WalkBuilder::new(&dir)
                .hidden(false)
                .git_ignore(true)
                .overrides(overrides.clone())
                .build();

            for entry in walker {
                let entry = entry.map_err(|e| DocgraphError::FileSystem(e.to_string()))?;
                let path = entry.path();
                if path.is_file() && self.should_parse_file(path) {
                    files.push(path.to_path_buf());
                }
            }
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    fn should_parse_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.config.parsing.extensions.iter().any(|e| e == ext))
    }

    fn snapshot_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        let path = explicit.unwrap_or_else(|| self.config.project.snapshot_path.clone());
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    fn project() -> assert_fs::TempDir {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/math.ts")
            .write_str("export function add(a, b) { return a + b; }\n")
            .unwrap();
        temp.child("src/app.ts")
            .write_str("import { add } from './math';\nexport function main() { return add(1, 2); }\n")
            .unwrap();
        temp.child("src/types.d.ts").write_str("declare function x(): void;\n").unwrap();
        temp.child("src/node_modules/pkg/index.js")
            .write_str("export function vendored() {}\n")
            .unwrap();
        temp.child("src/README.md").write_str("# docs").unwrap();
        temp
    }

    #[test]
    fn test_discovery_skips_ignored_and_foreign_files() {
        let temp = project();
        let engine = Engine::with_root(Config::default(), temp.path());

        let files = engine.discover_files(&[PathBuf::from("src")]).unwrap();
        assert_eq!(
            files,
            vec![temp.path().join("src/app.ts"), temp.path().join("src/math.ts")]
        );
    }

    #[test]
    fn test_build_then_check() {
        let temp = project();
        let engine = Engine::with_root(Config::default(), temp.path());

        let stats = engine.build(Vec::new(), None).unwrap();
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.total_edges, 1);
        temp.child(".docgraph/graph.json").assert(predicate::path::is_file());

        assert_eq!(engine.check(None, true).unwrap(), CheckOutcome::AllCurrent);

        temp.child("src/math.ts")
            .write_str("export function add(a, b) { return b + a; }\n")
            .unwrap();
        assert_eq!(engine.check(None, false).unwrap(), CheckOutcome::Stale(1));
        assert!(engine.check(None, true).is_err());
    }

    #[test]
    fn test_check_without_snapshot_needs_build() {
        let temp = project();
        let engine = Engine::with_root(Config::default(), temp.path());
        assert_eq!(engine.check(None, true).unwrap(), CheckOutcome::NothingToCheck);
    }

    #[test]
    fn test_init_writes_config_once() {
        let temp = assert_fs::TempDir::new().unwrap();
        let engine = Engine::with_root(Config::default(), temp.path());

        engine.init(None).unwrap();
        let config_file = temp.child(CONFIG_FILE_NAME);
        config_file.assert(predicate::path::is_file());
        config_file.assert(predicate::str::contains("snapshot_path"));

        config_file.write_str("# customised").unwrap();
        engine.init(None).unwrap();
        config_file.assert("# customised");
    }

    #[test]
    fn test_symbols_on_missing_file_fails() {
        let temp = project();
        let engine = Engine::with_root(Config::default(), temp.path());
        assert!(engine.symbols(Path::new("src/math.ts")).is_ok());
        assert!(engine.symbols(Path::new("src/nope.ts")).is_err());
    }
}
