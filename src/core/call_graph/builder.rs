// src/core/call_graph/builder.rs - Three-pass graph construction
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::core::hasher;
use crate::core::parser::{
    CallSite, FileExtraction, ImportDecl, ImportKind, ReExportDecl, SourceParser, Unit, UnitKind,
};
use crate::core::resolver::{normalize_path, ModuleResolver};
use crate::error::Result;
use super::call_graph::{dedup_edges, edge_id, node_id, EdgeKind, GraphEdge, GraphNode, GraphSnapshot};
use super::classifiers::{ClassifierRegistry, HintTarget, KnownFiles};

/// Re-export hops followed before a lookup gives up
pub const MAX_REEXPORT_DEPTH: usize = 5;

/// A file or declaration the build had to skip
#[derive(Debug, Clone, PartialEq)]
pub struct BuildIssue {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub snapshot: GraphSnapshot,
    pub issues: Vec<BuildIssue>,
}

/// Everything pass 2 needs about one file
struct FileFacts {
    path: PathBuf,
    rel: String,
    /// One unit per name; a redeclared name keeps its last declaration
    units: Vec<Unit>,
    /// `calls[i]` belongs to `units[i]`
    calls: Vec<Vec<CallSite>>,
    imports: Vec<ImportDecl>,
    re_exports: Vec<ReExportDecl>,
}

pub struct GraphBuilder {
    root: PathBuf,
    parser: SourceParser,
    resolver: ModuleResolver,
    registry: ClassifierRegistry,
}

impl GraphBuilder {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        let registry = ClassifierRegistry::default();
        debug!("Classifiers: {}", registry.names().join(", "));

        Ok(Self {
            root: root.into(),
            parser: SourceParser::new(config.parsing.max_file_size)?,
            resolver: ModuleResolver::new(&config.resolution),
            registry,
        })
    }

    /// Build the graph for an ordered file list.
    ///
    /// Files that fail to parse are reported in the outcome and skipped.
    pub fn build(&mut self, files: &[PathBuf]) -> BuildOutcome {
        let mut issues = Vec::new();
        let facts = self.load_files(files, &mut issues);
        info!("Parsed {} of {} files", facts.len(), files.len());

        // Pass 1: nodes
        let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
        let mut known = KnownFiles::new();
        for file in &facts {
            for unit in &file.units {
                let id = node_id(&file.rel, &unit.name);
                let node = GraphNode {
                    id: id.clone(),
                    name: unit.name.clone(),
                    kind: unit.kind,
                    file_path: file.rel.clone(),
                    is_async: unit.is_async,
                    content_hash: hasher::hash_unit(unit),
                    line_start: unit.line_range.0,
                    line_end: unit.line_range.1,
                    entry_point: self.registry.detect_entry_point(unit, &file.rel),
                };
                known.insert(&file.rel, &unit.name);
                nodes.insert(id, node);
            }
        }

        // Pass 2: edges
        let resolution = Resolution {
            facts: &facts,
            index: facts
                .iter()
                .enumerate()
                .map(|(i, f)| (f.path.clone(), i))
                .collect(),
            nodes: &nodes,
            resolver: &self.resolver,
        };

        let mut edges = Vec::new();
        for file in &facts {
            for (unit, calls) in file.units.iter().zip(&file.calls) {
                let source_id = node_id(&file.rel, &unit.name);
                let mut order = 0;

                for call in calls {
                    let Some(target) =
                        resolution.resolve_call(file, unit, &call.callee_name, &call.expression)
                    else {
                        trace!("{}: no target for {}", source_id, call.expression);
                        continue;
                    };
                    if target == source_id {
                        continue;
                    }

                    let (kind, label) = if call.guards.is_empty() {
                        (EdgeKind::DirectCall, None)
                    } else {
                        (EdgeKind::ConditionalCall, Some(call.guards.join(" && ")))
                    };
                    edges.push(GraphEdge {
                        id: edge_id(&source_id, &target),
                        source: source_id.clone(),
                        is_async: nodes.get(&target).map_or(false, |n| n.is_async),
                        target,
                        kind,
                        label,
                        order: Some(order),
                    });
                    order += 1;
                }

                for (classifier, hint) in self.registry.detect_connections(unit, &file.rel) {
                    let target = match &hint.target {
                        HintTarget::Symbol(name) => resolution.resolve_call(file, unit, name, name),
                        HintTarget::Literal(text) => classifier
                            .resolve_connection(&hint, &known)
                            .filter(|id| nodes.contains_key(id))
                            .or_else(|| resolution.match_entry_point(hint.kind, text)),
                    };
                    let Some(target) = target else {
                        debug!(
                            "{}: dropping unresolved {} hint {:?}",
                            source_id,
                            classifier.name(),
                            hint.target
                        );
                        continue;
                    };
                    if target == source_id {
                        continue;
                    }

                    edges.push(GraphEdge {
                        id: edge_id(&source_id, &target),
                        source: source_id.clone(),
                        is_async: hint.kind.is_async_boundary()
                            || nodes.get(&target).map_or(false, |n| n.is_async),
                        target,
                        kind: hint.kind,
                        label: hint.label,
                        order: hint.order,
                    });
                }
            }
        }

        // Pass 3: one edge per (source, target)
        let raw_edges = edges.len();
        let edges = dedup_edges(edges);
        info!(
            "Graph built: {} nodes, {} edges ({} before dedup)",
            nodes.len(),
            edges.len(),
            raw_edges
        );

        BuildOutcome {
            snapshot: GraphSnapshot::new(nodes.into_values().collect(), edges),
            issues,
        }
    }

    fn load_files(&mut self, files: &[PathBuf], issues: &mut Vec<BuildIssue>) -> Vec<FileFacts> {
        let mut facts: Vec<FileFacts> = Vec::new();

        for file in files {
            let path = if file.is_absolute() {
                normalize_path(file)
            } else {
                normalize_path(&self.root.join(file))
            };
            if facts.iter().any(|f| f.path == path) {
                continue;
            }

            let extraction = match self.parser.extract_file(&path) {
                Ok(extraction) => extraction,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    issues.push(BuildIssue {
                        file: path,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let FileExtraction {
                units,
                calls,
                imports,
                re_exports,
                issues: unit_issues,
            } = extraction;
            for issue in unit_issues {
                debug!("{}:{}: {}", path.display(), issue.line, issue.message);
                issues.push(BuildIssue {
                    file: path.clone(),
                    message: format!("line {}: {}", issue.line, issue.message),
                });
            }

            let rel = self.relative(&path);
            let (units, calls) = last_declarations(&rel, units, calls);
            facts.push(FileFacts {
                path,
                rel,
                units,
                calls,
                imports,
                re_exports,
            });
        }

        facts
    }

    /// Project-relative path with forward slashes
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Drop every declaration that a later one with the same name replaces
fn last_declarations(
    rel: &str,
    units: Vec<Unit>,
    calls: Vec<Vec<CallSite>>,
) -> (Vec<Unit>, Vec<Vec<CallSite>>) {
    let last: HashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(i, unit)| (unit.name.as_str(), i))
        .collect();
    let keep: Vec<bool> = units
        .iter()
        .enumerate()
        .map(|(i, unit)| last.get(unit.name.as_str()) == Some(&i))
        .collect();

    units
        .into_iter()
        .zip(calls)
        .zip(keep)
        .filter_map(|(pair, kept)| {
            if !kept {
                debug!("Duplicate unit {}; the later declaration replaces it", node_id(rel, &pair.0.name));
            }
            kept.then_some(pair)
        })
        .unzip()
}

/// Read-only view used to resolve calls once all nodes exist
struct Resolution<'a> {
    facts: &'a [FileFacts],
    index: HashMap<PathBuf, usize>,
    nodes: &'a BTreeMap<String, GraphNode>,
    resolver: &'a ModuleResolver,
}

impl Resolution<'_> {
    /// Same file first, then imports, following re-export barrels.
    ///
    /// Member calls only resolve through `this.` inside a method or a
    /// namespace import; `obj.save()` never binds to a free `save`.
    fn resolve_call(&self, file: &FileFacts, caller: &Unit, name: &str, expression: &str) -> Option<String> {
        let bare = expression == name;

        if bare {
            if let Some(id) = self.defined_in(file, name) {
                return Some(id);
            }
        }

        if expression.strip_prefix("this.") == Some(name) && caller.kind == UnitKind::Method {
            if let Some((class, _)) = caller.name.split_once('.') {
                if let Some(id) = self.defined_in(file, &format!("{}.{}", class, name)) {
                    return Some(id);
                }
            }
        }

        for import in &file.imports {
            let original = match import.kind {
                ImportKind::Namespace => match expression.split_once('.') {
                    Some((object, member)) if object == import.local_name && member == name => name,
                    _ => continue,
                },
                _ if bare && import.local_name == name => import.original_name.as_str(),
                _ => continue,
            };

            let Some(target) = self.resolver.resolve(&file.path, &import.specifier) else {
                continue;
            };
            if let Some(id) = self.lookup_export(&target, original, 0) {
                return Some(id);
            }
        }

        None
    }

    /// Unit exported as `name` by the module at `path`, following re-exports
    fn lookup_export(&self, path: &Path, name: &str, depth: usize) -> Option<String> {
        let file = &self.facts[*self.index.get(path)?];

        if name == "default" {
            if let Some(unit) = file.units.iter().find(|u| u.default_export) {
                return Some(node_id(&file.rel, &unit.name));
            }
        } else if let Some(id) = self.defined_in(file, name) {
            return Some(id);
        }

        if depth >= MAX_REEXPORT_DEPTH {
            debug!("Re-export chain for {} exceeded depth {} at {}", name, MAX_REEXPORT_DEPTH, file.rel);
            return None;
        }

        for re_export in &file.re_exports {
            let original = if re_export.exported_name == name {
                re_export.original_name.as_str()
            } else if re_export.exported_name == "*" && name != "default" {
                name
            } else {
                continue;
            };

            let Some(target) = self.resolver.resolve(&file.path, &re_export.specifier) else {
                continue;
            };
            if let Some(id) = self.lookup_export(&target, original, depth + 1) {
                return Some(id);
            }
        }

        None
    }

    fn defined_in(&self, file: &FileFacts, name: &str) -> Option<String> {
        let id = node_id(&file.rel, name);
        self.nodes.contains_key(&id).then_some(id)
    }

    /// Exact match of hint text against entry-point metadata
    fn match_entry_point(&self, kind: EdgeKind, text: &str) -> Option<String> {
        self.nodes
            .values()
            .find(|n| n.entry_point.as_ref().map_or(false, |e| e.matches(kind, text)))
            .map(|n| n.id.clone())
    }
}
