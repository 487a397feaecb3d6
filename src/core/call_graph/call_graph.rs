// src/core/call_graph/call_graph.rs - Graph model persisted in snapshots
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::parser::UnitKind;

/// Stable node id: project-relative path, a colon, then the unit name
pub fn node_id(file_path: &str, name: &str) -> String {
    format!("{}:{}", file_path, name)
}

pub fn edge_id(source: &str, target: &str) -> String {
    format!("{}->{}", source, target)
}

/// Where outside control enters the codebase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EntryPoint {
    HttpRoute {
        method: String,
        route: String,
    },
    EventHandler {
        event: String,
    },
    BackgroundTask {
        #[serde(rename = "taskId")]
        task_id: String,
    },
}

impl EntryPoint {
    /// Exact match of a literal connection target against this entry point's metadata
    pub fn matches(&self, kind: EdgeKind, target: &str) -> bool {
        match (self, kind) {
            (EntryPoint::HttpRoute { method, route }, EdgeKind::HttpRequest) => {
                match target.split_once(' ') {
                    Some((wanted_method, path)) => {
                        path == route && (method == "ANY" || method.eq_ignore_ascii_case(wanted_method))
                    }
                    None => target == route,
                }
            }
            (EntryPoint::EventHandler { event }, EdgeKind::EventEmit) => event == target,
            (EntryPoint::BackgroundTask { task_id }, EdgeKind::AsyncDispatch) => task_id == target,
            _ => false,
        }
    }

    /// Short human label, e.g. `POST /api/orders`
    pub fn describe(&self) -> String {
        match self {
            EntryPoint::HttpRoute { method, route } => format!("{} {}", method, route),
            EntryPoint::EventHandler { event } => format!("on {}", event),
            EntryPoint::BackgroundTask { task_id } => format!("task {}", task_id),
        }
    }
}

/// A unit in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub kind: UnitKind,
    /// Project-relative, forward slashes
    pub file_path: String,
    pub is_async: bool,
    pub content_hash: String,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<EntryPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    DirectCall,
    ConditionalCall,
    AsyncDispatch,
    EventEmit,
    HttpRequest,
    ErrorHandler,
    MiddlewareChain,
}

impl EdgeKind {
    /// Whether the edge crosses an asynchronous boundary regardless of target
    pub fn is_async_boundary(&self) -> bool {
        matches!(
            self,
            EdgeKind::AsyncDispatch | EdgeKind::EventEmit | EdgeKind::HttpRequest
        )
    }
}

/// A directed relationship between two units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

/// Persisted result of one graph build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            nodes,
            edges,
        }
    }

    /// Ids this node points at, in edge order
    pub fn get_callees(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .map(|e| e.target.as_str())
            .collect()
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.entry_point.is_some())
    }

    pub fn get_statistics(&self) -> GraphStats {
        GraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            entry_points: self.entry_points().count(),
            async_edges: self.edges.iter().filter(|e| e.is_async).count(),
            files: self
                .nodes
                .iter()
                .map(|n| n.file_path.as_str())
                .collect::<HashSet<_>>()
                .len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub entry_points: usize,
    pub async_edges: usize,
    pub files: usize,
}

/// Keep the first edge for each (source, target) pair
pub fn dedup_edges(edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
    let mut seen = HashSet::new();
    edges
        .into_iter()
        .filter(|e| seen.insert((e.source.clone(), e.target.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str, kind: EdgeKind) -> GraphEdge {
        GraphEdge {
            id: edge_id(source, target),
            source: source.to_string(),
            target: target.to_string(),
            kind,
            label: None,
            is_async: false,
            order: None,
        }
    }

    #[test]
    fn test_dedup_keeps_first_edge_per_pair() {
        let edges = vec![
            edge("a.ts:f", "b.ts:g", EdgeKind::ConditionalCall),
            edge("a.ts:f", "b.ts:g", EdgeKind::DirectCall),
            edge("a.ts:f", "c.ts:h", EdgeKind::DirectCall),
        ];
        let deduped = dedup_edges(edges);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].kind, EdgeKind::ConditionalCall);
    }

    #[test]
    fn test_entry_point_matching() {
        let route = EntryPoint::HttpRoute {
            method: "POST".to_string(),
            route: "/api/orders".to_string(),
        };
        assert!(route.matches(EdgeKind::HttpRequest, "POST /api/orders"));
        assert!(!route.matches(EdgeKind::HttpRequest, "GET /api/orders"));
        assert!(!route.matches(EdgeKind::EventEmit, "POST /api/orders"));

        let any = EntryPoint::HttpRoute {
            method: "ANY".to_string(),
            route: "/api/health".to_string(),
        };
        assert!(any.matches(EdgeKind::HttpRequest, "GET /api/health"));

        let task = EntryPoint::BackgroundTask {
            task_id: "send-email".to_string(),
        };
        assert!(task.matches(EdgeKind::AsyncDispatch, "send-email"));
        assert!(!task.matches(EdgeKind::AsyncDispatch, "send-emails"));
    }

    #[test]
    fn test_snapshot_wire_format() {
        let snapshot = GraphSnapshot::new(
            vec![GraphNode {
                id: "src/jobs/email.ts:handler".to_string(),
                name: "handler".to_string(),
                kind: UnitKind::CallableConstant,
                file_path: "src/jobs/email.ts".to_string(),
                is_async: true,
                content_hash: "abc".to_string(),
                line_start: 1,
                line_end: 3,
                entry_point: Some(EntryPoint::BackgroundTask {
                    task_id: "email".to_string(),
                }),
            }],
            vec![edge("a.ts:f", "src/jobs/email.ts:handler", EdgeKind::AsyncDispatch)],
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["nodes"][0]["kind"], "callable-constant");
        assert_eq!(json["nodes"][0]["contentHash"], "abc");
        assert_eq!(json["nodes"][0]["entryPoint"]["type"], "background-task");
        assert_eq!(json["nodes"][0]["entryPoint"]["taskId"], "email");
        assert_eq!(json["edges"][0]["kind"], "async-dispatch");
        assert_eq!(json["edges"][0]["id"], "a.ts:f->src/jobs/email.ts:handler");
        assert!(json["generatedAt"].is_string());

        let back: GraphSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.get_callees("a.ts:f"), vec!["src/jobs/email.ts:handler"]);
        assert_eq!(back.get_statistics().entry_points, 1);
    }
}
