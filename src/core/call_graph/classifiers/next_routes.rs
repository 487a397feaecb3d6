// src/core/call_graph/classifiers/next_routes.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::parser::Unit;
use super::{path_regex, Classifier, ConnectionHint, HintTarget, KnownFiles};
use crate::core::call_graph::{EdgeKind, EntryPoint};

const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// `app/**/route.ts` in the App Router
static APP_ROUTE_FILE: Lazy<Regex> =
    Lazy::new(|| path_regex(r"(?:^|/)app/(?P<route>(?:[^/]+/)*)route\.{ext}$"));

/// `pages/api/**.ts` in the Pages Router
static PAGES_API_FILE: Lazy<Regex> =
    Lazy::new(|| path_regex(r"(?:^|/)pages/(?P<route>api(?:/[^/]+)*)\.{ext}$"));

static FETCH_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bfetch\(\s*["'`]([^"'`]*)["'`]\s*(?:,\s*\{[^}]*?\bmethod\s*:\s*["'`](\w+)["'`])?"#)
        .expect("Invalid fetch pattern")
});

static AXIOS_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\baxios\.(get|post|put|patch|delete|head|options)\(\s*["'`]([^"'`]*)["'`]"#)
        .expect("Invalid axios pattern")
});

static ORIGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^/]+").expect("Invalid origin pattern"));

/// Next.js route handlers and the HTTP requests that reach them
pub struct NextRouteClassifier;

impl Classifier for NextRouteClassifier {
    fn name(&self) -> &'static str {
        "next-route"
    }

    fn detect_entry_point(&self, unit: &Unit, file_path: &str) -> Option<EntryPoint> {
        if let Some(caps) = APP_ROUTE_FILE.captures(file_path) {
            if unit.exported && HTTP_VERBS.contains(&unit.name.as_str()) {
                return Some(EntryPoint::HttpRoute {
                    method: unit.name.clone(),
                    route: route_from_segments(&caps["route"]),
                });
            }
            return None;
        }

        if let Some(caps) = PAGES_API_FILE.captures(file_path) {
            if unit.default_export || unit.name == "handler" {
                let raw = &caps["route"];
                let raw = raw.strip_suffix("/index").unwrap_or(raw);
                return Some(EntryPoint::HttpRoute {
                    method: "ANY".to_string(),
                    route: route_from_segments(raw),
                });
            }
        }

        None
    }

    fn detect_connections(&self, unit: &Unit, _file_path: &str) -> Vec<ConnectionHint> {
        let mut hints = Vec::new();

        for caps in FETCH_CALL.captures_iter(&unit.body) {
            let method = caps
                .get(2)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| "GET".to_string());
            if let Some(path) = request_path(&caps[1]) {
                hints.push(request_hint(&method, &path));
            }
        }

        for caps in AXIOS_CALL.captures_iter(&unit.body) {
            if let Some(path) = request_path(&caps[2]) {
                hints.push(request_hint(&caps[1].to_uppercase(), &path));
            }
        }

        hints
    }

    fn resolve_connection(&self, hint: &ConnectionHint, known: &KnownFiles) -> Option<String> {
        let HintTarget::Literal(target) = &hint.target else {
            return None;
        };
        if hint.kind != EdgeKind::HttpRequest {
            return None;
        }
        let (method, path) = target.split_once(' ')?;

        known.paths().find_map(|file| {
            let caps = APP_ROUTE_FILE.captures(file)?;
            let pattern = route_from_segments(&caps["route"]);
            if route_matches(&pattern, path) {
                known.find(file, method)
            } else {
                None
            }
        })
    }
}

fn request_hint(method: &str, path: &str) -> ConnectionHint {
    let target = format!("{} {}", method, path);
    ConnectionHint::literal(EdgeKind::HttpRequest, target.clone()).with_label(target)
}

/// URL path of a request target, dropping origin, query and fragment
fn request_path(url: &str) -> Option<String> {
    let without_origin = ORIGIN.replace(url, "");
    let path = without_origin
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or("");
    if !path.starts_with('/') {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    Some(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

/// Route path from directory segments; route groups and parallel slots vanish
fn route_from_segments(raw: &str) -> String {
    let segments: Vec<&str> = raw
        .split('/')
        .filter(|s| !s.is_empty())
        .filter(|s| !(s.starts_with('(') && s.ends_with(')')))
        .filter(|s| !s.starts_with('@'))
        .collect();
    format!("/{}", segments.join("/"))
}

/// Match a concrete path against a route with `[param]` and `[...rest]` segments
fn route_matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for (i, segment) in pattern.iter().enumerate() {
        if segment.starts_with("[[...") {
            return true;
        }
        if segment.starts_with("[...") {
            return path.len() > i;
        }
        match path.get(i) {
            Some(actual) if segment.starts_with('[') || segment == actual => {}
            _ => return false,
        }
    }
    pattern.len() == path.len()
}
