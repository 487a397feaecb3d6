// src/core/call_graph/classifiers/express.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::parser::Unit;
use super::{string_literal, Classifier, ConnectionHint, HintTarget};
use crate::core::call_graph::EdgeKind;

/// `app.use(a, b)` / `router.get("/x", auth, list)` with plain identifier arguments
static REGISTRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:app|router|server)\.(use|get|post|put|patch|delete|all)\(([^()]*)\)")
        .expect("Invalid registration pattern")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").expect("Invalid identifier pattern"));

/// `err` / `error(s)` as a whole word of a camelCase, snake_case or
/// SCREAMING_CASE name: `onError`, `errorHandler`, `ERROR_PAGE`, not `deferred`
static ERROR_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:^|_)(?:err|errors?)(?:[A-Z0-9_$]|$)",
        r"|(?:Err|Errors?)(?:[A-Z0-9_$]|$)",
        r"|(?:^|_)(?:ERR|ERRORS?)(?:[0-9_$]|$)",
    ))
    .expect("Invalid error-name pattern")
});

/// Express-style middleware chains.
///
/// Handlers passed by name become ordered edges from the unit that
/// registers them; inline handlers are not followed.
pub struct ExpressClassifier;

impl Classifier for ExpressClassifier {
    fn name(&self) -> &'static str {
        "express"
    }

    fn detect_connections(&self, unit: &Unit, _file_path: &str) -> Vec<ConnectionHint> {
        let mut hints = Vec::new();

        for caps in REGISTRATION.captures_iter(&unit.body) {
            let verb = &caps[1];
            let args: Vec<&str> = caps[2].split(',').map(str::trim).collect();

            let path = args.first().and_then(|a| string_literal(a));
            let label = match path {
                Some(path) => format!("{} {}", verb.to_uppercase(), path),
                None => verb.to_uppercase(),
            };

            for (position, handler) in args
                .iter()
                .filter(|a| IDENTIFIER.is_match(a))
                .enumerate()
            {
                let kind = if verb == "use" && ERROR_NAME.is_match(handler) {
                    EdgeKind::ErrorHandler
                } else {
                    EdgeKind::MiddlewareChain
                };
                hints.push(ConnectionHint {
                    kind,
                    target: HintTarget::Symbol(handler.to_string()),
                    label: Some(label.clone()),
                    order: Some(position),
                });
            }
        }

        hints
    }
}
