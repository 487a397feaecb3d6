// src/core/call_graph/classifiers/events.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::parser::Unit;
use super::{file_stem, path_regex, Classifier, ConnectionHint};
use crate::core::call_graph::{EdgeKind, EntryPoint};

static LISTENER_FILE: Lazy<Regex> = Lazy::new(|| {
    path_regex(r"(?:^|/)(?:listeners|subscribers|events/handlers)/(?:[^/]+/)*[^/]+\.{ext}$")
});

static EMIT_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:emit|publish)\(\s*["'`]([\w.:/-]+)["'`]"#).expect("Invalid emit pattern")
});

/// Named events: who emits them and who listens.
///
/// Emits are resolved against listener metadata by the graph builder.
pub struct EventClassifier;

impl Classifier for EventClassifier {
    fn name(&self) -> &'static str {
        "event"
    }

    fn detect_entry_point(&self, unit: &Unit, file_path: &str) -> Option<EntryPoint> {
        let listens = unit
            .docs
            .as_ref()
            .and_then(|d| d.tag("listens"))
            .and_then(|text| text.split_whitespace().next());
        if let Some(event) = listens {
            return Some(EntryPoint::EventHandler {
                event: event.to_string(),
            });
        }

        if unit.exported && LISTENER_FILE.is_match(file_path) {
            return file_stem(file_path).map(|event| EntryPoint::EventHandler {
                event: event.to_string(),
            });
        }

        None
    }

    fn detect_connections(&self, unit: &Unit, _file_path: &str) -> Vec<ConnectionHint> {
        EMIT_CALL
            .captures_iter(&unit.body)
            .map(|caps| {
                let event = caps[1].to_string();
                ConnectionHint::literal(EdgeKind::EventEmit, event.clone())
                    .with_label(format!("emit {}", event))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::classifiers::test_unit;
    use crate::core::languages::jsdoc::parse_doc_comment;

    #[test]
    fn test_listens_tag_marks_handler() {
        let mut unit = test_unit("onSignup", "src/analytics/track.ts", "{}");
        unit.docs = parse_doc_comment("/**\n * Track signups.\n * @listens user.created\n */");
        assert_eq!(
            EventClassifier.detect_entry_point(&unit, "src/analytics/track.ts"),
            Some(EntryPoint::EventHandler {
                event: "user.created".to_string()
            })
        );
    }

    #[test]
    fn test_listener_directory_marks_handler() {
        let unit = test_unit("handle", "src/listeners/order.paid.ts", "{}");
        assert_eq!(
            EventClassifier.detect_entry_point(&unit, "src/listeners/order.paid.ts"),
            Some(EntryPoint::EventHandler {
                event: "order.paid".to_string()
            })
        );

        let elsewhere = test_unit("handle", "src/orders/pay.ts", "{}");
        assert_eq!(EventClassifier.detect_entry_point(&elsewhere, "src/orders/pay.ts"), None);
    }

    #[test]
    fn test_emit_detection() {
        let body = "{\n  bus.emit('order.paid', order);\n  await pubsub.publish(\"audit\", entry);\n  emitter.emit(eventName);\n}";
        let unit = test_unit("pay", "src/orders/pay.ts", body);
        let labels: Vec<String> = EventClassifier
            .detect_connections(&unit, "src/orders/pay.ts")
            .into_iter()
            .filter_map(|h| h.label)
            .collect();
        assert_eq!(labels, vec!["emit order.paid", "emit audit"]);
    }
}
