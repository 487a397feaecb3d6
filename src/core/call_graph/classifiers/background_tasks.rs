// src/core/call_graph/classifiers/background_tasks.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::parser::Unit;
use super::{file_stem, path_regex, Classifier, ConnectionHint, HintTarget, KnownFiles};
use crate::core::call_graph::{EdgeKind, EntryPoint};

/// Exported names that mark a task module's entry
const HANDLER_NAMES: &[&str] = &["handler", "run", "perform", "process"];

static TASK_FILE: Lazy<Regex> =
    Lazy::new(|| path_regex(r"(?:^|/)(?:jobs|workers|tasks)/(?:[^/]+/)*[^/]+\.{ext}$"));

/// `queue.add("id")`, `tasks.trigger("id")`, `enqueue("id")`
static DISPATCH_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\.(?:add|enqueue|trigger)|\benqueue)\(\s*["'`]([\w.:/-]+)["'`]"#)
        .expect("Invalid dispatch pattern")
});

/// Queue workers and the code that enqueues work for them
pub struct BackgroundTaskClassifier;

impl Classifier for BackgroundTaskClassifier {
    fn name(&self) -> &'static str {
        "background-task"
    }

    fn detect_entry_point(&self, unit: &Unit, file_path: &str) -> Option<EntryPoint> {
        if !TASK_FILE.is_match(file_path) || !unit.exported {
            return None;
        }
        if !unit.default_export && !HANDLER_NAMES.contains(&unit.name.as_str()) {
            return None;
        }

        task_id(file_path).map(|task_id| EntryPoint::BackgroundTask { task_id })
    }

    fn detect_connections(&self, unit: &Unit, _file_path: &str) -> Vec<ConnectionHint> {
        DISPATCH_CALL
            .captures_iter(&unit.body)
            .map(|caps| {
                let task = caps[1].to_string();
                ConnectionHint::literal(EdgeKind::AsyncDispatch, task.clone())
                    .with_label(format!("dispatch {}", task))
            })
            .collect()
    }

    fn resolve_connection(&self, hint: &ConnectionHint, known: &KnownFiles) -> Option<String> {
        let HintTarget::Literal(task) = &hint.target else {
            return None;
        };
        if hint.kind != EdgeKind::AsyncDispatch {
            return None;
        }

        known
            .paths()
            .filter(|file| TASK_FILE.is_match(file))
            .filter(|file| task_id(file).as_deref() == Some(task.as_str()))
            .find_map(|file| HANDLER_NAMES.iter().find_map(|name| known.find(file, name)))
    }
}

/// Task id from the file name; `jobs/billing/index.ts` is `billing`
fn task_id(file_path: &str) -> Option<String> {
    let stem = file_stem(file_path)?;
    if stem != "index" {
        return Some(stem.to_string());
    }
    file_path
        .rsplit('/')
        .nth(1)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::classifiers::test_unit;

    #[test]
    fn test_task_entry_points() {
        let classifier = BackgroundTaskClassifier;

        let handler = test_unit("handler", "src/jobs/send-welcome.ts", "{}");
        assert_eq!(
            classifier.detect_entry_point(&handler, "src/jobs/send-welcome.ts"),
            Some(EntryPoint::BackgroundTask {
                task_id: "send-welcome".to_string()
            })
        );

        let index = test_unit("run", "workers/billing/index.js", "{}");
        assert_eq!(
            classifier.detect_entry_point(&index, "workers/billing/index.js"),
            Some(EntryPoint::BackgroundTask {
                task_id: "billing".to_string()
            })
        );

        let helper = test_unit("formatEmail", "src/jobs/send-welcome.ts", "{}");
        assert_eq!(classifier.detect_entry_point(&helper, "src/jobs/send-welcome.ts"), None);

        let mut private = test_unit("handler", "src/jobs/cleanup.ts", "{}");
        private.exported = false;
        assert_eq!(classifier.detect_entry_point(&private, "src/jobs/cleanup.ts"), None);
    }

    #[test]
    fn test_dispatch_detection_and_resolution() {
        let body = "{\n  await emailQueue.add('send-welcome', { userId });\n  enqueue(\"reindex\");\n  seen.add(user);\n}";
        let unit = test_unit("signup", "src/users/signup.ts", body);
        let hints = BackgroundTaskClassifier.detect_connections(&unit, "src/users/signup.ts");
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].label.as_deref(), Some("dispatch send-welcome"));

        let mut known = KnownFiles::new();
        known.insert("src/jobs/send-welcome.ts", "formatEmail");
        known.insert("src/jobs/send-welcome.ts", "handler");

        assert_eq!(
            BackgroundTaskClassifier.resolve_connection(&hints[0], &known),
            Some("src/jobs/send-welcome.ts:handler".to_string())
        );
        assert_eq!(BackgroundTaskClassifier.resolve_connection(&hints[1], &known), None);
    }
}
