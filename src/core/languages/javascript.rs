use std::collections::HashSet;

use tree_sitter::Node;

use crate::core::parser::{
    CallSite, ExtractionIssue, ImportDecl, ImportKind, ParsedSource, ReExportDecl, Unit, UnitKind,
};
use super::jsdoc::doc_comment_for;

/// A declaration recognised as a unit, still tied to its syntax tree
struct Candidate<'t> {
    name: String,
    kind: UnitKind,
    /// Subtree the unit covers; call sites are collected from here
    scope: Node<'t>,
    /// Declaration node used for text, line range and doc lookup
    decl: Node<'t>,
    params: Option<Node<'t>>,
    body: Option<Node<'t>>,
    exported: bool,
    default_export: bool,
}

struct UnitCollector<'t> {
    source: &'t ParsedSource,
    candidates: Vec<Candidate<'t>>,
    issues: Vec<ExtractionIssue>,
}

/// Extract every unit in a parsed file, in source order.
///
/// Declarations that cannot be named or contain syntax errors are reported
/// as issues and skipped; the rest of the file is still processed.
pub fn extract_units(source: &ParsedSource) -> (Vec<Unit>, Vec<ExtractionIssue>) {
    let collector = collect(source);
    let units = units_from(source, &collector.candidates);
    (units, collector.issues)
}

/// Units paired with the calls made inside each, from a single walk.
///
/// Within one unit each distinct callee expression is recorded once, at
/// its first occurrence, so `repo.save()` never hides a later `save()`.
pub fn extract_units_with_calls(
    source: &ParsedSource,
) -> (Vec<(Unit, Vec<CallSite>)>, Vec<ExtractionIssue>) {
    let collector = collect(source);
    let units = units_from(source, &collector.candidates);

    let with_calls = units
        .into_iter()
        .zip(&collector.candidates)
        .map(|(unit, candidate)| (unit, calls_in(source, candidate.scope)))
        .collect();

    (with_calls, collector.issues)
}

fn units_from(source: &ParsedSource, candidates: &[Candidate]) -> Vec<Unit> {
    let default_name = default_export_name(source);
    let local_exports = local_export_names(source);

    candidates
        .iter()
        .map(|c| {
            let mut unit = to_unit(source, c);
            if !unit.exported && local_exports.contains(&unit.name) {
                unit.exported = true;
            }
            if default_name.as_deref() == Some(unit.name.as_str()) {
                unit.exported = true;
                unit.default_export = true;
            }
            unit
        })
        .collect()
}

fn calls_in(source: &ParsedSource, scope: Node) -> Vec<CallSite> {
    let mut walker = CallWalker {
        source,
        seen: HashSet::new(),
        guards: Vec::new(),
        calls: Vec::new(),
    };
    walker.walk(scope);
    walker.calls
}

/// Top-level imports, skipping type-only forms
pub fn extract_imports(source: &ParsedSource) -> Vec<ImportDecl> {
    let root = source.root();
    let mut imports = Vec::new();
    let mut cursor = root.walk();

    for statement in root.children(&mut cursor) {
        if statement.kind() != "import_statement" || has_token(statement, "type") {
            continue;
        }
        let Some(specifier) = statement
            .child_by_field_name("source")
            .map(|s| unquote(source.node_text(s)))
        else {
            continue;
        };

        let mut clause_cursor = statement.walk();
        for clause in statement
            .children(&mut clause_cursor)
            .filter(|c| c.kind() == "import_clause")
        {
            let mut part_cursor = clause.walk();
            for part in clause.children(&mut part_cursor) {
                match part.kind() {
                    "identifier" => imports.push(ImportDecl {
                        local_name: source.node_text(part).to_string(),
                        original_name: "default".to_string(),
                        specifier: specifier.clone(),
                        kind: ImportKind::Default,
                    }),
                    "namespace_import" => {
                        if let Some(local) = first_child_of_kind(part, "identifier") {
                            imports.push(ImportDecl {
                                local_name: source.node_text(local).to_string(),
                                original_name: "*".to_string(),
                                specifier: specifier.clone(),
                                kind: ImportKind::Namespace,
                            });
                        }
                    }
                    "named_imports" => {
                        let mut spec_cursor = part.walk();
                        for spec in part
                            .children(&mut spec_cursor)
                            .filter(|s| s.kind() == "import_specifier")
                        {
                            if has_token(spec, "type") {
                                continue;
                            }
                            let Some(name) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let original = unquote(source.node_text(name));
                            let local = spec
                                .child_by_field_name("alias")
                                .map(|a| source.node_text(a).to_string())
                                .unwrap_or_else(|| original.clone());
                            imports.push(ImportDecl {
                                local_name: local,
                                original_name: original,
                                specifier: specifier.clone(),
                                kind: ImportKind::Named,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    imports
}

/// Top-level `export ... from` statements.
///
/// Named re-exports and `export *` are reported; type-only forms and
/// `export * as ns` are not.
pub fn extract_re_exports(source: &ParsedSource) -> Vec<ReExportDecl> {
    let root = source.root();
    let mut re_exports = Vec::new();
    let mut cursor = root.walk();

    for statement in root.children(&mut cursor) {
        if statement.kind() != "export_statement" || has_token(statement, "type") {
            continue;
        }
        let Some(specifier) = statement
            .child_by_field_name("source")
            .map(|s| unquote(source.node_text(s)))
        else {
            continue;
        };

        if let Some(clause) = first_child_of_kind(statement, "export_clause") {
            let mut spec_cursor = clause.walk();
            for spec in clause
                .children(&mut spec_cursor)
                .filter(|s| s.kind() == "export_specifier")
            {
                if has_token(spec, "type") {
                    continue;
                }
                let Some(name) = spec.child_by_field_name("name") else {
                    continue;
                };
                let original = unquote(source.node_text(name));
                let exported = spec
                    .child_by_field_name("alias")
                    .map(|a| unquote(source.node_text(a)))
                    .unwrap_or_else(|| original.clone());
                re_exports.push(ReExportDecl {
                    exported_name: exported,
                    original_name: original,
                    specifier: specifier.clone(),
                });
            }
        } else if first_child_of_kind(statement, "namespace_export").is_none()
            && !has_token(statement, "as")
            && has_token(statement, "*")
        {
            re_exports.push(ReExportDecl {
                exported_name: "*".to_string(),
                original_name: "*".to_string(),
                specifier,
            });
        }
    }

    re_exports
}

/// Local name bound to this module's default export, when it is a plain name
fn default_export_name(source: &ParsedSource) -> Option<String> {
    let root = source.root();
    let mut cursor = root.walk();

    for statement in root.children(&mut cursor) {
        if statement.kind() != "export_statement" || statement.child_by_field_name("source").is_some() {
            continue;
        }

        if has_token(statement, "default") {
            if let Some(decl) = statement.child_by_field_name("declaration") {
                return decl
                    .child_by_field_name("name")
                    .map(|n| source.node_text(n).to_string());
            }
            if let Some(value) = statement.child_by_field_name("value") {
                if value.kind() == "identifier" {
                    return Some(source.node_text(value).to_string());
                }
            }
            return None;
        }

        // export { handler as default }
        if let Some(clause) = first_child_of_kind(statement, "export_clause") {
            let mut spec_cursor = clause.walk();
            for spec in clause.children(&mut spec_cursor) {
                let alias = spec.child_by_field_name("alias").map(|a| source.node_text(a));
                if alias == Some("default") {
                    return spec
                        .child_by_field_name("name")
                        .map(|n| source.node_text(n).to_string());
                }
            }
        }
    }

    None
}

/// Names listed in `export { a, b as c }` without a source module
fn local_export_names(source: &ParsedSource) -> HashSet<String> {
    let root = source.root();
    let mut names = HashSet::new();
    let mut cursor = root.walk();

    for statement in root.children(&mut cursor) {
        if statement.kind() != "export_statement" || statement.child_by_field_name("source").is_some() {
            continue;
        }
        if let Some(clause) = first_child_of_kind(statement, "export_clause") {
            let mut spec_cursor = clause.walk();
            for spec in clause.children(&mut spec_cursor) {
                if let Some(name) = spec.child_by_field_name("name") {
                    names.insert(source.node_text(name).to_string());
                }
            }
        }
    }

    names
}

fn collect(source: &ParsedSource) -> UnitCollector<'_> {
    let mut collector = UnitCollector {
        source,
        candidates: Vec::new(),
        issues: Vec::new(),
    };
    collector.visit(source.root());
    collector
}

impl<'t> UnitCollector<'t> {
    fn visit(&mut self, node: Node<'t>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => self.function(node),
            "class_declaration" | "abstract_class_declaration" => self.class(node),
            "lexical_declaration" | "variable_declaration" => self.variable(node),
            // `export default class Name {}` may parse as a named expression
            "class" | "function_expression" | "function" if is_named_default(node) => {
                if node.kind() == "class" {
                    self.class(node)
                } else {
                    self.function(node)
                }
            }
            _ => {}
        }

        // Nested declarations are units too
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn function(&mut self, node: Node<'t>) {
        let Some(name) = self.name_of(node, node.child_by_field_name("name")) else {
            return;
        };
        if self.reject_on_error(node, &name) {
            return;
        }

        let body = node.child_by_field_name("body");
        let kind = self.callable_kind(&name, body, UnitKind::Function);
        let (exported, default_export) = export_flags(node);

        self.candidates.push(Candidate {
            name,
            kind,
            scope: node,
            decl: node,
            params: node.child_by_field_name("parameters"),
            body,
            exported,
            default_export,
        });
    }

    fn class(&mut self, node: Node<'t>) {
        // Anonymous default-exported classes have no name to key on
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let Some(class_name) = self.name_of(node, Some(name_node)) else {
            return;
        };
        let (exported, default_export) = export_flags(node);
        let body = node.child_by_field_name("body");

        if !self.reject_on_error(node, &class_name) {
            let kind = self.callable_kind(&class_name, body, UnitKind::Class);
            self.candidates.push(Candidate {
                name: class_name.clone(),
                kind,
                scope: node,
                decl: node,
                params: None,
                body,
                exported,
                default_export,
            });
        }

        let Some(body) = body else {
            return;
        };
        let mut cursor = body.walk();
        for member in body
            .children(&mut cursor)
            .filter(|m| m.kind() == "method_definition")
        {
            let Some(method_name) = self.name_of(member, member.child_by_field_name("name")) else {
                continue;
            };
            let qualified = format!("{}.{}", class_name, method_name);
            if self.reject_on_error(member, &qualified) {
                continue;
            }
            self.candidates.push(Candidate {
                name: qualified,
                kind: UnitKind::Method,
                scope: member,
                decl: member,
                params: member.child_by_field_name("parameters"),
                body: member.child_by_field_name("body"),
                exported,
                default_export: false,
            });
        }
    }

    fn variable(&mut self, node: Node<'t>) {
        // Only the first declarator of a statement is considered
        let mut cursor = node.walk();
        let Some(declarator) = node
            .children(&mut cursor)
            .find(|c| c.kind() == "variable_declarator")
        else {
            return;
        };
        let Some(value) = declarator.child_by_field_name("value") else {
            return;
        };
        if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
            return;
        }
        let name_node = declarator.child_by_field_name("name");
        if name_node.map(|n| n.kind()) != Some("identifier") && name_node.is_some() {
            // Destructuring patterns do not name a single unit
            return;
        }
        let Some(name) = self.name_of(node, name_node) else {
            return;
        };
        if self.reject_on_error(node, &name) {
            return;
        }

        let body = value.child_by_field_name("body");
        let kind = self.callable_kind(&name, body, UnitKind::CallableConstant);
        let params = value
            .child_by_field_name("parameters")
            .or_else(|| value.child_by_field_name("parameter"));
        let (exported, default_export) = export_flags(node);

        self.candidates.push(Candidate {
            name,
            kind,
            scope: value,
            decl: node,
            params,
            body,
            exported,
            default_export,
        });
    }

    fn name_of(&mut self, decl: Node<'t>, name: Option<Node<'t>>) -> Option<String> {
        let line = decl.start_position().row + 1;
        let Some(name) = name else {
            self.issues.push(ExtractionIssue {
                line,
                message: format!("{} without a name", decl.kind()),
            });
            return None;
        };

        match name.utf8_text(self.source.text.as_bytes()) {
            Ok(text) if !text.trim().is_empty() => Some(text.to_string()),
            _ => {
                self.issues.push(ExtractionIssue {
                    line,
                    message: format!("unreadable name for {}", decl.kind()),
                });
                None
            }
        }
    }

    fn reject_on_error(&mut self, node: Node<'t>, name: &str) -> bool {
        if node.has_error() {
            self.issues.push(ExtractionIssue {
                line: node.start_position().row + 1,
                message: format!("'{}' contains syntax errors", name),
            });
            true
        } else {
            false
        }
    }

    fn callable_kind(&self, name: &str, body: Option<Node<'t>>, fallback: UnitKind) -> UnitKind {
        let capitalized = name.chars().next().map_or(false, |c| c.is_uppercase());
        if self.source.markup && capitalized && body.map_or(false, contains_markup) {
            UnitKind::Component
        } else {
            fallback
        }
    }
}

fn to_unit(source: &ParsedSource, candidate: &Candidate) -> Unit {
    let text_of = |node: Option<Node>| node.map(|n| source.node_text(n).to_string()).unwrap_or_default();

    Unit {
        name: candidate.name.clone(),
        kind: candidate.kind,
        file_path: source.path.clone(),
        params: text_of(candidate.params),
        body: text_of(candidate.body),
        declaration: source.node_text(candidate.decl).to_string(),
        line_range: (
            candidate.decl.start_position().row + 1,
            candidate.decl.end_position().row + 1,
        ),
        is_async: has_token(candidate.scope, "async"),
        exported: candidate.exported,
        default_export: candidate.default_export,
        docs: doc_comment_for(candidate.decl, source),
    }
}

struct CallWalker<'s> {
    source: &'s ParsedSource,
    seen: HashSet<String>,
    guards: Vec<String>,
    calls: Vec<CallSite>,
}

impl CallWalker<'_> {
    fn walk(&mut self, node: Node) {
        match node.kind() {
            "call_expression" => {
                if let Some(callee) = node.child_by_field_name("function") {
                    self.record(callee);
                }
            }
            "new_expression" => {
                if let Some(callee) = node.child_by_field_name("constructor") {
                    self.record(callee);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            let guard = self.guard_for(node, child);
            let pushed = guard.is_some();
            if let Some(guard) = guard {
                self.guards.push(guard);
            }
            self.walk(child);
            if pushed {
                self.guards.pop();
            }
        }
    }

    fn record(&mut self, callee: Node) {
        let (name, expression) = match callee.kind() {
            "identifier" => {
                let text = self.source.node_text(callee).to_string();
                (text.clone(), text)
            }
            "member_expression" => {
                let Some(property) = callee.child_by_field_name("property") else {
                    return;
                };
                (
                    self.source.node_text(property).to_string(),
                    self.source.node_text(callee).to_string(),
                )
            }
            _ => return,
        };

        if !name.is_empty() && self.seen.insert(expression.clone()) {
            self.calls.push(CallSite {
                callee_name: name,
                expression,
                guards: self.guards.clone(),
            });
        }
    }

    /// Guard introduced when descending from `parent` into `child`
    fn guard_for(&self, parent: Node, child: Node) -> Option<String> {
        let is_field = |field: &str| {
            parent
                .child_by_field_name(field)
                .map_or(false, |n| n.id() == child.id())
        };

        match parent.kind() {
            "if_statement" | "ternary_expression" => {
                let condition = self.condensed(parent.child_by_field_name("condition")?);
                if is_field("consequence") {
                    Some(condition)
                } else if is_field("alternative") || child.kind() == "else_clause" {
                    Some(format!("!({})", condition))
                } else {
                    None
                }
            }
            "switch_case" => {
                if is_field("value") {
                    return None;
                }
                let value = self.condensed(parent.child_by_field_name("value")?);
                let discriminant = parent
                    .parent()
                    .and_then(|body| body.parent())
                    .and_then(|switch| switch.child_by_field_name("value"))
                    .map(|d| self.condensed(d))?;
                Some(format!("{} === {}", discriminant, value))
            }
            "switch_default" => {
                let discriminant = parent
                    .parent()
                    .and_then(|body| body.parent())
                    .and_then(|switch| switch.child_by_field_name("value"))
                    .map(|d| self.condensed(d))?;
                Some(format!("{} (default)", discriminant))
            }
            "binary_expression" => {
                if !is_field("right") {
                    return None;
                }
                let operator = parent.child_by_field_name("operator")?;
                let left = self.condensed(parent.child_by_field_name("left")?);
                match self.source.node_text(operator) {
                    "&&" => Some(left),
                    "||" => Some(format!("!({})", left)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Expression text on one line, without enclosing parentheses
    fn condensed(&self, node: Node) -> String {
        let text = self.source.node_text(node).trim();
        let text = if node.kind() == "parenthesized_expression" {
            text.strip_prefix('(')
                .and_then(|t| t.strip_suffix(')'))
                .unwrap_or(text)
        } else {
            text
        };
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Whether a declaration sits directly under `export` / `export default`
fn export_flags(node: Node) -> (bool, bool) {
    match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => (true, has_token(parent, "default")),
        _ => (false, false),
    }
}

fn is_named_default(node: Node) -> bool {
    node.child_by_field_name("name").is_some()
        && node
            .parent()
            .map_or(false, |p| p.kind() == "export_statement" && has_token(p, "default"))
}

fn contains_markup(node: Node) -> bool {
    if node.kind().starts_with("jsx_") {
        return true;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(contains_markup);
    found
}

fn has_token(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

fn first_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}
