use tree_sitter::Node;

use crate::core::parser::ParsedSource;

/// Structured form of a `/** ... */` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocComment {
    pub description: Option<String>,
    pub params: Vec<ParamDoc>,
    pub returns: Option<String>,
    pub examples: Vec<String>,
    pub throws: Vec<String>,
    pub see: Vec<String>,
    pub deprecated: Option<Deprecation>,
    /// Any tag without dedicated handling, e.g. `@listens`
    pub tags: Vec<DocTag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDoc {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Deprecation {
    /// `@deprecated` with no text
    Flagged,
    Reason(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocTag {
    pub name: String,
    pub text: String,
}

impl DocComment {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.text.as_str())
    }

    fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.params.is_empty()
            && self.returns.is_none()
            && self.examples.is_empty()
            && self.throws.is_empty()
            && self.see.is_empty()
            && self.deprecated.is_none()
            && self.tags.is_empty()
    }
}

/// Find the doc comment directly preceding a declaration.
///
/// Declarations wrapped in `export` carry the comment on the export statement.
pub fn doc_comment_for(node: Node, source: &ParsedSource) -> Option<DocComment> {
    let mut anchor = node;
    if let Some(parent) = node.parent() {
        if parent.kind() == "export_statement" {
            anchor = parent;
        }
    }

    let prev = anchor.prev_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }

    let text = source.node_text(prev);
    if text.starts_with("/**") && !text.starts_with("/**/") {
        parse_doc_comment(text)
    } else {
        None
    }
}

/// Parse raw comment text. Returns `None` when the block carries nothing.
pub fn parse_doc_comment(raw: &str) -> Option<DocComment> {
    let inner = raw
        .trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/");

    let lines: Vec<&str> = inner
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line).trim_end()
        })
        .collect();

    let mut doc = DocComment::default();
    let mut description = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in lines {
        if let Some(rest) = line.trim_start().strip_prefix('@') {
            if let Some((name, body)) = current.take() {
                apply_tag(&mut doc, &name, &body);
            }
            let (name, text) = match rest.split_once(char::is_whitespace) {
                Some((name, text)) => (name, text.trim()),
                None => (rest, ""),
            };
            current = Some((name.to_string(), vec![text]));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        } else {
            description.push(line);
        }
    }
    if let Some((name, body)) = current.take() {
        apply_tag(&mut doc, &name, &body);
    }

    let description = description.join("\n").trim().to_string();
    if !description.is_empty() {
        doc.description = Some(description);
    }

    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

fn apply_tag(doc: &mut DocComment, name: &str, body: &[&str]) {
    if name == "example" {
        let text = body.join("\n").trim_matches('\n').to_string();
        doc.examples.push(text);
        return;
    }

    let text = body
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match name {
        "param" | "arg" | "argument" => {
            let text = strip_type(&text);
            let (param, rest) = match text.split_once(char::is_whitespace) {
                Some((param, rest)) => (param, rest.trim()),
                None => (text, ""),
            };
            if param.is_empty() {
                return;
            }
            let description = rest.strip_prefix('-').unwrap_or(rest).trim();
            doc.params.push(ParamDoc {
                name: param.to_string(),
                description: description.to_string(),
            });
        }
        "returns" | "return" => {
            let text = strip_type(&text);
            if !text.is_empty() {
                doc.returns = Some(text.to_string());
            }
        }
        "throws" | "exception" => doc.throws.push(text),
        "see" => doc.see.push(text),
        "deprecated" => {
            doc.deprecated = Some(if text.is_empty() {
                Deprecation::Flagged
            } else {
                Deprecation::Reason(text)
            });
        }
        _ => doc.tags.push(DocTag {
            name: name.to_string(),
            text,
        }),
    }
}

/// Drop a leading `{Type}` annotation, honouring nested braces
fn strip_type(text: &str) -> &str {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
        return trimmed;
    }

    let mut depth = 0usize;
    for (i, c) in trimmed.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return trimmed[i + 1..].trim_start();
                }
            }
            _ => {}
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_block() {
        let raw = r#"/**
 * Charge a customer.
 *
 * Retries once on network failure.
 * @param {string} customerId - The customer to charge
 * @param {{ amount: number }} opts payment options
 * @returns {Promise<Receipt>} the receipt
 * @throws {PaymentError} when the card is declined
 * @see billing/README.md
 * @example
 * await charge("c_1", { amount: 5 });
 * @deprecated use chargeV2
 * @listens order.created
 */"#;
        let doc = parse_doc_comment(raw).unwrap();

        assert_eq!(
            doc.description.as_deref(),
            Some("Charge a customer.\n\nRetries once on network failure.")
        );
        assert_eq!(doc.params.len(), 2);
        assert_eq!(doc.params[0].name, "customerId");
        assert_eq!(doc.params[0].description, "The customer to charge");
        assert_eq!(doc.params[1].name, "opts");
        assert_eq!(doc.params[1].description, "payment options");
        assert_eq!(doc.returns.as_deref(), Some("the receipt"));
        assert_eq!(doc.throws, vec!["{PaymentError} when the card is declined"]);
        assert_eq!(doc.see, vec!["billing/README.md"]);
        assert_eq!(doc.examples, vec!["await charge(\"c_1\", { amount: 5 });"]);
        assert_eq!(
            doc.deprecated,
            Some(Deprecation::Reason("use chargeV2".to_string()))
        );
        assert_eq!(doc.tag("listens"), Some("order.created"));
    }

    #[test]
    fn test_bare_deprecated_is_flag() {
        let doc = parse_doc_comment("/** @deprecated */").unwrap();
        assert_eq!(doc.deprecated, Some(Deprecation::Flagged));
        assert!(doc.description.is_none());
    }

    #[test]
    fn test_empty_block_is_absent() {
        assert!(parse_doc_comment("/** */").is_none());
        assert!(parse_doc_comment("/**\n *\n */").is_none());
    }

    #[test]
    fn test_repeated_examples_are_kept() {
        let raw = "/**\n * @example\n * a()\n * @example\n * b()\n */";
        let doc = parse_doc_comment(raw).unwrap();
        assert_eq!(doc.examples, vec!["a()", "b()"]);
    }
}
