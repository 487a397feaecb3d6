use sha2::{Digest, Sha256};

use super::parser::Unit;

/// Spaces a tab expands to before whitespace is collapsed
const TAB_WIDTH: usize = 4;

/// Length of the display-only hash prefix
pub const SHORT_HASH_LEN: usize = 8;

/// Digest of a unit's parameters and body.
///
/// Name, export modifiers and position are not part of the digest, so a
/// rename or a move leaves it unchanged. Comments inside the body are.
pub fn hash_unit(unit: &Unit) -> String {
    content_hash(&unit.params, &unit.body)
}

pub fn content_hash(params: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(params).as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize(body).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Unify line endings, expand tabs, collapse space runs, trim
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let expanded = unified.replace('\t', &" ".repeat(TAB_WIDTH));

    let mut collapsed = String::with_capacity(expanded.len());
    let mut previous_space = false;
    for c in expanded.chars() {
        if c == ' ' {
            if !previous_space {
                collapsed.push(c);
            }
            previous_space = true;
        } else {
            collapsed.push(c);
            previous_space = false;
        }
    }

    collapsed.trim().to_string()
}

/// Whether `current` no longer matches a recorded digest
pub fn changed(recorded: &str, current: &Unit) -> bool {
    recorded != hash_unit(current)
}

/// Prefix for display; never compare these
pub fn short_hash(hash: &str) -> &str {
    hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::UnitKind;
    use std::path::PathBuf;

    fn unit(name: &str, file: &str, line: usize, params: &str, body: &str) -> Unit {
        Unit {
            name: name.to_string(),
            kind: UnitKind::Function,
            file_path: PathBuf::from(file),
            params: params.to_string(),
            body: body.to_string(),
            declaration: format!("function {}{} {}", name, params, body),
            line_range: (line, line + 2),
            is_async: false,
            exported: false,
            default_export: false,
            docs: None,
        }
    }

    #[test]
    fn test_rename_and_move_do_not_change_hash() {
        let original = unit("add", "src/math.ts", 1, "(a, b)", "{\n  return a + b;\n}");
        let renamed = unit("sum", "lib/other.ts", 40, "(a, b)", "{\n  return a + b;\n}");
        assert!(!changed(&hash_unit(&original), &renamed));

        let edited = unit("add", "src/math.ts", 1, "(a, b)", "{\n  return a - b;\n}");
        assert!(changed(&hash_unit(&original), &edited));
    }

    #[test]
    fn test_whitespace_normalization() {
        let base = content_hash("(a, b)", "{\n  return a + b;\n}");
        assert_eq!(base, content_hash("(a,  b)", "{\r\n\treturn a + b;\r\n}"));
        assert_eq!(base, content_hash(" (a, b) ", "{\r    return a  +  b;\r}\n\n"));
        assert_eq!(normalize("a\t\tb"), "a b");
    }

    #[test]
    fn test_token_edits_change_hash() {
        let base = content_hash("(a, b)", "{ return a + b; }");
        assert_ne!(base, content_hash("(a, b)", "{ return a - b; }"));
        assert_ne!(base, content_hash("(a, c)", "{ return a + b; }"));
        assert_ne!(base, content_hash("(a, b)", "{ return a + b; // sum\n}"));
        assert_ne!(content_hash("(a)", "b"), content_hash("(a)b", ""));
    }

    #[test]
    fn test_hash_shape() {
        let hash = content_hash("()", "{}");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(short_hash(&hash), &hash[..8]);
        assert_eq!(short_hash("abc"), "abc");
    }
}
