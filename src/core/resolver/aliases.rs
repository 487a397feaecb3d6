use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{debug, warn};

use super::normalize_path;

/// Directory -> aliases of the nearest project config at or above it.
/// `None` records that no usable config was found.
static ALIAS_CACHE: Lazy<DashMap<PathBuf, Option<Arc<PathAliases>>>> = Lazy::new(DashMap::new);

/// Wildcard path aliases declared by one project config file
#[derive(Debug)]
pub struct PathAliases {
    pub config_path: PathBuf,
    base_dir: PathBuf,
    /// Sorted by prefix length, longest first
    mappings: Vec<AliasMapping>,
}

#[derive(Debug)]
struct AliasMapping {
    prefix: String,
    targets: Vec<String>,
}

impl PathAliases {
    /// Candidate base paths for a specifier, from the longest matching prefix
    pub fn candidates(&self, specifier: &str) -> Vec<PathBuf> {
        let Some(mapping) = self
            .mappings
            .iter()
            .find(|m| specifier.starts_with(&m.prefix))
        else {
            return Vec::new();
        };

        let rest = &specifier[mapping.prefix.len()..];
        mapping
            .targets
            .iter()
            .map(|target| normalize_path(&self.base_dir.join(format!("{}{}", target, rest))))
            .collect()
    }
}

/// Aliases in effect for files in `dir`.
///
/// Walks upward to the nearest directory holding one of `config_files`.
/// Every directory visited on the way is cached with the result.
pub fn aliases_for(dir: &Path, config_files: &[String]) -> Option<Arc<PathAliases>> {
    let mut visited = Vec::new();
    let mut current = Some(dir);

    let found = loop {
        let Some(d) = current else {
            break None;
        };
        if let Some(hit) = ALIAS_CACHE.get(d) {
            break hit.value().clone();
        }
        visited.push(d.to_path_buf());

        if let Some(config) = config_files.iter().map(|f| d.join(f)).find(|p| p.is_file()) {
            break load_aliases(&config).map(Arc::new);
        }
        current = d.parent();
    };

    for d in visited {
        ALIAS_CACHE.insert(d, found.clone());
    }
    found
}

/// Drop every cached lookup
pub fn clear_alias_cache() {
    ALIAS_CACHE.clear();
}

fn load_aliases(config_path: &Path) -> Option<PathAliases> {
    let content = match std::fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read {}: {}", config_path.display(), e);
            return None;
        }
    };

    let json: Value = match serde_json::from_str(&strip_jsonc(&content)) {
        Ok(json) => json,
        Err(e) => {
            warn!(
                "Ignoring path aliases in malformed {}: {}",
                config_path.display(),
                e
            );
            return None;
        }
    };

    let options = json.get("compilerOptions")?;
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let base_dir = match options.get("baseUrl").and_then(Value::as_str) {
        Some(base_url) => normalize_path(&config_dir.join(base_url)),
        None => config_dir.to_path_buf(),
    };

    let mut mappings: Vec<AliasMapping> = options
        .get("paths")
        .and_then(Value::as_object)?
        .iter()
        .filter_map(|(pattern, targets)| {
            let prefix = pattern.strip_suffix('*')?;
            let targets: Vec<String> = targets
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|t| t.strip_suffix('*'))
                .map(str::to_string)
                .collect();
            (!targets.is_empty()).then(|| AliasMapping {
                prefix: prefix.to_string(),
                targets,
            })
        })
        .collect();

    if mappings.is_empty() {
        return None;
    }
    mappings.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

    debug!(
        "Loaded {} path aliases from {}",
        mappings.len(),
        config_path.display()
    );

    Some(PathAliases {
        config_path: config_path.to_path_buf(),
        base_dir,
        mappings,
    })
}

/// Turn JSON-with-comments into plain JSON.
///
/// Comment markers inside string literals are left alone, so `"@/*"` survives.
/// Trailing commas before `}` or `]` are removed.
pub fn strip_jsonc(input: &str) -> String {
    let without_comments = strip_comments(input);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 1;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}
