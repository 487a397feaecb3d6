use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{DocgraphError, Result};
use super::languages::{javascript, DocComment};

/// Syntactic category of an extracted unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    Function,
    Class,
    CallableConstant,
    Method,
    Component,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::Function => write!(f, "function"),
            UnitKind::Class => write!(f, "class"),
            UnitKind::CallableConstant => write!(f, "callable-constant"),
            UnitKind::Method => write!(f, "method"),
            UnitKind::Component => write!(f, "component"),
        }
    }
}

/// A named, independently documentable code construct
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Name as declared (`Class.method` for methods)
    pub name: String,

    pub kind: UnitKind,

    /// File the unit was extracted from
    pub file_path: PathBuf,

    /// Parameter list text, including parentheses when present
    pub params: String,

    /// Body text
    pub body: String,

    /// Full declaration text
    pub declaration: String,

    /// 1-indexed, inclusive
    pub line_range: (usize, usize),

    pub is_async: bool,

    pub exported: bool,

    pub default_export: bool,

    /// Attached `/** ... */` comment, if any
    pub docs: Option<DocComment>,
}

/// How an import binds its local name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
}

/// A top-level `import` binding
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    /// Name bound in the importing file
    pub local_name: String,
    /// Name exported by the target module (`default` / `*` for those forms)
    pub original_name: String,
    pub specifier: String,
    pub kind: ImportKind,
}

/// A top-level `export ... from` binding
#[derive(Debug, Clone, PartialEq)]
pub struct ReExportDecl {
    /// Name this module exports (`*` for star re-exports)
    pub exported_name: String,
    /// Name in the target module
    pub original_name: String,
    pub specifier: String,
}

/// A call made inside a unit
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Identifier being invoked (`save` for `repo.save()`)
    pub callee_name: String,
    /// Full callee expression (`repo.save`)
    pub expression: String,
    /// Enclosing conditional guards, outermost first
    pub guards: Vec<String>,
}

/// A declaration that could not be turned into a unit
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionIssue {
    pub line: usize,
    pub message: String,
}

/// Grammar used for a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    TypeScript,
    Tsx,
    JavaScript,
}

impl SourceLanguage {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str())? {
            "ts" | "mts" | "cts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(SourceLanguage::JavaScript),
            _ => None,
        }
    }

    fn grammar(&self) -> Language {
        match self {
            SourceLanguage::TypeScript => tree_sitter_typescript::language_typescript(),
            SourceLanguage::Tsx => tree_sitter_typescript::language_tsx(),
            SourceLanguage::JavaScript => tree_sitter_javascript::language(),
        }
    }
}

/// Whether inline markup is legal in this file, which gates the component kind
pub fn is_markup_capable(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("tsx") | Some("jsx")
    )
}

/// Everything extracted from one file in a single parse
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub units: Vec<Unit>,
    /// `calls[i]` holds the call sites made inside `units[i]`
    pub calls: Vec<Vec<CallSite>>,
    pub imports: Vec<ImportDecl>,
    pub re_exports: Vec<ReExportDecl>,
    pub issues: Vec<ExtractionIssue>,
}

impl FileExtraction {
    /// Calls made by `owner`; a redeclared name resolves to its last declaration
    pub fn call_sites(&self, owner: &str) -> &[CallSite] {
        self.units
            .iter()
            .rposition(|unit| unit.name == owner)
            .and_then(|i| self.calls.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A source file held together with its syntax tree
pub struct ParsedSource {
    pub path: PathBuf,
    pub markup: bool,
    pub text: String,
    tree: Tree,
}

impl ParsedSource {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn node_text(&self, node: Node) -> &str {
        self.text.get(node.byte_range()).unwrap_or("")
    }
}

/// Parses JS/TS sources and exposes the symbol-extraction operations over them
pub struct SourceParser {
    typescript: Parser,
    tsx: Parser,
    javascript: Parser,
    max_file_size: usize,
}

impl SourceParser {
    pub fn new(max_file_size: usize) -> Result<Self> {
        Ok(Self {
            typescript: Self::parser_for(SourceLanguage::TypeScript)?,
            tsx: Self::parser_for(SourceLanguage::Tsx)?,
            javascript: Self::parser_for(SourceLanguage::JavaScript)?,
            max_file_size,
        })
    }

    fn parser_for(language: SourceLanguage) -> Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&language.grammar()).map_err(|e| {
            DocgraphError::Config(format!("Failed to set {:?} language: {}", language, e))
        })?;
        Ok(parser)
    }

    /// Read and parse one file
    pub fn parse_file<P: AsRef<Path>>(&mut self, file_path: P) -> Result<ParsedSource> {
        let path = file_path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DocgraphError::parse(path, format!("unreadable: {}", e)))?;
        self.parse_source(path, text)
    }

    /// Parse already-loaded source text
    pub fn parse_source(&mut self, path: &Path, text: String) -> Result<ParsedSource> {
        if text.len() > self.max_file_size {
            return Err(DocgraphError::parse(path, "exceeds maximum size limit"));
        }

        let language = SourceLanguage::from_path(path)
            .ok_or_else(|| DocgraphError::parse(path, "unsupported file extension"))?;

        let parser = match language {
            SourceLanguage::TypeScript => &mut self.typescript,
            SourceLanguage::Tsx => &mut self.tsx,
            SourceLanguage::JavaScript => &mut self.javascript,
        };

        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| DocgraphError::parse(path, "tree-sitter produced no tree"))?;

        Ok(ParsedSource {
            path: path.to_path_buf(),
            markup: is_markup_capable(path),
            text,
            tree,
        })
    }

    /// Every unit in the file plus the declarations that failed extraction
    pub fn extract_all<P: AsRef<Path>>(
        &mut self,
        file_path: P,
    ) -> Result<(Vec<Unit>, Vec<ExtractionIssue>)> {
        let source = self.parse_file(file_path)?;
        Ok(javascript::extract_units(&source))
    }

    /// The unit called `name`, if the file declares one. When a name is
    /// declared more than once the last declaration wins, matching the graph.
    pub fn extract_one<P: AsRef<Path>>(&mut self, file_path: P, name: &str) -> Result<Option<Unit>> {
        let (units, _) = self.extract_all(file_path)?;
        Ok(units.into_iter().rev().find(|unit| unit.name == name))
    }

    /// Units, their call sites, imports and re-exports from one parse
    pub fn extract_file<P: AsRef<Path>>(&mut self, file_path: P) -> Result<FileExtraction> {
        let source = self.parse_file(file_path)?;
        let (pairs, issues) = javascript::extract_units_with_calls(&source);
        let (units, calls) = pairs.into_iter().unzip();

        Ok(FileExtraction {
            units,
            calls,
            imports: javascript::extract_imports(&source),
            re_exports: javascript::extract_re_exports(&source),
            issues,
        })
    }
}
