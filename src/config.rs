use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DocgraphError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source code parsing configuration
    pub parsing: ParsingConfig,

    /// Module specifier resolution settings
    pub resolution: ResolutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Source directories to analyze
    pub source_dirs: Vec<PathBuf>,

    /// Gitignore-style patterns to skip during discovery
    pub ignore_patterns: Vec<String>,

    /// Where the graph snapshot is written, relative to the project root
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// File extensions to parse
    pub extensions: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Suffixes appended to a specifier base path, tried in order
    pub resolve_suffixes: Vec<String>,

    /// Project configuration files that may declare path aliases
    pub project_config_files: Vec<String>,

    /// Path prefixes used to re-root snapshot paths recorded on another machine
    pub root_prefixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "Unnamed Project".to_string(),
                source_dirs: vec![PathBuf::from("src")],
                ignore_patterns: vec![
                    "node_modules/".to_string(),
                    "dist/".to_string(),
                    "build/".to_string(),
                    ".next/".to_string(),
                    "*.d.ts".to_string(),
                ],
                snapshot_path: PathBuf::from(".docgraph/graph.json"),
            },
            parsing: ParsingConfig::default(),
            resolution: ResolutionConfig::default(),
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            extensions: ["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            resolve_suffixes: [
                ".ts", ".tsx", ".js", ".jsx", "/index.ts", "/index.tsx", "/index.js", "/index.jsx",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            project_config_files: vec!["tsconfig.json".to_string(), "jsconfig.json".to_string()],
            root_prefixes: ["src/", "app/", "lib/", "pages/", "packages/", "components/"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| DocgraphError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| DocgraphError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                let candidates = ["docgraph.toml", "Docgraph.toml", ".docgraph.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docgraph.toml");

        let mut config = Config::default();
        config.project.name = "storefront".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.project.name, "storefront");
        assert_eq!(loaded.resolution.resolve_suffixes, config.resolution.resolve_suffixes);
    }

    #[test]
    fn test_missing_explicit_path_falls_back_to_default() {
        let config = Config::load_or_default(Some("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.project.snapshot_path, PathBuf::from(".docgraph/graph.json"));
    }

    #[test]
    fn test_malformed_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docgraph.toml");
        std::fs::write(&path, "project = [").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, DocgraphError::Config(_)));
    }
}
