//! Module specifier resolution
//!
//! Turns `./util`, `../lib/api.js` or `@/components/Button` into a concrete
//! source file. Bare package specifiers never resolve.

mod aliases;

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::trace;

use crate::config::ResolutionConfig;

use aliases::aliases_for;
pub use aliases::clear_alias_cache;

/// Compiled-output extensions and the source extensions they may stand in for
const EXTENSION_SWAPS: &[(&str, &[&str])] = &[
    ("js", &["ts", "tsx"]),
    ("jsx", &["tsx"]),
    ("mjs", &["mts"]),
    ("cjs", &["cts"]),
];

pub struct ModuleResolver {
    suffixes: Vec<String>,
    config_files: Vec<String>,
}

impl ModuleResolver {
    pub fn new(config: &ResolutionConfig) -> Self {
        Self {
            suffixes: config.resolve_suffixes.clone(),
            config_files: config.project_config_files.clone(),
        }
    }

    /// Resolve `specifier` as written in `from_file`
    pub fn resolve(&self, from_file: &Path, specifier: &str) -> Option<PathBuf> {
        let from_dir = from_file.parent().unwrap_or_else(|| Path::new("."));

        let resolved = if is_relative(specifier) {
            self.existing_file(&normalize_path(&from_dir.join(specifier)))
        } else {
            let aliases = aliases_for(from_dir, &self.config_files)?;
            aliases
                .candidates(specifier)
                .into_iter()
                .find_map(|base| self.existing_file(&base))
        };

        trace!(
            "resolve {} from {} -> {:?}",
            specifier,
            from_file.display(),
            resolved
        );
        resolved
    }

    /// Try the path as-is, then extension swaps, then each configured suffix
    fn existing_file(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }

        if let Some(ext) = base.extension().and_then(|e| e.to_str()) {
            if let Some((_, replacements)) = EXTENSION_SWAPS.iter().find(|(from, _)| *from == ext) {
                for replacement in replacements.iter() {
                    let candidate = base.with_extension(replacement);
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }
        }

        self.suffixes.iter().find_map(|suffix| {
            let mut raw: OsString = base.as_os_str().to_owned();
            raw.push(suffix);
            let candidate = PathBuf::from(raw);
            candidate.is_file().then_some(candidate)
        })
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Lexically resolve `.` and `..` segments without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn resolver() -> ModuleResolver {
        ModuleResolver::new(&ResolutionConfig::default())
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/./c/../d.ts")),
            PathBuf::from("/a/b/d.ts")
        );
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_relative_resolution_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/app.ts").touch().unwrap();
        temp.child("src/util.ts").touch().unwrap();
        temp.child("src/lib/index.tsx").touch().unwrap();
        temp.child("src/legacy.js").touch().unwrap();
        temp.child("src/typed.ts").touch().unwrap();

        let from = temp.child("src/app.ts").path().to_path_buf();
        let r = resolver();

        assert_eq!(r.resolve(&from, "./util"), Some(temp.child("src/util.ts").path().to_path_buf()));
        assert_eq!(r.resolve(&from, "./lib"), Some(temp.child("src/lib/index.tsx").path().to_path_buf()));
        assert_eq!(r.resolve(&from, "./legacy.js"), Some(temp.child("src/legacy.js").path().to_path_buf()));
        assert_eq!(r.resolve(&from, "./typed.js"), Some(temp.child("src/typed.ts").path().to_path_buf()));
        assert_eq!(r.resolve(&from, "./missing"), None);
    }

    #[test]
    fn test_parent_directory_specifier() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/shared/format.ts").touch().unwrap();
        temp.child("src/pages/home.ts").touch().unwrap();

        let from = temp.child("src/pages/home.ts").path().to_path_buf();
        assert_eq!(
            resolver().resolve(&from, "../shared/format"),
            Some(temp.child("src/shared/format.ts").path().to_path_buf())
        );
    }

    #[test]
    fn test_bare_specifier_is_unresolved() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.ts").touch().unwrap();
        temp.child("node_modules/react/index.js").touch().unwrap();

        let from = temp.child("app.ts").path().to_path_buf();
        assert_eq!(resolver().resolve(&from, "react"), None);
    }

    #[test]
    fn test_alias_resolution() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("tsconfig.json")
            .write_str(
                r#"{
  // editor settings
  "compilerOptions": {
    "baseUrl": ".",
    "paths": {
      "@/*": ["./src/*"], /* project root */
      "@ui/*": ["./src/components/ui/*"],
    },
  },
}"#,
            )
            .unwrap();
        temp.child("src/lib/db.ts").touch().unwrap();
        temp.child("src/components/ui/Button.tsx").touch().unwrap();
        temp.child("src/pages/index.tsx").touch().unwrap();

        let from = temp.child("src/pages/index.tsx").path().to_path_buf();
        let r = resolver();
        assert_eq!(r.resolve(&from, "@/lib/db"), Some(temp.child("src/lib/db.ts").path().to_path_buf()));
        assert_eq!(
            r.resolve(&from, "@ui/Button"),
            Some(temp.child("src/components/ui/Button.tsx").path().to_path_buf())
        );
        assert_eq!(r.resolve(&from, "@/lib/missing"), None);
    }
}
