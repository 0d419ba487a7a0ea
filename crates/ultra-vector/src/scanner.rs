//! Project file enumeration.
//!
//! Combines the built-in exclusions with the project's `.gitignore` into one
//! gitignore matcher, prunes excluded directories during the walk, and keeps
//! files matching at least one include glob.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;
use ultra_core::{IndexConfig, UltraError};

use crate::hasher::relative_path;

/// Paths never indexed: dependency and build directories, VCS metadata, the
/// store's own directory and the project config file, which may hold an API key.
pub const BUILTIN_EXCLUDES: &[&str] = &[
    "node_modules/",
    "target/",
    "dist/",
    "build/",
    "out/",
    "coverage/",
    "vendor/",
    ".git/",
    ".hg/",
    ".svn/",
    ".next/",
    "__pycache__/",
    ".venv/",
    ".ultra-mcp/",
    ".ultra-mcp.toml",
];

/// Enumerates candidate files under a project root.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use ultra_core::IndexConfig;
/// use ultra_vector::scanner::FileScanner;
///
/// let scanner = FileScanner::new(Path::new("."), &IndexConfig::default());
/// for path in scanner.scan().unwrap() {
///     println!("{}", path.display());
/// }
/// ```
pub struct FileScanner {
    root: PathBuf,
    include: Vec<glob::Pattern>,
    ignore: Arc<Gitignore>,
    max_file_bytes: u64,
}

impl FileScanner {
    /// Build a scanner for `root` from the `[index]` configuration.
    ///
    /// The root is canonicalized so scanned paths are absolute even when
    /// `root` is relative. Invalid include globs are dropped. An unreadable
    /// `.gitignore` is skipped and only the built-in and configured excludes
    /// apply.
    pub fn new(root: &Path, config: &IndexConfig) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let mut include = Vec::new();
        for pat in &config.include {
            match glob::Pattern::new(pat) {
                Ok(p) => include.push(p),
                Err(e) => debug!(pattern = %pat, error = %e, "ignoring invalid include pattern"),
            }
        }

        Self {
            ignore: Arc::new(build_ignore(&root, &config.exclude)),
            root,
            include,
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Project root this scanner walks.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a path under the root is excluded by the ignore rules.
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        self.ignore.matched(path, is_dir).is_ignore()
    }

    /// Whether a root-relative, `/`-separated path matches an include glob.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use ultra_core::IndexConfig;
    /// use ultra_vector::scanner::FileScanner;
    ///
    /// let scanner = FileScanner::new(Path::new("/repo"), &IndexConfig::default());
    /// assert!(scanner.is_included("src/main.rs"));
    /// assert!(!scanner.is_included("assets/logo.png"));
    /// ```
    pub fn is_included(&self, relative: &str) -> bool {
        self.include.iter().any(|p| p.matches(relative))
    }

    /// Walk the project and return absolute paths of files to index, sorted.
    ///
    /// Files larger than `max_file_bytes` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::FileNotFound`] if the root is not a directory.
    /// Failures on individual entries are logged and skipped.
    pub fn scan(&self) -> Result<Vec<PathBuf>, UltraError> {
        if !self.root.is_dir() {
            return Err(UltraError::FileNotFound(self.root.clone()));
        }

        let matcher = Arc::clone(&self.ignore);
        let walker = ignore::WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !matcher.matched(entry.path(), is_dir).is_ignore()
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            let relative = relative_path(&self.root, path);
            if !self.is_included(&relative) {
                continue;
            }

            match entry.metadata() {
                Ok(m) if m.len() > self.max_file_bytes => {
                    debug!(path = %relative, size = m.len(), "skipping large file");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(path = %relative, error = %e, "skipping file without metadata");
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }
}

fn build_ignore(root: &Path, extra: &[String]) -> Gitignore {
    let builtin = || {
        let mut builder = GitignoreBuilder::new(root);
        for line in BUILTIN_EXCLUDES {
            if let Err(e) = builder.add_line(None, line) {
                debug!(pattern = %line, error = %e, "invalid built-in exclude");
            }
        }
        for line in extra {
            if let Err(e) = builder.add_line(None, line) {
                debug!(pattern = %line, error = %e, "ignoring invalid exclude pattern");
            }
        }
        builder
    };

    let mut builder = builtin();
    let gitignore = root.join(".gitignore");
    if gitignore.is_file() {
        if let Some(e) = builder.add(&gitignore) {
            debug!(error = %e, "could not fully read .gitignore");
        }
    }

    match builder.build() {
        Ok(matcher) => matcher,
        Err(e) => {
            debug!(error = %e, "falling back to built-in excludes");
            builtin().build().unwrap_or_else(|_| Gitignore::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn make_temp_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/nested/util.py"), "def hello(): pass").unwrap();
        fs::write(root.join("README.md"), "# Hello").unwrap();
        fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();

        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1").unwrap();
        fs::create_dir_all(root.join(".ultra-mcp")).unwrap();
        fs::write(root.join(".ultra-mcp/notes.md"), "internal").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.toml"), "x = 1").unwrap();

        dir
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        let root = root.canonicalize().unwrap();
        files.iter().map(|p| relative_path(&root, p)).collect()
    }

    #[test]
    fn scan_finds_included_files_and_skips_builtins() {
        let dir = make_temp_repo();
        let scanner = FileScanner::new(dir.path(), &IndexConfig::default());
        let files = scanner.scan().unwrap();

        assert!(files.iter().all(|p| p.is_absolute()));
        assert_eq!(
            relative(dir.path(), &files),
            vec!["README.md", "src/main.rs", "src/nested/util.py"]
        );
    }

    #[test]
    fn scan_respects_gitignore() {
        let dir = make_temp_repo();
        let root = dir.path();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("generated/out.rs"), "fn ignored() {}").unwrap();
        fs::write(root.join("src/secret.md"), "hidden").unwrap();
        fs::write(root.join(".gitignore"), "generated/\n*.md\n!README.md\n").unwrap();

        let files = FileScanner::new(root, &IndexConfig::default()).scan().unwrap();
        let rel = relative(root, &files);
        assert!(!rel.iter().any(|p| p.starts_with("generated")), "{rel:?}");
        assert!(!rel.contains(&"src/secret.md".to_string()), "{rel:?}");
        assert!(rel.contains(&"README.md".to_string()), "{rel:?}");
    }

    #[test]
    fn configured_excludes_apply() {
        let dir = make_temp_repo();
        let config = IndexConfig {
            exclude: vec!["src/nested/".into()],
            ..IndexConfig::default()
        };
        let files = FileScanner::new(dir.path(), &config).scan().unwrap();
        assert_eq!(relative(dir.path(), &files), vec!["README.md", "src/main.rs"]);
    }

    #[test]
    fn include_patterns_narrow_the_scan() {
        let dir = make_temp_repo();
        let config = IndexConfig {
            include: vec!["**/*.py".into()],
            ..IndexConfig::default()
        };
        let files = FileScanner::new(dir.path(), &config).scan().unwrap();
        assert_eq!(relative(dir.path(), &files), vec!["src/nested/util.py"]);
    }

    #[test]
    fn large_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(2048)).unwrap();
        fs::write(dir.path().join("ok.txt"), "small").unwrap();
        let config = IndexConfig {
            max_file_bytes: 1024,
            ..IndexConfig::default()
        };
        let files = FileScanner::new(dir.path(), &config).scan().unwrap();
        assert_eq!(relative(dir.path(), &files), vec!["ok.txt"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = FileScanner::new(&dir.path().join("nope"), &IndexConfig::default());
        assert!(matches!(scanner.scan(), Err(UltraError::FileNotFound(_))));
    }

    #[test]
    fn builtin_directories_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = FileScanner::new(dir.path(), &IndexConfig::default());
        assert!(scanner.is_excluded(&dir.path().join("node_modules"), true));
        assert!(scanner.is_excluded(&dir.path().join(".ultra-mcp"), true));
        assert!(!scanner.is_excluded(&dir.path().join("src"), true));
        assert_eq!(scanner.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn project_config_file_is_never_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join(".ultra-mcp.toml"),
            "[embedding]\nprovider = \"openai\"\napi_key = \"sk-secret\"\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/.ultra-mcp.toml"), "api_key = \"sk-nested\"\n").unwrap();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();

        let files = FileScanner::new(root, &IndexConfig::default()).scan().unwrap();
        let rel = relative(root, &files);
        assert!(!rel.iter().any(|p| p.contains(".ultra-mcp.toml")), "{rel:?}");
        assert_eq!(rel, vec!["Cargo.toml", "main.rs"]);
    }

    #[test]
    fn non_canonical_root_yields_clean_absolute_paths() {
        let dir = make_temp_repo();
        let files = FileScanner::new(&dir.path().join("src/.."), &IndexConfig::default())
            .scan()
            .unwrap();

        assert_eq!(files.len(), 3);
        for path in &files {
            assert!(path.is_absolute(), "{}", path.display());
            assert!(
                path.components().all(|c| !matches!(
                    c,
                    std::path::Component::CurDir | std::path::Component::ParentDir
                )),
                "{}",
                path.display()
            );
        }
        assert_eq!(
            relative(dir.path(), &files),
            vec!["README.md", "src/main.rs", "src/nested/util.py"]
        );
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let scanner = FileScanner::new(Path::new("."), &IndexConfig::default());
        assert!(scanner.root().is_absolute());
    }
}
