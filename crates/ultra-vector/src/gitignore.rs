//! Keeps the store directory out of version control.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::debug;
use ultra_core::{UltraError, STORE_DIR};

/// Whether `STORE_DIR` is already listed in gitignore `content`.
///
/// # Examples
///
/// ```
/// use ultra_vector::gitignore::lists_store_dir;
///
/// assert!(lists_store_dir("target/\n.ultra-mcp/\n"));
/// assert!(!lists_store_dir("target/\n"));
/// ```
pub fn lists_store_dir(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .any(|line| line.trim_start_matches('/').trim_end_matches('/') == STORE_DIR)
}

/// Append `.ultra-mcp/` to the project's `.gitignore` unless already listed.
///
/// An existing file is appended to, never rewritten. A missing file is
/// created only when `root` is a git checkout. An unreadable file is treated
/// as empty. Returns whether the file was modified.
///
/// # Errors
///
/// Returns [`UltraError::Io`] if the file cannot be written.
///
/// # Examples
///
/// ```
/// use ultra_vector::gitignore::ensure_store_ignored;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
/// assert!(ensure_store_ignored(dir.path()).unwrap());
/// assert!(!ensure_store_ignored(dir.path()).unwrap());
/// ```
pub fn ensure_store_ignored(root: &Path) -> Result<bool, UltraError> {
    let path = root.join(".gitignore");

    let existing = if path.is_file() {
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!(error = %e, "treating unreadable .gitignore as empty");
                Some(String::new())
            }
        }
    } else {
        None
    };

    let mut entry = String::new();
    match &existing {
        Some(content) if lists_store_dir(content) => return Ok(false),
        Some(content) if !content.is_empty() && !content.ends_with('\n') => entry.push('\n'),
        Some(_) => {}
        None if !root.join(".git").exists() => return Ok(false),
        None => {}
    }
    entry.push_str(STORE_DIR);
    entry.push_str("/\n");

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(entry.as_bytes())?;
    debug!(path = %path.display(), "added store directory to .gitignore");
    Ok(true)
}
