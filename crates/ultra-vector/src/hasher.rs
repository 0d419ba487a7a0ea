//! Content hashing and chunk-id derivation.

use std::path::Path;

use sha2::{Digest, Sha256};

/// SHA-256 of `text`, as lowercase hex.
///
/// # Examples
///
/// ```
/// use ultra_vector::hasher::content_hash;
///
/// let hash = content_hash("fn main() {}");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, content_hash("fn main() {}"));
/// ```
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the chunk id `<relative_path>#<index>`.
///
/// # Examples
///
/// ```
/// use ultra_vector::hasher::chunk_id;
///
/// assert_eq!(chunk_id("src/lib.rs", 3), "src/lib.rs#3");
/// ```
pub fn chunk_id(relative_path: &str, index: usize) -> String {
    format!("{relative_path}#{index}")
}

/// Render `path` relative to `root` with `/` separators.
///
/// Paths outside `root` are rendered as given.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use ultra_vector::hasher::relative_path;
///
/// let rel = relative_path(Path::new("/repo"), Path::new("/repo/src/main.rs"));
/// assert_eq!(rel, "src/main.rs");
/// ```
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
