use std::path::PathBuf;

/// Errors that can occur across the indexing engine.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate reports it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use ultra_core::UltraError;
///
/// let err = UltraError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum UltraError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single file could not be enumerated or read.
    #[error("failed to scan {}: {message}", path.display())]
    Scan {
        /// File that failed.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// Embedding provider request or response error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The vector store file or its base schema could not be created.
    #[error("failed to initialize vector store: {0}")]
    StoreInit(String),

    /// Vector store read/write failure outside of search and clear.
    #[error("database error: {0}")]
    Database(String),

    /// Vector store read failure while answering a query.
    #[error("search failed: {0}")]
    Search(String),

    /// Full-store delete failed; nothing was removed.
    #[error("failed to clear vector store: {0}")]
    Clear(String),

    /// A vector's length does not match the store's recorded dimension.
    #[error(
        "embedding has {actual} dimensions but the index was built with {expected}; \
         run `ultra-index clear` before switching embedding providers"
    )]
    DimensionMismatch {
        /// Dimension recorded in the store.
        expected: usize,
        /// Dimension of the rejected vector.
        actual: usize,
    },

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: UltraError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = UltraError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn scan_error_shows_path_and_cause() {
        let err = UltraError::Scan {
            path: PathBuf::from("src/lib.rs"),
            message: "permission denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("src/lib.rs"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn dimension_mismatch_mentions_both_sizes() {
        let err = UltraError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        let msg = err.to_string();
        assert!(msg.contains("1536"));
        assert!(msg.contains("768"));
        assert!(msg.contains("clear"));
    }

    #[test]
    fn embedding_error_preserves_provider_message() {
        let err = UltraError::Embedding("OpenAI API returned 429: rate limited".into());
        assert!(err.to_string().contains("rate limited"));
    }
}
