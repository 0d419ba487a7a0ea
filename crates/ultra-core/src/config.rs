use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::UltraError;

/// Top-level configuration loaded from `.ultra-mcp.toml`.
///
/// Every section is optional; missing keys fall back to their defaults.
///
/// # Examples
///
/// ```
/// use ultra_core::UltraConfig;
///
/// let config = UltraConfig::default();
/// assert_eq!(config.index.chunk_size, 1500);
/// assert_eq!(config.search.limit, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UltraConfig {
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Chunking, batching and file selection.
    #[serde(default)]
    pub index: IndexConfig,
    /// Search defaults.
    #[serde(default)]
    pub search: SearchConfig,
    /// Vector store behavior.
    #[serde(default)]
    pub store: StoreConfig,
}

impl UltraConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Io`] if the file cannot be read, or
    /// [`UltraError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ultra_core::UltraConfig;
    /// use std::path::Path;
    ///
    /// let config = UltraConfig::from_file(Path::new(".ultra-mcp.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, UltraError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use ultra_core::UltraConfig;
    ///
    /// let toml = r#"
    /// [index]
    /// chunk_size = 800
    /// "#;
    /// let config = UltraConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.index.chunk_size, 800);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, UltraError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Embedding provider configuration.
///
/// # Examples
///
/// ```
/// use ultra_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert!(config.model.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: `"openai"`, `"azure"`, `"gemini"` or `"voyage"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name, or the deployment name for Azure. Provider default when unset.
    pub model: Option<String>,
    /// API key. Falls back to the provider's environment variable.
    pub api_key: Option<String>,
    /// Custom base URL (OpenAI-compatible servers, Azure endpoint).
    pub base_url: Option<String>,
    /// Azure OpenAI `api-version` query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Requested output dimensions, for providers that support truncation.
    pub dimensions: Option<usize>,
}

fn default_embedding_provider() -> String {
    "openai".into()
}

fn default_api_version() -> String {
    "2024-02-01".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            api_key: None,
            base_url: None,
            api_version: default_api_version(),
            dimensions: None,
        }
    }
}

/// Indexing configuration.
///
/// # Examples
///
/// ```
/// use ultra_core::IndexConfig;
///
/// let config = IndexConfig::default();
/// assert_eq!(config.chunk_overlap, 200);
/// assert_eq!(config.batch_size, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum characters per chunk (default: 1500).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks (default: 200).
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Files per embedding batch (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Glob patterns a file must match to be indexed.
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    /// Extra gitignore-style patterns to exclude, on top of the built-ins.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Files larger than this are skipped (default: 1 MiB).
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_chunk_size() -> usize {
    1500
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_batch_size() -> usize {
    10
}

fn default_max_file_bytes() -> u64 {
    1_048_576
}

fn default_include() -> Vec<String> {
    [
        "**/*.rs", "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.py",
        "**/*.go", "**/*.java", "**/*.kt", "**/*.c", "**/*.h", "**/*.cpp", "**/*.hpp",
        "**/*.cs", "**/*.rb", "**/*.php", "**/*.swift", "**/*.scala", "**/*.sh", "**/*.sql",
        "**/*.md", "**/*.mdx", "**/*.txt", "**/*.json", "**/*.yaml", "**/*.yml",
        "**/*.toml",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

impl IndexConfig {
    /// Check that chunking and batching parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Config`] if `chunk_size` or `batch_size` is zero,
    /// or if `chunk_overlap` is not smaller than `chunk_size`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ultra_core::IndexConfig;
    ///
    /// let config = IndexConfig {
    ///     chunk_size: 100,
    ///     chunk_overlap: 100,
    ///     ..IndexConfig::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), UltraError> {
        if self.chunk_size == 0 {
            return Err(UltraError::Config("index.chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(UltraError::Config(format!(
                "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.batch_size == 0 {
            return Err(UltraError::Config("index.batch_size must be positive".into()));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            batch_size: default_batch_size(),
            include: default_include(),
            exclude: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Search defaults, overridable per call.
///
/// # Examples
///
/// ```
/// use ultra_core::SearchConfig;
///
/// let config = SearchConfig::default();
/// assert_eq!(config.limit, 10);
/// assert_eq!(config.similarity_threshold, 0.5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum results per query (default: 10).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum cosine similarity for a result to be returned (default: 0.5).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_limit() -> usize {
    10
}

fn default_similarity_threshold() -> f64 {
    0.5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Use the in-engine similarity path when available (default: true).
    #[serde(default = "default_accelerated")]
    pub accelerated: bool,
}

fn default_accelerated() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            accelerated: default_accelerated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_has_expected_values() {
        let config = UltraConfig::default();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.api_version, "2024-02-01");
        assert_eq!(config.index.chunk_size, 1500);
        assert_eq!(config.index.chunk_overlap, 200);
        assert_eq!(config.index.batch_size, 10);
        assert_eq!(config.index.max_file_bytes, 1_048_576);
        assert!(config.index.include.contains(&"**/*.rs".to_string()));
        assert!(config.index.exclude.is_empty());
        assert_eq!(config.search.limit, 10);
        assert!(config.store.accelerated);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[embedding]
provider = "azure"
model = "embeddings-prod"
base_url = "https://example.openai.azure.com"
api_version = "2024-06-01"

[index]
chunk_size = 800
chunk_overlap = 100
batch_size = 4
include = ["**/*.md"]
exclude = ["docs/generated/"]

[search]
limit = 3
similarity_threshold = 0.75

[store]
accelerated = false
"#;
        let config = UltraConfig::from_toml(toml).unwrap();
        assert_eq!(config.embedding.provider, "azure");
        assert_eq!(config.embedding.model.as_deref(), Some("embeddings-prod"));
        assert_eq!(config.embedding.api_version, "2024-06-01");
        assert_eq!(config.index.chunk_size, 800);
        assert_eq!(config.index.include, vec!["**/*.md".to_string()]);
        assert_eq!(config.index.exclude, vec!["docs/generated/".to_string()]);
        assert_eq!(config.search.limit, 3);
        assert_eq!(config.search.similarity_threshold, 0.75);
        assert!(!config.store.accelerated);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = UltraConfig::from_toml("").unwrap();
        assert_eq!(config.index.chunk_size, 1500);
        assert_eq!(config.embedding.provider, "openai");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = UltraConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_chunking() {
        let zero = IndexConfig {
            chunk_size: 0,
            chunk_overlap: 0,
            ..IndexConfig::default()
        };
        assert!(zero.validate().is_err());

        let overlap = IndexConfig {
            chunk_size: 50,
            chunk_overlap: 60,
            ..IndexConfig::default()
        };
        let err = overlap.validate().unwrap_err().to_string();
        assert!(err.contains("chunk_overlap"), "{err}");

        let batch = IndexConfig {
            batch_size: 0,
            ..IndexConfig::default()
        };
        assert!(batch.validate().is_err());
    }
}
