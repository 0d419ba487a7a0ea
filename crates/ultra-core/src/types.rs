use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single ranked match returned by semantic search.
///
/// # Examples
///
/// ```
/// use ultra_core::SearchMatch;
///
/// let hit = SearchMatch {
///     chunk_id: "src/db.rs#2".into(),
///     relative_path: "src/db.rs".into(),
///     chunk_text: "fn connect() { ... }".into(),
///     similarity: 0.92,
/// };
/// assert!(hit.similarity > 0.9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// Chunk id, `<relativePath>#<chunkIndex>`.
    pub chunk_id: String,
    /// Path of the source file relative to the project root.
    pub relative_path: String,
    /// Literal chunk text.
    pub chunk_text: String,
    /// Cosine similarity to the query (`1 - distance`).
    pub similarity: f64,
}

/// Outcome of one indexing run.
///
/// # Examples
///
/// ```
/// use ultra_core::IndexSummary;
///
/// let summary = IndexSummary::default();
/// assert_eq!(summary.chunks_created, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    /// Files that had at least one chunk written during the run.
    pub files_indexed: usize,
    /// Chunks embedded and written during the run.
    pub chunks_created: usize,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use ultra_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn search_match_serializes_camel_case() {
        let hit = SearchMatch {
            chunk_id: "lib.rs#0".into(),
            relative_path: "lib.rs".into(),
            chunk_text: "code".into(),
            similarity: 0.5,
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["chunkId"], "lib.rs#0");
        assert_eq!(json["relativePath"], "lib.rs");
        assert!(json.get("chunk_text").is_none());
    }

    #[test]
    fn index_summary_serializes_camel_case() {
        let summary = IndexSummary {
            files_indexed: 2,
            chunks_created: 7,
            elapsed_ms: 120,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["filesIndexed"], 2);
        assert_eq!(json["chunksCreated"], 7);
        assert_eq!(json["elapsedMs"], 120);
    }
}
