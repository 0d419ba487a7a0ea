//! Local semantic indexing and retrieval.
//!
//! Turns a project's text files into content-addressed, embedded chunks kept
//! in a SQLite store under `.ultra-mcp/`, and answers natural-language
//! queries by cosine similarity over those chunks. Re-indexing only embeds
//! chunks whose content hash or file mtime changed.

pub mod chunker;
pub mod embedding;
pub mod gitignore;
pub mod hasher;
pub mod indexer;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod store;

pub use embedding::{provider_from_config, EmbeddingProvider};
pub use indexer::Indexer;
pub use progress::IndexEvent;
pub use search::SearchEngine;
pub use store::{IndexStats, SimilarityBackend, StoreOptions, VectorChunk, VectorStore};
