//! Core types, configuration, and error handling for ultra-index.
//!
//! This crate provides the shared foundation used by the engine and the CLI:
//! - [`UltraError`]: unified error type using `thiserror`
//! - [`UltraConfig`]: configuration loaded from `.ultra-mcp.toml`
//! - Shared types: [`SearchMatch`], [`IndexSummary`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{EmbeddingConfig, IndexConfig, SearchConfig, StoreConfig, UltraConfig};
pub use error::UltraError;
pub use types::{IndexSummary, OutputFormat, SearchMatch};

/// A convenience `Result` type for ultra-index operations.
pub type Result<T> = std::result::Result<T, UltraError>;

/// Hidden directory, relative to a project root, that holds the vector store.
pub const STORE_DIR: &str = ".ultra-mcp";

/// File name of the vector store inside [`STORE_DIR`].
pub const STORE_FILE: &str = "vector-index-v1.db";
