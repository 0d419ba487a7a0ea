//! Semantic search over a [`VectorStore`].
//!
//! Ranking prefers the store's in-engine `vector_distance_cos` path and falls
//! back to a streaming brute-force scan when that path is unavailable or a
//! query on it fails. Both paths order by cosine distance, then chunk id, so
//! they return identical rankings.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, warn};
use ultra_core::{SearchMatch, UltraError};

use crate::embedding::EmbeddingProvider;
use crate::store::{cosine_similarity, SimilarityBackend, VectorChunk, VectorStore};

/// Answers natural-language queries against one project's store.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use ultra_core::UltraConfig;
/// use ultra_vector::embedding::provider_from_config;
/// use ultra_vector::search::SearchEngine;
/// use ultra_vector::store::{StoreOptions, VectorStore};
///
/// # async fn example() -> ultra_core::Result<()> {
/// let config = UltraConfig::default();
/// let store = VectorStore::open_project(Path::new("."), StoreOptions::from(&config.store))?;
/// let provider = provider_from_config(&config.embedding)?;
/// let engine = SearchEngine::new(&store, provider.as_ref());
/// for hit in engine.search("where are tokens validated", 5, 0.5).await? {
///     println!("{:.3} {}", hit.similarity, hit.chunk_id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SearchEngine<'a> {
    store: &'a VectorStore,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> SearchEngine<'a> {
    /// Create a search engine over `store`, embedding queries with `provider`.
    pub fn new(store: &'a VectorStore, provider: &'a dyn EmbeddingProvider) -> Self {
        Self { store, provider }
    }

    /// Up to `limit` chunks most similar to `query`, most similar first.
    ///
    /// Matches below `similarity_threshold` are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Embedding`] if the query cannot be embedded,
    /// [`UltraError::DimensionMismatch`] if the query vector does not fit the
    /// store, or [`UltraError::Search`] if reading the store fails.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        similarity_threshold: f64,
    ) -> Result<Vec<SearchMatch>, UltraError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(query).await?;
        let dimensions = self
            .store
            .dimensions()
            .map_err(|e| UltraError::Search(e.to_string()))?;
        match dimensions {
            None => {
                debug!("store is empty");
                return Ok(Vec::new());
            }
            Some(expected) if expected != query_vector.len() => {
                return Err(UltraError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
            Some(_) => {}
        }

        let ranked = self.nearest(&query_vector, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(chunk, distance)| SearchMatch {
                chunk_id: chunk.id,
                relative_path: chunk.relative_path,
                chunk_text: chunk.text,
                similarity: 1.0 - distance,
            })
            .filter(|m| m.similarity >= similarity_threshold)
            .collect())
    }

    /// Distinct files among the matches for `query`, in rank order.
    ///
    /// # Errors
    ///
    /// Same as [`SearchEngine::search`].
    pub async fn related_files(
        &self,
        query: &str,
        limit: usize,
        similarity_threshold: f64,
    ) -> Result<Vec<String>, UltraError> {
        let matches = self.search(query, limit, similarity_threshold).await?;
        let mut seen = HashSet::new();
        Ok(matches
            .into_iter()
            .filter_map(|m| seen.insert(m.relative_path.clone()).then_some(m.relative_path))
            .collect())
    }

    fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<(VectorChunk, f64)>, UltraError> {
        if self.store.backend() == SimilarityBackend::Accelerated {
            match self.store.nearest(query, limit) {
                Ok(hits) => return Ok(hits),
                Err(e) => warn!(error = %e, "accelerated search failed, falling back to brute force"),
            }
        }
        brute_force_nearest(self.store, query, limit)
    }
}

/// The `limit` rows nearest to `query`, computed by streaming every row.
///
/// Holds at most `limit` rows in memory. Ties are broken by chunk id.
///
/// # Errors
///
/// Returns [`UltraError::Search`] if reading the store fails.
pub fn brute_force_nearest(
    store: &VectorStore,
    query: &[f32],
    limit: usize,
) -> Result<Vec<(VectorChunk, f64)>, UltraError> {
    let mut best: Vec<(VectorChunk, f64)> = Vec::with_capacity(limit.saturating_add(1).min(1024));
    if limit == 0 {
        return Ok(best);
    }

    store.scan_all(|chunk| {
        let distance = 1.0 - cosine_similarity(query, &chunk.embedding);
        let pos = best.partition_point(|(c, d)| rank(*d, &c.id, distance, &chunk.id) == Ordering::Less);
        if pos < limit {
            best.insert(pos, (chunk, distance));
            best.truncate(limit);
        }
    })?;

    Ok(best)
}

fn rank(a_distance: f64, a_id: &str, b_distance: f64, b_id: &str) -> Ordering {
    a_distance.total_cmp(&b_distance).then_with(|| a_id.cmp(b_id))
}
