//! Incremental indexing: scan, chunk, detect changes, embed, store.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Instant, UNIX_EPOCH};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use ultra_core::{IndexConfig, IndexSummary, UltraError};

use crate::chunker::TextChunker;
use crate::embedding::EmbeddingProvider;
use crate::gitignore::ensure_store_ignored;
use crate::hasher::{chunk_id, content_hash, relative_path};
use crate::progress::{IndexEvent, ProgressSink};
use crate::scanner::FileScanner;
use crate::store::{VectorChunk, VectorStore};

/// A chunk whose embedding is stale or missing.
struct Pending {
    id: String,
    relative_path: String,
    text: String,
    content_hash: String,
    mtime_ms: i64,
}

/// Drives one project's store through an embedding provider.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use ultra_core::UltraConfig;
/// use ultra_vector::embedding::provider_from_config;
/// use ultra_vector::indexer::Indexer;
/// use ultra_vector::store::{StoreOptions, VectorStore};
///
/// # async fn example() -> ultra_core::Result<()> {
/// let config = UltraConfig::default();
/// let root = Path::new(".");
/// let store = VectorStore::open_project(root, StoreOptions::from(&config.store))?;
/// let provider = provider_from_config(&config.embedding)?;
/// let indexer = Indexer::new(&store, provider.as_ref(), config.index)?;
/// let summary = indexer.run(root, false, None).await?;
/// println!("{} chunks", summary.chunks_created);
/// # Ok(())
/// # }
/// ```
pub struct Indexer<'a> {
    store: &'a VectorStore,
    provider: &'a dyn EmbeddingProvider,
    chunker: TextChunker,
    config: IndexConfig,
}

impl<'a> Indexer<'a> {
    /// Create an indexer.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Config`] if the chunking or batching settings are invalid.
    pub fn new(
        store: &'a VectorStore,
        provider: &'a dyn EmbeddingProvider,
        config: IndexConfig,
    ) -> Result<Self, UltraError> {
        config.validate()?;
        Ok(Self {
            store,
            provider,
            chunker: TextChunker::from_config(&config)?,
            config,
        })
    }

    /// Index every candidate file under `project_root`.
    ///
    /// Unchanged chunks (same content hash and mtime as the stored row) are
    /// skipped unless `force` is set. Each batch of files is embedded with one
    /// `embed_batch` call and written in one transaction.
    ///
    /// # Errors
    ///
    /// Embedding and store failures abort the remaining batches; rows written
    /// by earlier batches are kept. Unreadable files are logged and skipped.
    pub async fn run(
        &self,
        project_root: &Path,
        force: bool,
        progress: Option<UnboundedSender<IndexEvent>>,
    ) -> Result<IndexSummary, UltraError> {
        let started = Instant::now();
        let progress = ProgressSink::new(progress);

        if let Err(e) = ensure_store_ignored(project_root) {
            warn!(error = %e, "could not update .gitignore");
        }

        let scanner = FileScanner::new(project_root, &self.config);
        let files = scanner.scan()?;
        let total_files = files.len();
        info!(files = total_files, provider = self.provider.name(), force, "indexing started");
        progress.emit(IndexEvent::Started { total_files });

        let mut summary = IndexSummary::default();
        let mut files_processed = 0;

        for (batch_index, batch) in files.chunks(self.config.batch_size).enumerate() {
            let mut pending = Vec::new();
            for path in batch {
                self.collect_changed(scanner.root(), path, force, &mut pending)?;
            }
            files_processed += batch.len();

            let written = self.embed_and_store(&pending).await?;
            summary.chunks_created += written;
            summary.files_indexed += pending
                .iter()
                .map(|p| p.relative_path.as_str())
                .collect::<HashSet<_>>()
                .len();

            debug!(batch = batch_index + 1, chunks = written, "batch completed");
            progress.emit(IndexEvent::BatchCompleted {
                batch: batch_index + 1,
                files_processed,
                total_files,
                chunks_written: written,
            });
        }

        summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            files = summary.files_indexed,
            chunks = summary.chunks_created,
            elapsed_ms = summary.elapsed_ms,
            "indexing finished"
        );
        progress.emit(IndexEvent::Finished(summary));
        Ok(summary)
    }

    /// Chunk one file and queue the chunks whose stored copy is stale.
    fn collect_changed(
        &self,
        root: &Path,
        path: &Path,
        force: bool,
        pending: &mut Vec<Pending>,
    ) -> Result<(), UltraError> {
        let relative = relative_path(root, path);
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                let err = UltraError::Scan {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                };
                warn!(error = %err, "skipping file");
                return Ok(());
            }
        };
        let mtime_ms = modified_ms(path);

        for chunk in self.chunker.chunks(&content) {
            let id = chunk_id(&relative, chunk.index);
            let hash = content_hash(chunk.text);

            if !force {
                if let Some(existing) = self.store.get_by_id(&id)? {
                    if existing.content_hash == hash && existing.mtime_ms == mtime_ms {
                        continue;
                    }
                }
            }

            pending.push(Pending {
                id,
                relative_path: relative.clone(),
                text: chunk.text.to_string(),
                content_hash: hash,
                mtime_ms,
            });
        }
        Ok(())
    }

    async fn embed_and_store(&self, pending: &[Pending]) -> Result<usize, UltraError> {
        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = pending.iter().map(|p| p.text.clone()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;
        if vectors.len() != pending.len() {
            return Err(UltraError::Embedding(format!(
                "{} returned {} embeddings for {} chunks",
                self.provider.name(),
                vectors.len(),
                pending.len()
            )));
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let rows: Vec<VectorChunk> = pending
            .iter()
            .zip(vectors)
            .map(|(p, embedding)| VectorChunk {
                id: p.id.clone(),
                relative_path: p.relative_path.clone(),
                text: p.text.clone(),
                content_hash: p.content_hash.clone(),
                mtime_ms: p.mtime_ms,
                embedding,
                created_at,
            })
            .collect();

        self.store.upsert_batch(&rows)?;
        Ok(rows.len())
    }
}

/// File modification time in Unix epoch milliseconds, or 0 if unavailable.
fn modified_ms(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;

    use crate::store::StoreOptions;

    /// Returns a constant vector and records every batch it sees.
    #[derive(Default)]
    struct RecordingEmbedder {
        batches: Mutex<Vec<usize>>,
        short_by: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingEmbedder {
        fn name(&self) -> &str {
            "recording"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, UltraError> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UltraError> {
            self.batches.lock().unwrap().push(texts.len());
            let n = texts.len().saturating_sub(self.short_by);
            Ok(vec![vec![1.0, 0.0]; n])
        }
    }

    fn config(batch_size: usize) -> IndexConfig {
        IndexConfig {
            chunk_size: 20,
            chunk_overlap: 0,
            batch_size,
            ..IndexConfig::default()
        }
    }

    #[tokio::test]
    async fn one_embed_call_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(dir.path().join(name), format!("contents of {name}")).unwrap();
        }

        let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
        let embedder = RecordingEmbedder::default();
        let indexer = Indexer::new(&store, &embedder, config(2)).unwrap();
        let summary = indexer.run(dir.path(), false, None).await.unwrap();

        assert_eq!(summary.files_indexed, 3);
        assert_eq!(summary.chunks_created, 3);
        assert_eq!(*embedder.batches.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn short_embedding_response_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "one two three four five six seven").unwrap();

        let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
        let embedder = RecordingEmbedder {
            short_by: 1,
            ..RecordingEmbedder::default()
        };
        let indexer = Indexer::new(&store, &embedder, config(10)).unwrap();
        let err = indexer.run(dir.path(), false, None).await.unwrap_err();

        assert!(matches!(err, UltraError::Embedding(_)));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn non_utf8_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        fs::write(dir.path().join("good.txt"), "hello").unwrap();

        let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
        let embedder = RecordingEmbedder::default();
        let indexer = Indexer::new(&store, &embedder, config(10)).unwrap();
        let summary = indexer.run(dir.path(), false, None).await.unwrap();

        assert_eq!(summary.files_indexed, 1);
        assert!(store.get_by_id("good.txt#0").unwrap().is_some());
    }

    #[tokio::test]
    async fn chunk_ids_stay_relative_for_non_canonical_roots() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.txt"), "hello").unwrap();

        let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
        let embedder = RecordingEmbedder::default();
        let indexer = Indexer::new(&store, &embedder, config(10)).unwrap();
        let root = dir.path().join("src").join("..");
        indexer.run(&root, false, None).await.unwrap();

        let chunk = store.get_by_id("src/lib.txt#0").unwrap().unwrap();
        assert_eq!(chunk.relative_path, "src/lib.txt");
    }

    #[tokio::test]
    async fn progress_stream_is_ordered_and_finite() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.md", "b.md", "c.md"] {
            fs::write(dir.path().join(name), "text").unwrap();
        }

        let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
        let embedder = RecordingEmbedder::default();
        let indexer = Indexer::new(&store, &embedder, config(2)).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let summary = indexer.run(dir.path(), false, Some(tx)).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                IndexEvent::Started { total_files: 3 },
                IndexEvent::BatchCompleted {
                    batch: 1,
                    files_processed: 2,
                    total_files: 3,
                    chunks_written: 2
                },
                IndexEvent::BatchCompleted {
                    batch: 2,
                    files_processed: 3,
                    total_files: 3,
                    chunks_written: 1
                },
                IndexEvent::Finished(summary),
            ]
        );
    }

    #[tokio::test]
    async fn empty_project_still_reports_start_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
        let embedder = RecordingEmbedder::default();
        let indexer = Indexer::new(&store, &embedder, config(2)).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let summary = indexer.run(dir.path(), false, Some(tx)).await.unwrap();

        assert_eq!(summary.files_indexed, 0);
        assert_eq!(rx.recv().await, Some(IndexEvent::Started { total_files: 0 }));
        assert!(matches!(rx.recv().await, Some(IndexEvent::Finished(_))));
        assert!(embedder.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
        let embedder = RecordingEmbedder::default();
        let bad = IndexConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            ..IndexConfig::default()
        };
        assert!(Indexer::new(&store, &embedder, bad).is_err());
    }
}
