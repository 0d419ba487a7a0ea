//! SQLite storage for embedded chunks.
//!
//! Chunks live in one table with their embeddings stored as little-endian
//! `f32` BLOBs. Nearest-neighbor ranking runs inside SQLite through a
//! `vector_distance_cos` function when the capability probe finds or
//! registers one; otherwise callers fall back to [`VectorStore::scan_all`]
//! and compute cosine similarity in Rust.

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ultra_core::{StoreConfig, UltraError, STORE_DIR, STORE_FILE};

const SCHEMA_VERSION: &str = "1";
const DIMENSIONS_KEY: &str = "embedding_dimensions";
const DISTANCE_FN: &str = "vector_distance_cos";
const CHUNK_COLUMNS: &str = "id, relpath, chunk, hash, mtime_ms, embedding, created_at";

/// A stored chunk with its embedding.
///
/// # Examples
///
/// ```
/// use ultra_vector::store::VectorChunk;
///
/// let chunk = VectorChunk {
///     id: "src/main.rs#0".into(),
///     relative_path: "src/main.rs".into(),
///     text: "fn main() {}".into(),
///     content_hash: "abc".into(),
///     mtime_ms: 1_700_000_000_000,
///     embedding: vec![0.1, 0.2, 0.3],
///     created_at: 0,
/// };
/// assert_eq!(chunk.embedding.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorChunk {
    /// `<relative_path>#<chunk index>`.
    pub id: String,
    /// Source file path relative to the project root.
    pub relative_path: String,
    /// Literal chunk text.
    pub text: String,
    /// SHA-256 of `text`.
    pub content_hash: String,
    /// Source file modification time, Unix epoch milliseconds.
    pub mtime_ms: i64,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Insertion time, Unix epoch milliseconds.
    pub created_at: i64,
}

/// How nearest-neighbor queries are answered for a store.
///
/// # Examples
///
/// ```
/// use ultra_vector::store::SimilarityBackend;
///
/// assert_eq!(SimilarityBackend::BruteForceOnly.to_string(), "brute-force");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimilarityBackend {
    /// Ranking runs inside SQLite via `vector_distance_cos`.
    Accelerated,
    /// Every query scans all rows and ranks them in Rust.
    BruteForceOnly,
}

impl fmt::Display for SimilarityBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityBackend::Accelerated => write!(f, "accelerated"),
            SimilarityBackend::BruteForceOnly => write!(f, "brute-force"),
        }
    }
}

/// Options applied when opening a store.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Probe for the in-engine similarity path. `false` forces brute force.
    pub accelerated: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { accelerated: true }
    }
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            accelerated: config.accelerated,
        }
    }
}

/// Store statistics.
///
/// # Examples
///
/// ```
/// use ultra_vector::store::{IndexStats, SimilarityBackend};
///
/// let stats = IndexStats {
///     total_chunks: 100,
///     total_files: 10,
///     dimensions: Some(1536),
///     index_size_bytes: 50000,
///     backend: SimilarityBackend::Accelerated,
/// };
/// assert_eq!(stats.total_chunks, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Total number of chunks in the store.
    pub total_chunks: usize,
    /// Number of distinct source files with at least one chunk.
    pub total_files: usize,
    /// Embedding dimension recorded by the first write, if any.
    pub dimensions: Option<usize>,
    /// Size of the database in bytes.
    pub index_size_bytes: u64,
    /// Similarity path selected by the capability probe.
    pub backend: SimilarityBackend,
}

/// Persistent table of embedded chunks for one project.
///
/// # Examples
///
/// ```
/// use ultra_vector::store::{StoreOptions, VectorStore};
///
/// let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
/// assert_eq!(store.count(), 0);
/// ```
pub struct VectorStore {
    conn: Connection,
    path: Option<PathBuf>,
    options: StoreOptions,
    backend: SimilarityBackend,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Location of the store for a project: `<root>/.ultra-mcp/vector-index-v1.db`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use ultra_vector::store::VectorStore;
    ///
    /// let path = VectorStore::project_path(Path::new("/repo"));
    /// assert!(path.ends_with(".ultra-mcp/vector-index-v1.db"));
    /// ```
    pub fn project_path(project_root: &Path) -> PathBuf {
        project_root.join(STORE_DIR).join(STORE_FILE)
    }

    /// Open or create the store at `path`.
    ///
    /// Creates the parent directory, the file and the schema if absent.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::StoreInit`] if the file or schema cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use ultra_vector::store::{StoreOptions, VectorStore};
    ///
    /// let store = VectorStore::open(
    ///     Path::new(".ultra-mcp/vector-index-v1.db"),
    ///     StoreOptions::default(),
    /// ).unwrap();
    /// ```
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self, UltraError> {
        let conn = connect(path)?;
        Self::init(conn, Some(path.to_path_buf()), options)
    }

    /// Open or create the store for a project root.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::StoreInit`] if the store cannot be created.
    pub fn open_project(project_root: &Path, options: StoreOptions) -> Result<Self, UltraError> {
        Self::open(&Self::project_path(project_root), options)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::StoreInit`] if schema creation fails.
    pub fn in_memory(options: StoreOptions) -> Result<Self, UltraError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            UltraError::StoreInit(format!("failed to create in-memory database: {e}"))
        })?;
        Self::init(conn, None, options)
    }

    fn init(conn: Connection, path: Option<PathBuf>, options: StoreOptions) -> Result<Self, UltraError> {
        init_schema(&conn)?;
        let backend = probe_backend(&conn, options);
        Ok(Self {
            conn,
            path,
            options,
            backend,
        })
    }

    /// Close and re-open the backing file, then probe capabilities again.
    ///
    /// An in-memory store keeps its connection and is only re-probed.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::StoreInit`] if the file cannot be re-opened.
    pub fn reopen(&mut self) -> Result<(), UltraError> {
        if let Some(path) = &self.path {
            let conn = connect(path)?;
            init_schema(&conn)?;
            self.conn = conn;
        }
        self.backend = probe_backend(&self.conn, self.options);
        Ok(())
    }

    /// Backing file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Similarity path chosen at open time.
    pub fn backend(&self) -> SimilarityBackend {
        self.backend
    }

    /// Insert or replace a chunk by id.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::DimensionMismatch`] if the embedding length
    /// differs from the store's, or [`UltraError::Database`] on write failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use ultra_vector::store::{StoreOptions, VectorChunk, VectorStore};
    ///
    /// let store = VectorStore::in_memory(StoreOptions::default()).unwrap();
    /// let chunk = VectorChunk {
    ///     id: "a.md#0".into(),
    ///     relative_path: "a.md".into(),
    ///     text: "hello".into(),
    ///     content_hash: "h".into(),
    ///     mtime_ms: 1,
    ///     embedding: vec![1.0, 0.0],
    ///     created_at: 0,
    /// };
    /// store.upsert(&chunk).unwrap();
    /// assert_eq!(store.count(), 1);
    /// ```
    pub fn upsert(&self, chunk: &VectorChunk) -> Result<(), UltraError> {
        self.upsert_batch(std::slice::from_ref(chunk))
    }

    /// Insert or replace several chunks in one transaction.
    ///
    /// Either every chunk is written or none is. The first write to an empty
    /// store records the embedding dimension.
    ///
    /// # Errors
    ///
    /// Same as [`VectorStore::upsert`].
    pub fn upsert_batch(&self, chunks: &[VectorChunk]) -> Result<(), UltraError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| UltraError::Database(format!("failed to begin transaction: {e}")))?;

        let expected = match get_metadata(&tx, DIMENSIONS_KEY)? {
            Some(value) => parse_dimensions(&value)?,
            None => {
                let dims = chunks[0].embedding.len();
                if dims == 0 {
                    return Err(UltraError::Database("refusing to store an empty embedding".into()));
                }
                set_metadata(&tx, DIMENSIONS_KEY, &dims.to_string())?;
                dims
            }
        };

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO vector_chunks
                     (id, relpath, chunk, hash, mtime_ms, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| UltraError::Database(format!("failed to prepare upsert: {e}")))?;

            for chunk in chunks {
                if chunk.embedding.len() != expected {
                    return Err(UltraError::DimensionMismatch {
                        expected,
                        actual: chunk.embedding.len(),
                    });
                }
                stmt.execute(params![
                    chunk.id,
                    chunk.relative_path,
                    chunk.text,
                    chunk.content_hash,
                    chunk.mtime_ms,
                    encode_embedding(&chunk.embedding),
                    chunk.created_at,
                ])
                .map_err(|e| UltraError::Database(format!("failed to upsert {}: {e}", chunk.id)))?;
            }
        }

        tx.commit()
            .map_err(|e| UltraError::Database(format!("failed to commit chunks: {e}")))
    }

    /// Delete every chunk and forget the recorded dimension.
    ///
    /// Runs in one transaction; on failure nothing is removed.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Clear`] if the delete or commit fails.
    pub fn clear(&self) -> Result<(), UltraError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| UltraError::Clear(format!("failed to begin transaction: {e}")))?;
        tx.execute("DELETE FROM vector_chunks", [])
            .map_err(|e| UltraError::Clear(e.to_string()))?;
        tx.execute(
            "DELETE FROM store_metadata WHERE key = ?1",
            params![DIMENSIONS_KEY],
        )
        .map_err(|e| UltraError::Clear(e.to_string()))?;
        tx.commit().map_err(|e| UltraError::Clear(format!("failed to commit: {e}")))
    }

    /// Number of stored chunks.
    ///
    /// Returns 0 when the query fails; the failure is logged.
    pub fn count(&self) -> usize {
        match self
            .conn
            .query_row("SELECT COUNT(*) FROM vector_chunks", [], |row| row.get::<_, i64>(0))
        {
            Ok(n) => n as usize,
            Err(e) => {
                warn!(error = %e, "failed to count chunks");
                0
            }
        }
    }

    /// Fetch a chunk by id.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Database`] on query failure.
    pub fn get_by_id(&self, id: &str) -> Result<Option<VectorChunk>, UltraError> {
        let result = self.conn.query_row(
            &format!("SELECT {CHUNK_COLUMNS} FROM vector_chunks WHERE id = ?1"),
            params![id],
            chunk_from_row,
        );

        match result {
            Ok(chunk) => Ok(Some(chunk)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(UltraError::Database(format!("failed to get chunk {id}: {e}"))),
        }
    }

    /// Visit every stored chunk, streaming rows from a cursor.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Search`] if reading or decoding a row fails.
    pub fn scan_all<F>(&self, mut visit: F) -> Result<(), UltraError>
    where
        F: FnMut(VectorChunk),
    {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CHUNK_COLUMNS} FROM vector_chunks"))
            .map_err(|e| UltraError::Search(format!("failed to prepare scan: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| UltraError::Search(format!("failed to scan chunks: {e}")))?;

        while let Some(row) = rows
            .next()
            .map_err(|e| UltraError::Search(format!("failed to read row: {e}")))?
        {
            let chunk = chunk_from_row(row)
                .map_err(|e| UltraError::Search(format!("failed to decode row: {e}")))?;
            visit(chunk);
        }
        Ok(())
    }

    /// The `limit` rows nearest to `query` by cosine distance, ranked inside SQLite.
    ///
    /// Ties are broken by id. Only usable when [`VectorStore::backend`] is
    /// [`SimilarityBackend::Accelerated`].
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Search`] if the query fails, including when the
    /// distance function is unavailable.
    pub fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<(VectorChunk, f64)>, UltraError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {CHUNK_COLUMNS}, {DISTANCE_FN}(embedding, ?1) AS distance
                 FROM vector_chunks
                 ORDER BY distance ASC, id ASC
                 LIMIT ?2"
            ))
            .map_err(|e| UltraError::Search(format!("failed to prepare nearest query: {e}")))?;

        let rows = stmt
            .query_map(params![encode_embedding(query), limit as i64], |row| {
                let chunk = chunk_from_row(row)?;
                let distance: f64 = row.get(7)?;
                Ok((chunk, distance))
            })
            .map_err(|e| UltraError::Search(format!("nearest query failed: {e}")))?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.map_err(|e| UltraError::Search(format!("failed to read row: {e}")))?);
        }
        Ok(hits)
    }

    /// Embedding dimension recorded by the first write, if any.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Database`] on query failure or corrupted metadata.
    pub fn dimensions(&self) -> Result<Option<usize>, UltraError> {
        get_metadata(&self.conn, DIMENSIONS_KEY)?
            .map(|v| parse_dimensions(&v))
            .transpose()
    }

    /// Store statistics.
    ///
    /// # Errors
    ///
    /// Returns [`UltraError::Database`] on query failure.
    pub fn stats(&self) -> Result<IndexStats, UltraError> {
        let (total_chunks, total_files): (i64, i64) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT relpath) FROM vector_chunks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| UltraError::Database(format!("failed to count chunks: {e}")))?;

        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(IndexStats {
            total_chunks: total_chunks as usize,
            total_files: total_files as usize,
            dimensions: self.dimensions()?,
            index_size_bytes: (page_count * page_size) as u64,
            backend: self.backend,
        })
    }

    #[cfg(test)]
    pub(crate) fn drop_distance_function(&self) {
        self.conn
            .remove_function(DISTANCE_FN, 2)
            .expect("remove distance function");
    }
}

fn connect(path: &Path) -> Result<Connection, UltraError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            UltraError::StoreInit(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    Connection::open(path).map_err(|e| {
        UltraError::StoreInit(format!("failed to open {}: {e}", path.display()))
    })
}

fn init_schema(conn: &Connection) -> Result<(), UltraError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS store_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS vector_chunks (
            id TEXT PRIMARY KEY,
            relpath TEXT NOT NULL,
            chunk TEXT NOT NULL,
            hash TEXT NOT NULL,
            mtime_ms INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_vector_chunks_relpath ON vector_chunks(relpath);
        CREATE INDEX IF NOT EXISTS idx_vector_chunks_hash ON vector_chunks(hash);
        ",
    )
    .map_err(|e| UltraError::StoreInit(format!("failed to create schema: {e}")))?;

    conn.execute(
        "INSERT OR IGNORE INTO store_metadata (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION],
    )
    .map_err(|e| UltraError::StoreInit(format!("failed to record schema version: {e}")))?;
    Ok(())
}

/// Decide once per connection whether ranking can run inside SQLite.
fn probe_backend(conn: &Connection, options: StoreOptions) -> SimilarityBackend {
    if !options.accelerated {
        debug!("accelerated similarity disabled by configuration");
        return SimilarityBackend::BruteForceOnly;
    }

    if distance_function_works(conn).is_ok() {
        debug!("using engine-provided {DISTANCE_FN}");
        return SimilarityBackend::Accelerated;
    }

    let registered = conn
        .create_scalar_function(
            DISTANCE_FN,
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let a = decode_arg(ctx, 0)?;
                let b = decode_arg(ctx, 1)?;
                Ok(1.0 - cosine_similarity(&a, &b))
            },
        )
        .and_then(|()| distance_function_works(conn));

    match registered {
        Ok(()) => SimilarityBackend::Accelerated,
        Err(e) => {
            warn!(error = %e, "accelerated similarity unavailable, using brute-force search");
            SimilarityBackend::BruteForceOnly
        }
    }
}

fn distance_function_works(conn: &Connection) -> rusqlite::Result<()> {
    let probe = encode_embedding(&[1.0, 0.0]);
    let distance: f64 = conn.query_row(
        &format!("SELECT {DISTANCE_FN}(?1, ?1)"),
        params![probe],
        |row| row.get(0),
    )?;
    if distance.abs() < 1e-6 {
        Ok(())
    } else {
        Err(rusqlite::Error::InvalidQuery)
    }
}

fn decode_arg(ctx: &rusqlite::functions::Context<'_>, idx: usize) -> rusqlite::Result<Vec<f32>> {
    let blob = ctx
        .get_raw(idx)
        .as_blob()
        .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
    decode_embedding(blob).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
}

fn chunk_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorChunk> {
    let blob: Vec<u8> = row.get(5)?;
    let embedding = decode_embedding(&blob).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Blob, Box::new(e))
    })?;

    Ok(VectorChunk {
        id: row.get(0)?,
        relative_path: row.get(1)?,
        text: row.get(2)?,
        content_hash: row.get(3)?,
        mtime_ms: row.get(4)?,
        embedding,
        created_at: row.get(6)?,
    })
}

fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>, UltraError> {
    let result = conn.query_row(
        "SELECT value FROM store_metadata WHERE key = ?1",
        params![key],
        |row| row.get(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(UltraError::Database(format!(
            "failed to get metadata '{key}': {e}"
        ))),
    }
}

fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<(), UltraError> {
    conn.execute(
        "INSERT OR REPLACE INTO store_metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(|e| UltraError::Database(format!("failed to set metadata '{key}': {e}")))?;
    Ok(())
}

fn parse_dimensions(value: &str) -> Result<usize, UltraError> {
    value
        .parse()
        .map_err(|_| UltraError::Database(format!("corrupted dimension metadata: '{value}'")))
}

/// Encode a vector as concatenated little-endian `f32` bytes.
///
/// # Examples
///
/// ```
/// use ultra_vector::store::{decode_embedding, encode_embedding};
///
/// let bytes = encode_embedding(&[1.0, -2.5]);
/// assert_eq!(bytes.len(), 8);
/// assert_eq!(decode_embedding(&bytes).unwrap(), vec![1.0, -2.5]);
/// ```
pub fn encode_embedding(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

/// Decode bytes produced by [`encode_embedding`].
///
/// # Errors
///
/// Returns [`UltraError::Database`] if the length is not a multiple of 4.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, UltraError> {
    if bytes.len() % 4 != 0 {
        return Err(UltraError::Database(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity of two vectors.
///
/// Returns 0 when either vector has zero norm or the lengths differ.
///
/// # Examples
///
/// ```
/// use ultra_vector::store::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
/// assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let ai = f64::from(*x);
        let bi = f64::from(*y);
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}
