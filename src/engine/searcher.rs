//! Similarity query engine
//!
//! Exact k-nearest-neighbor search over a [`VectorStore`]'s vec0 table.
//! Distances are raw L2 (lower is more similar); callers interpret the
//! values. Ties are stable in insertion order (vec0 scans rowids in order).

use serde_json::Value;

use crate::error::{RecallError, Result};
use crate::storage::VectorStore;

/// Query modes the retrieval layer may request. Only [`QueryMode::Default`]
/// (plain nearest-neighbor) is implemented here; the rest exist so callers
/// get a typed rejection instead of silently wrong results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Default,
    Sparse,
    Hybrid,
    Mmr,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryMode::Default => "default",
            QueryMode::Sparse => "sparse",
            QueryMode::Hybrid => "hybrid",
            QueryMode::Mmr => "mmr",
        };
        f.write_str(name)
    }
}

/// A nearest-neighbor query against one store.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub embedding: Vec<f32>,
    pub top_k: usize,
    pub mode: QueryMode,
}

impl VectorQuery {
    pub fn new(embedding: Vec<f32>, top_k: usize) -> Self {
        Self {
            embedding,
            top_k,
            mode: QueryMode::Default,
        }
    }
}

/// One query hit: the stored record reconstructed, plus its distance.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub metadata: Value,
    pub distance: f32,
}

pub struct Searcher;

impl Searcher {
    /// Run a KNN query, closest first.
    ///
    /// Returns up to `top_k` hits; fewer (or none) when the store holds
    /// fewer records. Mode and dimension are validated before the database
    /// is touched.
    pub fn search(store: &VectorStore, query: &VectorQuery) -> Result<Vec<SearchResult>> {
        if query.mode != QueryMode::Default {
            return Err(RecallError::UnsupportedMode(query.mode.to_string()));
        }

        if query.embedding.len() != store.embed_dim() {
            return Err(RecallError::DimensionMismatch {
                expected: store.embed_dim(),
                actual: query.embedding.len(),
            });
        }

        if query.top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = store.conn()?;
        let embedding_bytes: &[u8] = bytemuck::cast_slice(&query.embedding);

        let mut stmt = conn.prepare(&format!(
            "SELECT id, content, metadata, distance
             FROM {}
             WHERE embedding MATCH ?1 AND k = ?2
             ORDER BY distance",
            store.table()
        ))?;

        let rows = stmt.query_map(
            rusqlite::params![embedding_bytes, query.top_k as i64],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, f32>(3)?,
                ))
            },
        )?;

        let mut results = Vec::new();
        for row in rows {
            let (id, content, metadata, distance) = row?;
            let metadata = metadata
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| RecallError::Other(e.into()))?
                .unwrap_or(Value::Null);
            results.push(SearchResult {
                id,
                content: content.unwrap_or_default(),
                metadata,
                distance,
            });
        }

        tracing::debug!("[Searcher] top_k={} returned {} hits", query.top_k, results.len());
        Ok(results)
    }
}
