//! Vector record store backed by a sqlite-vec virtual table
//!
//! One vec0 table per store: `(id TEXT PRIMARY KEY, embedding FLOAT[dim],
//! +content, +metadata)`. Inserts are validated up front and committed as a
//! single transaction; a failed batch leaves nothing behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::error::{RecallError, Result};
use crate::storage::{connection, Record};

#[derive(Debug)]
pub struct VectorStore {
    conn: Option<Connection>,
    db_path: PathBuf,
    table: String,
    embed_dim: usize,
}

impl VectorStore {
    /// Open the store at `db_path`, creating the backing table if needed.
    ///
    /// Reopening the same path/table observes previously committed records.
    /// `embed_dim` fixes the vector width at table creation; it is not
    /// re-checked against an existing table (sqlite-vec rejects mismatched
    /// vectors at write time).
    pub fn open(db_path: &Path, table: &str, embed_dim: usize) -> Result<Self> {
        let table = table.to_lowercase();
        validate_table_name(&table)?;

        let conn = connection::open_database(db_path)?;

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {table} USING vec0(
                id TEXT PRIMARY KEY,
                embedding FLOAT[{embed_dim}],
                +content TEXT,
                +metadata TEXT
            );"
        ))
        .map_err(|e| RecallError::StorageInit(format!("create table {}: {}", table, e)))?;

        tracing::debug!("[Store] Opened {} / {} ({} dims)", db_path.display(), table, embed_dim);

        Ok(Self {
            conn: Some(conn),
            db_path: db_path.to_path_buf(),
            table,
            embed_dim,
        })
    }

    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(RecallError::ClosedStore)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(RecallError::ClosedStore)
    }

    /// Insert a batch of records, committed atomically.
    ///
    /// Every embedding is validated against `embed_dim` before anything is
    /// written. Duplicate ids, within the batch or against committed rows,
    /// roll the whole batch back. Returns the inserted ids in input order.
    pub fn insert(&mut self, records: &[Record]) -> Result<Vec<String>> {
        let embed_dim = self.embed_dim;
        for record in records {
            if record.embedding.len() != embed_dim {
                return Err(RecallError::DimensionMismatch {
                    expected: embed_dim,
                    actual: record.embedding.len(),
                });
            }
        }

        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.id.as_str()) {
                return Err(RecallError::DuplicateId(record.id.clone()));
            }
        }

        let table = self.table.clone();
        let tx = self.conn_mut()?.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} (id, embedding, content, metadata) VALUES (?1, ?2, ?3, ?4)"
            ))?;
            for record in records {
                let embedding_bytes: &[u8] = bytemuck::cast_slice(&record.embedding);
                let metadata = serde_json::to_string(&record.metadata)
                    .map_err(|e| RecallError::Other(e.into()))?;
                stmt.execute(params![record.id, embedding_bytes, record.content, metadata])
                    .map_err(|e| match e {
                        rusqlite::Error::SqliteFailure(err, _)
                            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                        {
                            RecallError::DuplicateId(record.id.clone())
                        }
                        other => RecallError::Database(other),
                    })?;
            }
        }
        tx.commit()?;

        tracing::debug!("[Store] Inserted {} records into {}", records.len(), self.table);
        Ok(records.iter().map(|r| r.id.clone()).collect())
    }

    /// Delete the record with `id` if present; a missing id is a no-op.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let table = self.table.clone();
        let conn = self.conn_mut()?;
        let rows = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;

        // Push the WAL out before returning; delete promises durability.
        conn.query_row("PRAGMA wal_checkpoint(FULL)", [], |_row| Ok(()))?;

        tracing::debug!("[Store] Deleted id {} from {} (rows: {})", id, table, rows);
        Ok(())
    }

    /// Number of committed records.
    pub fn count(&self) -> Result<u64> {
        let count: u64 = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Release the backing connection. Later operations fail with
    /// `ClosedStore`.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_conn, e)) = conn.close() {
                tracing::warn!("[Store] Error closing {}: {}", self.db_path.display(), e);
            }
        }
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(RecallError::StorageInit(format!(
            "invalid table name: {:?}",
            table
        )));
    }
    Ok(())
}
