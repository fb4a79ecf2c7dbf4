//! SQLite store: per-document FTS5 chunk index plus persisted tender records.
//!
//! Chunks are partitioned by `doc_key`, so a search for one tender never
//! sees another tender's text. Replacing a document's chunks is atomic.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::schema::{FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL, SCHEMA_SQL};
use crate::types::*;
use tendersift_core::{Error, Result};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store. The file will be `db_dir/tendersift.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("tendersift.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let doc_count = store.count_documents()?;
        let chunk_count = store.count_chunks(None)?;
        info!(
            "SqliteStore initialized: {} documents, {} chunks, path={}",
            doc_count,
            chunk_count,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA cache_size = -16384;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}\n{}", SCHEMA_SQL, FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Chunk index
    // ---------------------------------------------------------------

    /// Replace every chunk stored under `doc_key` in one transaction.
    ///
    /// Readers see either the old set or the new set, never a mix.
    pub fn replace_chunks(
        &self,
        doc_key: &str,
        filename: Option<&str>,
        content_hash: Option<&str>,
        chunks: &[String],
    ) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO documents (doc_key, filename, content_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(doc_key) DO UPDATE SET \
               filename = excluded.filename, \
               content_hash = excluded.content_hash, \
               updated_at = excluded.created_at",
            params![doc_key, filename, content_hash, now],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tx.execute("DELETE FROM chunks WHERE doc_key = ?1", params![doc_key])
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut inserted = 0usize;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO chunks (doc_key, chunk_index, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (idx, text) in chunks.iter().enumerate() {
                if text.trim().is_empty() {
                    continue;
                }
                stmt.execute(params![doc_key, idx as i32, text, now])
                    .map_err(|e| Error::Database(e.to_string()))?;
                inserted += 1;
            }
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        debug!("Indexed {} chunks for {}", inserted, doc_key);
        Ok(inserted)
    }

    pub fn count_chunks(&self, doc_key: Option<&str>) -> Result<i64> {
        let conn = self.conn.lock();
        let count = match doc_key {
            Some(key) => conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE doc_key = ?1",
                params![key],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0)),
        };
        count.map_err(|e| Error::Database(e.to_string()))
    }

    pub fn count_documents(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // BM25 Search (FTS5)
    // ---------------------------------------------------------------

    /// Full-text search over one document's chunks using FTS5 BM25 ranking.
    pub fn bm25_search(&self, doc_key: &str, query: &str, top_k: usize) -> Result<Vec<ChunkHit>> {
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let sql = "SELECT c.*, chunks_fts.rank AS bm25_score \
                   FROM chunks_fts \
                   JOIN chunks c ON c.id = chunks_fts.rowid \
                   WHERE chunks_fts MATCH ?1 \
                     AND c.doc_key = ?2 \
                   ORDER BY chunks_fts.rank \
                   LIMIT ?3";

        let mut stmt = conn.prepare_cached(sql).map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![fts_query, doc_key, top_k as i64], |row| {
                let bm25_score: f64 = row.get("bm25_score").unwrap_or(0.0);
                Ok(ChunkHit {
                    chunk_id: row.get("id")?,
                    doc_key: row.get("doc_key")?,
                    chunk_index: row.get("chunk_index")?,
                    text: row.get("text")?,
                    score: -bm25_score, // FTS5 rank is negative; negate for positive
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Wrap each token in double quotes and join with OR.
    fn sanitize_fts_query(query: &str) -> String {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.replace('"', ""))
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{}\"", t))
            .collect();
        tokens.join(" OR ")
    }

    // ---------------------------------------------------------------
    // Records
    // ---------------------------------------------------------------

    /// Insert or replace the record for a document key.
    pub fn save_record(&self, write: RecordWrite<'_>) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let record_json = serde_json::to_string(write.record)?;
        let evaluation_json = write.evaluation.map(serde_json::to_string).transpose()?;
        let metadata_json = write.metadata.map(serde_json::to_string).transpose()?;

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO records (doc_key, filename, record_json, evaluation_json, metadata_json, failure, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(doc_key) DO UPDATE SET \
               filename = excluded.filename, \
               record_json = excluded.record_json, \
               evaluation_json = excluded.evaluation_json, \
               metadata_json = excluded.metadata_json, \
               failure = excluded.failure, \
               updated_at = excluded.updated_at",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            write.doc_key,
            write.filename,
            record_json,
            evaluation_json,
            metadata_json,
            write.failure,
            now
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    pub fn get_record(&self, doc_key: &str) -> Result<Option<StoredRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM records WHERE doc_key = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![doc_key], |row| Ok(Self::row_to_record(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.transpose()
    }

    /// All records, most recently updated first.
    pub fn list_records(&self) -> Result<Vec<StoredRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM records ORDER BY updated_at DESC, doc_key")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok(Self::row_to_record(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.filter_map(|r| r.ok()).collect()
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let total_documents = self.count_documents()?;
        let total_chunks = self.count_chunks(None)?;
        let conn = self.conn.lock();
        let total_records: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            total_documents,
            total_chunks,
            total_records,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_record(row: &rusqlite::Row<'_>) -> Result<StoredRecord> {
        let record_json: String = row
            .get("record_json")
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(StoredRecord {
            doc_key: row.get("doc_key").unwrap_or_default(),
            filename: row.get("filename").ok().flatten(),
            record: serde_json::from_str(&record_json)?,
            evaluation: row
                .get::<_, Option<String>>("evaluation_json")
                .ok()
                .flatten()
                .and_then(|s| serde_json::from_str(&s).ok()),
            metadata: row
                .get::<_, Option<String>>("metadata_json")
                .ok()
                .flatten()
                .and_then(|s| serde_json::from_str(&s).ok()),
            failure: row.get("failure").ok().flatten(),
            updated_at: row.get("updated_at").unwrap_or(0),
        })
    }
}
