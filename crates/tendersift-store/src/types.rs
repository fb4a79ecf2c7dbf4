//! Row types for search hits, persisted records and store statistics.

use serde::{Deserialize, Serialize};

use tendersift_core::{CanonicalRecord, EvaluationResult};

/// A BM25 hit restricted to one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub chunk_id: i64,
    pub doc_key: String,
    pub chunk_index: i32,
    pub text: String,
    pub score: f64,
}

/// The persisted outcome for one document key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub doc_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub record: CanonicalRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub updated_at: i64,
}

/// What to persist for one document.
#[derive(Debug, Clone, Copy)]
pub struct RecordWrite<'a> {
    pub doc_key: &'a str,
    pub filename: Option<&'a str>,
    pub record: &'a CanonicalRecord,
    pub evaluation: Option<&'a EvaluationResult>,
    pub metadata: Option<&'a serde_json::Value>,
    pub failure: Option<&'a str>,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: i64,
    pub total_chunks: i64,
    pub total_records: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}
