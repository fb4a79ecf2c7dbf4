//! Retrieval collaborator: per-document chunk index and query.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use tendersift_core::{Error, Result};
use tendersift_store::SqliteStore;

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub text: String,
    pub score: f64,
}

/// Similarity search partitioned by document key.
///
/// `query` must only ever return chunks indexed under the same `doc_key`.
/// `index` replaces whatever was stored under the key before.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn index(&self, doc_key: &str, chunks: &[String]) -> Result<usize>;

    async fn query(&self, doc_key: &str, query: &str, k: usize) -> Result<Vec<RetrievalHit>>;
}

// ---------------------------------------------------------------
// In-memory index
// ---------------------------------------------------------------

struct IndexedChunk {
    text: String,
    terms: HashSet<String>,
}

/// Term-overlap index held in memory. Suitable for single-process runs and tests.
#[derive(Default)]
pub struct MemoryIndex {
    docs: DashMap<String, Arc<Vec<IndexedChunk>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_count(&self, doc_key: &str) -> usize {
        self.docs.get(doc_key).map(|c| c.len()).unwrap_or(0)
    }

    fn search(&self, doc_key: &str, query: &str, k: usize) -> Vec<RetrievalHit> {
        let chunks = match self.docs.get(doc_key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Vec::new(),
        };
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = chunks
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| {
                let matched = query_terms.iter().filter(|t| chunk.terms.contains(*t)).count();
                if matched == 0 {
                    None
                } else {
                    Some((idx, matched as f64 / query_terms.len() as f64))
                }
            })
            .collect();
        // Stable sort keeps document order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(idx, score)| RetrievalHit {
                text: chunks[idx].text.clone(),
                score,
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for MemoryIndex {
    async fn index(&self, doc_key: &str, chunks: &[String]) -> Result<usize> {
        let indexed: Vec<IndexedChunk> = chunks
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| IndexedChunk {
                text: c.clone(),
                terms: terms(c),
            })
            .collect();
        let n = indexed.len();
        self.docs.insert(doc_key.to_string(), Arc::new(indexed));
        Ok(n)
    }

    async fn query(&self, doc_key: &str, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        Ok(self.search(doc_key, query, k))
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

// ---------------------------------------------------------------
// SQLite FTS5 index
// ---------------------------------------------------------------

/// BM25 retrieval backed by the shared SQLite store.
pub struct SqliteRetriever {
    store: Arc<SqliteStore>,
}

impl SqliteRetriever {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for SqliteRetriever {
    async fn index(&self, doc_key: &str, chunks: &[String]) -> Result<usize> {
        let store = Arc::clone(&self.store);
        let doc_key = doc_key.to_string();
        let chunks = chunks.to_vec();
        tokio::task::spawn_blocking(move || store.replace_chunks(&doc_key, None, None, &chunks))
            .await
            .map_err(|e| Error::Internal(format!("index task failed: {}", e)))?
    }

    async fn query(&self, doc_key: &str, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let store = Arc::clone(&self.store);
        let doc_key = doc_key.to_string();
        let query = query.to_string();
        let hits = tokio::task::spawn_blocking(move || store.bm25_search(&doc_key, &query, k))
            .await
            .map_err(|e| Error::Internal(format!("query task failed: {}", e)))?
            .map_err(|e| Error::Retrieval(e.to_string()))?;
        Ok(hits
            .into_iter()
            .map(|h| RetrievalHit {
                text: h.text,
                score: h.score,
            })
            .collect())
    }
}

// ---------------------------------------------------------------
// Unavailable backend
// ---------------------------------------------------------------

/// A backend that fails every call. Stands in for an unreachable index.
#[derive(Debug, Default, Clone)]
pub struct FailingRetriever {
    pub message: String,
}

impl FailingRetriever {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Retriever for FailingRetriever {
    async fn index(&self, _doc_key: &str, _chunks: &[String]) -> Result<usize> {
        Err(Error::Retrieval(self.message.clone()))
    }

    async fn query(&self, _doc_key: &str, _query: &str, _k: usize) -> Result<Vec<RetrievalHit>> {
        Err(Error::Retrieval(self.message.clone()))
    }
}
