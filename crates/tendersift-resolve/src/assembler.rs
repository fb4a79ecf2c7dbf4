//! Context assembler: one bounded text window per field group.
//!
//! Retrieval failures never escape this module. A failed index call drops
//! the whole document back to direct mode; a failed or empty group query set
//! gives that group the document head instead.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tendersift_core::{Error, Field, RagSettings, Result};
use tendersift_ingest::document::head_slice;
use tendersift_ingest::{chunk_text, DocumentText};

use crate::groups::FieldGroup;
use crate::retriever::{RetrievalHit, Retriever};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    Direct,
    Retrieval,
}

/// Text handed to one generative call, with the fields it should answer.
#[derive(Debug, Clone, Serialize)]
pub struct ContextWindow {
    pub label: &'static str,
    pub fields: Vec<Field>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembledContext {
    pub mode: ContextMode,
    pub windows: Vec<ContextWindow>,
    /// Why retrieval was skipped or abandoned, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

pub struct ContextAssembler {
    retriever: Option<Arc<dyn Retriever>>,
    settings: RagSettings,
    direct_chars: usize,
}

impl ContextAssembler {
    /// Direct-mode assembler.
    pub fn new(settings: RagSettings, direct_chars: usize) -> Self {
        Self {
            retriever: None,
            settings,
            direct_chars,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    /// Build the context windows for one document.
    pub async fn assemble(&self, doc_key: &str, text: &DocumentText) -> AssembledContext {
        let retriever = match &self.retriever {
            Some(r) if self.settings.enabled => Arc::clone(r),
            _ => return self.direct(text, None),
        };
        if text.char_len() <= self.direct_chars {
            debug!("{} fits the direct window, skipping retrieval", doc_key);
            return self.direct(text, None);
        }

        let chunks = chunk_text(
            text.as_str(),
            self.settings.chunk_chars,
            self.settings.chunk_overlap,
        );
        match self.timed(retriever.index(doc_key, &chunks)).await {
            Ok(n) => debug!("Indexed {} chunks for {}", n, doc_key),
            Err(e) => {
                warn!("Retrieval index failed for {}, using direct context: {}", doc_key, e);
                return self.direct(text, Some(e.to_string()));
            }
        }

        let head = text.head(self.direct_chars);
        let mut windows = Vec::with_capacity(FieldGroup::ALL.len());
        for group in FieldGroup::ALL {
            let passages = self.group_passages(retriever.as_ref(), doc_key, group).await;
            let text = if passages.is_empty() {
                debug!("No passages for {} group of {}, using document head", group, doc_key);
                head.to_string()
            } else {
                join_within_budget(&passages, self.settings.context_chars)
            };
            windows.push(ContextWindow {
                label: group.name(),
                fields: group.fields().to_vec(),
                text,
            });
        }

        AssembledContext {
            mode: ContextMode::Retrieval,
            windows,
            degraded: None,
        }
    }

    /// One window over the document head, answering every field.
    pub fn direct(&self, text: &DocumentText, degraded: Option<String>) -> AssembledContext {
        AssembledContext {
            mode: ContextMode::Direct,
            windows: vec![ContextWindow {
                label: "full",
                fields: Field::ALL.to_vec(),
                text: text.head(self.direct_chars).to_string(),
            }],
            degraded,
        }
    }

    /// Run every query for a group, dedupe hits by exact text, keep query order.
    async fn group_passages(
        &self,
        retriever: &dyn Retriever,
        doc_key: &str,
        group: FieldGroup,
    ) -> Vec<String> {
        let k = group.top_k(&self.settings);
        let calls = group
            .queries()
            .iter()
            .map(|q| self.timed(retriever.query(doc_key, q, k)));
        let results: Vec<Result<Vec<RetrievalHit>>> = join_all(calls).await;

        let mut passages: Vec<String> = Vec::new();
        for (query, result) in group.queries().iter().zip(results) {
            match result {
                Ok(hits) => {
                    for hit in hits {
                        if !passages.iter().any(|p| *p == hit.text) {
                            passages.push(hit.text);
                        }
                    }
                }
                Err(e) => warn!("Retrieval query '{}' failed for {}: {}", query, doc_key, e),
            }
        }
        passages
    }

    async fn timed<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        let secs = self.settings.timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| Error::Timeout(secs))?
    }
}

/// Concatenate passages with blank lines, truncated to `max_chars` characters.
fn join_within_budget(passages: &[String], max_chars: usize) -> String {
    let joined = passages.join("\n\n");
    head_slice(&joined, max_chars).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::{FailingRetriever, MemoryIndex};

    fn settings() -> RagSettings {
        RagSettings {
            chunk_chars: 500,
            chunk_overlap: 50,
            ..RagSettings::default()
        }
    }

    fn long_document() -> DocumentText {
        let filler = "General conditions of contract apply to all bidders.\n".repeat(40);
        DocumentText::from_raw(&format!(
            "NOTICE INVITING TENDER\nTender Ref: PWD/RD/2024/117\n\n{filler}\n\
             EMD Earnest Money Deposit: Rs. 50,000\n\n{filler}\n\
             Scope of Work: resurfacing of the ring road.\n\n{filler}"
        ))
    }

    #[tokio::test]
    async fn test_direct_without_retriever() {
        let assembler = ContextAssembler::new(settings(), 100);
        let ctx = assembler.assemble("doc", &long_document()).await;
        assert_eq!(ctx.mode, ContextMode::Direct);
        assert_eq!(ctx.windows.len(), 1);
        assert_eq!(ctx.windows[0].fields.len(), Field::ALL.len());
        assert_eq!(ctx.windows[0].text.chars().count(), 100);
        assert!(ctx.degraded.is_none());
    }

    #[tokio::test]
    async fn test_small_document_stays_direct() {
        let assembler =
            ContextAssembler::new(settings(), 15_000).with_retriever(Arc::new(MemoryIndex::new()));
        let ctx = assembler.assemble("doc", &long_document()).await;
        assert_eq!(ctx.mode, ContextMode::Direct);
    }

    #[tokio::test]
    async fn test_retrieval_windows_per_group() {
        let index = Arc::new(MemoryIndex::new());
        let assembler = ContextAssembler::new(settings(), 300).with_retriever(index.clone());
        let ctx = assembler.assemble("doc", &long_document()).await;

        assert_eq!(ctx.mode, ContextMode::Retrieval);
        assert_eq!(ctx.windows.len(), 3);
        assert!(index.chunk_count("doc") > 1);

        let core = &ctx.windows[0];
        assert_eq!(core.label, "core");
        assert!(core.text.contains("Rs. 50,000"));
        assert!(core.text.chars().count() <= 12_000);
        let content = &ctx.windows[1];
        assert!(content.text.contains("ring road"));
    }

    #[tokio::test]
    async fn test_index_failure_degrades_to_direct() {
        let assembler = ContextAssembler::new(settings(), 300)
            .with_retriever(Arc::new(FailingRetriever::new("index offline")));
        let ctx = assembler.assemble("doc", &long_document()).await;
        assert_eq!(ctx.mode, ContextMode::Direct);
        assert!(ctx.degraded.unwrap().contains("index offline"));
        assert_eq!(ctx.windows[0].text.chars().count(), 300);
    }

    #[tokio::test]
    async fn test_disabled_rag_ignores_retriever() {
        let mut rag = settings();
        rag.enabled = false;
        let assembler =
            ContextAssembler::new(rag, 300).with_retriever(Arc::new(MemoryIndex::new()));
        assert!(assembler.has_retriever());
        let ctx = assembler.assemble("doc", &long_document()).await;
        assert_eq!(ctx.mode, ContextMode::Direct);
    }

    #[test]
    fn test_join_within_budget() {
        let passages = vec!["a".repeat(10), "b".repeat(10)];
        assert_eq!(join_within_budget(&passages, 12), format!("{}\n\n", "a".repeat(10)));
        assert_eq!(join_within_budget(&passages, 100).len(), 22);
    }
}
