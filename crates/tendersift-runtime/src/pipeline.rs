//! Single-document pipeline: bytes → text → candidates → record.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use tendersift_core::{CanonicalRecord, EvaluationResult, PipelineConfig, Result};
use tendersift_ingest::{
    build_global_header, extract_candidates, BasicTextExtractor, Document, DocumentText,
    TextExtractor,
};
use tendersift_llm::{CompletionBackend, Evaluator, GenerativeExtractor, GenerativeOutcome, LlmEvaluator};
use tendersift_resolve::{ContextAssembler, ContextMode, Retriever};
use tendersift_store::{RecordWrite, SqliteStore};

use crate::finalize::{evaluate_fallback, failure_record, finalize};
use crate::reconcile::reconcile;
use crate::types::{EvaluationSource, ExtractionMetadata, TenderAnalysis};

/// The extraction and reconciliation pipeline with its collaborators.
///
/// Every collaborator is optional except text extraction. Without a
/// completion backend the run is pattern-only; without an evaluator the
/// heuristic evaluation is attached; without a retriever context is direct.
pub struct TenderPipeline {
    config: PipelineConfig,
    text_extractor: Arc<dyn TextExtractor>,
    assembler: ContextAssembler,
    generative: Option<GenerativeExtractor>,
    evaluator: Option<Arc<dyn Evaluator>>,
    store: Option<Arc<SqliteStore>>,
}

impl TenderPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let assembler = ContextAssembler::new(config.rag.clone(), config.direct_context_chars);
        Self {
            config,
            text_extractor: Arc::new(BasicTextExtractor),
            assembler,
            generative: None,
            evaluator: None,
            store: None,
        }
    }

    pub fn with_text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.text_extractor = extractor;
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.assembler =
            ContextAssembler::new(self.config.rag.clone(), self.config.direct_context_chars)
                .with_retriever(retriever);
        self
    }

    /// Use `backend` for generative extraction and, unless an evaluator was
    /// already set, for evaluation. Each is skipped when disabled in config.
    pub fn with_completion(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        if self.config.use_llm_extract {
            self.generative = Some(GenerativeExtractor::new(Arc::clone(&backend), &self.config));
        }
        if self.config.use_llm_eval && self.evaluator.is_none() {
            self.evaluator = Some(Arc::new(LlmEvaluator::new(
                backend,
                self.config.llm_timeout_secs,
            )));
        }
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Persist every finished analysis to `store`.
    pub fn with_store(mut self, store: Arc<SqliteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stable key for a document: file stem plus a content-hash prefix.
    pub fn doc_key(document: &Document) -> String {
        let hash = document.content_hash();
        format!("{}-{}", document.safe_stem(), &hash[..12])
    }

    /// Run one document end to end. Never fails: a document whose text cannot
    /// be extracted yields an all-"N/A" record carrying a failure marker.
    pub async fn process(&self, document: &Document) -> TenderAnalysis {
        let doc_key = Self::doc_key(document);
        info!("Processing {} as {}", document.filename, doc_key);

        let analysis = match self.extract_text(document).await {
            Ok(text) => self.analyze_text(&doc_key, &document.filename, &text).await,
            Err(e) => {
                if e.is_fatal_input() {
                    warn!("Cannot read {}: {}", document.filename, e);
                } else {
                    error!("Text extraction failed for {}: {}", document.filename, e);
                }
                self.failed(&doc_key, &document.filename, &e.to_string())
            }
        };

        if let Err(e) = self.persist(&analysis).await {
            warn!("Failed to persist {}: {}", analysis.doc_key, e);
        }
        analysis
    }

    async fn extract_text(&self, document: &Document) -> Result<DocumentText> {
        let extractor = Arc::clone(&self.text_extractor);
        let bytes = document.bytes.clone();
        let filename = document.filename.clone();
        let raw = tokio::task::spawn_blocking(move || extractor.extract_text(&bytes, &filename))
            .await
            .map_err(|e| tendersift_core::Error::Internal(format!("text extraction task: {}", e)))??;
        Ok(DocumentText::from_raw(&raw))
    }

    /// Extract, reconcile, finalize and evaluate already-cleaned text.
    pub async fn analyze_text(&self, doc_key: &str, filename: &str, text: &DocumentText) -> TenderAnalysis {
        let header = build_global_header(text.as_str(), self.config.header_chars);

        // The two passes are independent; reconciliation waits for both.
        let pattern_pass = async {
            let candidates = extract_candidates(text.as_str());
            debug!("Pattern pass for {} done", doc_key);
            candidates
        };
        let generative_pass = async {
            match &self.generative {
                Some(generative) => {
                    let context = self.assembler.assemble(doc_key, text).await;
                    let outcome = generative.extract(&context.windows, &header).await;
                    (context.mode, context.degraded, outcome)
                }
                None => (ContextMode::Direct, None, GenerativeOutcome::skipped()),
            }
        };
        let (pattern, (context_mode, context_degraded, generative)) =
            tokio::join!(pattern_pass, generative_pass);

        if self.generative.is_some() && !generative.available() {
            warn!("Generative pass unavailable for {}, using patterns only", doc_key);
        }

        let reconciled = reconcile(&pattern, &generative.candidates, &self.config.categories);
        let (record, report) = finalize(reconciled.fields.clone(), text);
        let (evaluation, evaluation_source) = self.evaluate(&record).await;

        info!(
            "Finished {}: {} of 26 fields present, evaluation {} ({:?})",
            doc_key,
            tendersift_core::Field::ALL
                .iter()
                .filter(|f| record.is_present(**f))
                .count(),
            evaluation.recommendation,
            evaluation_source
        );

        let generative_available = generative.available();
        TenderAnalysis {
            doc_key: doc_key.to_string(),
            filename: filename.to_string(),
            record,
            evaluation,
            metadata: ExtractionMetadata {
                pattern_candidates: pattern.values,
                generative_candidates: generative.candidates.values,
                context_mode,
                context_degraded,
                generative_available,
                generative_calls: generative.calls,
                generative_failed_calls: generative.failed_calls,
                sources: reconciled.sources,
                category_detected: reconciled.category_detected,
                year_corrections: report.year_corrections,
                tender_id_reset: report.tender_id_reset,
                title_fallback_used: report.title_fallback_used,
                summary_fallback_used: report.summary_fallback_used,
                evaluation_source,
            },
            failure: None,
        }
    }

    async fn evaluate(&self, record: &CanonicalRecord) -> (EvaluationResult, EvaluationSource) {
        if self.config.use_llm_eval {
            if let Some(evaluator) = &self.evaluator {
                match evaluator.evaluate(record).await {
                    Ok(result) => return (result, EvaluationSource::Llm),
                    Err(e) => warn!("Evaluation failed, using heuristic: {}", e),
                }
            }
        }
        (evaluate_fallback(record), EvaluationSource::Heuristic)
    }

    fn failed(&self, doc_key: &str, filename: &str, reason: &str) -> TenderAnalysis {
        let record = failure_record(reason);
        TenderAnalysis {
            doc_key: doc_key.to_string(),
            filename: filename.to_string(),
            evaluation: evaluate_fallback(&record),
            record,
            metadata: ExtractionMetadata::empty(),
            failure: Some(reason.to_string()),
        }
    }

    async fn persist(&self, analysis: &TenderAnalysis) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let store = Arc::clone(store);
        let analysis = analysis.clone();
        tokio::task::spawn_blocking(move || {
            let metadata = analysis.metadata_json()?;
            store.save_record(RecordWrite {
                doc_key: &analysis.doc_key,
                filename: Some(&analysis.filename),
                record: &analysis.record,
                evaluation: Some(&analysis.evaluation),
                metadata: Some(&metadata),
                failure: analysis.failure.as_deref(),
            })
        })
        .await
        .map_err(|e| tendersift_core::Error::Internal(format!("persist task: {}", e)))?
    }
}
