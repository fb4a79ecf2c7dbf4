//! Runtime types.

use std::collections::BTreeMap;

use serde::Serialize;

use tendersift_core::{CandidateSource, CanonicalRecord, EvaluationResult, Field, FieldMap};
use tendersift_resolve::ContextMode;

/// Where the attached evaluation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationSource {
    /// The evaluation collaborator answered.
    Llm,
    /// Local heuristic, used when the collaborator is disabled or failed.
    Heuristic,
}

/// A date whose year was overwritten with the publication year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearCorrection {
    pub field: Field,
    pub from: String,
    pub to: String,
}

/// How a run arrived at its record.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetadata {
    #[serde(rename = "regex_candidates")]
    pub pattern_candidates: FieldMap,
    #[serde(rename = "llm_candidates")]
    pub generative_candidates: FieldMap,
    pub context_mode: ContextMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_degraded: Option<String>,
    pub generative_available: bool,
    pub generative_calls: usize,
    pub generative_failed_calls: usize,
    pub sources: BTreeMap<Field, CandidateSource>,
    pub category_detected: bool,
    pub year_corrections: Vec<YearCorrection>,
    /// Tender id dropped because it does not occur in the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tender_id_reset: Option<String>,
    pub title_fallback_used: bool,
    pub summary_fallback_used: bool,
    pub evaluation_source: EvaluationSource,
}

impl ExtractionMetadata {
    /// Metadata for a document that never reached extraction.
    pub fn empty() -> Self {
        Self {
            pattern_candidates: FieldMap::new(),
            generative_candidates: FieldMap::new(),
            context_mode: ContextMode::Direct,
            context_degraded: None,
            generative_available: false,
            generative_calls: 0,
            generative_failed_calls: 0,
            sources: BTreeMap::new(),
            category_detected: false,
            year_corrections: Vec::new(),
            tender_id_reset: None,
            title_fallback_used: false,
            summary_fallback_used: false,
            evaluation_source: EvaluationSource::Heuristic,
        }
    }
}

/// Outcome of one pipeline run over one document.
#[derive(Debug, Clone, Serialize)]
pub struct TenderAnalysis {
    pub doc_key: String,
    pub filename: String,
    pub record: CanonicalRecord,
    pub evaluation: EvaluationResult,
    pub metadata: ExtractionMetadata,
    /// Set when the document could not be decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl TenderAnalysis {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// The `metadata.json` document: `{"extraction_meta": {..., "eval": ...}}`.
    pub fn metadata_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(MetadataFile {
            extraction_meta: MetadataBody {
                meta: &self.metadata,
                eval: &self.evaluation,
                failure: self.failure.as_deref(),
            },
        })
    }
}

#[derive(Serialize)]
struct MetadataFile<'a> {
    extraction_meta: MetadataBody<'a>,
}

#[derive(Serialize)]
struct MetadataBody<'a> {
    #[serde(flatten)]
    meta: &'a ExtractionMetadata,
    eval: &'a EvaluationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'a str>,
}
