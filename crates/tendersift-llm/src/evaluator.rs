//! Bid evaluation collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use tendersift_core::{CanonicalRecord, Error, EvaluationResult, Recommendation, Result};

use crate::backend::CompletionBackend;
use crate::json::extract_json_object;
use crate::prompts::evaluation_prompt;

const EVALUATION_MAX_TOKENS: u32 = 500;

/// Produces a bid evaluation for a finished record.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, record: &CanonicalRecord) -> Result<EvaluationResult>;
}

/// Evaluation through a completion backend.
pub struct LlmEvaluator {
    backend: Arc<dyn CompletionBackend>,
    timeout_secs: u64,
}

impl LlmEvaluator {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout_secs: u64) -> Self {
        Self {
            backend,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(&self, record: &CanonicalRecord) -> Result<EvaluationResult> {
        let prompt = evaluation_prompt(record)?;
        let raw = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.backend.complete(&prompt, EVALUATION_MAX_TOKENS, 0.0),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout_secs))??;

        let object = extract_json_object(&raw)
            .ok_or_else(|| Error::Completion("evaluation output is not a JSON object".into()))?;
        let result = parse_evaluation(&object)?;
        debug!(
            "Evaluation: score {} recommendation {}",
            result.priority_score, result.recommendation
        );
        Ok(result)
    }
}

/// Read score, recommendation and risks from a model answer.
///
/// The score may be a number or a numeric string and is clamped to 1..=10.
/// `pursue_recommendation` is accepted as an alias of `recommendation`.
pub fn parse_evaluation(object: &Map<String, Value>) -> Result<EvaluationResult> {
    let score = match object.get("priority_score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::Completion("evaluation has no priority_score".into()))?;

    let recommendation = object
        .get("recommendation")
        .or_else(|| object.get("pursue_recommendation"))
        .and_then(Value::as_str)
        .and_then(Recommendation::parse)
        .ok_or_else(|| Error::Completion("evaluation has no usable recommendation".into()))?;

    let key_risks = match object.get("key_risks") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    };

    Ok(EvaluationResult {
        priority_score: score.round().clamp(1.0, 10.0) as u8,
        recommendation,
        key_risks,
    })
}

// ---------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------

/// Returns the same evaluation for every record.
pub struct StaticEvaluator {
    result: EvaluationResult,
    calls: AtomicUsize,
}

impl StaticEvaluator {
    pub fn new(result: EvaluationResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for StaticEvaluator {
    async fn evaluate(&self, _record: &CanonicalRecord) -> Result<EvaluationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Fails every evaluation.
#[derive(Debug, Default)]
pub struct FailingEvaluator;

#[async_trait]
impl Evaluator for FailingEvaluator {
    async fn evaluate(&self, _record: &CanonicalRecord) -> Result<EvaluationResult> {
        Err(Error::Completion("evaluator unavailable".into()))
    }
}
