//! Generative extractor: one completion call per context window, merged
//! into a single generative candidate set.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use tendersift_core::{
    is_blank, CandidateSet, CandidateSource, CategoryTable, Error, Field, FieldKind, FieldMap,
    FieldValue, PipelineConfig, Result,
};
use tendersift_ingest::document::head_slice;
use tendersift_ingest::extract::{
    cleanup_emails, cleanup_phones, is_valid_field_value, sanitize_for_field,
};
use tendersift_ingest::GlobalHeader;
use tendersift_resolve::ContextWindow;

use crate::backend::CompletionBackend;
use crate::json::extract_json_object;
use crate::prompts::extraction_prompt;

/// Character caps applied to long narrative answers.
const NARRATIVE_CAPS: &[(Field, usize)] = &[
    (Field::ScopeOfWork, 1000),
    (Field::ShortSummary, 2000),
    (Field::EligibilitySummary, 800),
    (Field::RequiredDocuments, 800),
];

/// What the generative pass produced for one document.
#[derive(Debug, Clone, Serialize)]
pub struct GenerativeOutcome {
    pub candidates: CandidateSet,
    pub calls: usize,
    pub failed_calls: usize,
}

impl GenerativeOutcome {
    /// No calls made; used when the pass is disabled.
    pub fn skipped() -> Self {
        Self {
            candidates: CandidateSet::new(CandidateSource::Generative),
            calls: 0,
            failed_calls: 0,
        }
    }

    /// Whether at least one call returned a usable object.
    pub fn available(&self) -> bool {
        self.calls > self.failed_calls
    }
}

pub struct GenerativeExtractor {
    backend: Arc<dyn CompletionBackend>,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
    max_context_chars: usize,
    categories: CategoryTable,
}

impl GenerativeExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
            timeout_secs: config.llm_timeout_secs,
            max_context_chars: config.direct_context_chars,
            categories: config.categories.clone(),
        }
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    /// Run every window concurrently and merge the answers.
    ///
    /// Never fails: a window whose call errors, times out or returns no
    /// parseable object contributes nothing.
    pub async fn extract(&self, windows: &[ContextWindow], header: &GlobalHeader) -> GenerativeOutcome {
        let live: Vec<&ContextWindow> = windows.iter().filter(|w| !w.text.trim().is_empty()).collect();
        let results = join_all(live.iter().map(|w| self.extract_window(w, header))).await;

        let mut maps = Vec::with_capacity(results.len());
        let mut failed_calls = 0usize;
        for (window, result) in live.iter().zip(results) {
            match result {
                Ok(map) => {
                    debug!("Window {} yielded {} fields", window.label, map.len());
                    maps.push(map);
                }
                Err(e) => {
                    failed_calls += 1;
                    warn!("Generative extraction failed for window {}: {}", window.label, e);
                }
            }
        }

        let merged = merge_generative_maps(maps);
        GenerativeOutcome {
            candidates: CandidateSet::from_map(
                CandidateSource::Generative,
                postprocess(merged, &self.categories),
            ),
            calls: live.len(),
            failed_calls,
        }
    }

    async fn extract_window(&self, window: &ContextWindow, header: &GlobalHeader) -> Result<FieldMap> {
        let text = head_slice(&window.text, self.max_context_chars);
        let prompt = extraction_prompt(
            &window.fields,
            text,
            header,
            &self.categories.allowed,
            window.label,
        );
        let raw = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.backend.complete(&prompt, self.max_tokens, self.temperature),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout_secs))??;

        let object = extract_json_object(&raw)
            .ok_or_else(|| Error::Completion("no JSON object in model output".into()))?;
        Ok(values_from_json(&object, &window.fields))
    }
}

/// Keep recognized keys the call was asked for, as strings or string lists.
pub fn values_from_json(object: &Map<String, Value>, fields: &[Field]) -> FieldMap {
    let mut out = FieldMap::new();
    for (key, value) in object {
        let Some(field) = Field::from_name(key) else {
            continue;
        };
        if !fields.contains(&field) {
            continue;
        }
        let converted = match value {
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Number(n) => FieldValue::Text(n.to_string()),
            Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .filter_map(|i| match i {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => continue,
        };
        out.insert(field, converted);
    }
    out
}

/// Merge per-window answers. Lists are unioned in first-seen order; for
/// scalars the first non-blank answer wins.
pub fn merge_generative_maps(maps: Vec<FieldMap>) -> FieldMap {
    let mut merged = FieldMap::new();
    for map in maps {
        for (field, value) in map {
            if field.is_list() {
                let mut items = merged
                    .get(&field)
                    .map(|v: &FieldValue| v.to_items())
                    .unwrap_or_default();
                for item in value.to_items() {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                merged.insert(field, FieldValue::List(items));
                continue;
            }
            if value.is_empty_value() {
                continue;
            }
            let taken = merged.get(&field).is_some_and(|v| !v.is_empty_value());
            if !taken {
                merged.insert(field, value);
            }
        }
    }
    merged
}

/// Normalize generative answers before reconciliation.
///
/// Blank answers become empty strings, typed fields are sanitized, unknown
/// categories are dropped and long narratives are capped.
pub fn postprocess(map: FieldMap, categories: &CategoryTable) -> FieldMap {
    let mut out = FieldMap::new();
    for (field, value) in map {
        let cleaned = match field.kind() {
            FieldKind::Emails => FieldValue::List(cleanup_emails(&value.to_items())),
            FieldKind::Phones => FieldValue::List(cleanup_phones(&value.to_items())),
            FieldKind::List => FieldValue::List(value.to_items()),
            kind => {
                let raw = match &value {
                    FieldValue::Text(s) => s.clone(),
                    FieldValue::List(items) => items.join(", "),
                };
                FieldValue::Text(postprocess_scalar(field, kind, &raw, categories))
            }
        };
        out.insert(field, cleaned);
    }
    out
}

fn postprocess_scalar(field: Field, kind: FieldKind, raw: &str, categories: &CategoryTable) -> String {
    if is_blank(raw) {
        return String::new();
    }
    match kind {
        FieldKind::Category => categories
            .canonical(raw)
            .map(str::to_string)
            .unwrap_or_default(),
        FieldKind::Organization => {
            let v = sanitize_for_field(field, raw);
            if is_valid_field_value(field, &v) {
                v
            } else {
                String::new()
            }
        }
        FieldKind::Narrative => {
            let v = raw.trim();
            match NARRATIVE_CAPS.iter().find(|(f, _)| *f == field) {
                Some((_, cap)) => head_slice(v, *cap).trim_end().to_string(),
                None => v.to_string(),
            }
        }
        _ => sanitize_for_field(field, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailingCompletion, StaticCompletion};

    fn window(label: &'static str, fields: &[Field], text: &str) -> ContextWindow {
        ContextWindow {
            label,
            fields: fields.to_vec(),
            text: text.to_string(),
        }
    }

    fn extractor(backend: Arc<dyn CompletionBackend>) -> GenerativeExtractor {
        GenerativeExtractor::new(backend, &PipelineConfig::default())
    }

    #[test]
    fn test_values_from_json_filters_fields() {
        let object = extract_json_object(
            r#"{"emd": "Rs. 5,000", "tender_fee": 1180, "projects": ["A", 2, null], "bogus": "x", "scope_of_work": "Roads"}"#,
        )
        .unwrap();
        let map = values_from_json(&object, &[Field::Emd, Field::TenderFee, Field::Projects]);
        assert_eq!(map.len(), 3);
        assert_eq!(map[&Field::TenderFee], FieldValue::text("1180"));
        assert_eq!(
            map[&Field::Projects],
            FieldValue::List(vec!["A".into(), "2".into()])
        );
    }

    #[test]
    fn test_merge_first_nonblank_scalar_and_list_union() {
        let mut a = FieldMap::new();
        a.insert(Field::Emd, FieldValue::text("N/A"));
        a.insert(Field::ContactEmails, FieldValue::List(vec!["a@x.in".into()]));
        let mut b = FieldMap::new();
        b.insert(Field::Emd, FieldValue::text("Rs. 5,000"));
        b.insert(
            Field::ContactEmails,
            FieldValue::List(vec!["b@x.in".into(), "a@x.in".into()]),
        );
        let mut c = FieldMap::new();
        c.insert(Field::Emd, FieldValue::text("Rs. 9,000"));

        let merged = merge_generative_maps(vec![a, b, c]);
        assert_eq!(merged[&Field::Emd], FieldValue::text("Rs. 5,000"));
        assert_eq!(
            merged[&Field::ContactEmails],
            FieldValue::List(vec!["a@x.in".into(), "b@x.in".into()])
        );
    }

    #[test]
    fn test_postprocess() {
        let categories = CategoryTable::default();
        let mut map = FieldMap::new();
        map.insert(Field::PublicationDate, FieldValue::text("5th March 2025"));
        map.insert(Field::SubmissionDeadline, FieldValue::text("soon"));
        map.insert(Field::BidOpeningTime, FieldValue::text("3.30 pm"));
        map.insert(Field::Emd, FieldValue::text("Rs. 50,000/- only"));
        map.insert(Field::Category, FieldValue::text("Spaceflight"));
        map.insert(Field::IssuingAuthority, FieldValue::text("GeM"));
        map.insert(Field::ScopeOfWork, FieldValue::text("x".repeat(1500)));
        map.insert(Field::Title, FieldValue::text("N/A"));
        map.insert(
            Field::ContactPhones,
            FieldValue::text("+91 98765 43210, 1800-11-2233"),
        );

        let out = postprocess(map, &categories);
        assert_eq!(out[&Field::PublicationDate], FieldValue::text("05-03-2025"));
        assert_eq!(out[&Field::SubmissionDeadline], FieldValue::text(""));
        assert_eq!(out[&Field::BidOpeningTime], FieldValue::text("03:30 PM"));
        assert_eq!(out[&Field::Emd], FieldValue::text("Rs. 50,000"));
        assert_eq!(out[&Field::Category], FieldValue::text(""));
        assert_eq!(out[&Field::IssuingAuthority], FieldValue::text(""));
        assert_eq!(out[&Field::Title], FieldValue::text(""));
        assert_eq!(
            out[&Field::ScopeOfWork].as_text().unwrap().chars().count(),
            1000
        );
        assert_eq!(
            out[&Field::ContactPhones],
            FieldValue::List(vec!["9876543210".into()])
        );
    }

    #[tokio::test]
    async fn test_extract_merges_windows() {
        let backend = Arc::new(
            StaticCompletion::new("{}")
                .with_rule(
                    "(section = core)",
                    r#"Here you go: {"tender_id": "PWD/7/2025", "emd": "Rs. 5,000", "contact_emails": ["ee@pwd.gov.in"]}"#,
                )
                .with_rule(
                    "(section = content)",
                    r#"{"scope_of_work": "Repair of culverts", "projects": "Culvert A; Culvert B"}"#,
                ),
        );
        let windows = vec![
            window("core", &[Field::TenderId, Field::Emd, Field::ContactEmails], "core text"),
            window("content", &[Field::ScopeOfWork, Field::Projects], "content text"),
            window("summary", &[Field::ShortSummary], "   "),
        ];
        let outcome = extractor(backend.clone())
            .extract(&windows, &GlobalHeader::new())
            .await;

        assert_eq!(outcome.calls, 2);
        assert_eq!(backend.calls(), 2);
        assert!(outcome.available());
        let c = &outcome.candidates;
        assert_eq!(c.source, CandidateSource::Generative);
        assert_eq!(c.text(Field::TenderId), "PWD/7/2025");
        assert_eq!(c.text(Field::Emd), "Rs. 5,000");
        assert_eq!(c.text(Field::ScopeOfWork), "Repair of culverts");
        assert_eq!(
            c.get(Field::Projects),
            Some(&FieldValue::List(vec!["Culvert A".into(), "Culvert B".into()]))
        );
    }

    #[tokio::test]
    async fn test_failures_yield_empty_candidates() {
        let windows = vec![window("full", &Field::ALL, "some text")];

        let outcome = extractor(Arc::new(FailingCompletion::new()))
            .extract(&windows, &GlobalHeader::new())
            .await;
        assert_eq!(outcome.failed_calls, 1);
        assert!(!outcome.available());
        assert!(outcome.candidates.is_empty());

        let outcome = extractor(Arc::new(StaticCompletion::new("I cannot help with that.")))
            .extract(&windows, &GlobalHeader::new())
            .await;
        assert_eq!(outcome.failed_calls, 1);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_skipped_outcome() {
        let outcome = GenerativeOutcome::skipped();
        assert!(!outcome.available());
        assert!(outcome.candidates.is_empty());
    }
}
