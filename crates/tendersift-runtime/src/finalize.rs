//! Finalizer: record-level corrections, fallbacks and the canonical record.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use tendersift_core::{
    is_blank, CanonicalRecord, CategoryTable, EvaluationResult, Field, FieldKind, FieldMap,
    FieldValue, Recommendation,
};
use tendersift_ingest::document::head_slice;
use tendersift_ingest::extract::{is_canonical_amount, is_canonical_date, is_valid_field_value};
use tendersift_ingest::DocumentText;

use crate::types::YearCorrection;

/// Longest synthesized summary.
const SUMMARY_MAX_CHARS: usize = 1200;
/// Templated summaries built from fewer parts than this are too thin to ship.
const MIN_SUMMARY_PARTS: usize = 2;
/// Paragraphs scanned for summary keywords.
const SUMMARY_PARAGRAPH_SCAN: usize = 20;
/// A keyword paragraph must be longer than this.
const SUMMARY_PARAGRAPH_MIN_CHARS: usize = 80;
/// Lines joined by the last-resort summary.
const SUMMARY_HEAD_LINES: usize = 6;

const SUMMARY_KEYWORDS: &[&str] = &[
    "invites",
    "request for proposal",
    "scope of work",
    "eligibility",
    "submission",
    "deadline",
];

const NO_SUMMARY: &str = "No summary could be derived from the document text.";

const BASELINE_PRIORITY: u8 = 6;
const RAISED_PRIORITY: u8 = 7;

static NAME_OF_WORK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Name\s*of\s*Work\s*[:\-]\s*(.+?)(?:\n|$)").unwrap());

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// What the finalizer changed on its way to the record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FinalizeReport {
    pub year_corrections: Vec<YearCorrection>,
    pub tender_id_reset: Option<String>,
    pub title_fallback_used: bool,
    pub summary_fallback_used: bool,
}

/// Turn reconciled fields into the canonical record.
///
/// Order matters: year alignment and the title fallback run before the
/// summary is synthesized so the summary sees their results.
pub fn finalize(mut fields: FieldMap, text: &DocumentText) -> (CanonicalRecord, FinalizeReport) {
    let mut report = FinalizeReport {
        year_corrections: correct_years(&mut fields),
        ..FinalizeReport::default()
    };
    for c in &report.year_corrections {
        warn!("{} year corrected from {} to {}", c.field, c.from, c.to);
    }

    if is_blank(text_of(&fields, Field::Title)) {
        if let Some(title) = title_from_name_of_work(text.as_str()) {
            fields.insert(Field::Title, FieldValue::Text(title));
            report.title_fallback_used = true;
        }
    }

    let tender_id = text_of(&fields, Field::TenderId).trim().to_string();
    if !is_blank(&tender_id) && !text.contains_ignore_case(&tender_id) {
        warn!("Tender id {} does not occur in the text, dropping it", tender_id);
        fields.insert(Field::TenderId, FieldValue::text(""));
        report.tender_id_reset = Some(tender_id);
    }

    if is_blank(text_of(&fields, Field::ShortSummary)) {
        let summary = template_summary(&fields)
            .or_else(|| text_summary(text.as_str()))
            .unwrap_or_else(|| NO_SUMMARY.to_string());
        fields.insert(Field::ShortSummary, FieldValue::Text(summary));
        report.summary_fallback_used = true;
    }

    (CanonicalRecord::from_fields(&fields), report)
}

/// All-"N/A" record for a document that could not be decoded.
pub fn failure_record(reason: &str) -> CanonicalRecord {
    let mut fields = FieldMap::new();
    fields.insert(
        Field::ShortSummary,
        FieldValue::Text(format!("Document could not be processed: {}", reason)),
    );
    CanonicalRecord::from_fields(&fields)
}

fn text_of(fields: &FieldMap, field: Field) -> &str {
    fields.get(&field).and_then(|v| v.as_text()).unwrap_or("")
}

// ---------------------------------------------------------------
// Cross-field corrections
// ---------------------------------------------------------------

/// Deadline and opening dates sharing day and month with the publication
/// date but not its year take the publication year.
pub fn correct_years(fields: &mut FieldMap) -> Vec<YearCorrection> {
    let publication = text_of(fields, Field::PublicationDate).to_string();
    if !is_canonical_date(&publication) {
        return Vec::new();
    }
    let (pub_day_month, pub_year) = (&publication[..5], &publication[6..]);

    let mut corrections = Vec::new();
    for field in [Field::SubmissionDeadline, Field::BidOpeningDate] {
        let value = text_of(fields, field).to_string();
        if !is_canonical_date(&value) {
            continue;
        }
        if &value[..5] == pub_day_month && &value[6..] != pub_year {
            let fixed = format!("{}-{}", pub_day_month, pub_year);
            fields.insert(field, FieldValue::Text(fixed.clone()));
            corrections.push(YearCorrection {
                field,
                from: value,
                to: fixed,
            });
        }
    }
    corrections
}

/// Literal "Name of Work:" line, if it passes the title checks.
pub fn title_from_name_of_work(text: &str) -> Option<String> {
    NAME_OF_WORK
        .captures(text)
        .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| is_valid_field_value(Field::Title, t))
}

// ---------------------------------------------------------------
// Summary fallback chain
// ---------------------------------------------------------------

/// Templated paragraph from already-extracted fields.
pub fn template_summary(fields: &FieldMap) -> Option<String> {
    let get = |f: Field| -> Option<&str> {
        let v = text_of(fields, f).trim();
        (!is_blank(v)).then_some(v)
    };

    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = get(Field::Title) {
        parts.push(format!("This tender is for {}.", title));
    }
    if let Some(issuer) = get(Field::IssuingAuthority) {
        parts.push(format!("Issued by {}.", issuer));
    }
    if let Some(location) = get(Field::Location) {
        parts.push(format!("Location: {}.", location));
    }

    let dates: Vec<String> = [
        (Field::PublicationDate, "publication date"),
        (Field::SubmissionDeadline, "submission deadline"),
        (Field::BidOpeningDate, "bid opening date"),
    ]
    .iter()
    .filter_map(|(f, label)| get(*f).map(|v| format!("{} {}", label, v)))
    .collect();
    if !dates.is_empty() {
        parts.push(format!("Key dates include {}.", dates.join(", ")));
    }

    let money: Vec<String> = [
        (Field::Emd, "EMD"),
        (Field::TenderFee, "Tender fee"),
        (Field::PerformanceGuarantee, "Performance guarantee"),
    ]
    .iter()
    .filter_map(|(f, label)| get(*f).map(|v| format!("{} {}", label, v)))
    .collect();
    if !money.is_empty() {
        parts.push(format!("Financial terms: {}.", money.join("; ")));
    }

    if let Some(duration) = get(Field::ContractDuration) {
        parts.push(format!("Contract duration: {}.", duration));
    }
    if let Some(scope) = get(Field::ScopeOfWork) {
        parts.push(format!("Scope of work: {}", scope));
    }
    if let Some(eligibility) = get(Field::EligibilitySummary) {
        parts.push(format!("Eligibility highlights: {}", eligibility));
    }

    if parts.len() < MIN_SUMMARY_PARTS {
        return None;
    }
    Some(head_slice(&parts.join(" "), SUMMARY_MAX_CHARS).trim().to_string())
}

/// Keyword-bearing paragraph, else the first few non-empty lines.
pub fn text_summary(text: &str) -> Option<String> {
    let paragraphs = PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty());
    for p in paragraphs.take(SUMMARY_PARAGRAPH_SCAN) {
        let lower = p.to_lowercase();
        if p.chars().count() > SUMMARY_PARAGRAPH_MIN_CHARS
            && SUMMARY_KEYWORDS.iter().any(|k| lower.contains(k))
        {
            return Some(head_slice(p, SUMMARY_MAX_CHARS).to_string());
        }
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(SUMMARY_HEAD_LINES)
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(head_slice(&lines.join(" "), SUMMARY_MAX_CHARS).to_string())
}

// ---------------------------------------------------------------
// Evaluation and validation
// ---------------------------------------------------------------

/// Heuristic evaluation used when no evaluation collaborator answered.
pub fn evaluate_fallback(record: &CanonicalRecord) -> EvaluationResult {
    let has_deadline = record.is_present(Field::SubmissionDeadline);
    let has_emd = record.is_present(Field::Emd);

    let mut risks = Vec::new();
    if !has_deadline {
        risks.push("Submission deadline not found");
    }
    if !has_emd {
        risks.push("EMD not specified");
    }
    if !record.is_present(Field::ScopeOfWork) {
        risks.push("Scope of work not summarized");
    }

    EvaluationResult {
        priority_score: if has_deadline && has_emd {
            RAISED_PRIORITY
        } else {
            BASELINE_PRIORITY
        },
        recommendation: Recommendation::Review,
        key_risks: if risks.is_empty() {
            "No major risks detected from extracted fields".to_string()
        } else {
            risks.join("; ")
        },
    }
}

/// Schema invariant violations of a finished record, one message each.
pub fn validate_record(record: &CanonicalRecord, categories: &CategoryTable) -> Vec<String> {
    let mut problems = Vec::new();
    for field in Field::ALL {
        if let Some(items) = record.list(field) {
            if items.iter().any(|i| i.trim().is_empty()) {
                problems.push(format!("{}: contains an empty item", field));
            }
            for (i, item) in items.iter().enumerate() {
                if items[..i].contains(item) {
                    problems.push(format!("{}: duplicate item {:?}", field, item));
                }
            }
            continue;
        }

        let value = record.text(field).unwrap_or("");
        if value.trim().is_empty() {
            problems.push(format!("{}: empty string instead of \"N/A\"", field));
            continue;
        }
        if is_blank(value) {
            continue;
        }
        let ok = match field.kind() {
            FieldKind::Date => is_canonical_date(value),
            FieldKind::Money => is_canonical_amount(value),
            FieldKind::Category => categories.is_allowed(value),
            _ => true,
        };
        if !ok {
            problems.push(format!("{}: {:?} is not in canonical form", field, value));
        }
    }
    if !record.is_present(Field::ShortSummary) {
        problems.push("short_summary: missing".to_string());
    }
    problems
}
