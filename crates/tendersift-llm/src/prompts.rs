//! Prompt templates for field extraction and bid evaluation.

use tendersift_core::{CanonicalRecord, Field, Result};
use tendersift_ingest::GlobalHeader;

const EXTRACTION_TEMPLATE: &str = r#"You are an information extraction system for public procurement notices.
Read TEXT and return exactly ONE JSON object with the keys of SCHEMA and nothing else.
GLOBAL_HEADER holds masthead details that may appear only once in the document; use it as context.

SCHEMA = {schema}

GLOBAL_HEADER:
{header}

TEXT (section = {label}):
{text}

RULES:
- A field that is not present in TEXT is "N/A" for strings and [] for arrays. Never invent values.
- Dates: "DD-MM-YYYY".
- Times: "HH:MM AM/PM".
- Money fields: the value only, e.g. "₹ 70,000", "Rs. 1 Lakh", "2%". No payment instructions.
- issuing_authority: the organization name only.
- category: choose one of {categories}, or "N/A".
- scope_of_work: a concise description, about 400 characters.
- short_summary: about 100-150 words covering scope, key dates and requirements, written from TEXT.
- projects: distinct sub-projects, if any.
- tender_id: only if it appears verbatim in TEXT next to a label such as "Tender ID", "NIT No" or "Ref No". Do not infer or generate it.
- publication_date: the issue or start date of the notice.

OUTPUT: JSON only. No markdown, no commentary, no trailing text.
"#;

const EVALUATION_TEMPLATE: &str = r#"You are a business analyst reviewing a tender for a contractor.
Based on the tender details below, return a JSON object with:
- priority_score: a number from 1 to 10
- recommendation: one of "PURSUE", "REVIEW", "DO NOT PURSUE"
- key_risks: a short string summarizing key risks or gaps

Return JSON only.

Tender JSON:
{record}
"#;

/// `{"field": "" | [] , ...}` for the requested fields, in schema order.
pub fn schema_for_fields(fields: &[Field]) -> String {
    let mut ordered: Vec<Field> = fields.to_vec();
    ordered.sort();
    ordered.dedup();
    let body: Vec<String> = ordered
        .iter()
        .map(|f| {
            let empty = if f.is_list() { "[]" } else { "\"\"" };
            format!("  \"{}\": {}", f.name(), empty)
        })
        .collect();
    format!("{{\n{}\n}}", body.join(",\n"))
}

/// Prompt for one extraction call over one context window.
pub fn extraction_prompt(
    fields: &[Field],
    text: &str,
    header: &GlobalHeader,
    categories: &[String],
    label: &str,
) -> String {
    let header_json = serde_json::to_string(header).unwrap_or_else(|_| "{}".into());
    let categories = categories
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    EXTRACTION_TEMPLATE
        .replace("{schema}", &schema_for_fields(fields))
        .replace("{header}", &header_json)
        .replace("{label}", label)
        .replace("{categories}", &format!("[{}]", categories))
        .replace("{text}", text)
}

/// Prompt asking for a bid evaluation of a finished record.
pub fn evaluation_prompt(record: &CanonicalRecord) -> Result<String> {
    let record_json = serde_json::to_string_pretty(record)?;
    Ok(EVALUATION_TEMPLATE.replace("{record}", &record_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_for_fields_is_ordered() {
        let schema = schema_for_fields(&[Field::Projects, Field::TenderId, Field::TenderId]);
        assert_eq!(schema, "{\n  \"tender_id\": \"\",\n  \"projects\": []\n}");
        let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert!(parsed["projects"].is_array());
    }

    #[test]
    fn test_extraction_prompt_fills_slots() {
        let mut header = GlobalHeader::new();
        header.insert("title".into(), "Supply of desks".into());
        let prompt = extraction_prompt(
            &[Field::Emd],
            "EMD: Rs. 5,000",
            &header,
            &["Construction".to_string(), "Repair".to_string()],
            "core",
        );
        assert!(prompt.contains("\"emd\": \"\""));
        assert!(prompt.contains("Supply of desks"));
        assert!(prompt.contains("(section = core)"));
        assert!(prompt.contains("[\"Construction\", \"Repair\"]"));
        assert!(prompt.contains("EMD: Rs. 5,000"));
        assert!(!prompt.contains("{schema}"));
    }

    #[test]
    fn test_evaluation_prompt_embeds_record() {
        let mut record = CanonicalRecord::default();
        record.emd = "Rs. 5,000".into();
        let prompt = evaluation_prompt(&record).unwrap();
        assert!(prompt.contains("\"emd\": \"Rs. 5,000\""));
        assert!(prompt.contains("DO NOT PURSUE"));
    }
}
