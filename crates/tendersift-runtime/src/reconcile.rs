//! Reconciler: one value per field from the pattern and generative candidates.
//!
//! Scalars: the sanitized pattern candidate wins when it validates, then the
//! sanitized generative candidate, else the field stays empty. Lists: both
//! sources are unioned and the field's cleanup function filters the result.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use tendersift_core::{
    is_blank, CandidateSet, CandidateSource, CategoryTable, Field, FieldKind, FieldMap, FieldValue,
};
use tendersift_ingest::extract::{
    cleanup_emails, cleanup_phones, is_valid_field_value, sanitize_for_field,
};

/// Reconciled field values plus which source supplied each scalar.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub fields: FieldMap,
    pub sources: BTreeMap<Field, CandidateSource>,
    /// Category came from the keyword table rather than either source.
    pub category_detected: bool,
}

impl Reconciliation {
    pub fn text(&self, field: Field) -> &str {
        self.fields.get(&field).and_then(|v| v.as_text()).unwrap_or("")
    }
}

pub fn reconcile(
    pattern: &CandidateSet,
    generative: &CandidateSet,
    categories: &CategoryTable,
) -> Reconciliation {
    let mut fields = FieldMap::new();
    let mut sources = BTreeMap::new();

    for field in Field::ALL {
        if field.is_list() {
            let merged = merge_list(field, pattern.get(field), generative.get(field));
            fields.insert(field, FieldValue::List(merged));
            continue;
        }

        let from_pattern = accept_scalar(field, &scalar_text(pattern, field), categories);
        let chosen = match from_pattern {
            Some(v) => Some((v, CandidateSource::Pattern)),
            None => accept_scalar(field, &scalar_text(generative, field), categories)
                .map(|v| (v, CandidateSource::Generative)),
        };
        match chosen {
            Some((value, source)) => {
                fields.insert(field, FieldValue::Text(value));
                sources.insert(field, source);
            }
            None => {
                fields.insert(field, FieldValue::text(""));
            }
        }
    }

    let mut category_detected = false;
    if !sources.contains_key(&Field::Category) {
        let haystack = format!(
            "{} {}",
            text_of(&fields, Field::Title),
            text_of(&fields, Field::ScopeOfWork)
        );
        if let Some(category) = categories.detect(&haystack) {
            debug!("Category detected from keywords: {}", category);
            fields.insert(Field::Category, FieldValue::text(category));
            category_detected = true;
        }
    }

    Reconciliation {
        fields,
        sources,
        category_detected,
    }
}

fn text_of(fields: &FieldMap, field: Field) -> &str {
    fields.get(&field).and_then(|v| v.as_text()).unwrap_or("")
}

fn scalar_text(set: &CandidateSet, field: Field) -> String {
    match set.get(field) {
        Some(FieldValue::Text(s)) => s.clone(),
        Some(FieldValue::List(items)) => items.join(", "),
        None => String::new(),
    }
}

/// Sanitize and validate one scalar candidate.
fn accept_scalar(field: Field, raw: &str, categories: &CategoryTable) -> Option<String> {
    if is_blank(raw) {
        return None;
    }
    if field.kind() == FieldKind::Category {
        return categories.canonical(raw).map(str::to_string);
    }
    let value = sanitize_for_field(field, raw);
    is_valid_field_value(field, &value).then_some(value)
}

fn merge_list(field: Field, pattern: Option<&FieldValue>, generative: Option<&FieldValue>) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for value in [pattern, generative].into_iter().flatten() {
        items.extend(value.to_items());
    }
    match field.kind() {
        FieldKind::Emails => cleanup_emails(&items),
        FieldKind::Phones => cleanup_phones(&items),
        _ => {
            let mut out: Vec<String> = Vec::new();
            for item in items {
                if !is_blank(&item) && !out.contains(&item) {
                    out.push(item);
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(source: CandidateSource, pairs: &[(Field, FieldValue)]) -> CandidateSet {
        let mut s = CandidateSet::new(source);
        for (f, v) in pairs {
            s.insert(*f, v.clone());
        }
        s
    }

    fn run(pattern: &[(Field, FieldValue)], generative: &[(Field, FieldValue)]) -> Reconciliation {
        reconcile(
            &set(CandidateSource::Pattern, pattern),
            &set(CandidateSource::Generative, generative),
            &CategoryTable::default(),
        )
    }

    #[test]
    fn test_pattern_wins_over_generative_na() {
        let r = run(
            &[(Field::TenderId, FieldValue::text("ABC/2024/001"))],
            &[(Field::TenderId, FieldValue::text("N/A"))],
        );
        assert_eq!(r.text(Field::TenderId), "ABC/2024/001");
        assert_eq!(r.sources[&Field::TenderId], CandidateSource::Pattern);
    }

    #[test]
    fn test_pattern_wins_even_when_both_valid() {
        let r = run(
            &[(Field::Emd, FieldValue::text("Rs. 25,000/-"))],
            &[(Field::Emd, FieldValue::text("Rs. 30,000"))],
        );
        assert_eq!(r.text(Field::Emd), "Rs. 25,000");
    }

    #[test]
    fn test_invalid_pattern_falls_through_to_generative() {
        let r = run(
            &[
                (Field::Emd, FieldValue::text("to be paid by Demand Draft in favour of EE")),
                (Field::PublicationDate, FieldValue::text("sometime in spring")),
            ],
            &[
                (Field::Emd, FieldValue::text("Rs. 10,000")),
                (Field::PublicationDate, FieldValue::text("3 Feb 2025")),
            ],
        );
        assert_eq!(r.text(Field::Emd), "Rs. 10,000");
        assert_eq!(r.sources[&Field::Emd], CandidateSource::Generative);
        assert_eq!(r.text(Field::PublicationDate), "03-02-2025");
    }

    #[test]
    fn test_both_invalid_leaves_field_empty() {
        let r = run(
            &[(Field::IssuingAuthority, FieldValue::text("---"))],
            &[(Field::IssuingAuthority, FieldValue::text("MSME procurement policy"))],
        );
        assert_eq!(r.text(Field::IssuingAuthority), "");
        assert!(!r.sources.contains_key(&Field::IssuingAuthority));
        assert_eq!(r.fields.len(), 26);
    }

    #[test]
    fn test_lists_are_unioned_and_cleaned() {
        let r = run(
            &[
                (Field::ContactEmails, FieldValue::List(vec!["ee.pwd@nic.in".into()])),
                (Field::ContactPhones, FieldValue::List(vec!["0141-2227744".into()])),
            ],
            &[
                (Field::ContactEmails, FieldValue::text("se@pwd.gov.in; ee.pwd@nic.in, not-an-email")),
                (Field::ContactPhones, FieldValue::List(vec!["+91 141 222 7744".into(), "1800-180-6127".into()])),
                (Field::Projects, FieldValue::text("Road A\nRoad B\nRoad A")),
            ],
        );
        assert_eq!(
            r.fields[&Field::ContactEmails],
            FieldValue::List(vec!["ee.pwd@nic.in".into(), "se@pwd.gov.in".into()])
        );
        assert_eq!(
            r.fields[&Field::ContactPhones],
            FieldValue::List(vec!["1412227744".into()])
        );
        assert_eq!(
            r.fields[&Field::Projects],
            FieldValue::List(vec!["Road A".into(), "Road B".into()])
        );
    }

    #[test]
    fn test_category_from_source_or_keywords() {
        let r = run(&[], &[(Field::Category, FieldValue::text("it / software"))]);
        assert_eq!(r.text(Field::Category), "IT / Software");
        assert!(!r.category_detected);

        let r = run(
            &[(Field::Title, FieldValue::text("Construction of Highway"))],
            &[(Field::Category, FieldValue::text("Highways"))],
        );
        assert_eq!(r.text(Field::Category), "Construction");
        assert!(r.category_detected);

        let r = run(&[(Field::Title, FieldValue::text("Supply of stationery"))], &[]);
        assert_eq!(r.text(Field::Category), "");
    }
}
