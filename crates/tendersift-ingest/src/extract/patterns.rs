//! Deterministic, label-anchored field detection over cleaned text.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use tendersift_core::{CandidateSet, CandidateSource, Field, FieldValue};

use super::header::{authority_from_head, location_from_text, title_from_head};
use super::sanitize::{find_amount, sanitize_amount};
use crate::document::{head_slice, window_after};

/// Prefix scanned by the masthead heuristics.
pub const HEADER_SCAN_CHARS: usize = 4000;
/// Characters after a money keyword searched for an amount.
pub const AMOUNT_WINDOW_CHARS: usize = 400;

static TENDER_ID_LABELS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bTender\s*(?:Ref(?:erence)?\b\.?(?:\s*(?:No|Number)\b\.?)?|Number\b|Document\s*No\b\.?|ID\b|No\b\.?)\s*[:\-]?\s*([A-Za-z0-9_/.()\-]{3,})",
        r"(?i)\bNIT\s*No\b\.?\s*[:\-]?\s*([A-Za-z0-9_/.()\-]{3,})",
        r"(?i)\be-?Tender\s*(?:Reference|No|ID)\b\.?\s*[:\-]?\s*([A-Za-z0-9_/.()\-]{3,})",
        r"(?i)\bBid\s*(?:Reference|Number|No|ID)\b\.?\s*[:\-]?\s*([A-Za-z0-9_/.()\-]{3,})",
        r"(?i)\bRFQ\s*No\b\.?\s*[:\-]?\s*([A-Za-z0-9_/.()\-]{3,})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TENDER_ID_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]{2,}-\d+\b").unwrap());

static PUBLICATION_DATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:Publication\s*Date|Published\s*(?:On|Date)|Bid\s*Calling(?:\s*Date)?|Date\s*of\s*Issue|Advertised\s*Date)\s*[:\-]?\s*([0-3]?\d[./-][01]?\d[./-]\d{2,4})",
        r"\b([0-3]?\d[./-][01]?\d[./-]\d{2,4})\b",
        r"(?i)\b([0-3]?\d(?:st|nd|rd|th)?\s*(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec)\.?,?\s*\d{4})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Value of a labelled text field; may wrap onto one lowercase-led line.
const TEXT_VALUE: &str = r"[ \t]*([^\n]+(?:\n[ \t]*(?-i:[a-z(&])[^\n:]{0,80})?)";

/// A numeric or textual date after a label.
const DATE_VALUE: &str = r"\s*[:\-]?\s*(\d{1,2}[./-]\d{1,2}[./-]\d{2,4}|\d{1,2}(?:st|nd|rd|th)?\s+[A-Za-z]{3,9}\.?,?\s+\d{4})";

/// Free text after a money or duration label, possibly on the next line.
const AMOUNT_VALUE: &str = r"\b[^\n\r]{0,30}?[:\-]?\s*([^\n\r]{1,120})";
const SHORT_VALUE: &str = r"\b[^\n\r]{0,30}?[:\-]?\s*([^\n\r]{1,60})";

static SCALAR_PATTERNS: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
    let patterns: Vec<(Field, String)> = vec![
        (
            Field::Title,
            format!(r"(?i)\b(?:Name\s*of\s*(?:the\s*)?Work|Project\s*Title|Title)\s*[:\-]{TEXT_VALUE}"),
        ),
        (
            Field::IssuingAuthority,
            format!(
                r"(?i)\b(?:Issued\s*By|Issuing\s*Authority|Organi[sz]ation|Department|Office)\s*[:\-]{TEXT_VALUE}"
            ),
        ),
        (
            Field::Location,
            format!(r"(?i)\b(?:Location|Place\s*of\s*Bid|Place\s*of\s*Work)\s*[:\-]{TEXT_VALUE}"),
        ),
        (
            Field::SubmissionDeadline,
            format!(
                r"(?i)(?:Last\s*Date\s*(?:of|for)?\s*(?:Bid\s*Submission|Submission|Receipt)(?:\s*of\s*(?:Bids?|Tenders?))?|Bid\s*Closing(?:\s*Date)?|Submission\s*Deadline){DATE_VALUE}"
            ),
        ),
        (
            Field::BidOpeningDate,
            format!(r"(?i)\b(?:Bid\s*Opening(?:\s*Date)?|Opening\s*Date){DATE_VALUE}"),
        ),
        (
            Field::BidOpeningTime,
            r"(?i)\b(?:Opening\s*Time|Time)\s*[:\-]?\s*(\d{1,2}[:.]\d{2}\s*(?:[AP]\.?\s*M\b\.?)?)"
                .to_string(),
        ),
        (
            Field::TenderValue,
            format!(
                r"(?i)\b(?:Estimated\s*Cost|Tender\s*Value|Project\s*Cost|Approx\.?\s*Value){AMOUNT_VALUE}"
            ),
        ),
        (
            Field::Emd,
            format!(r"(?i)\b(?:EMD(?:\s*Amount)?|Earnest\s*Money(?:\s*Deposit)?){AMOUNT_VALUE}"),
        ),
        (
            Field::TenderFee,
            format!(r"(?i)\b(?:Bid\s*Document\s*Fee|Tender\s*Fee|Document\s*Fee){AMOUNT_VALUE}"),
        ),
        (
            Field::PerformanceGuarantee,
            format!(r"(?i)\bPerformance\s*(?:Security|Guarantee){SHORT_VALUE}"),
        ),
        (
            Field::ContractDuration,
            format!(
                r"(?i)\b(?:Contract\s*Duration|Period\s*of\s*Completion|Completion\s*Period|Duration){SHORT_VALUE}"
            ),
        ),
    ];
    patterns
        .into_iter()
        .map(|(field, p)| (field, Regex::new(&p).unwrap()))
        .collect()
});

static MONEY_KEYWORDS: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
    [
        (Field::Emd, r"(?i)\b(?:EMD|Earnest\s*Money(?:\s*Deposit)?)\b"),
        (
            Field::TenderFee,
            r"(?i)\b(?:Tender\s*Fee|Bid\s*Document\s*Fee|Document\s*Fee)\b",
        ),
        (Field::PerformanceGuarantee, r"(?i)\bPerformance\s*(?:Security|Guarantee)\b"),
        (
            Field::TenderValue,
            r"(?i)\b(?:Estimated\s*Cost|Tender\s*Value|Project\s*Cost)\b",
        ),
    ]
    .into_iter()
    .map(|(field, p)| (field, Regex::new(p).unwrap()))
    .collect()
});

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(?:\+91[-\s]?)?\(?\d{3,5}\)?[-\s]?\d{5,8}|\b\d{10}\b)").unwrap()
});

static LINE_WRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());

static ADDRESS_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),?\s*\bAddress\b").unwrap());

/// Run every pattern pass and return one candidate per schema field.
///
/// Fields nothing matched hold `""` (scalars) or `[]` (lists).
pub fn extract_candidates(text: &str) -> CandidateSet {
    let mut set = CandidateSet::new(CandidateSource::Pattern);
    for field in Field::ALL {
        let empty = if field.is_list() {
            FieldValue::List(Vec::new())
        } else {
            FieldValue::text("")
        };
        set.insert(field, empty);
    }

    if let Some(id) = find_tender_id(text) {
        set.insert(Field::TenderId, FieldValue::Text(id));
    }
    if let Some(date) = find_publication_date(text) {
        set.insert(Field::PublicationDate, FieldValue::Text(date));
    }

    for (field, re) in SCALAR_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let value = clean_capture(*field, &caps[1]);
            if !value.is_empty() {
                set.insert(*field, FieldValue::Text(value));
            }
        }
    }

    apply_header_heuristics(&mut set, head_slice(text, HEADER_SCAN_CHARS));

    for (field, keyword) in MONEY_KEYWORDS.iter() {
        if !sanitize_amount(set.text(*field)).is_empty() {
            continue;
        }
        if let Some(amount) = amount_near_keyword(text, keyword, AMOUNT_WINDOW_CHARS) {
            debug!(field = %field, amount = %amount, "amount found near keyword");
            set.insert(*field, FieldValue::Text(amount));
        }
    }

    set.insert(Field::ContactEmails, FieldValue::List(find_all(&EMAIL, text)));
    set.insert(Field::ContactPhones, FieldValue::List(find_all(&PHONE, text)));

    debug!(
        filled = set.values.values().filter(|v| !v.is_empty_value()).count(),
        "pattern pass complete"
    );
    set
}

/// Label-anchored identifier first, then the first `LETTERS-DIGITS` shape.
pub fn find_tender_id(text: &str) -> Option<String> {
    for re in TENDER_ID_LABELS.iter() {
        for caps in re.captures_iter(text) {
            let candidate = trim_identifier(&caps[1]);
            if candidate.chars().count() >= 3
                && candidate.chars().any(|c| c.is_ascii_digit())
                && !candidate.eq_ignore_ascii_case("N/A")
            {
                return Some(candidate.to_string());
            }
        }
    }
    TENDER_ID_SHAPE.find(text).map(|m| m.as_str().to_string())
}

fn trim_identifier(raw: &str) -> &str {
    let mut s = raw.trim_end_matches(['.', ',', ';', ':', '-']);
    if s.ends_with(')') && !s.contains('(') {
        s = s.trim_end_matches(')');
    }
    if s.starts_with('(') && !s.contains(')') {
        s = s.trim_start_matches('(');
    }
    s
}

/// Labelled date, else the first bare numeric date, else the first textual date.
pub fn find_publication_date(text: &str) -> Option<String> {
    PUBLICATION_DATE
        .iter()
        .find_map(|re| re.captures(text).map(|c| c[1].trim().to_string()))
}

fn clean_capture(field: Field, raw: &str) -> String {
    let joined = LINE_WRAP.replace_all(raw.trim(), " ");
    let mut value = joined.trim().trim_end_matches([',', ';']).trim().to_string();
    if field == Field::IssuingAuthority {
        if let Some(first) = ADDRESS_SPLIT.split(&value).next() {
            value = first.trim().to_string();
        }
    }
    value
}

fn apply_header_heuristics(set: &mut CandidateSet, head: &str) {
    if !set.has(Field::Title) {
        if let Some(title) = title_from_head(head) {
            set.insert(Field::Title, FieldValue::Text(title));
        }
    }
    if !set.has(Field::IssuingAuthority) {
        if let Some(authority) = authority_from_head(head) {
            set.insert(Field::IssuingAuthority, FieldValue::Text(authority));
        }
    }
    if !set.has(Field::Location) {
        if let Some(location) = location_from_text(head) {
            set.insert(Field::Location, FieldValue::Text(location));
        }
    }
}

/// Search a window after the first keyword hit for an amount.
pub fn amount_near_keyword(text: &str, keyword: &Regex, window: usize) -> Option<String> {
    let m = keyword.find(text)?;
    find_amount(window_after(text, m.start(), window))
}

fn find_all(re: &Regex, text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        let s = m.as_str().trim();
        if !s.is_empty() && !out.iter().any(|o| o == s) {
            out.push(s.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(set: &CandidateSet, field: Field) -> String {
        set.text(field).to_string()
    }

    #[test]
    fn test_every_field_present() {
        let set = extract_candidates("");
        assert_eq!(set.values.len(), 26);
        assert!(set.is_empty());
        assert_eq!(set.get(Field::ContactEmails), Some(&FieldValue::List(vec![])));
    }

    #[test]
    fn test_tender_ref_label() {
        let set = extract_candidates("Notice\nTender Ref: ABC/2024/001\nOther text");
        assert_eq!(text_of(&set, Field::TenderId), "ABC/2024/001");
    }

    #[test]
    fn test_tender_id_label_variants() {
        assert_eq!(
            find_tender_id("NIT No. PWD/EE/12/2025-26, dated").as_deref(),
            Some("PWD/EE/12/2025-26")
        );
        assert_eq!(
            find_tender_id("Tender Reference Number: 2025_RVNL_98765_1").as_deref(),
            Some("2025_RVNL_98765_1")
        );
        assert_eq!(
            find_tender_id("Tender Ref. No.: (GEM/2025/B/123)").as_deref(),
            Some("(GEM/2025/B/123)")
        );
        // Label without a digit-bearing code falls through to the shape scan.
        assert_eq!(
            find_tender_id("Tender Notice for works. Ref KMC-4411 applies").as_deref(),
            Some("KMC-4411")
        );
        assert_eq!(find_tender_id("no identifiers at all"), None);
    }

    #[test]
    fn test_labelled_publication_date_beats_bare_date() {
        let text = "Submission by 15-03-2025.\nPublication Date: 01/02/2025";
        assert_eq!(find_publication_date(text).as_deref(), Some("01/02/2025"));
        assert_eq!(
            find_publication_date("Issued 7th March 2025 in Delhi").as_deref(),
            Some("7th March 2025")
        );
    }

    #[test]
    fn test_minimal_document() {
        let text = "Tender Ref: TEND-2026-001\n\
                    Title: Construction of Highway\n\
                    Publication Date: 20-01-2026\n\
                    EMD: Rs. 50,000";
        let set = extract_candidates(text);
        assert_eq!(text_of(&set, Field::TenderId), "TEND-2026-001");
        assert_eq!(text_of(&set, Field::Title), "Construction of Highway");
        assert_eq!(text_of(&set, Field::PublicationDate), "20-01-2026");
        assert_eq!(text_of(&set, Field::Emd), "Rs. 50,000");
        assert_eq!(text_of(&set, Field::Location), "");
        assert_eq!(text_of(&set, Field::IssuingAuthority), "");
        assert_eq!(set.get(Field::ContactPhones), Some(&FieldValue::List(vec![])));
    }

    #[test]
    fn test_title_wraps_one_lowercase_line() {
        let text = "Name of Work: Construction of storm water drain\nand culverts in Ward 12\nLocation: Pune";
        let set = extract_candidates(text);
        assert_eq!(
            text_of(&set, Field::Title),
            "Construction of storm water drain and culverts in Ward 12"
        );
        assert_eq!(text_of(&set, Field::Location), "Pune");
    }

    #[test]
    fn test_dates_and_time() {
        let text = "Last Date of Submission: 12.03.2025\nBid Opening Date: 14 March 2025\nOpening Time: 3.30 PM";
        let set = extract_candidates(text);
        assert_eq!(text_of(&set, Field::SubmissionDeadline), "12.03.2025");
        assert_eq!(text_of(&set, Field::BidOpeningDate), "14 March 2025");
        assert_eq!(text_of(&set, Field::BidOpeningTime), "3.30 PM");
    }

    #[test]
    fn test_amount_near_keyword_fallback() {
        let text = "EMD: to be paid through demand draft in favour of the Registrar.\n\
                    The amount shall be Rs. 25,000 (Rupees Twenty Five Thousand).";
        let set = extract_candidates(text);
        assert_eq!(text_of(&set, Field::Emd), "Rs. 25,000");
    }

    #[test]
    fn test_header_heuristics_fill_missing_fields() {
        let text = "Ministry of Electronics\nElectronics Niketan, New Delhi 110003\n\
                    REQUEST FOR PROPOSAL\nfor\nDevelopment of Citizen Services Portal\nPage 1 of 40\n";
        let set = extract_candidates(text);
        assert_eq!(text_of(&set, Field::Title), "Development of Citizen Services Portal");
        assert_eq!(text_of(&set, Field::IssuingAuthority), "Ministry of Electronics");
        assert_eq!(
            text_of(&set, Field::Location),
            "Electronics Niketan, New Delhi 110003"
        );
    }

    #[test]
    fn test_issuing_authority_drops_address() {
        let text = "Issued By: Municipal Corporation, Address: Civic Centre";
        let set = extract_candidates(text);
        assert_eq!(text_of(&set, Field::IssuingAuthority), "Municipal Corporation");
    }

    #[test]
    fn test_contacts_collected_in_order() {
        let text = "Contact: a@x.gov.in, b@y.in\nPhone: 9876543210\nAlt: a@x.gov.in, +91 98765 43211";
        let set = extract_candidates(text);
        assert_eq!(
            set.get(Field::ContactEmails),
            Some(&FieldValue::List(vec!["a@x.gov.in".into(), "b@y.in".into()]))
        );
        match set.get(Field::ContactPhones) {
            Some(FieldValue::List(phones)) => {
                assert_eq!(phones[0], "9876543210");
                assert_eq!(phones.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
