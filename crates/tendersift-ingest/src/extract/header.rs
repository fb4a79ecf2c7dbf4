//! Masthead heuristics over the first few thousand characters.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::sanitize::sanitize_date;
use crate::document::head_slice;

static HEADER_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Name\s*of\s*(?:the\s*)?Work|Project\s*Title|Title)\s*[:\-][ \t]*([^\n]+)").unwrap()
});

static HEADER_AUTHORITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:Issued\s*By|Issuing\s*Authority|Organi[sz]ation|Department|Office)\s*[:\-][ \t]*([^\n]+)",
    )
    .unwrap()
});

static HEADER_PUBLICATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:Bid\s*Calling|Publication\s*Date|Date\s*of\s*Issue)\s*[:\-]?\s*(\d{1,2}[./-]\d{1,2}[./-]\d{2,4})",
    )
    .unwrap()
});

static HEADER_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+(?:,?[ \t]+[A-Z][a-z]+)*,[ \t]*India)\b").unwrap());

static ADDRESS_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\n|,?\s*Address").unwrap());

static REQUEST_FOR_PROPOSAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Request\s*for\s*Proposal").unwrap());

static RFP_FOR_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Request\s*for\s*Proposal.*?\bfor\s+([^\n]+)").unwrap());

static PAGE_OR_CONTENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:Page|Contents)\b").unwrap());

static ORGANIZATION_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:Bureau|Department|Ministry|Authority|Directorate|Council|Corporation|Board|Commission)\b",
    )
    .unwrap()
});

static PIN_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{6}\b").unwrap());

/// Disambiguating context passed alongside every generative call.
pub type GlobalHeader = BTreeMap<String, String>;

/// Title, issuing authority, publication date and location guesses from
/// the first `max_chars` characters.
pub fn build_global_header(text: &str, max_chars: usize) -> GlobalHeader {
    let head = head_slice(text, max_chars);
    let mut out = GlobalHeader::new();

    if let Some(c) = HEADER_TITLE.captures(head) {
        out.insert("title".into(), c[1].trim().to_string());
    }
    if let Some(c) = HEADER_AUTHORITY.captures(head) {
        let value = c[1].trim();
        let first = ADDRESS_SPLIT.split(value).next().unwrap_or(value).trim();
        if !first.is_empty() {
            out.insert("issuing_authority".into(), first.to_string());
        }
    }
    if let Some(c) = HEADER_PUBLICATION.captures(head) {
        let date = sanitize_date(&c[1]);
        if !date.is_empty() {
            out.insert("publication_date".into(), date);
        }
    }
    if let Some(c) = HEADER_LOCATION.captures(head) {
        out.insert("location".into(), c[1].trim().to_string());
    }
    out
}

fn non_empty_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Title following a "Request for Proposal" masthead.
pub fn title_from_head(head: &str) -> Option<String> {
    let lines = non_empty_lines(head);
    for (i, line) in lines.iter().take(20).enumerate() {
        if !REQUEST_FOR_PROPOSAL.is_match(line) {
            continue;
        }
        let mut collected: Vec<&str> = Vec::new();
        for next in lines.iter().skip(i + 1).take(5) {
            if PAGE_OR_CONTENTS.is_match(next) {
                break;
            }
            if next.eq_ignore_ascii_case("for") || next.eq_ignore_ascii_case("to") {
                continue;
            }
            collected.push(*next);
        }
        let title = collected.join(" ");
        let title = title.trim().trim_matches(|c| c == '"' || c == '\'');
        if title.chars().count() >= 10 {
            return Some(title.to_string());
        }
    }

    RFP_FOR_CLAUSE.captures(head).and_then(|c| {
        let line = c[1].trim().trim_matches(|c| c == '"' || c == '\'');
        (line.chars().count() >= 10).then(|| line.to_string())
    })
}

/// First early line naming a department, ministry, board or similar body.
pub fn authority_from_head(head: &str) -> Option<String> {
    non_empty_lines(head)
        .into_iter()
        .take(15)
        .find(|l| ORGANIZATION_WORD.is_match(l) && l.chars().count() <= 120)
        .map(str::to_string)
}

/// First line carrying a six-digit PIN code.
pub fn location_from_text(text: &str) -> Option<String> {
    text.lines()
        .filter(|l| PIN_CODE.is_match(l))
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|l| (8..=120).contains(&l.chars().count()))
}
