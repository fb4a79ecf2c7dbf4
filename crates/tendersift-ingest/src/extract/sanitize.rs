//! Field sanitizers and validators.
//!
//! Every function here fails soft: a value that cannot be normalized comes
//! back as an empty string (or `false`), never as an error.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use tendersift_core::{Field, FieldKind};

/// Instructional boilerplate that must never be mistaken for a money figure.
pub const BANNED_PHRASES: &[&str] = &[
    "msme",
    "mse procurement",
    "public procurement",
    "make in india",
    "gem",
    "physical form",
    "drawn in favour",
    "bank",
    "ifsc",
    "dd/",
    "bg",
    "cheque",
    "demand draft",
    "annexure",
    "refundable",
    "to be notified later",
    "of receiving queries",
    "form of dd",
    "form of bg",
    "submitted along with",
    "covering letter",
];

/// Phrases that name procurement policy rather than an organization.
const NON_ORGANIZATION_PHRASES: &[&str] = &[
    "public procurement",
    "msme",
    "mse procurement",
    "make in india",
    "gem",
];

/// Longest accepted value for short (non-narrative) fields.
pub const MAX_SHORT_VALUE_CHARS: usize = 120;
/// Longest accepted value for narrative fields.
pub const MAX_NARRATIVE_CHARS: usize = 2000;
/// Cap applied to the free-text money fallback.
const MONEY_FALLBACK_CHARS: usize = 60;
/// Durations longer than this are reduced to their "N unit" core.
const MAX_DURATION_CHARS: usize = 40;

/// Phone prefixes for helplines and IVR numbers.
const HELPLINE_PREFIXES: &[&str] = &["0", "1800", "1860"];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[./-](\d{1,2})[./-](\d{2,4})\b").unwrap());

static TEXTUAL_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s*([A-Za-z]{3,9})\.?,?\s+(\d{4})\b").unwrap()
});

static PERCENTAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?:\.\d{1,2})?)\s*%").unwrap());

static CURRENCY_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(₹|\brs\.?|\brupees|\binr)\s*([0-9][\d,.]*)\s*(?:(lacks?|lakhs?|lacs?|crores?)\b)?",
    )
    .unwrap()
});

static BANNED: Lazy<Regex> = Lazy::new(|| phrase_regex(BANNED_PHRASES));

static NON_ORGANIZATION: Lazy<Regex> = Lazy::new(|| phrase_regex(NON_ORGANIZATION_PHRASES));

static BULLETS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-–—•·*_.|\s]+$").unwrap());

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[:.](\d{2})(?:\s*([ap])\.?\s*m\b\.?)?").unwrap()
});

static DURATION_CORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+\s*(?:days?|weeks?|months?|years?))\b").unwrap()
});

static EMAIL_STRICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

static EMAIL_LABEL_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:cell|ph|tel|phone|mobile|mob|fax)\b.*$").unwrap());

static EMAIL_GLUED_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}?)(?:cell|phone|ph|tel|mobile|mob|fax)(?:\b|[:\d])",
    )
    .unwrap()
});

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").unwrap());

/// Case-insensitive alternation of phrases, anchored on word boundaries
/// where the phrase starts or ends with a word character.
fn phrase_regex(phrases: &[&str]) -> Regex {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|p| {
            let mut alt = String::new();
            if p.chars().next().is_some_and(|c| c.is_alphanumeric()) {
                alt.push_str(r"\b");
            }
            alt.push_str(&regex::escape(p));
            if p.chars().last().is_some_and(|c| c.is_alphanumeric()) {
                alt.push_str(r"\b");
            }
            alt
        })
        .collect();
    Regex::new(&format!("(?i)(?:{})", alternatives.join("|"))).unwrap()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Like [`truncate_chars`], but never splits a word: a cut landing inside a
/// word backs up to the preceding whitespace.
fn truncate_at_word(s: &str, max: usize) -> &str {
    let cut = truncate_chars(s, max);
    if cut.len() == s.len() {
        return cut;
    }
    let splits_word = cut.chars().next_back().is_some_and(char::is_alphanumeric)
        && s[cut.len()..].chars().next().is_some_and(char::is_alphanumeric);
    if !splits_word {
        return cut;
    }
    match cut.rfind(char::is_whitespace) {
        Some(idx) => &cut[..idx],
        None => cut,
    }
}

/// Whether `s` contains any banned boilerplate phrase.
pub fn contains_banned_phrase(s: &str) -> bool {
    BANNED.is_match(&collapse_whitespace(s))
}

fn month_number(word: &str) -> Option<u32> {
    let w = word.to_lowercase();
    if w == "sept" {
        return Some(9);
    }
    if w.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(w.as_str()))
        .map(|i| i as u32 + 1)
}

fn format_date(day: u32, month: u32, year: i32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%d-%m-%Y").to_string())
}

fn normalize_year(raw: &str) -> Option<i32> {
    let y: i32 = raw.parse().ok()?;
    match raw.len() {
        1 | 2 => Some(2000 + y),
        4 => Some(y),
        _ => None,
    }
}

/// Normalize a date to `DD-MM-YYYY`.
///
/// Accepts numeric `D[./-]M[./-]Y` (two-digit years are 20YY) and textual
/// `D Month Y`. The first calendar-valid occurrence wins; anything else
/// yields an empty string.
pub fn sanitize_date(raw: &str) -> String {
    let s = collapse_whitespace(raw);
    if s.is_empty() {
        return String::new();
    }

    for caps in NUMERIC_DATE.captures_iter(&s) {
        let (Ok(day), Ok(month)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        let Some(year) = normalize_year(&caps[3]) else {
            continue;
        };
        if let Some(date) = format_date(day, month, year) {
            return date;
        }
    }

    for caps in TEXTUAL_DATE.captures_iter(&s) {
        let Ok(day) = caps[1].parse::<u32>() else {
            continue;
        };
        let Some(month) = month_number(&caps[2]) else {
            continue;
        };
        let Ok(year) = caps[3].parse::<i32>() else {
            continue;
        };
        if let Some(date) = format_date(day, month, year) {
            return date;
        }
    }

    String::new()
}

/// Normalize a monetary value.
///
/// Any banned phrase anywhere in the input rejects it outright. Otherwise a
/// percentage wins, then a currency amount (`₹ N` or `Rs. N`, optional
/// Lakh/Crore unit), then the first sentence of a digit-bearing string capped
/// at 60 characters.
pub fn sanitize_amount(raw: &str) -> String {
    let s = collapse_whitespace(raw);
    if s.is_empty() || BANNED.is_match(&s) {
        return String::new();
    }

    if let Some(caps) = PERCENTAGE.captures(&s) {
        return format!("{}%", &caps[1]);
    }

    if let Some(caps) = CURRENCY_AMOUNT.captures(&s) {
        let marker = if &caps[1] == "₹" { "₹" } else { "Rs." };
        let number = caps[2].trim_end_matches(['.', ',']);
        if !number.is_empty() {
            return match caps.get(3) {
                Some(unit) => format!("{} {} {}", marker, number, capitalize(unit.as_str())),
                None => format!("{} {}", marker, number),
            };
        }
    }

    if s.chars().any(|c| c.is_ascii_digit()) {
        let first = s.split(['.', ';']).next().unwrap_or("");
        let capped = truncate_at_word(first, MONEY_FALLBACK_CHARS).trim();
        if capped.chars().any(|c| c.is_ascii_digit()) && !BANNED.is_match(capped) {
            return capped.to_string();
        }
    }

    String::new()
}

/// First currency amount, else first percentage, inside `snippet`.
pub fn find_amount(snippet: &str) -> Option<String> {
    if let Some(m) = CURRENCY_AMOUNT.find(snippet) {
        let value = sanitize_amount(m.as_str());
        if !value.is_empty() {
            return Some(value);
        }
    }
    PERCENTAGE.captures(snippet).map(|c| format!("{}%", &c[1]))
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Normalize a clock time to `HH:MM AM|PM`, or 24-hour `HH:MM` when no
/// meridiem is given.
pub fn sanitize_time(raw: &str) -> String {
    let s = collapse_whitespace(raw);
    for caps in CLOCK_TIME.captures_iter(&s) {
        let (Ok(hour), Ok(minute)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        if minute > 59 {
            continue;
        }
        match caps.get(3) {
            Some(m) => {
                if !(1..=12).contains(&hour) {
                    continue;
                }
                let meridiem = if m.as_str().eq_ignore_ascii_case("a") { "AM" } else { "PM" };
                return format!("{:02}:{:02} {}", hour, minute, meridiem);
            }
            None => {
                if hour > 23 {
                    continue;
                }
                return format!("{:02}:{:02}", hour, minute);
            }
        }
    }
    String::new()
}

/// Keep short durations as written; reduce long ones to `N days|weeks|months|years`.
pub fn sanitize_duration(raw: &str) -> String {
    let s = collapse_whitespace(raw);
    if s.chars().count() <= MAX_DURATION_CHARS {
        return s;
    }
    DURATION_CORE
        .captures(&s)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

/// Apply the sanitizer matching a field's kind. Plain text is trimmed only.
pub fn sanitize_for_field(field: Field, raw: &str) -> String {
    match field.kind() {
        FieldKind::Date => sanitize_date(raw),
        FieldKind::Money => sanitize_amount(raw),
        FieldKind::Time => sanitize_time(raw),
        FieldKind::Duration => sanitize_duration(raw),
        FieldKind::Narrative => raw.trim().to_string(),
        _ => collapse_whitespace(raw),
    }
}

/// Whether a sanitized scalar is acceptable for `field`.
pub fn is_valid_field_value(field: Field, value: &str) -> bool {
    let s = value.trim();
    if tendersift_core::is_blank(s) {
        return false;
    }

    let kind = field.kind();
    if kind == FieldKind::Narrative {
        return s.chars().count() <= MAX_NARRATIVE_CHARS;
    }
    if s.chars().count() > MAX_SHORT_VALUE_CHARS || s.matches('\n').count() > 1 {
        return false;
    }

    let has_digit = s.chars().any(|c| c.is_ascii_digit());
    match kind {
        FieldKind::Identifier => has_digit,
        FieldKind::Money => has_digit && !BANNED.is_match(s),
        FieldKind::Organization => {
            s.chars().any(|c| c.is_alphabetic())
                && !BULLETS_ONLY.is_match(s)
                && !NON_ORGANIZATION.is_match(s)
        }
        FieldKind::Date => is_canonical_date(s),
        FieldKind::Time => sanitize_time(s) == s,
        _ => true,
    }
}

/// Whether `s` is already in `DD-MM-YYYY` form and names a real day.
pub fn is_canonical_date(s: &str) -> bool {
    s.len() == 10 && sanitize_date(s) == s
}

/// Whether `s` is already a canonical money value.
pub fn is_canonical_amount(s: &str) -> bool {
    !s.is_empty() && sanitize_amount(s) == s
}

/// Strip label text glued onto addresses, keep strict matches, de-duplicate.
pub fn cleanup_emails<S: AsRef<str>>(emails: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in emails {
        let mut e = raw.as_ref().trim().to_string();
        e = EMAIL_LABEL_TAIL.replace(&e, "").trim().to_string();
        if let Some(caps) = EMAIL_GLUED_LABEL.captures(&e) {
            e = caps[1].to_string();
        }
        let e = e.trim_end_matches(['.', ',', ';', ':']).to_string();
        if EMAIL_STRICT.is_match(&e) && !out.contains(&e) {
            out.push(e);
        }
    }
    out
}

/// Reduce phone numbers to national digits, drop helplines, de-duplicate.
pub fn cleanup_phones<S: AsRef<str>>(phones: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in phones {
        let mut digits = NON_DIGITS.replace_all(raw.as_ref(), "").to_string();
        if digits.len() == 12 && digits.starts_with("91") {
            digits = digits[2..].to_string();
        }
        if (digits.len() == 11 || digits.len() == 12) && digits.starts_with('0') {
            digits.remove(0);
        }
        if HELPLINE_PREFIXES.iter().any(|p| digits.starts_with(p)) {
            continue;
        }
        if (8..=10).contains(&digits.len()) && !out.contains(&digits) {
            out.push(digits);
        }
    }
    out
}
