//! Documents and their cleaned text.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Raw bytes plus the name they arrived under.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// SHA-256 of the raw bytes, hex-encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }

    /// Filename without directories or extension, with path-hostile characters replaced.
    pub fn safe_stem(&self) -> String {
        safe_stem(&self.filename)
    }
}

/// See [`Document::safe_stem`].
pub fn safe_stem(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    let cleaned = UNSAFE_PATH_CHARS.replace_all(stem, "_");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Cleaned, immutable plain text of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    text: String,
}

impl DocumentText {
    /// Clean raw extracted text.
    pub fn from_raw(raw: &str) -> Self {
        Self {
            text: clean_text(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The first `max_chars` characters.
    pub fn head(&self, max_chars: usize) -> &str {
        head_slice(&self.text, max_chars)
    }

    /// Case-insensitive substring test.
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        let needle = needle.trim();
        !needle.is_empty() && self.text.to_lowercase().contains(&needle.to_lowercase())
    }
}

static FOOTER_LINES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^\s*\d+\s*\|\s*P\s*a\s*g\s*e.*$").unwrap(),
        Regex::new(r"(?i)^\s*Page\s+\d+\s*(?:of|/)\s*\d+\s*$").unwrap(),
    ]
});

static HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)-\n(\w)").unwrap());

static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

static URI_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)mailto:|file://").unwrap());

static UNSAFE_PATH_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:"*?<>|]+"#).unwrap());

/// Drop page-footer lines, join hyphenated line breaks, collapse runs of
/// spaces and tabs, and strip `mailto:` / `file://` prefixes.
pub fn clean_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let kept: Vec<&str> = normalized
        .lines()
        .filter(|line| !FOOTER_LINES.iter().any(|re| re.is_match(line)))
        .collect();
    let joined = kept.join("\n");
    let joined = HYPHEN_BREAK.replace_all(&joined, "$1$2");
    let spaced = HORIZONTAL_SPACE.replace_all(&joined, " ");
    URI_PREFIX.replace_all(&spaced, "").into_owned()
}

/// The first `max_chars` characters of `text`.
pub fn head_slice(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Up to `max_chars` characters starting at byte offset `start`.
pub fn window_after(text: &str, start: usize, max_chars: usize) -> &str {
    let mut start = start.min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    head_slice(&text[start..], max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let raw = "Tender\tNotice\n3 | Page\nConstruc-\ntion of road\nPage 4 of 10\nmailto:a@b.in  file://x";
        assert_eq!(clean_text(raw), "Tender Notice\nConstruction of road\na@b.in x");
    }

    #[test]
    fn test_head_slice_is_char_safe() {
        let text = "₹₹₹abc";
        assert_eq!(head_slice(text, 2), "₹₹");
        assert_eq!(head_slice(text, 100), text);
        assert_eq!(window_after(text, 1, 2), "₹₹");
    }

    #[test]
    fn test_document_text_contains() {
        let text = DocumentText::from_raw("Tender Ref: abc/2024/001");
        assert!(text.contains_ignore_case("ABC/2024/001"));
        assert!(!text.contains_ignore_case("XYZ"));
        assert!(!text.contains_ignore_case("  "));
    }

    #[test]
    fn test_safe_stem_and_hash() {
        let doc = Document::new("uploads/NIT: 12?.pdf", b"abc".to_vec());
        assert_eq!(doc.safe_stem(), "NIT_ 12_");
        assert_eq!(
            doc.content_hash(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(Document::new(".pdf", Vec::new()).safe_stem(), ".pdf");
    }
}
