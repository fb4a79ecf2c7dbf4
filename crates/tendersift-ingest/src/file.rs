//! Document→Text boundary.

use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use regex::Regex;

use tendersift_core::{Error, Result};

/// Supported file types for text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Markdown,
    Csv,
    Docx,
    Pdf,
    LegacyDoc,
    Unknown,
}

impl FileType {
    /// Detect file type from extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Self::PlainText,
            "md" | "markdown" => Self::Markdown,
            "csv" | "tsv" => Self::Csv,
            "docx" => Self::Docx,
            "pdf" => Self::Pdf,
            "doc" => Self::LegacyDoc,
            _ => Self::Unknown,
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::from_extension(ext),
            _ => Self::Unknown,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::PlainText | Self::Markdown | Self::Csv)
    }
}

/// Turns raw document bytes into linear text.
///
/// Implementations own any OCR or layout recovery. Errors from this trait
/// are the only ones that fail a document outright.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], filename: &str) -> Result<String>;
}

/// Plain-text and DOCX extraction. PDF needs an injected extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTextExtractor;

impl TextExtractor for BasicTextExtractor {
    fn extract_text(&self, bytes: &[u8], filename: &str) -> Result<String> {
        match FileType::from_filename(filename) {
            FileType::Docx => extract_docx(bytes),
            FileType::Pdf | FileType::LegacyDoc => Err(Error::UnsupportedFormat(format!(
                "{}: no extractor configured for this format",
                filename
            ))),
            FileType::PlainText | FileType::Markdown | FileType::Csv | FileType::Unknown => {
                decode_text(bytes, filename)
            }
        }
    }
}

/// Share of control characters above which content is treated as binary.
const BINARY_THRESHOLD_DIVISOR: usize = 10;

fn decode_text(bytes: &[u8], filename: &str) -> Result<String> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    let content = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    };
    let total = content.chars().count();
    let suspicious = content
        .chars()
        .filter(|c| {
            *c == char::REPLACEMENT_CHARACTER
                || (c.is_control() && *c != '\n' && *c != '\r' && *c != '\t')
        })
        .count();
    if suspicious > total / BINARY_THRESHOLD_DIVISOR {
        return Err(Error::Decode(format!(
            "{}: content looks binary ({} of {} characters unreadable)",
            filename, suspicious, total
        )));
    }
    Ok(content)
}

static PARAGRAPH_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").unwrap());
static TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:tab\s*/>").unwrap());
static XML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Decode(format!("not a DOCX container: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::Decode(format!("DOCX without document body: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::Decode(format!("unreadable DOCX body: {}", e)))?;

    let text = PARAGRAPH_END.replace_all(&xml, "\n");
    let text = TAB.replace_all(&text, "\t");
    let text = XML_TAG.replace_all(&text, "");
    Ok(unescape_xml(&text))
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
