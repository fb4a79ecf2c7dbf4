//! TenderSift Ingest — document text, cleaning, chunking, pattern extraction.

pub mod chunking;
pub mod document;
pub mod extract;
pub mod file;

pub use chunking::{chunk_text, OverlapChunker, TextChunk};
pub use document::{clean_text, safe_stem, Document, DocumentText};
pub use extract::{build_global_header, extract_candidates, GlobalHeader};
pub use file::{BasicTextExtractor, FileType, TextExtractor};
