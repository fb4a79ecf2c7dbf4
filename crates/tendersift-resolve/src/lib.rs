//! Context resolution — turn a document into bounded context windows for
//! the generative extractor.
//!
//! Direct mode hands over the head of the document. Retrieval mode indexes
//! the document's chunks and gathers the passages each field group asks for.

pub mod assembler;
pub mod groups;
pub mod retriever;

pub use assembler::{AssembledContext, ContextAssembler, ContextMode, ContextWindow};
pub use groups::FieldGroup;
pub use retriever::{FailingRetriever, MemoryIndex, RetrievalHit, Retriever, SqliteRetriever};
