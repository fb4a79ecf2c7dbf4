//! TenderSift Core — error type, configuration, canonical tender schema.

pub mod categories;
pub mod config;
pub mod error;
pub mod schema;

pub use categories::CategoryTable;
pub use config::{PipelineConfig, RagSettings};
pub use error::{Error, Result};
pub use schema::{
    is_blank, CandidateSet, CandidateSource, CanonicalRecord, EvaluationResult, Field,
    FieldCandidate, FieldKind, FieldMap, FieldValue, Recommendation, NOT_AVAILABLE,
};
