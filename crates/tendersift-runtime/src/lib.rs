//! TenderSift Runtime — reconciliation, finalization and the document pipeline.
//!
//! A run takes one document from raw bytes to a finished record: text
//! extraction, the pattern and generative passes, reconciliation, record-level
//! corrections and evaluation. The batch runner drives many runs with bounded
//! concurrency and cooperative cancellation.

pub mod batch;
pub mod finalize;
pub mod pipeline;
pub mod reconcile;
pub mod types;

pub use batch::{BatchProgress, BatchReport, BatchRunner, ProgressFn};
pub use finalize::{evaluate_fallback, failure_record, finalize, validate_record, FinalizeReport};
pub use pipeline::TenderPipeline;
pub use reconcile::{reconcile, Reconciliation};
pub use types::*;
