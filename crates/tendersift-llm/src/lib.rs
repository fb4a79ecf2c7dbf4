//! Generative extraction and bid evaluation over external LLM providers.
//!
//! The model is a black box: prompt in, JSON-ish text out. Every call is
//! budgeted and every failure degrades to an empty result.

pub mod backend;
pub mod config;
pub mod evaluator;
pub mod extractor;
pub mod json;
pub mod prompts;
pub mod types;

pub use backend::{CompletionBackend, FailingCompletion, HttpCompletion, StaticCompletion};
pub use config::LLMConfig;
pub use evaluator::{Evaluator, FailingEvaluator, LlmEvaluator, StaticEvaluator};
pub use extractor::{GenerativeExtractor, GenerativeOutcome};
pub use json::extract_json_object;
pub use types::*;
