//! Offline field extraction: sanitizers, label patterns, masthead heuristics.
//!
//! Everything here is pure CPU work over cleaned text and never fails; a
//! field that cannot be found comes back empty.

pub mod header;
pub mod patterns;
pub mod sanitize;

pub use header::{build_global_header, GlobalHeader};
pub use patterns::{extract_candidates, find_publication_date, find_tender_id};
pub use sanitize::{
    cleanup_emails, cleanup_phones, contains_banned_phrase, is_canonical_amount,
    is_canonical_date, is_valid_field_value, sanitize_amount, sanitize_date,
    sanitize_duration, sanitize_for_field, sanitize_time,
};
