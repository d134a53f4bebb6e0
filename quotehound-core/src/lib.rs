//! quotehound core - domain model for quote harvesting
//!
//! This crate provides the pieces every other layer shares:
//! - Pipeline data types (candidate URLs, fetch results, raw and clean quotes, metrics)
//! - Search query builder biased toward quote aggregators
//! - Text normalizer and single-pass deduper
//! - Tabular record output (CSV / JSONL)

pub mod normalize;
pub mod query;
pub mod quote;
pub mod record;

pub use normalize::*;
pub use query::*;
pub use quote::*;
pub use record::*;

/// Minimum length (chars) of a normalized quote kept by dedup
pub const MIN_QUOTE_CHARS: usize = 10;

/// Minimum length (chars) of a generic extraction candidate
pub const MIN_CANDIDATE_CHARS: usize = 12;

/// Maximum length (chars) of a generic extraction candidate
pub const MAX_CANDIDATE_CHARS: usize = 350;
