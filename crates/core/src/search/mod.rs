//! Search primitives: request parameters, scored results and metadata filtering.

/// Metadata filter evaluation.
pub mod filter;
/// Search request and result types.
pub mod types;

pub use filter::matches_filter;
pub use types::{FilterMode, SearchParams, SearchResult};
