//! Search request and result types.

use crate::config;
use crate::filter_types::FilterClause;
use crate::record::Metadata;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A vector matched by a query.
///
/// The `score` semantics depend on the index metric:
/// - **Cosine**: cosine similarity (higher = more similar)
/// - **DotProduct**: dot product (higher = more similar)
/// - **Euclidean**: L2 distance, not squared (lower = closer)
/// - **Manhattan**: L1 distance (lower = closer)
/// - **Hamming**: number of differing sign bits (lower = closer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    /// Present when [`SearchParams::include_metadata`] is set.
    pub metadata: Option<Metadata>,
}

/// Where the metadata filter is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    /// Search with over-fetch, then drop non-matching results.
    #[default]
    Post,
    /// Exact linear scan over matching vectors only.
    Pre,
    /// Evaluate the filter inside the layer-0 beam search.
    Traversal,
}

/// Parameters of a single query.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub k: usize,
    /// Beam width; `None` uses the index default. Clamped to at least `k`.
    pub ef_search: Option<usize>,
    pub filter: Option<FilterClause>,
    pub filter_mode: FilterMode,
    /// Traversal stops once this instant has passed.
    pub deadline: Option<Instant>,
    pub include_metadata: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k: 10,
            ef_search: None,
            filter: None,
            filter_mode: FilterMode::Post,
            deadline: None,
            include_metadata: false,
        }
    }
}

impl SearchParams {
    pub fn top_k(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_ef(mut self, ef_search: usize) -> Self {
        self.ef_search = Some(ef_search);
        self
    }

    pub fn with_filter(mut self, filter: FilterClause, mode: FilterMode) -> Self {
        self.filter = Some(filter);
        self.filter_mode = mode;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.include_metadata = true;
        self
    }

    /// Effective beam width: the explicit or default `ef`, never below `k`.
    pub fn effective_ef(&self, default_ef: usize) -> usize {
        self.ef_search.unwrap_or(default_ef).max(self.k)
    }

    pub(crate) fn validate(&self) -> crate::error::Result<()> {
        if self.k == 0 || self.k > config::MAX_K {
            return Err(crate::error::IndexError::InvalidParameter(format!(
                "k must be in 1..={}, got {}",
                config::MAX_K,
                self.k
            )));
        }
        if self.ef_search == Some(0) {
            return Err(crate::error::IndexError::InvalidParameter(
                "ef_search must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ef_clamped_to_k() {
        let params = SearchParams::top_k(100).with_ef(10);
        assert_eq!(params.effective_ef(50), 100);
        assert_eq!(SearchParams::top_k(5).effective_ef(50), 50);
    }

    #[test]
    fn test_k_bounds() {
        assert!(SearchParams::top_k(0).validate().is_err());
        assert!(SearchParams::top_k(config::MAX_K + 1).validate().is_err());
        assert!(SearchParams::top_k(10).validate().is_ok());
    }
}
