//! Configuration for vecdex.
//!
//! Tuning defaults and input validation limits are compile-time constants.
//! Per-index runtime settings live in [`IndexConfig`], which can be loaded
//! from and saved to JSON.

use crate::error::{IndexError, Result};
use crate::hnsw::distance::DistanceMetric;
use crate::hnsw::graph::HnswConfig;
use crate::quantization::QuantConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Smallest accepted `m`. Below this the level distribution degenerates.
pub const HNSW_MIN_M: usize = 2;

/// Number of centroids per PQ subspace. 256 lets each code fit one byte.
pub const PQ_NUM_CENTROIDS: usize = 256;

/// Lloyd iterations run per subspace during PQ training.
pub const PQ_KMEANS_ITERATIONS: usize = 15;

/// Recommended minimum training sample, as a multiple of the centroid count.
pub const PQ_MIN_TRAINING_FACTOR: usize = 10;

/// Initial over-fetch multiplier for post-filtered search (`k × factor`).
pub const POST_FILTER_OVERFETCH: usize = 2;

/// Search traversal checks its deadline once every this many expansions.
pub const DEADLINE_CHECK_INTERVAL: usize = 64;

/// Maximum allowed vector dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`k`) per search request.
pub const MAX_K: usize = 10_000;

/// Maximum number of entries per batch insert.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Maximum length of a vector id in bytes.
pub const MAX_ID_LEN: usize = 512;

/// Maximum number of metadata keys per vector.
pub const MAX_METADATA_KEYS: usize = 64;

/// Current snapshot format version written by `save`.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Runtime configuration of a single index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimensionality, fixed for the lifetime of the index.
    pub dimensions: usize,
    /// Distance metric used by the graph and the quantizer.
    pub metric: DistanceMetric,
    /// HNSW graph parameters.
    #[serde(default)]
    pub hnsw: HnswConfig,
    /// Optional compression layer.
    #[serde(default)]
    pub quantization: Option<QuantConfig>,
}

impl IndexConfig {
    /// Creates a configuration with default HNSW parameters and no quantization.
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            hnsw: HnswConfig::default(),
            quantization: None,
        }
    }

    /// Replaces the HNSW parameters.
    pub fn with_hnsw(mut self, hnsw: HnswConfig) -> Self {
        self.hnsw = hnsw;
        self
    }

    /// Enables quantization.
    pub fn with_quantization(mut self, quantization: QuantConfig) -> Self {
        self.quantization = Some(quantization);
        self
    }

    /// Checks the configuration for values the index cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 || self.dimensions > MAX_DIMENSION {
            return Err(IndexError::InvalidConfig(format!(
                "dimensions must be in 1..={}, got {}",
                MAX_DIMENSION, self.dimensions
            )));
        }
        self.hnsw.validate()?;
        if let Some(ref quant) = self.quantization {
            quant.validate(self.dimensions)?;
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: IndexConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::QuantKind;

    #[test]
    fn test_default_config_is_valid() {
        let config = IndexConfig::new(128, DistanceMetric::Cosine);
        assert!(config.validate().is_ok());
        assert_eq!(config.hnsw.m, HNSW_DEFAULT_M);
        assert_eq!(config.hnsw.m_max0, HNSW_DEFAULT_M * 2);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = IndexConfig::new(0, DistanceMetric::Euclidean);
        assert!(matches!(
            config.validate(),
            Err(IndexError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pq_subspaces_must_divide_dimensions() {
        let config = IndexConfig::new(30, DistanceMetric::Euclidean)
            .with_quantization(QuantConfig::new(QuantKind::Product { subspaces: 8 }));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let config = IndexConfig::new(64, DistanceMetric::DotProduct)
            .with_quantization(QuantConfig::new(QuantKind::Binary));
        config.to_json_file(&path).unwrap();
        let loaded = IndexConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.dimensions, 64);
        assert_eq!(loaded.metric, DistanceMetric::DotProduct);
        assert!(matches!(
            loaded.quantization.map(|q| q.kind),
            Some(QuantKind::Binary)
        ));
    }

    #[test]
    fn test_json_without_optional_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.json");
        std::fs::write(&path, r#"{"dimensions": 16, "metric": "Euclidean"}"#).unwrap();
        let loaded = IndexConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.hnsw.ef_construction, HNSW_DEFAULT_EF_CONSTRUCTION);
        assert!(loaded.quantization.is_none());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            IndexConfig::from_json_file(&path),
            Err(IndexError::InvalidConfig(_))
        ));
    }
}
