//! Vector quantization: scalar (f32 → u8), product (ADC codebooks) and binary (sign bits).
//!
//! Every strategy implements [`Quantizer`]. The index stores one of them as an
//! [`AnyQuantizer`], which is what gets persisted. Quantizers are immutable once
//! trained; retraining builds a new instance and the caller re-encodes every
//! stored vector against it.

/// Sign-bit binary quantization with popcount distance.
pub mod binary;
/// Product quantization with k-means codebooks and ADC lookup tables.
pub mod pq;
/// Per-dimension affine scalar quantization.
pub mod scalar;

pub use binary::BinaryQuantizer;
pub use pq::{PqDistanceTable, ProductQuantizer};
pub use scalar::ScalarQuantizer;

use crate::config;
use crate::error::{IndexError, Result};
use crate::hnsw::distance::{self, DistanceMetric};
use serde::{Deserialize, Serialize};

/// Which compression strategy an index uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuantKind {
    /// 4x compression. `range` fixes `[min, max]` for every dimension;
    /// without it the range is calibrated from the training sample.
    Scalar {
        #[serde(default)]
        range: Option<(f32, f32)>,
    },
    /// `subspaces` bytes per vector. Must divide the dimensionality.
    Product { subspaces: usize },
    /// One bit per dimension. Not suitable when high recall is required.
    Binary,
}

fn default_rerank() -> bool {
    true
}

fn default_centroids() -> usize {
    config::PQ_NUM_CENTROIDS
}

fn default_iterations() -> usize {
    config::PQ_KMEANS_ITERATIONS
}

/// Quantization settings of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantConfig {
    pub kind: QuantKind,
    /// Re-score graph candidates with exact float distance before truncating to `k`.
    #[serde(default = "default_rerank")]
    pub rerank: bool,
    /// Train automatically once this many vectors are stored.
    #[serde(default)]
    pub train_after: Option<usize>,
    /// Centroids per PQ subspace (at most 256).
    #[serde(default = "default_centroids")]
    pub centroids: usize,
    /// Lloyd iterations per PQ subspace.
    #[serde(default = "default_iterations")]
    pub kmeans_iterations: usize,
    /// Seed for k-means initialization. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl QuantConfig {
    pub fn new(kind: QuantKind) -> Self {
        Self {
            kind,
            rerank: true,
            train_after: None,
            centroids: config::PQ_NUM_CENTROIDS,
            kmeans_iterations: config::PQ_KMEANS_ITERATIONS,
            seed: None,
        }
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn train_after(mut self, count: usize) -> Self {
        self.train_after = Some(count);
        self
    }

    pub fn with_centroids(mut self, centroids: usize) -> Self {
        self.centroids = centroids;
        self
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self, dimensions: usize) -> Result<()> {
        match self.kind {
            QuantKind::Scalar { range: Some((lo, hi)) } => {
                if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                    return Err(IndexError::InvalidConfig(format!(
                        "scalar range must be finite with min < max, got [{}, {}]",
                        lo, hi
                    )));
                }
            }
            QuantKind::Scalar { range: None } | QuantKind::Binary => {}
            QuantKind::Product { subspaces } => {
                if subspaces == 0 || subspaces > dimensions || dimensions % subspaces != 0 {
                    return Err(IndexError::InvalidConfig(format!(
                        "pq subspaces ({}) must divide dimensions ({})",
                        subspaces, dimensions
                    )));
                }
                if self.centroids == 0 || self.centroids > config::PQ_NUM_CENTROIDS {
                    return Err(IndexError::InvalidConfig(format!(
                        "pq centroids must be in 1..={}, got {}",
                        config::PQ_NUM_CENTROIDS,
                        self.centroids
                    )));
                }
                if self.kmeans_iterations == 0 {
                    return Err(IndexError::InvalidConfig(
                        "kmeans_iterations must be > 0".into(),
                    ));
                }
            }
        }
        if self.train_after == Some(0) {
            return Err(IndexError::InvalidConfig("train_after must be > 0".into()));
        }
        Ok(())
    }
}

/// Per-query state that makes repeated [`QueryTable::distance`] calls cheap.
pub enum QueryTable<'a> {
    /// Float query scored against dequantized bytes.
    Scalar {
        query: Vec<f32>,
        quantizer: &'a ScalarQuantizer,
    },
    /// `S x K` partial-distance table.
    Product(PqDistanceTable),
    /// Packed sign bits of the query.
    Binary { bits: Vec<u8> },
}

impl QueryTable<'_> {
    /// Approximate lower-is-better distance to a stored code.
    #[inline]
    pub fn distance(&self, code: &[u8]) -> f32 {
        match self {
            QueryTable::Scalar { query, quantizer } => quantizer.asymmetric_distance(query, code),
            QueryTable::Product(table) => table.distance(code),
            QueryTable::Binary { bits } => distance::hamming_bytes(bits, code) as f32,
        }
    }
}

/// Common interface over the compression strategies.
pub trait Quantizer {
    /// Dimensionality of the float vectors this quantizer accepts.
    fn dimensions(&self) -> usize;
    /// Bytes per encoded vector.
    fn code_size(&self) -> usize;
    fn is_trained(&self) -> bool;
    /// `false` when the recall floor cannot be met even with reranking.
    fn high_recall_suitable(&self) -> bool {
        true
    }
    fn encode(&self, vector: &[f32]) -> Result<Vec<u8>>;
    /// Lossy reconstruction.
    fn decode(&self, code: &[u8]) -> Result<Vec<f32>>;
    /// Precompute per-query state for scoring many codes.
    fn prepare(&self, query: &[f32]) -> Result<QueryTable<'_>>;

    /// One-shot asymmetric distance. Prefer [`Quantizer::prepare`] in loops.
    fn distance(&self, query: &[f32], code: &[u8]) -> Result<f32> {
        Ok(self.prepare(query)?.distance(code))
    }
}

/// Length check shared by the strategies.
pub(crate) fn check_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_code(expected: usize, code: &[u8]) -> Result<()> {
    if code.len() != expected {
        return Err(IndexError::InvalidParameter(format!(
            "code length {} != code size {}",
            code.len(),
            expected
        )));
    }
    Ok(())
}

/// The quantizer stored by an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnyQuantizer {
    Scalar(ScalarQuantizer),
    Product(ProductQuantizer),
    Binary(BinaryQuantizer),
}

impl AnyQuantizer {
    /// Builds the quantizer described by `config` without training it.
    /// Strategies that need no sample (fixed-range scalar, binary) come back ready.
    pub fn untrained(config: &QuantConfig, dimensions: usize, metric: DistanceMetric) -> Self {
        match config.kind {
            QuantKind::Scalar { range: Some((lo, hi)) } => {
                AnyQuantizer::Scalar(ScalarQuantizer::with_range(dimensions, metric, lo, hi))
            }
            QuantKind::Scalar { range: None } => {
                AnyQuantizer::Scalar(ScalarQuantizer::uncalibrated(dimensions, metric))
            }
            QuantKind::Product { subspaces } => AnyQuantizer::Product(ProductQuantizer::new(
                dimensions,
                subspaces,
                config.centroids,
                metric,
            )),
            QuantKind::Binary => {
                tracing::warn!(
                    dimensions,
                    "binary quantizer selected; recall is not guaranteed even with rerank"
                );
                AnyQuantizer::Binary(BinaryQuantizer::new(dimensions))
            }
        }
    }

    /// Trains a fresh quantizer on `sample`, a contiguous arena of vectors.
    pub fn train(
        config: &QuantConfig,
        dimensions: usize,
        metric: DistanceMetric,
        sample: &[f32],
    ) -> Result<Self> {
        let n = sample.len() / dimensions.max(1);
        if n == 0 {
            tracing::warn!("quantizer training requested with an empty sample");
            return Err(IndexError::InvalidParameter(
                "cannot train a quantizer on an empty sample".into(),
            ));
        }
        match config.kind {
            QuantKind::Scalar { range: None } => Ok(AnyQuantizer::Scalar(
                ScalarQuantizer::calibrate(dimensions, metric, sample)?,
            )),
            QuantKind::Product { subspaces } => Ok(AnyQuantizer::Product(ProductQuantizer::train(
                sample,
                dimensions,
                subspaces,
                config.centroids,
                config.kmeans_iterations,
                metric,
                config.seed,
            )?)),
            _ => Ok(Self::untrained(config, dimensions, metric)),
        }
    }

    /// Checks a code arena holding `count` codes, as read back from disk.
    pub(crate) fn check_codes(&self, codes: &[u8], count: usize) -> Result<()> {
        if !self.is_trained() {
            if codes.is_empty() {
                return Ok(());
            }
            return Err(IndexError::CorruptIndex(
                "codes present for an untrained quantizer".into(),
            ));
        }
        if codes.len() != count * self.code_size() {
            return Err(IndexError::CorruptIndex(format!(
                "code arena holds {} bytes, expected {} codes of {}",
                codes.len(),
                count,
                self.code_size()
            )));
        }
        if let AnyQuantizer::Product(pq) = self {
            pq.check_code_range(codes)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnyQuantizer::Scalar(_) => "scalar",
            AnyQuantizer::Product(_) => "product",
            AnyQuantizer::Binary(_) => "binary",
        }
    }

    fn inner(&self) -> &dyn Quantizer {
        match self {
            AnyQuantizer::Scalar(q) => q,
            AnyQuantizer::Product(q) => q,
            AnyQuantizer::Binary(q) => q,
        }
    }
}

impl Quantizer for AnyQuantizer {
    fn dimensions(&self) -> usize {
        self.inner().dimensions()
    }

    fn code_size(&self) -> usize {
        self.inner().code_size()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }

    fn high_recall_suitable(&self) -> bool {
        self.inner().high_recall_suitable()
    }

    fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        self.inner().encode(vector)
    }

    fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        self.inner().decode(code)
    }

    fn prepare(&self, query: &[f32]) -> Result<QueryTable<'_>> {
        self.inner().prepare(query)
    }
}
