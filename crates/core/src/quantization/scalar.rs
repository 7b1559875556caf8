//! Scalar quantization.
//!
//! Each dimension `d` is mapped linearly from `[min_d, max_d]` to `[0, 255]`.
//! The range is either fixed up front or calibrated from a training sample.
//! Distances are asymmetric: the f32 query is compared against stored bytes
//! dequantized on the fly, using SIMD-friendly f32 chunks with f64 accumulation
//! at chunk boundaries.

use crate::error::{IndexError, Result};
use crate::hnsw::distance::DistanceMetric;
use crate::quantization::{check_code, check_dimensions, QueryTable, Quantizer};
use serde::{Deserialize, Serialize};

/// 8 × f32 = 256 bit = one AVX register.
const CHUNK_F32: usize = 8;

/// Per-dimension affine u8 quantizer.
/// `scale[d]` is precomputed as `(max_d - min_d) / 255` to avoid division in hot paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarQuantizer {
    dimensions: usize,
    metric: DistanceMetric,
    min: Vec<f32>,
    scale: Vec<f32>,
    trained: bool,
}

impl ScalarQuantizer {
    /// Same fixed `[min, max]` range for every dimension. Ready immediately.
    pub fn with_range(dimensions: usize, metric: DistanceMetric, min: f32, max: f32) -> Self {
        let scale = if max > min { (max - min) / 255.0 } else { 0.0 };
        Self {
            dimensions,
            metric,
            min: vec![min; dimensions],
            scale: vec![scale; dimensions],
            trained: true,
        }
    }

    /// Placeholder awaiting [`ScalarQuantizer::calibrate`].
    pub fn uncalibrated(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            min: Vec::new(),
            scale: Vec::new(),
            trained: false,
        }
    }

    /// Per-dimension range from a contiguous sample arena.
    pub fn calibrate(dimensions: usize, metric: DistanceMetric, sample: &[f32]) -> Result<Self> {
        if dimensions == 0 || sample.is_empty() || sample.len() % dimensions != 0 {
            return Err(IndexError::InvalidParameter(format!(
                "calibration sample of {} floats is not a whole number of {}-d vectors",
                sample.len(),
                dimensions
            )));
        }
        let mut min = vec![f32::MAX; dimensions];
        let mut max = vec![f32::MIN; dimensions];
        for vector in sample.chunks_exact(dimensions) {
            for (d, &v) in vector.iter().enumerate() {
                min[d] = min[d].min(v);
                max[d] = max[d].max(v);
            }
        }
        let scale = min
            .iter()
            .zip(&max)
            .map(|(&lo, &hi)| {
                let range = hi - lo;
                if range < f32::EPSILON {
                    0.0
                } else {
                    range / 255.0
                }
            })
            .collect();
        tracing::debug!(
            dimensions,
            sample = sample.len() / dimensions,
            "scalar quantizer calibrated"
        );
        Ok(Self {
            dimensions,
            metric,
            min,
            scale,
            trained: true,
        })
    }

    #[inline]
    fn dequant(&self, d: usize, byte: u8) -> f32 {
        self.min[d] + byte as f32 * self.scale[d]
    }

    /// Lower-is-better distance between a float query and stored bytes.
    /// Both slices must have length `dimensions`.
    #[allow(clippy::needless_range_loop)]
    pub fn asymmetric_distance(&self, query: &[f32], code: &[u8]) -> f32 {
        debug_assert_eq!(query.len(), code.len());
        let len = query.len().min(code.len());
        match self.metric {
            DistanceMetric::Euclidean => {
                let mut sum = 0.0f64;
                let full_chunks = len / CHUNK_F32;
                for c in 0..full_chunks {
                    let base = c * CHUNK_F32;
                    let mut chunk_acc = 0.0f32;
                    for j in 0..CHUNK_F32 {
                        let diff = query[base + j] - self.dequant(base + j, code[base + j]);
                        chunk_acc += diff * diff;
                    }
                    sum += chunk_acc as f64;
                }
                for i in (full_chunks * CHUNK_F32)..len {
                    let diff = query[i] - self.dequant(i, code[i]);
                    sum += (diff * diff) as f64;
                }
                sum as f32
            }
            DistanceMetric::Cosine | DistanceMetric::DotProduct => {
                let mut sum = 0.0f64;
                let full_chunks = len / CHUNK_F32;
                for c in 0..full_chunks {
                    let base = c * CHUNK_F32;
                    let mut chunk_acc = 0.0f32;
                    for j in 0..CHUNK_F32 {
                        chunk_acc += query[base + j] * self.dequant(base + j, code[base + j]);
                    }
                    sum += chunk_acc as f64;
                }
                for i in (full_chunks * CHUNK_F32)..len {
                    sum += (query[i] * self.dequant(i, code[i])) as f64;
                }
                if self.metric == DistanceMetric::Cosine {
                    1.0 - sum as f32
                } else {
                    -(sum as f32)
                }
            }
            DistanceMetric::Manhattan => {
                let mut sum = 0.0f64;
                let full_chunks = len / CHUNK_F32;
                for c in 0..full_chunks {
                    let base = c * CHUNK_F32;
                    let mut chunk_acc = 0.0f32;
                    for j in 0..CHUNK_F32 {
                        chunk_acc += (query[base + j] - self.dequant(base + j, code[base + j])).abs();
                    }
                    sum += chunk_acc as f64;
                }
                for i in (full_chunks * CHUNK_F32)..len {
                    sum += (query[i] - self.dequant(i, code[i])).abs() as f64;
                }
                sum as f32
            }
            DistanceMetric::Hamming => (0..len)
                .filter(|&i| (query[i] > 0.0) != (self.dequant(i, code[i]) > 0.0))
                .count() as f32,
        }
    }

    fn ensure_trained(&self) -> Result<()> {
        if self.trained {
            Ok(())
        } else {
            Err(IndexError::UntrainedQuantizer)
        }
    }
}

impl Quantizer for ScalarQuantizer {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn code_size(&self) -> usize {
        self.dimensions
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        self.ensure_trained()?;
        check_dimensions(self.dimensions, vector)?;
        Ok(vector
            .iter()
            .enumerate()
            .map(|(d, &v)| {
                let scale = self.scale[d];
                if scale == 0.0 {
                    0
                } else {
                    ((v - self.min[d]) / scale).round().clamp(0.0, 255.0) as u8
                }
            })
            .collect())
    }

    fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        self.ensure_trained()?;
        check_code(self.dimensions, code)?;
        Ok(code
            .iter()
            .enumerate()
            .map(|(d, &b)| self.dequant(d, b))
            .collect())
    }

    fn prepare(&self, query: &[f32]) -> Result<QueryTable<'_>> {
        self.ensure_trained()?;
        check_dimensions(self.dimensions, query)?;
        Ok(QueryTable::Scalar {
            query: query.to_vec(),
            quantizer: self,
        })
    }
}
