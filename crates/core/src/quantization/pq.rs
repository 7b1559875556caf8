//! Product Quantization (PQ) for fast approximate distance computation.
//!
//! Splits vectors into S subspaces and learns up to K=256 centroids per subspace
//! via k-means. Each vector is encoded as S bytes (one centroid id per subspace).
//! Distance computation uses a per-query lookup table: S table lookups + S additions
//! instead of D multiply-adds (asymmetric distance computation, ADC).

use crate::config;
use crate::error::{IndexError, Result};
use crate::hnsw::distance::DistanceMetric;
use crate::quantization::{check_code, check_dimensions, QueryTable, Quantizer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Product quantizer: S subspaces × K centroids × sub_dim floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductQuantizer {
    dimensions: usize,
    num_subspaces: usize,
    num_centroids: usize,
    sub_dim: usize,
    metric: DistanceMetric,
    /// Flat centroid array: `codebook[s * K * sub_dim + k * sub_dim .. + sub_dim]`.
    /// `None` until trained.
    codebook: Option<Vec<f32>>,
}

/// Precomputed distance table for a single query: `[S][K]` partial distances.
#[derive(Debug, Clone)]
pub struct PqDistanceTable {
    table: Vec<f32>,
    num_subspaces: usize,
    num_centroids: usize,
    /// Added once per code; `1.0` for cosine so the sum equals `1 - dot`.
    bias: f32,
}

impl PqDistanceTable {
    /// Approximate distance for a PQ-encoded vector. `codes` is S bytes.
    #[inline]
    pub fn distance(&self, codes: &[u8]) -> f32 {
        let k = self.num_centroids;
        let mut dist = self.bias;
        for (m, &c) in codes.iter().enumerate().take(self.num_subspaces) {
            dist += self.table[m * k + c as usize];
        }
        dist
    }
}

impl ProductQuantizer {
    /// Untrained quantizer. `num_centroids` is clamped to `1..=256`.
    pub fn new(
        dimensions: usize,
        num_subspaces: usize,
        num_centroids: usize,
        metric: DistanceMetric,
    ) -> Self {
        let num_subspaces = num_subspaces.max(1);
        Self {
            dimensions,
            num_subspaces,
            num_centroids: num_centroids.clamp(1, config::PQ_NUM_CENTROIDS),
            sub_dim: dimensions / num_subspaces,
            metric,
            codebook: None,
        }
    }

    /// Train a codebook on a contiguous arena of vectors, one k-means per
    /// subspace, run in parallel.
    ///
    /// With fewer training vectors than centroids the codebook shrinks to the
    /// sample size. A sample below `PQ_MIN_TRAINING_FACTOR × K` is accepted
    /// with a warning.
    pub fn train(
        sample: &[f32],
        dimensions: usize,
        num_subspaces: usize,
        num_centroids: usize,
        iterations: usize,
        metric: DistanceMetric,
        seed: Option<u64>,
    ) -> Result<Self> {
        if num_subspaces == 0 || dimensions % num_subspaces != 0 {
            return Err(IndexError::InvalidConfig(format!(
                "pq subspaces ({}) must divide dimensions ({})",
                num_subspaces, dimensions
            )));
        }
        if num_centroids == 0 || num_centroids > config::PQ_NUM_CENTROIDS {
            return Err(IndexError::InvalidConfig(format!(
                "pq centroids must be in 1..={}, got {}",
                config::PQ_NUM_CENTROIDS,
                num_centroids
            )));
        }
        if sample.is_empty() || sample.len() % dimensions != 0 {
            return Err(IndexError::InvalidParameter(format!(
                "training sample of {} floats is not a whole number of {}-d vectors",
                sample.len(),
                dimensions
            )));
        }
        let sub_dim = dimensions / num_subspaces;
        let n = sample.len() / dimensions;
        if n < num_centroids * config::PQ_MIN_TRAINING_FACTOR {
            tracing::warn!(
                sample = n,
                recommended = num_centroids * config::PQ_MIN_TRAINING_FACTOR,
                "pq training sample is small; recall may suffer"
            );
        }
        let k = num_centroids.min(n);

        let per_subspace: Vec<Vec<f32>> = (0..num_subspaces)
            .into_par_iter()
            .map(|sub| {
                let mut sub_vectors = Vec::with_capacity(n * sub_dim);
                for vector in sample.chunks_exact(dimensions) {
                    sub_vectors.extend_from_slice(&vector[sub * sub_dim..(sub + 1) * sub_dim]);
                }
                let mut rng = match seed {
                    Some(s) => StdRng::seed_from_u64(s ^ (sub as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
                    None => StdRng::from_entropy(),
                };
                kmeans(&sub_vectors, sub_dim, k, iterations, &mut rng)
            })
            .collect();

        let mut codebook = Vec::with_capacity(num_subspaces * k * sub_dim);
        for centroids in per_subspace {
            codebook.extend_from_slice(&centroids);
        }

        tracing::info!(
            subspaces = num_subspaces,
            centroids = k,
            sample = n,
            "pq codebook trained"
        );
        Ok(Self {
            dimensions,
            num_subspaces,
            num_centroids: k,
            sub_dim,
            metric,
            codebook: Some(codebook),
        })
    }

    pub fn num_subspaces(&self) -> usize {
        self.num_subspaces
    }

    /// Effective centroid count per subspace.
    pub fn num_centroids(&self) -> usize {
        self.num_centroids
    }

    /// Float bytes divided by code bytes.
    pub fn compression_ratio(&self) -> f32 {
        (self.dimensions * std::mem::size_of::<f32>()) as f32 / self.num_subspaces as f32
    }

    fn codebook(&self) -> Result<&[f32]> {
        self.codebook.as_deref().ok_or(IndexError::UntrainedQuantizer)
    }

    #[inline]
    fn centroid<'a>(&self, codebook: &'a [f32], sub: usize, ci: usize) -> &'a [f32] {
        let start = (sub * self.num_centroids + ci) * self.sub_dim;
        &codebook[start..start + self.sub_dim]
    }

    /// Find nearest centroid in a subspace. Returns its index.
    fn nearest_centroid(&self, codebook: &[f32], sub: usize, sub_vec: &[f32]) -> u8 {
        let mut best_idx = 0usize;
        let mut best_dist = f32::MAX;
        for ci in 0..self.num_centroids {
            let d = sq_dist(sub_vec, self.centroid(codebook, sub, ci));
            if d < best_dist {
                best_dist = d;
                best_idx = ci;
            }
        }
        best_idx as u8
    }

    /// Build the `[S][K]` table of partial distances for `query`.
    pub fn distance_table(&self, query: &[f32]) -> Result<PqDistanceTable> {
        let codebook = self.codebook()?;
        check_dimensions(self.dimensions, query)?;
        let k = self.num_centroids;
        let mut table = vec![0.0f32; self.num_subspaces * k];

        for sub in 0..self.num_subspaces {
            let q_sub = &query[sub * self.sub_dim..(sub + 1) * self.sub_dim];
            for ci in 0..k {
                let centroid = self.centroid(codebook, sub, ci);
                table[sub * k + ci] = match self.metric {
                    DistanceMetric::Euclidean | DistanceMetric::Hamming => sq_dist(q_sub, centroid),
                    // L1 splits additively across subspaces
                    DistanceMetric::Manhattan => {
                        q_sub.iter().zip(centroid).map(|(a, b)| (a - b).abs()).sum::<f32>()
                    }
                    DistanceMetric::Cosine | DistanceMetric::DotProduct => {
                        -q_sub.iter().zip(centroid).map(|(a, b)| a * b).sum::<f32>()
                    }
                };
            }
        }

        let bias = if self.metric == DistanceMetric::Cosine {
            1.0
        } else {
            0.0
        };
        Ok(PqDistanceTable {
            table,
            num_subspaces: self.num_subspaces,
            num_centroids: k,
            bias,
        })
    }

    /// Every byte of `codes` must name an existing centroid.
    pub(crate) fn check_code_range(&self, codes: &[u8]) -> Result<()> {
        match codes.iter().find(|&&c| c as usize >= self.num_centroids) {
            Some(&bad) => Err(IndexError::CorruptIndex(format!(
                "pq code {} >= centroid count {}",
                bad, self.num_centroids
            ))),
            None => Ok(()),
        }
    }
}

impl Quantizer for ProductQuantizer {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn code_size(&self) -> usize {
        self.num_subspaces
    }

    fn is_trained(&self) -> bool {
        self.codebook.is_some()
    }

    fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        let codebook = self.codebook()?;
        check_dimensions(self.dimensions, vector)?;
        Ok((0..self.num_subspaces)
            .map(|sub| {
                let sub_vec = &vector[sub * self.sub_dim..(sub + 1) * self.sub_dim];
                self.nearest_centroid(codebook, sub, sub_vec)
            })
            .collect())
    }

    fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        let codebook = self.codebook()?;
        check_code(self.num_subspaces, code)?;
        self.check_code_range(code)?;
        let mut out = Vec::with_capacity(self.dimensions);
        for (sub, &c) in code.iter().enumerate() {
            out.extend_from_slice(self.centroid(codebook, sub, c as usize));
        }
        Ok(out)
    }

    fn prepare(&self, query: &[f32]) -> Result<QueryTable<'_>> {
        Ok(QueryTable::Product(self.distance_table(query)?))
    }
}

/// K-means clustering with k-means++ initialization.
/// Returns k × sub_dim centroids as a flat `Vec<f32>`.
fn kmeans(data: &[f32], sub_dim: usize, k: usize, iterations: usize, rng: &mut StdRng) -> Vec<f32> {
    let n = data.len() / sub_dim;
    if n <= k {
        // Each point is its own centroid
        return data[..k.min(n) * sub_dim].to_vec();
    }

    let point = |i: usize| &data[i * sub_dim..(i + 1) * sub_dim];
    let mut centroids = vec![0.0f32; k * sub_dim];

    let first = rng.gen_range(0..n);
    centroids[..sub_dim].copy_from_slice(point(first));

    // Distance from each point to its nearest centroid so far
    let mut min_dists = vec![f32::MAX; n];

    for ci in 1..k {
        let last = centroids[(ci - 1) * sub_dim..ci * sub_dim].to_vec();
        let mut total = 0.0f64;
        for (i, md) in min_dists.iter_mut().enumerate() {
            let d = sq_dist(point(i), &last);
            if d < *md {
                *md = d;
            }
            total += *md as f64;
        }

        let chosen = if total < 1e-30 {
            // All points coincide with existing centroids
            rng.gen_range(0..n)
        } else {
            // Weighted pick proportional to squared distance
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0f64;
            let mut chosen = n - 1;
            for (i, &d) in min_dists.iter().enumerate() {
                cumulative += d as f64;
                if cumulative >= threshold {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids[ci * sub_dim..(ci + 1) * sub_dim].copy_from_slice(point(chosen));
    }

    let mut assignments = vec![usize::MAX; n];
    for _ in 0..iterations {
        let mut changed = false;
        for (i, slot) in assignments.iter_mut().enumerate() {
            let p = point(i);
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for ci in 0..k {
                let d = sq_dist(p, &centroids[ci * sub_dim..(ci + 1) * sub_dim]);
                if d < best_dist {
                    best_dist = d;
                    best = ci;
                }
            }
            if *slot != best {
                *slot = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![0.0f32; k * sub_dim];
        let mut counts = vec![0u32; k];
        for (i, &ci) in assignments.iter().enumerate() {
            counts[ci] += 1;
            for (acc, &v) in sums[ci * sub_dim..(ci + 1) * sub_dim].iter_mut().zip(point(i)) {
                *acc += v;
            }
        }
        // Empty clusters keep their previous centroid
        for ci in 0..k {
            if counts[ci] > 0 {
                let inv = 1.0 / counts[ci] as f32;
                for d in 0..sub_dim {
                    centroids[ci * sub_dim + d] = sums[ci * sub_dim + d] * inv;
                }
            }
        }
    }

    centroids
}

/// Squared Euclidean distance between two sub-vectors.
#[inline]
fn sq_dist(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
