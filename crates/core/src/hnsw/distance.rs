//! Distance metric implementations.
//!
//! Supports cosine, euclidean (L2), manhattan (L1), dot product and Hamming. All internal
//! distances are **lower-is-better** so every comparator and heap in the
//! index can share one ordering; [`DistanceMetric::score`] converts back to the
//! caller-facing value.
//!
//! Float kernels use SIMD-friendly fixed-size chunks with f32 inner
//! accumulators so the compiler can auto-vectorize them.

use serde::{Deserialize, Serialize};

/// Distance metric used for vector similarity computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine distance: `1 - dot(a, b)` over unit vectors. Range: \[0, 2\].
    ///
    /// Inputs must already be normalized; the index normalizes on insert.
    Cosine,
    /// Squared Euclidean distance (L2²). Range: \[0, ∞).
    Euclidean,
    /// Negative dot product: `-dot(a, b)`. Lower = higher similarity.
    DotProduct,
    /// Sum of absolute differences (L1). Range: \[0, ∞).
    Manhattan,
    /// Number of dimensions whose sign differs. Range: \[0, D\].
    Hamming,
}

impl DistanceMetric {
    /// Distance between two float vectors.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Cosine => 1.0 - dot_product(a, b),
            DistanceMetric::Euclidean => euclidean_sq(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
            DistanceMetric::Manhattan => manhattan(a, b),
            DistanceMetric::Hamming => hamming_f32(a, b) as f32,
        }
    }

    /// Converts an internal distance to the value reported in search results:
    /// cosine similarity, dot product, Euclidean or L1 distance, or Hamming bits.
    #[inline]
    pub fn score(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::Euclidean => distance.max(0.0).sqrt(),
            DistanceMetric::DotProduct => -distance,
            DistanceMetric::Manhattan | DistanceMetric::Hamming => distance,
        }
    }

    /// Whether a larger [`score`](Self::score) means a closer match.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, DistanceMetric::Cosine | DistanceMetric::DotProduct)
    }

    /// Whether vectors must be unit-normalized before storage and search.
    pub fn requires_normalization(&self) -> bool {
        matches!(self, DistanceMetric::Cosine)
    }
}

/// 8 × f32 = 256 bit = one AVX register.
const CHUNK_F32: usize = 8;

/// Dot product between two f32 slices.
#[allow(clippy::needless_range_loop)]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let full_chunks = len / CHUNK_F32;
    let mut acc = [0.0f32; CHUNK_F32];
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        for j in 0..CHUNK_F32 {
            acc[j] += a[base + j] * b[base + j];
        }
    }
    let mut sum: f32 = acc.iter().sum();
    for i in (full_chunks * CHUNK_F32)..len {
        sum += a[i] * b[i];
    }
    sum
}

/// Squared Euclidean distance between two f32 slices.
#[allow(clippy::needless_range_loop)]
pub fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let full_chunks = len / CHUNK_F32;
    let mut acc = [0.0f32; CHUNK_F32];
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        for j in 0..CHUNK_F32 {
            let d = a[base + j] - b[base + j];
            acc[j] += d * d;
        }
    }
    let mut sum: f32 = acc.iter().sum();
    for i in (full_chunks * CHUNK_F32)..len {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Manhattan (L1) distance between two f32 slices.
#[allow(clippy::needless_range_loop)]
pub fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let full_chunks = len / CHUNK_F32;
    let mut acc = [0.0f32; CHUNK_F32];
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        for j in 0..CHUNK_F32 {
            acc[j] += (a[base + j] - b[base + j]).abs();
        }
    }
    let mut sum: f32 = acc.iter().sum();
    for i in (full_chunks * CHUNK_F32)..len {
        sum += (a[i] - b[i]).abs();
    }
    sum
}

/// Euclidean (L2) distance.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    euclidean_sq(a, b).sqrt()
}

/// Hamming distance over the sign pattern of two float vectors.
/// A component counts as set when it is strictly positive.
pub fn hamming_f32(a: &[f32], b: &[f32]) -> u32 {
    a.iter()
        .zip(b.iter())
        .filter(|(&x, &y)| (x > 0.0) != (y > 0.0))
        .count() as u32
}

/// Hamming distance between two bit-packed byte arrays: popcount of the XOR.
pub fn hamming_bytes(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    let mut total = 0u32;
    let mut a_words = a.chunks_exact(8);
    let mut b_words = b.chunks_exact(8);
    for (wa, wb) in (&mut a_words).zip(&mut b_words) {
        let mut xa = [0u8; 8];
        let mut xb = [0u8; 8];
        xa.copy_from_slice(wa);
        xb.copy_from_slice(wb);
        total += (u64::from_le_bytes(xa) ^ u64::from_le_bytes(xb)).count_ones();
    }
    for (&x, &y) in a_words.remainder().iter().zip(b_words.remainder()) {
        total += (x ^ y).count_ones();
    }
    total
}

/// L2 norm of a vector, accumulated in f64 so large components cannot
/// overflow the sum of squares.
#[inline]
pub fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
/// Returns `false` when the vector has zero norm or cannot be scaled to a
/// finite unit vector.
pub fn normalize_in_place(v: &mut [f32]) -> bool {
    let n = norm(v);
    if n == 0.0 || !n.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x = (f64::from(*x) / n) as f32;
    }
    v.iter().all(|x| x.is_finite())
}
