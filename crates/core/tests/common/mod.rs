//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use vecdex_core::{DistanceMetric, HnswConfig, IndexConfig, Metadata, VectorIndex, VectorRecord};

/// `count` i.i.d. vectors with components uniform in `[-1, 1)`.
pub fn random_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

pub fn random_unit_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    random_vectors(count, dim, seed)
        .into_iter()
        .map(|mut v| {
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            v.iter_mut().for_each(|x| *x /= norm);
            v
        })
        .collect()
}

pub fn records(vectors: &[Vec<f32>]) -> Vec<VectorRecord> {
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| VectorRecord::new(format!("v{i}"), v.clone()))
        .collect()
}

pub fn seeded_config(dim: usize, metric: DistanceMetric) -> IndexConfig {
    IndexConfig::new(dim, metric).with_hnsw(HnswConfig::with_params(16, 200).seeded(7))
}

pub fn build(config: IndexConfig, vectors: &[Vec<f32>]) -> VectorIndex {
    let index = VectorIndex::new(config).unwrap();
    index.insert_batch(records(vectors)).unwrap();
    index
}

pub fn insert_all(index: &VectorIndex, vectors: &[Vec<f32>]) {
    for (i, v) in vectors.iter().enumerate() {
        index.insert(format!("v{i}"), v.clone(), Metadata::new()).unwrap();
    }
}

/// Exact top-k ids by squared L2, ties to the lower id string.
pub fn brute_force_l2(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<String> {
    let mut scored: Vec<(f32, String)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let d: f32 = v.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum();
            (d, format!("v{i}"))
        })
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().take(k).map(|(_, id)| id).collect()
}

pub fn overlap(expected: &[String], got: &[String]) -> usize {
    let expected: HashSet<&String> = expected.iter().collect();
    got.iter().filter(|id| expected.contains(id)).count()
}
