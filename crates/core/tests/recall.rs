//! Recall of exact and quantized search against brute force.

mod common;

use common::*;
use vecdex_core::quantization::ProductQuantizer;
use vecdex_core::{DistanceMetric, QuantConfig, QuantKind, Quantizer, SearchParams};

const DIM: usize = 32;
const N: usize = 3000;
const QUERIES: usize = 100;
const K: usize = 10;

/// Mean recall@10 over `QUERIES` held-out queries.
fn measure(index: &vecdex_core::VectorIndex, data: &[Vec<f32>], ef: usize) -> f64 {
    let queries = random_vectors(QUERIES, DIM, 99);
    let params = SearchParams::top_k(K).with_ef(ef);
    let mut found = 0usize;
    for q in &queries {
        let expected = brute_force_l2(data, q, K);
        let got: Vec<String> = index
            .search(q, &params)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        found += overlap(&expected, &got);
    }
    found as f64 / (QUERIES * K) as f64
}

#[test]
fn exact_graph_recall() {
    let data = random_vectors(N, DIM, 1);
    let index = build(seeded_config(DIM, DistanceMetric::Euclidean), &data);
    let recall = measure(&index, &data, 200);
    assert!(recall >= 0.98, "recall@10 = {recall}");
}

#[test]
fn scalar_quantized_recall() {
    let data = random_vectors(N, DIM, 2);
    let config = seeded_config(DIM, DistanceMetric::Euclidean)
        .with_quantization(QuantConfig::new(QuantKind::Scalar { range: None }));
    let index = build(config, &data);
    index.train_quantizer().unwrap();
    assert!(index.stats().quantizer_trained);
    let recall = measure(&index, &data, 200);
    assert!(recall >= 0.98, "scalar recall@10 = {recall}");
}

#[test]
fn scalar_ordering_without_rerank_matches_float_index() {
    let data = random_vectors(N, DIM, 2);
    let exact = build(seeded_config(DIM, DistanceMetric::Euclidean), &data);
    let config = seeded_config(DIM, DistanceMetric::Euclidean).with_quantization(
        QuantConfig::new(QuantKind::Scalar { range: None }).with_rerank(false),
    );
    let quantized = build(config, &data);
    quantized.train_quantizer().unwrap();

    let params = SearchParams::top_k(K).with_ef(200);
    let mut shared = 0usize;
    for q in &random_vectors(QUERIES, DIM, 99) {
        let ids = |index: &vecdex_core::VectorIndex| -> Vec<String> {
            index.search(q, &params).unwrap().into_iter().map(|r| r.id).collect()
        };
        shared += overlap(&ids(&exact), &ids(&quantized));
    }
    let agreement = shared as f64 / (QUERIES * K) as f64;
    assert!(agreement >= 0.98, "u8 ordering agreement@10 = {agreement}");
}

#[test]
fn manhattan_index_finds_l1_neighbors() {
    let data = random_vectors(1000, DIM, 8);
    let config = seeded_config(DIM, DistanceMetric::Manhattan)
        .with_quantization(QuantConfig::new(QuantKind::Scalar { range: None }));
    let index = build(config, &data);
    index.train_quantizer().unwrap();
    let query = random_vectors(1, DIM, 77).remove(0);
    let hits = index.search(&query, &SearchParams::top_k(K).with_ef(200)).unwrap();

    let mut expected: Vec<(f32, String)> = data
        .iter()
        .enumerate()
        .map(|(i, v)| (v.iter().zip(&query).map(|(a, b)| (a - b).abs()).sum(), format!("v{i}")))
        .collect();
    expected.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    let expected: Vec<String> = expected.into_iter().take(K).map(|(_, id)| id).collect();
    let got: Vec<String> = hits.iter().map(|r| r.id.clone()).collect();
    assert!(overlap(&expected, &got) >= 9, "expected {expected:?}, got {got:?}");
    // Lower is closer, so scores ascend
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
    assert!((hits[0].score - expected_l1(&data, &hits[0].id, &query)).abs() < 1e-3);
}

fn expected_l1(data: &[Vec<f32>], id: &str, query: &[f32]) -> f32 {
    let i: usize = id.trim_start_matches('v').parse().unwrap();
    data[i].iter().zip(query).map(|(a, b)| (a - b).abs()).sum()
}

#[test]
fn product_quantized_recall_with_rerank() {
    let data = random_vectors(N, DIM, 3);
    let config = seeded_config(DIM, DistanceMetric::Euclidean).with_quantization(
        QuantConfig::new(QuantKind::Product { subspaces: 8 }).seeded(11),
    );
    let index = build(config, &data);
    index.train_quantizer().unwrap();
    assert_eq!(index.stats().bytes_per_vector, 8);
    let recall = measure(&index, &data, 200);
    assert!(recall >= 0.95, "product recall@10 = {recall}");
}

#[test]
fn binary_quantizer_self_match_with_rerank() {
    let data = random_vectors(500, DIM, 4);
    let config =
        seeded_config(DIM, DistanceMetric::Euclidean).with_quantization(QuantConfig::new(QuantKind::Binary));
    let index = build(config, &data);
    let stats = index.stats();
    assert_eq!(stats.quantizer, Some("binary"));
    assert_eq!(stats.bytes_per_vector, DIM / 8);
    let hits = index.search(&data[42], &SearchParams::top_k(1).with_ef(200)).unwrap();
    assert_eq!(hits[0].id, "v42");
}

#[test]
fn pq_compression_example() {
    let pq = ProductQuantizer::new(384, 16, 256, DistanceMetric::Euclidean);
    assert_eq!(pq.code_size(), 16);
    assert_eq!(384 * std::mem::size_of::<f32>(), 1536);
    assert_eq!(pq.compression_ratio(), 96.0);
}

#[test]
fn trained_pq_reports_sixteen_bytes_per_vector() {
    let data = random_vectors(300, 384, 5);
    let config = seeded_config(384, DistanceMetric::Euclidean).with_quantization(
        QuantConfig::new(QuantKind::Product { subspaces: 16 })
            .with_centroids(256)
            .seeded(1),
    );
    let index = build(config, &data);
    index.train_quantizer().unwrap();
    let stats = index.stats();
    assert_eq!(stats.bytes_per_vector, 16);
    assert!(index.validate().is_ok());
}

#[test]
fn cosine_scenario_self_match() {
    let data = random_unit_vectors(1000, 128, 6);
    let config = seeded_config(128, DistanceMetric::Cosine);
    let index = vecdex_core::VectorIndex::new(config).unwrap();
    insert_all(&index, &data);
    for pick in [0usize, 123, 500, 999] {
        let hits = index
            .search(&data[pick], &SearchParams::top_k(1).with_ef(50))
            .unwrap();
        assert_eq!(hits[0].id, format!("v{pick}"));
        assert!(hits[0].score > 0.999, "similarity {}", hits[0].score);
    }
}
