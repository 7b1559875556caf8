//! ANN Benchmark: synthetic uniform vectors
//! Measures Recall@10 and QPS for exact, scalar and product configurations
//! against brute-force ground truth.
//!
//! Usage: cargo bench --bench ann_random
//! Set RUST_LOG=vecdex_core=debug to see training and compaction events.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vecdex_core::{
    DistanceMetric, HnswConfig, IndexConfig, QuantConfig, QuantKind, SearchParams, VectorIndex,
    VectorRecord,
};

const DIM: usize = 64;
const TRAIN: usize = 20_000;
const QUERIES: usize = 500;
const K: usize = 10;

fn random_vectors(count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..DIM).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

fn ground_truth(train: &[Vec<f32>], query: &[f32]) -> Vec<usize> {
    let mut scored: Vec<(f32, usize)> = train
        .iter()
        .enumerate()
        .map(|(i, v)| (v.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum(), i))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().take(K).map(|(_, i)| i).collect()
}

/// Compute Recall@k: fraction of true nearest neighbors found
fn recall_at_k(predicted: &[String], truth: &[usize]) -> f64 {
    let truth: HashSet<String> = truth.iter().map(|i| format!("v{i}")).collect();
    predicted.iter().filter(|id| truth.contains(*id)).count() as f64 / K as f64
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("=== ANN Benchmark: uniform random, {DIM}d, L2 ===");
    println!();

    print!("Generating data...");
    let train = random_vectors(TRAIN, 1);
    let queries = random_vectors(QUERIES, 2);
    println!(" {TRAIN} train vectors, {QUERIES} queries");

    print!("Computing ground truth...");
    let t0 = Instant::now();
    let truth: Vec<Vec<usize>> = queries.iter().map(|q| ground_truth(&train, q)).collect();
    println!(" {:.2}s", t0.elapsed().as_secs_f64());

    let configs: Vec<(&str, Option<QuantConfig>)> = vec![
        ("exact f32", None),
        ("scalar u8", Some(QuantConfig::new(QuantKind::Scalar { range: None }))),
        (
            "product S=16",
            Some(QuantConfig::new(QuantKind::Product { subspaces: 16 }).seeded(7)),
        ),
    ];

    for (label, quant) in configs {
        println!();
        println!("--- {label} (M=16, ef_c=200) ---");

        let mut config = IndexConfig::new(DIM, DistanceMetric::Euclidean)
            .with_hnsw(HnswConfig::with_params(16, 200).seeded(42));
        config.quantization = quant;
        let index = VectorIndex::new(config).expect("valid config");

        let records: Vec<VectorRecord> = train
            .iter()
            .enumerate()
            .map(|(i, v)| VectorRecord::new(format!("v{i}"), v.clone()))
            .collect();
        let t0 = Instant::now();
        for chunk in records.chunks(5_000) {
            index.insert_batch(chunk.to_vec()).expect("insert batch");
        }
        let build_time = t0.elapsed();
        if index.config().quantization.is_some() {
            index.train_quantizer().expect("train quantizer");
        }
        let stats = index.stats();
        println!(
            "  Build time: {:.2}s ({:.0} inserts/s), total with training {:.2}s",
            build_time.as_secs_f64(),
            TRAIN as f64 / build_time.as_secs_f64(),
            t0.elapsed().as_secs_f64()
        );
        println!(
            "  Bytes/vector: {}  Memory: {:.1} MiB  Max layer: {}",
            stats.bytes_per_vector,
            stats.memory_bytes as f64 / (1024.0 * 1024.0),
            stats.max_layer
        );

        println!();
        println!("  ef_search | Recall@10 |    QPS    | Avg latency");
        println!("  ----------+-----------+-----------+------------");
        for ef in [10usize, 20, 40, 80, 120, 200] {
            let params = SearchParams::top_k(K).with_ef(ef);
            for q in queries.iter().take(10) {
                let _ = index.search(q, &params);
            }

            let t0 = Instant::now();
            let mut total_recall = 0.0f64;
            for (q, gt) in queries.iter().zip(&truth) {
                let ids: Vec<String> = index
                    .search(q, &params)
                    .expect("search")
                    .into_iter()
                    .map(|r| r.id)
                    .collect();
                total_recall += recall_at_k(&ids, gt);
            }
            let elapsed = t0.elapsed();
            println!(
                "  {:>9} | {:.4}    | {:>9.1} | {:.0} us",
                ef,
                total_recall / QUERIES as f64,
                QUERIES as f64 / elapsed.as_secs_f64(),
                elapsed.as_micros() as f64 / QUERIES as f64
            );
        }
    }

    println!();
    println!("=== Benchmark complete ===");
}
