//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor graph.
//!
//! The graph stores topology only, in a Struct-of-Arrays layout: neighbor lists
//! per node per layer, layer assignments and tombstones, all keyed by the dense
//! slot the vector store hands out. Distances are supplied by closures, so the
//! coordinator can drive the same traversal with exact floats or quantized codes.

/// Tombstone deletion with lazy neighbor-list repair.
pub mod delete;
/// Distance metrics: cosine, euclidean, dot product and hamming.
pub mod distance;
/// HNSW graph structure and configuration.
pub mod graph;
/// HNSW insertion with reciprocal edges and heuristic pruning.
pub mod insert;
/// HNSW search: single-layer beam search and multi-layer KNN.
pub mod search;
/// Diversity-aware neighbor selection.
pub mod select;
/// Generation-based visited set for efficient graph traversal.
pub mod visited;

pub use distance::DistanceMetric;
pub use graph::{HnswConfig, HnswGraph};
pub use search::SearchBudget;
pub use select::select_neighbors;
