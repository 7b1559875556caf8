//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search).
//! [`HnswGraph`] stores only topology in a Struct-of-Arrays layout: neighbor
//! lists per node per layer, layer assignments and tombstones. Vectors live in
//! the vector store; every graph operation receives distance closures instead,
//! so the same code runs over exact floats or quantized codes.

use crate::config;
use crate::error::{IndexError, Result};
use crate::hnsw::visited::VisitedSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configuration parameters for an HNSW graph.
///
/// Controls the trade-off between build speed, search speed, recall, and memory usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Number of links per node above layer 0.
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Default candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Seed for level sampling. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            seed: None,
        }
    }
}

impl HnswConfig {
    /// Builds a config from the two construction parameters, deriving the rest.
    pub fn with_params(m: usize, ef_construction: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ef_construction,
            ..Self::default()
        }
    }

    /// Sets the level-sampling seed.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.m < config::HNSW_MIN_M {
            return Err(IndexError::InvalidConfig(format!(
                "m must be >= {}, got {}",
                config::HNSW_MIN_M,
                self.m
            )));
        }
        if self.m_max0 < self.m {
            return Err(IndexError::InvalidConfig(format!(
                "m_max0 ({}) must be >= m ({})",
                self.m_max0, self.m
            )));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(IndexError::InvalidConfig(
                "ef_construction and ef_search must be > 0".into(),
            ));
        }
        if self.max_layers == 0 || self.max_layers > u8::MAX as usize {
            return Err(IndexError::InvalidConfig(format!(
                "max_layers must be in 1..=255, got {}",
                self.max_layers
            )));
        }
        Ok(())
    }
}

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

/// Multi-layer proximity graph over dense node slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraph {
    pub config: HnswConfig,
    /// `[node][layer][neighbor]`.
    pub neighbors: Vec<Vec<Vec<u32>>>,
    /// Max layer of each node, sampled once at insertion.
    pub layers: Vec<u8>,
    /// Tombstones. Deleted nodes keep their own edges for navigation.
    pub deleted: Vec<bool>,
    pub entry_point: Option<u32>,
    pub max_layer: usize,
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
}

impl HnswGraph {
    /// Creates an empty graph.
    pub fn new(config: HnswConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => entropy_rng(),
        };
        Self {
            config,
            neighbors: Vec::new(),
            layers: Vec::new(),
            deleted: Vec::new(),
            entry_point: None,
            max_layer: 0,
            rng,
        }
    }

    /// Re-derives the level RNG after deserialization. A seeded config is
    /// mixed with the node count so a reloaded graph does not replay levels.
    pub fn reseed_levels(&mut self) {
        self.rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ (self.node_count() as u64).rotate_left(32)),
            None => entropy_rng(),
        };
    }

    /// Total number of slots, including tombstones.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.layers.len()
    }

    /// Number of non-deleted nodes.
    pub fn len(&self) -> usize {
        self.deleted.iter().filter(|&&d| !d).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tombstoned nodes awaiting compaction.
    pub fn deleted_count(&self) -> usize {
        self.deleted.iter().filter(|&&d| d).count()
    }

    #[inline]
    pub fn is_deleted(&self, id: u32) -> bool {
        self.deleted[id as usize]
    }

    #[inline]
    pub fn layer_of(&self, id: u32) -> usize {
        self.layers[id as usize] as usize
    }

    /// Neighbor list of `id` at `layer`; empty when the node does not reach that layer.
    #[inline]
    pub fn neighbors_at(&self, id: u32, layer: usize) -> &[u32] {
        self.neighbors[id as usize]
            .get(layer)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    /// Neighbor cap for a layer: `m_max0` at layer 0, `m` above.
    #[inline]
    pub fn m_max(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }

    /// Sample a level from the exponential distribution with `mL = 1/ln(M)`,
    /// capped at one above the current top layer.
    pub fn random_level(&mut self) -> usize {
        let ml = 1.0 / (self.config.m as f64).ln();
        // gen::<f64>() is in [0, 1); flip to (0, 1] so ln never sees zero
        let r: f64 = 1.0 - self.rng.gen::<f64>();
        let level = (-r.ln() * ml).floor() as usize;
        let cap = if self.entry_point.is_some() {
            self.max_layer + 1
        } else {
            0
        };
        level.min(cap).min(self.config.max_layers - 1)
    }

    /// Append a node slot with empty neighbor lists up to `level`.
    pub(crate) fn push_node(&mut self, level: usize) {
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.layers.push(level as u8);
        self.deleted.push(false);
    }

    /// Check structural invariants: parallel arrays agree, entry point and every
    /// neighbor id are in bounds, no node links above its own layer.
    pub fn validate(&self) -> Result<()> {
        let nc = self.node_count();
        if self.neighbors.len() != nc || self.deleted.len() != nc {
            return Err(IndexError::CorruptIndex(format!(
                "neighbors({}) / deleted({}) != layers({})",
                self.neighbors.len(),
                self.deleted.len(),
                nc
            )));
        }
        match self.entry_point {
            Some(ep) if ep as usize >= nc => {
                return Err(IndexError::CorruptIndex(format!(
                    "entry point {} >= node count {}",
                    ep, nc
                )));
            }
            Some(ep) if self.layer_of(ep) != self.max_layer => {
                return Err(IndexError::CorruptIndex(format!(
                    "entry point {} has layer {} but graph top layer is {}",
                    ep,
                    self.layer_of(ep),
                    self.max_layer
                )));
            }
            None if nc > 0 => {
                return Err(IndexError::CorruptIndex(format!(
                    "no entry point but {} nodes",
                    nc
                )));
            }
            _ => {}
        }
        for (node, node_layers) in self.neighbors.iter().enumerate() {
            if node_layers.len() != self.layers[node] as usize + 1 {
                return Err(IndexError::CorruptIndex(format!(
                    "node {} has {} neighbor layers but level {}",
                    node,
                    node_layers.len(),
                    self.layers[node]
                )));
            }
            for (layer, list) in node_layers.iter().enumerate() {
                for &nb in list {
                    if nb as usize >= nc {
                        return Err(IndexError::CorruptIndex(format!(
                            "neighbor {} out of bounds (node_count={}) at node {} layer {}",
                            nb, nc, node, layer
                        )));
                    }
                    if (self.layers[nb as usize] as usize) < layer {
                        return Err(IndexError::CorruptIndex(format!(
                            "node {} links to {} at layer {} above its level",
                            node, nb, layer
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Count live nodes reachable from the entry point at layer 0 (BFS).
    /// Tombstones are walked through but not counted.
    pub fn reachable_from_entry(&self) -> usize {
        let ep = match self.entry_point {
            Some(ep) => ep,
            None => return 0,
        };
        let mut visited = VisitedSet::new(self.node_count());
        let mut queue = VecDeque::new();
        visited.insert(ep);
        queue.push_back(ep);
        let mut live = 0usize;
        while let Some(node) = queue.pop_front() {
            if !self.is_deleted(node) {
                live += 1;
            }
            for &nb in self.neighbors_at(node, 0) {
                if visited.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }
        live
    }

    /// Approximate heap footprint of the topology in bytes.
    pub fn estimate_memory_bytes(&self) -> usize {
        let mut total = self.layers.len() + self.deleted.len();
        for node_layers in &self.neighbors {
            total += 24;
            for list in node_layers {
                total += list.len() * 4 + 24;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(HnswConfig::default().validate().is_ok());
        assert!(HnswConfig::with_params(1, 100).validate().is_err());
        let bad = HnswConfig {
            m_max0: 4,
            ..HnswConfig::with_params(8, 100)
        };
        assert!(bad.validate().is_err());
        let zero_ef = HnswConfig {
            ef_search: 0,
            ..HnswConfig::default()
        };
        assert!(zero_ef.validate().is_err());
    }

    #[test]
    fn test_first_level_is_zero() {
        let mut g = HnswGraph::new(HnswConfig::default().seeded(7));
        assert_eq!(g.random_level(), 0);
    }

    #[test]
    fn test_level_capped_at_top_plus_one() {
        let mut g = HnswGraph::new(HnswConfig::with_params(2, 10).seeded(11));
        g.push_node(0);
        g.entry_point = Some(0);
        g.max_layer = 0;
        for _ in 0..1000 {
            assert!(g.random_level() <= 1);
        }
    }

    #[test]
    fn test_level_distribution_mostly_zero() {
        let mut g = HnswGraph::new(HnswConfig::default().seeded(3));
        g.push_node(0);
        g.entry_point = Some(0);
        g.max_layer = 5;
        let zeros = (0..10_000).filter(|_| g.random_level() == 0).count();
        // P(level 0) = 1 - 1/M = 0.9375 for M = 16
        assert!(zeros > 9_000 && zeros < 9_700, "zeros = {zeros}");
    }

    #[test]
    fn test_validate_detects_out_of_bounds_entry_point() {
        let mut g = HnswGraph::new(HnswConfig::default());
        g.push_node(0);
        g.entry_point = Some(5);
        assert!(matches!(g.validate(), Err(IndexError::CorruptIndex(_))));
    }

    #[test]
    fn test_validate_detects_bad_neighbor() {
        let mut g = HnswGraph::new(HnswConfig::default());
        g.push_node(0);
        g.push_node(0);
        g.entry_point = Some(0);
        g.neighbors[0][0].push(9);
        assert!(matches!(g.validate(), Err(IndexError::CorruptIndex(_))));
    }

    #[test]
    fn test_validate_missing_entry_point() {
        let mut g = HnswGraph::new(HnswConfig::default());
        g.push_node(0);
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_reachability_counts_live_only() {
        let mut g = HnswGraph::new(HnswConfig::default());
        for _ in 0..4 {
            g.push_node(0);
        }
        g.entry_point = Some(0);
        g.neighbors[0][0] = vec![1];
        g.neighbors[1][0] = vec![2];
        g.deleted[1] = true;
        // node 3 is isolated
        assert_eq!(g.reachable_from_entry(), 2);
        assert_eq!(g.len(), 3);
        assert_eq!(g.deleted_count(), 1);
    }
}
