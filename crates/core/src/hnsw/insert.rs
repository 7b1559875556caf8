//! HNSW insertion algorithm.
//!
//! Inserts a node with heuristic neighbor selection and reciprocal edges,
//! pruning any neighbor list pushed over its cap. Neighbor lists touched on the
//! way are lazily repaired if they still point at tombstones.

use crate::error::{IndexError, Result};
use crate::hnsw::graph::HnswGraph;
use crate::hnsw::search::{greedy_descent, search_layer, SearchBudget};
use crate::hnsw::select::select_neighbors;
use crate::hnsw::visited::VisitedSet;

impl HnswGraph {
    /// Insert `node` at a randomly sampled level. Returns the level.
    ///
    /// `dist_to_new(id)` is the distance from the new node's vector to `id`;
    /// `pair_dist(a, b)` must also work when either side is the new node, so
    /// the vector has to be in the store before this call. `node` must equal
    /// the current node count.
    pub fn insert<D, P>(&mut self, node: u32, dist_to_new: &D, pair_dist: &P) -> Result<usize>
    where
        D: Fn(u32) -> f32,
        P: Fn(u32, u32) -> f32,
    {
        let level = self.random_level();
        self.insert_at_level(node, level, dist_to_new, pair_dist)?;
        Ok(level)
    }

    /// Insert `node` at a fixed level (clamped to `max_layers - 1`).
    pub fn insert_at_level<D, P>(
        &mut self,
        node: u32,
        level: usize,
        dist_to_new: &D,
        pair_dist: &P,
    ) -> Result<()>
    where
        D: Fn(u32) -> f32,
        P: Fn(u32, u32) -> f32,
    {
        if node as usize != self.node_count() {
            return Err(IndexError::CorruptIndex(format!(
                "insert slot {} does not follow node count {}",
                node,
                self.node_count()
            )));
        }
        let level = level.min(self.config.max_layers - 1);

        let entry_point = match self.entry_point {
            Some(ep) => ep,
            None => {
                self.push_node(level);
                self.entry_point = Some(node);
                self.max_layer = level;
                return Ok(());
            }
        };

        // Phase 1: greedy descent through layers above the node's level
        let mut budget = SearchBudget::unlimited();
        let mut visited = VisitedSet::new(self.node_count() + 1);
        let current = greedy_descent(
            self,
            entry_point,
            self.max_layer,
            level,
            &mut visited,
            dist_to_new,
            &mut budget,
        );

        // Phase 2: beam search per layer, choose the new node's neighbors
        let top = level.min(self.max_layer);
        let mut node_neighbors: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        let mut layer_eps: Vec<u32> = vec![current];
        {
            let live = |id: u32| !self.is_deleted(id);
            let accept_all = |_: u32| true;
            for layer in (0..=top).rev() {
                let ef = self.config.ef_construction;
                let mut candidates = search_layer(
                    self,
                    &layer_eps,
                    ef,
                    layer,
                    &mut visited,
                    dist_to_new,
                    &live,
                    &mut budget,
                );
                if candidates.is_empty() {
                    // Neighborhood is all tombstones; link to them and let repair fix it later
                    candidates = search_layer(
                        self,
                        &layer_eps,
                        ef,
                        layer,
                        &mut visited,
                        dist_to_new,
                        &accept_all,
                        &mut budget,
                    );
                }

                // Ties beyond the beam carry no extra information for linking
                candidates.truncate(ef);
                let selected = select_neighbors(&candidates, self.m_max(layer), pair_dist);
                node_neighbors[layer] = selected.iter().map(|&(_, id)| id).collect();

                if !candidates.is_empty() {
                    layer_eps.clear();
                    layer_eps.extend(candidates.iter().map(|&(_, id)| id));
                }
            }
        }

        // The node becomes visible only once its lists are complete
        self.push_node(level);
        for (layer, list) in node_neighbors.into_iter().enumerate() {
            self.neighbors[node as usize][layer] = list;
        }

        // Phase 3: reciprocal edges, pruning over-capacity lists
        for layer in 0..=top {
            let m_max = self.m_max(layer);
            let my_neighbors = self.neighbors[node as usize][layer].clone();
            for neighbor_id in my_neighbors {
                self.repair_list(neighbor_id, layer, None, pair_dist);

                let nid = neighbor_id as usize;
                if !self.neighbors[nid][layer].contains(&node) {
                    self.neighbors[nid][layer].push(node);
                }
                if self.neighbors[nid][layer].len() > m_max {
                    let candidates: Vec<(f32, u32)> = self.neighbors[nid][layer]
                        .iter()
                        .map(|&cid| (pair_dist(neighbor_id, cid), cid))
                        .collect();
                    let pruned = select_neighbors(&candidates, m_max, pair_dist);
                    self.neighbors[nid][layer] = pruned.iter().map(|&(_, id)| id).collect();
                }
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(node);
        }
        Ok(())
    }
}
