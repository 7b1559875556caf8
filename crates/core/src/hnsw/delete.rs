//! Tombstone deletion with lazy neighbor-list repair.

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::select::select_neighbors;

impl HnswGraph {
    /// Tombstone `node`. Returns `false` if it is out of bounds or already deleted.
    ///
    /// Live neighbors of `node` get any *other* tombstones in their lists
    /// replaced by surviving second-hop neighbors. Edges to `node` itself are
    /// left in place and excised the next time the list is touched, so the
    /// walk can still route through it meanwhile. The entry point is kept even
    /// when tombstoned.
    pub fn mark_deleted<P>(&mut self, node: u32, pair_dist: &P) -> bool
    where
        P: Fn(u32, u32) -> f32,
    {
        let idx = node as usize;
        if idx >= self.node_count() || self.deleted[idx] {
            return false;
        }
        self.deleted[idx] = true;

        for layer in 0..=self.layer_of(node) {
            let neighbors = self.neighbors[idx][layer].clone();
            for nb in neighbors {
                if !self.is_deleted(nb) {
                    self.repair_list(nb, layer, Some(node), pair_dist);
                }
            }
        }
        true
    }

    /// Replace tombstoned entries of `node`'s list at `layer` with their live
    /// neighbors, then re-select down to the layer cap. `keep` is exempt from
    /// removal. Returns the number of tombstones removed.
    pub(crate) fn repair_list<P>(
        &mut self,
        node: u32,
        layer: usize,
        keep: Option<u32>,
        pair_dist: &P,
    ) -> usize
    where
        P: Fn(u32, u32) -> f32,
    {
        let list = self.neighbors_at(node, layer);
        let stale: Vec<u32> = list
            .iter()
            .copied()
            .filter(|&n| self.is_deleted(n) && Some(n) != keep)
            .collect();
        if stale.is_empty() {
            return 0;
        }

        let mut pool: Vec<u32> = list
            .iter()
            .copied()
            .filter(|n| !stale.contains(n))
            .collect();
        for &tomb in &stale {
            for &c in self.neighbors_at(tomb, layer) {
                if c != node && !self.is_deleted(c) && !pool.contains(&c) {
                    pool.push(c);
                }
            }
        }

        let candidates: Vec<(f32, u32)> = pool.iter().map(|&c| (pair_dist(node, c), c)).collect();
        let selected = select_neighbors(&candidates, self.m_max(layer), pair_dist);
        self.neighbors[node as usize][layer] = selected.iter().map(|&(_, id)| id).collect();
        stale.len()
    }
}
