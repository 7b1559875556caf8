//! HNSW search algorithms: single-layer beam search and multi-layer KNN.
//!
//! Distances come from a caller-supplied `Fn(u32) -> f32` (exact floats or a
//! quantizer lookup table). An `accept` predicate decides which visited nodes
//! may become results; rejected nodes (tombstones, filter misses) are still
//! used for navigation.

use crate::config;
use crate::error::{IndexError, Result};
use crate::hnsw::graph::HnswGraph;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::collections::BinaryHeap;
use std::time::Instant;

thread_local! {
    /// Per-thread visited set reused across searches on the same thread.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// Optional wall-clock limit for a traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchBudget {
    deadline: Option<Instant>,
    expansions: usize,
    expired: bool,
}

impl SearchBudget {
    /// No time limit.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Stop traversal once `deadline` has passed.
    pub fn until(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn from_deadline(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            ..Self::default()
        }
    }

    /// Whether traversal was cut short by the deadline.
    pub fn expired(&self) -> bool {
        self.expired
    }

    /// Count one expansion; reads the clock every `DEADLINE_CHECK_INTERVAL` calls.
    #[inline]
    fn tick(&mut self) -> bool {
        if self.expired {
            return true;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };
        self.expansions += 1;
        if self.expansions % config::DEADLINE_CHECK_INTERVAL == 1 && Instant::now() >= deadline {
            self.expired = true;
        }
        self.expired
    }
}

/// A candidate during search. `BinaryHeap` is a max-heap, so the distance is
/// negated to pop the closest first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance
            .cmp(&other.neg_distance)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A result entry. Max-heap by `(distance, id)` so the worst result pops first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Adds `entry`, trimming the heap back to `ef` entries. Entries tied with the
/// `ef`-th distance are all kept, so callers can break ties by their own key.
fn push_result(results: &mut BinaryHeap<ResultEntry>, entry: ResultEntry, ef: usize) {
    results.push(entry);
    if results.len() <= ef {
        return;
    }
    let Some(worst) = results.pop() else {
        return;
    };
    match results.peek() {
        Some(next) if next.distance == worst.distance => {
            results.push(worst.clone());
            let tied = results
                .iter()
                .filter(|r| r.distance == worst.distance)
                .count();
            if results.len() - tied >= ef {
                for _ in 0..tied {
                    results.pop();
                }
            }
        }
        _ => {}
    }
}

/// Beam search over one layer.
///
/// Returns at least the best `ef` accepted nodes sorted by ascending
/// `(distance, id)`, plus every node tied with the `ef`-th distance.
/// `visited` is cleared at the start of each call.
#[allow(clippy::too_many_arguments)]
pub fn search_layer<D, A>(
    graph: &HnswGraph,
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    dist_fn: &D,
    accept: &A,
    budget: &mut SearchBudget,
) -> Vec<(f32, u32)>
where
    D: Fn(u32) -> f32,
    A: Fn(u32) -> bool,
{
    visited.clear();
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);
    // Cached worst distance; avoids repeated heap peeks in the hot loop
    let mut worst_dist = f32::MAX;

    for &ep in entry_points {
        if visited.insert(ep) {
            let dist = dist_fn(ep);
            candidates.push(Candidate {
                neg_distance: OrderedFloat(-dist),
                id: ep,
            });
            if accept(ep) {
                push_result(
                    &mut results,
                    ResultEntry {
                        distance: OrderedFloat(dist),
                        id: ep,
                    },
                    ef,
                );
                if results.len() >= ef {
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    while let Some(candidate) = candidates.pop() {
        if budget.tick() {
            break;
        }
        let c_dist = -candidate.neg_distance.0;

        // Closest unexpanded candidate is farther than the worst kept result
        if results.len() >= ef && c_dist > worst_dist {
            break;
        }

        for &neighbor_id in graph.neighbors_at(candidate.id, layer) {
            if !visited.insert(neighbor_id) {
                continue;
            }

            let dist = dist_fn(neighbor_id);
            // Ties with the worst kept result still enter so no equal-distance
            // node is lost to visiting order
            if results.len() < ef || dist <= worst_dist {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-dist),
                    id: neighbor_id,
                });
                if accept(neighbor_id) {
                    push_result(
                        &mut results,
                        ResultEntry {
                            distance: OrderedFloat(dist),
                            id: neighbor_id,
                        },
                        ef,
                    );
                    if results.len() >= ef {
                        worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                    }
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.id))
        .collect()
}

/// Walk from the entry point down to layer `target + 1` with beam width 1.
/// Returns the closest node found at the last layer walked.
pub(crate) fn greedy_descent<D>(
    graph: &HnswGraph,
    start: u32,
    from_layer: usize,
    target: usize,
    visited: &mut VisitedSet,
    dist_fn: &D,
    budget: &mut SearchBudget,
) -> u32
where
    D: Fn(u32) -> f32,
{
    let accept_all = |_: u32| true;
    let mut current = start;
    for layer in (target + 1..=from_layer).rev() {
        let found = search_layer(
            graph,
            std::slice::from_ref(&current),
            1,
            layer,
            visited,
            dist_fn,
            &accept_all,
            budget,
        );
        if let Some(&(_, nearest)) = found.first() {
            current = nearest;
        }
    }
    current
}

impl HnswGraph {
    /// Multi-layer KNN search.
    ///
    /// Greedy descent through the upper layers, then a beam of width `ef` at
    /// layer 0. Returns the best `ef` accepted nodes ordered by `(distance, id)`,
    /// extended by any nodes tied with the `ef`-th distance; the caller
    /// truncates to `k` after reranking and its own tie-break. An empty graph yields
    /// an empty list. An out-of-bounds entry point is reported as
    /// [`IndexError::CorruptIndex`].
    pub fn knn_search<D, A>(
        &self,
        ef: usize,
        dist_fn: &D,
        accept: &A,
        budget: &mut SearchBudget,
    ) -> Result<Vec<(f32, u32)>>
    where
        D: Fn(u32) -> f32,
        A: Fn(u32) -> bool,
    {
        let entry_point = match self.entry_point {
            Some(ep) => ep,
            None => return Ok(Vec::new()),
        };
        if entry_point as usize >= self.node_count() {
            tracing::error!(
                entry_point,
                node_count = self.node_count(),
                "entry point out of bounds"
            );
            return Err(IndexError::CorruptIndex(format!(
                "entry point {} >= node count {}",
                entry_point,
                self.node_count()
            )));
        }

        let results = SEARCH_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();
            visited.ensure_capacity(self.node_count());

            let current = greedy_descent(
                self,
                entry_point,
                self.max_layer,
                0,
                &mut visited,
                dist_fn,
                budget,
            );
            search_layer(
                self,
                std::slice::from_ref(&current),
                ef.max(1),
                0,
                &mut visited,
                dist_fn,
                accept,
                budget,
            )
        });

        if budget.expired() {
            tracing::debug!(found = results.len(), ef, "search deadline reached");
        }
        Ok(results)
    }
}
