//! Diversity-aware neighbor selection (Algorithm 4 of the HNSW paper).
//!
//! Kept free of graph state so it can be checked against small hand-built
//! point sets. Callers pass the candidate list as `(distance_to_base, id)` and
//! a pairwise distance closure.

use std::cmp::Ordering;

/// Order candidates by distance, then by id so equal distances are deterministic.
#[inline]
pub fn cmp_candidates(a: &(f32, u32), b: &(f32, u32)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Choose at most `m` neighbors for a base node.
///
/// A candidate is accepted only if it is at least as close to the base as to
/// every neighbor already accepted; this keeps one representative per cluster
/// and lets edges reach in several directions. If fewer than `m` pass, the
/// closest rejected candidates back-fill the remaining slots so sparse regions
/// keep their full degree. Duplicate ids are ignored.
pub fn select_neighbors<P>(candidates: &[(f32, u32)], m: usize, pair_dist: P) -> Vec<(f32, u32)>
where
    P: Fn(u32, u32) -> f32,
{
    if m == 0 {
        return Vec::new();
    }
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(cmp_candidates);
    sorted.dedup_by_key(|c| c.1);

    if sorted.len() <= m {
        return sorted;
    }

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    let mut rejected: Vec<(f32, u32)> = Vec::new();

    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let is_diverse = selected
            .iter()
            .all(|&(_, sid)| dist_to_base <= pair_dist(cid, sid));
        if is_diverse {
            selected.push((dist_to_base, cid));
        } else {
            rejected.push((dist_to_base, cid));
        }
    }

    // rejected is already in ascending order
    for cand in rejected {
        if selected.len() >= m {
            break;
        }
        selected.push(cand);
    }

    selected.sort_unstable_by(cmp_candidates);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points on a line, id = index.
    fn line_dist(points: &[f32]) -> impl Fn(u32, u32) -> f32 + '_ {
        move |a, b| (points[a as usize] - points[b as usize]).abs()
    }

    #[test]
    fn test_returns_all_when_under_capacity() {
        let points = [0.0, 1.0, 2.0];
        let cands = vec![(2.0, 2), (1.0, 1)];
        let out = select_neighbors(&cands, 4, line_dist(&points));
        assert_eq!(out, vec![(1.0, 1), (2.0, 2)]);
    }

    #[test]
    fn test_prefers_diverse_directions() {
        // Base at 0.0 (id 0). Cluster on the right at 1.0, 1.1, 1.2 and one point on the left at -1.5.
        let points = [0.0, 1.0, 1.1, 1.2, -1.5];
        let base = 0.0f32;
        let cands: Vec<(f32, u32)> = (1..5u32)
            .map(|id| ((points[id as usize] - base).abs(), id))
            .collect();
        let out = select_neighbors(&cands, 2, line_dist(&points));
        let ids: Vec<u32> = out.iter().map(|c| c.1).collect();
        // Plain closest-2 would return {1, 2}; the heuristic keeps 1 and the left point.
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_backfills_with_closest_rejected() {
        let points = [0.0, 1.0, 1.1, 1.2, 1.3];
        let cands: Vec<(f32, u32)> = (1..5u32).map(|id| (points[id as usize], id)).collect();
        let out = select_neighbors(&cands, 3, line_dist(&points));
        let ids: Vec<u32> = out.iter().map(|c| c.1).collect();
        // Only id 1 is diverse; 2 and 3 back-fill in distance order.
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_ties_broken_by_lower_id() {
        let points = [0.0, 1.0, -1.0, 1.0, -1.0];
        let cands = vec![(1.0, 4), (1.0, 3), (1.0, 2), (1.0, 1)];
        let out = select_neighbors(&cands, 2, line_dist(&points));
        assert_eq!(out, vec![(1.0, 1), (1.0, 2)]);
    }

    #[test]
    fn test_duplicates_ignored() {
        let points = [0.0, 1.0, 2.0, 3.0];
        let cands = vec![(1.0, 1), (1.0, 1), (2.0, 2), (3.0, 3)];
        let out = select_neighbors(&cands, 2, line_dist(&points));
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].1, out[1].1);
    }

    #[test]
    fn test_zero_capacity() {
        let points = [0.0, 1.0];
        assert!(select_neighbors(&[(1.0, 1)], 0, line_dist(&points)).is_empty());
    }
}
