//! Vector-similarity edge filter and the two-pass noise rejection built on it.
//!
//! A true grid step recurs all over the board, so its displacement vector has
//! many near-identical companions. An edge touching a spurious keypoint does
//! not.

use std::collections::HashMap;

use holegrid_core::{Bound, Keypoint};
use kiddo::{KdTree, SquaredEuclidean};
use serde::{Deserialize, Serialize};

use crate::graph::{build_edges, Edge};
use crate::GridNotFoundError;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Edge counts of one filter pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub candidate_edges: usize,
    pub kept_edges: usize,
}

/// Result of [`double_pass`].
#[derive(Clone, Debug)]
pub struct FilterOutcome {
    /// Edges surviving the second pass, sorted by `(from, to)`.
    pub edges: Vec<Edge>,
    /// Per input position, `true` if excluded from the second pass.
    pub noise: Vec<bool>,
    pub first_pass: PassStats,
    pub second_pass: PassStats,
}

impl FilterOutcome {
    pub fn noisy_count(&self) -> usize {
        self.noise.iter().filter(|&&n| n).count()
    }
}

/// Keep the edges whose displacement has at least `min_similar` companions
/// (itself included) within `margin` pixels.
///
/// Identical vectors are collapsed into one tree entry with a multiplicity;
/// exact lattices would otherwise stack many points on the same split value.
pub fn filter_edges(
    edges: &[Edge],
    margin: f32,
    min_similar: usize,
) -> Result<Vec<Edge>, GridNotFoundError> {
    if min_similar > edges.len() {
        return Err(GridNotFoundError::InsufficientCorroboration {
            required: min_similar,
            available: edges.len(),
        });
    }

    let mut distinct: Vec<[f64; 2]> = Vec::new();
    let mut multiplicity: Vec<usize> = Vec::new();
    let mut slot_by_bits: HashMap<(u32, u32), usize> = HashMap::new();
    let mut slot_of_edge = Vec::with_capacity(edges.len());
    for e in edges {
        let key = (e.vector.x.to_bits(), e.vector.y.to_bits());
        let slot = *slot_by_bits.entry(key).or_insert_with(|| {
            distinct.push([e.vector.x as f64, e.vector.y as f64]);
            multiplicity.push(0);
            distinct.len() - 1
        });
        multiplicity[slot] += 1;
        slot_of_edge.push(slot);
    }

    let tree: KdTree<f64, 2> = (&distinct).into();
    let radius_sq = (margin as f64).powi(2);
    let support: Vec<usize> = distinct
        .iter()
        .map(|query| {
            tree.within_unsorted::<SquaredEuclidean>(query, radius_sq)
                .iter()
                .map(|nn| multiplicity[nn.item as usize])
                .sum()
        })
        .collect();

    Ok(edges
        .iter()
        .zip(&slot_of_edge)
        .filter(|(_, &slot)| support[slot] >= min_similar)
        .map(|(e, _)| *e)
        .collect())
}

/// Filter, flag every keypoint left without a surviving edge as noise, rebuild
/// the graph without those keypoints and filter again.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(keypoints, bound), fields(points = keypoints.len()))
)]
pub fn double_pass(
    keypoints: &[Keypoint],
    bound: &Bound,
    margin: f32,
    min_similar: usize,
) -> Result<FilterOutcome, GridNotFoundError> {
    let clean = vec![false; keypoints.len()];
    let candidates = build_edges(keypoints, bound, &clean);
    let kept = filter_edges(&candidates, margin, min_similar)?;
    let first_pass = PassStats {
        candidate_edges: candidates.len(),
        kept_edges: kept.len(),
    };

    let mut touched = vec![false; keypoints.len()];
    for e in &kept {
        touched[e.from] = true;
        touched[e.to] = true;
    }
    let noise: Vec<bool> = touched.iter().map(|&t| !t).collect();
    log::debug!(
        "noise pass 1: kept {}/{} edges, {} points flagged",
        kept.len(),
        candidates.len(),
        noise.iter().filter(|&&n| n).count()
    );

    let candidates = build_edges(keypoints, bound, &noise);
    let edges = filter_edges(&candidates, margin, min_similar)?;
    let second_pass = PassStats {
        candidate_edges: candidates.len(),
        kept_edges: edges.len(),
    };
    log::debug!(
        "noise pass 2: kept {}/{} edges",
        edges.len(),
        candidates.len()
    );

    Ok(FilterOutcome {
        edges,
        noise,
        first_pass,
        second_pass,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::lattice;
    use nalgebra::Vector2;

    fn edge(from: usize, to: usize, x: f32, y: f32) -> Edge {
        Edge {
            from,
            to,
            vector: Vector2::new(x, y),
        }
    }

    #[test]
    fn keeps_only_corroborated_vectors() {
        let edges = vec![
            edge(0, 1, 10.0, 0.0),
            edge(1, 2, 10.3, 0.1),
            edge(2, 3, 9.8, -0.2),
            edge(3, 4, 0.0, 10.0),
            edge(4, 5, 25.0, 7.0),
        ];
        let kept = filter_edges(&edges, 0.7, 3).unwrap();
        let pairs: Vec<(usize, usize)> = kept.iter().map(|e| (e.from, e.to)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn duplicate_vectors_count_with_multiplicity() {
        let edges: Vec<Edge> = (0..40).map(|k| edge(k, k + 1, 5.0, 0.0)).collect();
        assert_eq!(filter_edges(&edges, 0.01, 40).unwrap().len(), 40);
    }

    #[test]
    fn threshold_above_edge_count_fails() {
        let edges = vec![edge(0, 1, 1.0, 0.0)];
        assert_eq!(
            filter_edges(&edges, 1.0, 2),
            Err(GridNotFoundError::InsufficientCorroboration {
                required: 2,
                available: 1
            })
        );
    }

    #[test]
    fn double_pass_flags_far_outlier() {
        let mut kps = lattice(3, 3, 5.0, 8.0);
        kps.push(Keypoint::new(9, 1000.0, 1000.0));
        let bound = Bound::from_keypoints(&kps).unwrap();

        let out = double_pass(&kps, &bound, 0.5, 2).unwrap();
        assert!(out.noise[9]);
        assert_eq!(out.noisy_count(), 1);
        assert_eq!(out.second_pass.kept_edges, 24);
        assert!(out.first_pass.candidate_edges > out.second_pass.candidate_edges);
        assert!(out.edges.iter().all(|e| e.from != 9 && e.to != 9));
    }

    #[test]
    fn second_pass_restores_edges_around_interior_noise() {
        // A stray point inside cell (2, 1) splits the neighbouring cells'
        // triangles, so pass 1 loses true steps next to it.
        let mut kps = lattice(7, 6, 30.0, 25.0);
        kps.push(Keypoint::new(42, 67.0, 40.0));
        let bound = Bound::from_keypoints(&kps).unwrap();

        let out = double_pass(&kps, &bound, 2.0, 4).unwrap();
        assert!(out.noise[42]);
        assert_eq!(out.noisy_count(), 1);
        assert!(out.first_pass.kept_edges < out.second_pass.kept_edges);
        assert_eq!(out.second_pass.kept_edges, 142);
    }
}
