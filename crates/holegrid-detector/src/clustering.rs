//! Split filtered edges into the four grid step directions.
//!
//! On a clean board the surviving displacement vectors form four tight blobs:
//! one column right, one column left, one row forward and one row back. A
//! seeded k-means (k = 4) finds them; only the "right" and "row forward" blobs
//! are kept, the other two are their reverses.

use nalgebra::Vector2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::graph::Edge;
use crate::{ClusteringParams, GridNotFoundError, RowDirection};

#[cfg(feature = "tracing")]
use tracing::instrument;

const K: usize = 4;

/// Edges classified as single grid steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectionalEdges {
    /// `(from, to)` pairs where `to` is one column to the right of `from`.
    pub right: Vec<(usize, usize)>,
    /// `(from, to)` pairs where `to` is one row further than `from`.
    pub up: Vec<(usize, usize)>,
    /// Centroid of the `right` cluster, in pixels.
    pub right_step: Vector2<f32>,
    /// Centroid of the `up` cluster, in pixels.
    pub up_step: Vector2<f32>,
    /// k-means attempts used, starting at 1.
    pub attempts: usize,
}

impl DirectionalEdges {
    /// Iterate over all step edges, `right` first.
    pub fn iter(&self) -> impl Iterator<Item = &(usize, usize)> {
        self.right.iter().chain(self.up.iter())
    }

    pub fn len(&self) -> usize {
        self.right.len() + self.up.len()
    }

    pub fn is_empty(&self) -> bool {
        self.right.is_empty() && self.up.is_empty()
    }
}

/// Cluster edge displacements into four directions and pick `right` / `up`.
///
/// `right` is the cluster with the largest centroid `x`. `up` is chosen among
/// the remaining three by centroid `y`, largest for [`RowDirection::PositiveY`]
/// and smallest for [`RowDirection::NegativeY`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(edges, params), fields(edges = edges.len()))
)]
pub fn cluster_directions(
    edges: &[Edge],
    params: &ClusteringParams,
    row_direction: RowDirection,
) -> Result<DirectionalEdges, GridNotFoundError> {
    if edges.is_empty() {
        return Err(GridNotFoundError::NoDirectionalSignal);
    }

    let data: Vec<Vector2<f64>> = edges.iter().map(|e| e.vector.cast::<f64>()).collect();

    let attempts = params.max_attempts.max(1);
    for attempt in 0..attempts {
        let seed = params.seed.wrapping_add(attempt as u64);
        let Some((centroids, labels)) = kmeans(&data, params.max_iters, seed) else {
            log::warn!("k-means attempt {} (seed {seed}) left an empty cluster", attempt + 1);
            continue;
        };

        let right = argmax_by(&centroids, |c| c.x, |_| true);
        let up = match row_direction {
            RowDirection::PositiveY => argmax_by(&centroids, |c| c.y, |k| k != right),
            RowDirection::NegativeY => argmax_by(&centroids, |c| -c.y, |k| k != right),
        };

        let pick = |cluster: usize| -> Vec<(usize, usize)> {
            edges
                .iter()
                .zip(&labels)
                .filter(|(_, &l)| l == cluster)
                .map(|(e, _)| (e.from, e.to))
                .collect()
        };

        let out = DirectionalEdges {
            right: pick(right),
            up: pick(up),
            right_step: centroids[right].cast::<f32>(),
            up_step: centroids[up].cast::<f32>(),
            attempts: attempt + 1,
        };
        log::debug!(
            "directions: right {:?} ({} edges), up {:?} ({} edges)",
            out.right_step.as_slice(),
            out.right.len(),
            out.up_step.as_slice(),
            out.up.len()
        );
        return Ok(out);
    }

    Err(GridNotFoundError::DegenerateClustering { attempts })
}

fn argmax_by(
    centroids: &[Vector2<f64>; K],
    key: impl Fn(&Vector2<f64>) -> f64,
    allowed: impl Fn(usize) -> bool,
) -> usize {
    let mut best = usize::MAX;
    let mut best_val = f64::NEG_INFINITY;
    for (k, c) in centroids.iter().enumerate() {
        if !allowed(k) {
            continue;
        }
        let v = key(c);
        if best == usize::MAX || v > best_val {
            best = k;
            best_val = v;
        }
    }
    best
}

fn nearest(centroids: &[Vector2<f64>], p: &Vector2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (k, c) in centroids.iter().enumerate() {
        let d = (p - c).norm_squared();
        if d < best.1 {
            best = (k, d);
        }
    }
    best
}

/// k-means++ seeding followed by Lloyd iterations. `None` if any cluster ends
/// up empty.
fn kmeans(
    data: &[Vector2<f64>],
    max_iters: usize,
    seed: u64,
) -> Option<([Vector2<f64>; K], Vec<usize>)> {
    let n = data.len();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut seeds: Vec<Vector2<f64>> = Vec::with_capacity(K);
    seeds.push(data[rng.random_range(0..n)]);
    while seeds.len() < K {
        let d2: Vec<f64> = data.iter().map(|p| nearest(&seeds, p).1).collect();
        let total: f64 = d2.iter().sum();
        let idx = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &w) in d2.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            rng.random_range(0..n)
        };
        seeds.push(data[idx]);
    }
    let mut centroids = [seeds[0], seeds[1], seeds[2], seeds[3]];

    let mut labels = vec![usize::MAX; n];
    for _ in 0..max_iters.max(1) {
        let mut changed = false;
        for (label, p) in labels.iter_mut().zip(data) {
            let (k, _) = nearest(&centroids, p);
            if *label != k {
                *label = k;
                changed = true;
            }
        }

        let mut sums = [Vector2::<f64>::zeros(); K];
        let mut counts = [0usize; K];
        for (&k, p) in labels.iter().zip(data) {
            sums[k] += p;
            counts[k] += 1;
        }
        if counts.contains(&0) {
            return None;
        }
        for k in 0..K {
            centroids[k] = sums[k] / counts[k] as f64;
        }

        if !changed {
            break;
        }
    }

    Some((centroids, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_edges, tests::lattice};
    use approx::assert_relative_eq;
    use holegrid_core::Bound;

    fn lattice_edges() -> Vec<Edge> {
        let kps = lattice(3, 3, 5.0, 8.0);
        build_edges(&kps, &Bound::new(-1.0, -1.0, 100.0, 100.0), &[false; 9])
    }

    #[test]
    fn finds_right_and_up_on_lattice() {
        let edges = lattice_edges();
        let dirs =
            cluster_directions(&edges, &ClusteringParams::default(), RowDirection::PositiveY)
                .unwrap();

        assert_eq!(dirs.right.len(), 6);
        assert_eq!(dirs.up.len(), 6);
        assert_relative_eq!(dirs.right_step.x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(dirs.right_step.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(dirs.up_step.y, 8.0, epsilon = 1e-5);
        // Row-major lattice: right steps go k -> k+1, up steps k -> k+3.
        assert!(dirs.right.iter().all(|&(a, b)| b == a + 1));
        assert!(dirs.up.iter().all(|&(a, b)| b == a + 3));
        assert!(dirs.right.iter().all(|p| !dirs.up.contains(p)));
    }

    #[test]
    fn negative_row_direction_flips_up() {
        let edges = lattice_edges();
        let dirs =
            cluster_directions(&edges, &ClusteringParams::default(), RowDirection::NegativeY)
                .unwrap();
        assert_relative_eq!(dirs.up_step.y, -8.0, epsilon = 1e-5);
        assert!(dirs.up.iter().all(|&(a, b)| a == b + 3));
    }

    #[test]
    fn same_seed_same_clusters() {
        let edges = lattice_edges();
        let params = ClusteringParams {
            seed: 42,
            ..ClusteringParams::default()
        };
        let a = cluster_directions(&edges, &params, RowDirection::PositiveY).unwrap();
        let b = cluster_directions(&edges, &params, RowDirection::PositiveY).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_has_no_signal() {
        assert_eq!(
            cluster_directions(&[], &ClusteringParams::default(), RowDirection::PositiveY),
            Err(GridNotFoundError::NoDirectionalSignal)
        );
    }

    #[test]
    fn single_direction_is_degenerate() {
        let edges: Vec<Edge> = (0..8)
            .map(|k| Edge {
                from: k,
                to: k + 1,
                vector: Vector2::new(5.0, 0.0),
            })
            .collect();
        let params = ClusteringParams {
            max_attempts: 3,
            ..ClusteringParams::default()
        };
        assert_eq!(
            cluster_directions(&edges, &params, RowDirection::PositiveY),
            Err(GridNotFoundError::DegenerateClustering { attempts: 3 })
        );
    }
}
