//! Candidate neighbour graph over keypoints.
//!
//! A Delaunay triangulation of the usable keypoints gives an O(n) set of
//! candidate neighbour pairs. On a near-rectangular lattice every cell is split
//! into two triangles whose longest side is the cell diagonal; those sides are
//! dropped so that only axis steps remain.

use std::collections::BTreeSet;

use delaunator::{triangulate, Point};
use holegrid_core::{Bound, Keypoint};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Directed edge between two keypoints, identified by their slice positions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    /// `position[to] - position[from]`.
    pub vector: Vector2<f32>,
}

/// Build the directed candidate edges among keypoints that are inside `bound`
/// and not flagged in `noise`.
///
/// The result is sorted by `(from, to)`. Fewer than three usable points or a
/// collinear set produce no edges.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(keypoints, noise), fields(points = keypoints.len()))
)]
pub fn build_edges(keypoints: &[Keypoint], bound: &Bound, noise: &[bool]) -> Vec<Edge> {
    let usable: Vec<usize> = keypoints
        .iter()
        .enumerate()
        .filter(|(pos, kp)| !noise.get(*pos).copied().unwrap_or(false) && bound.contains(kp.position))
        .map(|(pos, _)| pos)
        .collect();
    if usable.len() < 3 {
        return Vec::new();
    }

    let points: Vec<Point> = usable
        .iter()
        .map(|&pos| Point {
            x: keypoints[pos].position.x as f64,
            y: keypoints[pos].position.y as f64,
        })
        .collect();
    let triangulation = triangulate(&points);

    let mut sides = BTreeSet::new();
    let mut diagonals = BTreeSet::new();
    for tri in triangulation.triangles.chunks_exact(3) {
        let corners = [usable[tri[0]], usable[tri[1]], usable[tri[2]]];
        let mut longest = None;
        let mut longest_len = f32::NEG_INFINITY;
        for k in 0..3 {
            let side = undirected(corners[k], corners[(k + 1) % 3]);
            let len = (keypoints[side.1].position - keypoints[side.0].position).norm_squared();
            if len > longest_len {
                longest_len = len;
                longest = Some(side);
            }
            sides.insert(side);
        }
        if let Some(side) = longest {
            diagonals.insert(side);
        }
    }

    let mut edges = Vec::with_capacity(2 * sides.len());
    for &(a, b) in sides.difference(&diagonals) {
        let v = keypoints[b].position - keypoints[a].position;
        edges.push(Edge {
            from: a,
            to: b,
            vector: v,
        });
        edges.push(Edge {
            from: b,
            to: a,
            vector: -v,
        });
    }
    edges.sort_by_key(|e| (e.from, e.to));

    log::debug!(
        "graph: {} usable points, {} triangles, {} directed edges ({} long sides dropped)",
        usable.len(),
        triangulation.triangles.len() / 3,
        edges.len(),
        diagonals.len()
    );
    edges
}

#[inline]
fn undirected(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
