//! BFS labelling of keypoints with integer grid coordinates.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use holegrid_core::GridCoords;

use crate::clustering::DirectionalEdges;
use crate::GridNotFoundError;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Normalized coordinate labelling produced by [`assign_coordinates`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assignment {
    /// Grid coordinate to keypoint slice position; minimum corner is `(0, 0)`.
    pub cells: BTreeMap<GridCoords, usize>,
    /// Transitions that disagreed with an existing label, plus coordinates
    /// claimed by more than one keypoint.
    pub conflicts: usize,
}

impl Assignment {
    /// Number of columns and rows spanned by the labelled cells.
    pub fn extent(&self) -> (usize, usize) {
        let Some(max_i) = self.cells.keys().map(|c| c.i).max() else {
            return (0, 0);
        };
        let max_j = self.cells.keys().map(|c| c.j).max().unwrap_or(0);
        ((max_i + 1) as usize, (max_j + 1) as usize)
    }
}

/// Walk the step graph breadth-first from the first non-noisy keypoint and
/// label every reachable keypoint.
///
/// A `right` edge `(a, b)` moves one column forward from `a` to `b`; an `up`
/// edge moves one row forward. Both are also walked backwards. The first
/// label a keypoint receives is final. When the start keypoint has no `right`
/// edge in either direction it is returned alone at `(0, 0)`.
///
/// With `strict` set, any contradiction is an error instead of a warning.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(directional, noise), fields(steps = directional.len()))
)]
pub fn assign_coordinates(
    directional: &DirectionalEdges,
    len: usize,
    noise: &[bool],
    strict: bool,
) -> Result<Assignment, GridNotFoundError> {
    let is_noisy = |pos: usize| noise.get(pos).copied().unwrap_or(false);

    let mut adjacency: Vec<Vec<(usize, i32, i32)>> = vec![Vec::new(); len];
    let mut link = |a: usize, b: usize, di: i32, dj: i32| {
        if a < len && b < len && !is_noisy(a) && !is_noisy(b) {
            adjacency[a].push((b, di, dj));
            adjacency[b].push((a, -di, -dj));
        }
    };
    for &(a, b) in &directional.right {
        link(a, b, 1, 0);
    }
    for &(a, b) in &directional.up {
        link(a, b, 0, 1);
    }

    let Some(start) = (0..len).find(|&p| !is_noisy(p)) else {
        return Ok(Assignment::default());
    };
    if !adjacency[start].iter().any(|&(_, di, _)| di != 0) {
        log::debug!("coords: start {start} has no right edge, single-point mapping");
        return Ok(Assignment {
            cells: BTreeMap::from([(GridCoords::new(0, 0), start)]),
            conflicts: 0,
        });
    }

    let mut label: Vec<Option<GridCoords>> = vec![None; len];
    let mut cells: BTreeMap<GridCoords, usize> = BTreeMap::new();
    let mut duplicate_claims = 0usize;
    let mut contradicting: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut queue = VecDeque::new();

    label[start] = Some(GridCoords::new(0, 0));
    cells.insert(GridCoords::new(0, 0), start);
    queue.push_back(start);

    while let Some(u) = queue.pop_front() {
        let Some(here) = label[u] else {
            continue;
        };
        for &(v, di, dj) in &adjacency[u] {
            let implied = here.offset(di, dj);
            match label[v] {
                Some(existing) => {
                    if existing != implied {
                        contradicting.insert((u.min(v), u.max(v)));
                    }
                }
                None => {
                    label[v] = Some(implied);
                    if let Some(&owner) = cells.get(&implied) {
                        log::debug!("coords: {implied:?} held by {owner}, {v} dropped");
                        duplicate_claims += 1;
                    } else {
                        cells.insert(implied, v);
                        queue.push_back(v);
                    }
                }
            }
        }
    }

    let conflicts = duplicate_claims + contradicting.len();
    if conflicts > 0 {
        log::warn!("coords: {conflicts} contradicting transitions during BFS");
        if strict {
            return Err(GridNotFoundError::InconsistentCoordinates { conflicts });
        }
    }

    let min_i = cells.keys().map(|c| c.i).min().unwrap_or(0);
    let min_j = cells.keys().map(|c| c.j).min().unwrap_or(0);
    let cells = cells
        .into_iter()
        .map(|(c, pos)| (c.offset(-min_i, -min_j), pos))
        .collect();

    Ok(Assignment { cells, conflicts })
}
