//! Fit the labelled cells to the expected board shape.
//!
//! An exact fit is accepted as is. When the labelling spans more rows or
//! columns than the board (extra holes, reflections, a neighbouring object),
//! every board-sized window is scored by the number of step edges it contains
//! and the single best window is cropped out.

use std::collections::{BTreeMap, HashMap};

use holegrid_core::GridCoords;
use serde::{Deserialize, Serialize};

use crate::clustering::DirectionalEdges;
use crate::coords::Assignment;
use crate::{GridNotFoundError, GridShape};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Board-sized window chosen out of a larger labelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgridWindow {
    /// Coordinate of the window's `(0, 0)` cell before cropping.
    pub offset: GridCoords,
    /// Step edges with both ends inside the window.
    pub score: i64,
}

/// Cells fitted to the board shape, minimum corner at `(0, 0)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGrid {
    pub cells: BTreeMap<GridCoords, usize>,
    /// Set when the labelling was larger than the board.
    pub window: Option<SubgridWindow>,
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(assignment, directional), fields(cells = assignment.cells.len()))
)]
pub fn resolve_grid(
    assignment: &Assignment,
    shape: GridShape,
    directional: &DirectionalEdges,
) -> Result<ResolvedGrid, GridNotFoundError> {
    let (cols, rows) = assignment.extent();
    if cols < shape.cols || rows < shape.rows {
        return Err(GridNotFoundError::BoundingBoxTooSmall {
            rows,
            cols,
            expected_rows: shape.rows,
            expected_cols: shape.cols,
        });
    }
    if cols == shape.cols && rows == shape.rows {
        return Ok(ResolvedGrid {
            cells: assignment.cells.clone(),
            window: None,
        });
    }

    let coord_of: HashMap<usize, GridCoords> =
        assignment.cells.iter().map(|(&c, &pos)| (pos, c)).collect();

    let mut best_score = -1i64;
    let mut best: Vec<GridCoords> = Vec::new();
    for oj in 0..=(rows - shape.rows) as i32 {
        for oi in 0..=(cols - shape.cols) as i32 {
            let origin = GridCoords::new(oi, oj);
            let score = window_score(assignment, &coord_of, directional, origin, shape);
            log::trace!("resolve: window at {origin:?} scores {score}");
            if score < 0 {
                continue;
            }
            if score > best_score {
                best_score = score;
                best.clear();
                best.push(origin);
            } else if score == best_score {
                best.push(origin);
            }
        }
    }

    let origin = match best.as_slice() {
        [] => return Err(GridNotFoundError::NoValidSubgrid),
        [only] => *only,
        tied => {
            log::warn!(
                "resolve: {} windows tie at score {best_score}: {tied:?}",
                tied.len()
            );
            return Err(GridNotFoundError::AmbiguousSubgrid {
                score: best_score,
                candidates: tied.len(),
            });
        }
    };

    let cells = assignment
        .cells
        .iter()
        .filter(|(c, _)| inside(**c, origin, shape))
        .map(|(c, &pos)| (c.offset(-origin.i, -origin.j), pos))
        .collect();
    log::debug!("resolve: cropped {cols}x{rows} labelling at {origin:?} (score {best_score})");

    Ok(ResolvedGrid {
        cells,
        window: Some(SubgridWindow {
            offset: origin,
            score: best_score,
        }),
    })
}

#[inline]
fn inside(c: GridCoords, origin: GridCoords, shape: GridShape) -> bool {
    c.i >= origin.i
        && c.j >= origin.j
        && c.i < origin.i + shape.cols as i32
        && c.j < origin.j + shape.rows as i32
}

/// Step edges inside the window, or `-1` when any border row or column of the
/// window holds fewer than two cells.
fn window_score(
    assignment: &Assignment,
    coord_of: &HashMap<usize, GridCoords>,
    directional: &DirectionalEdges,
    origin: GridCoords,
    shape: GridShape,
) -> i64 {
    let last_i = origin.i + shape.cols as i32 - 1;
    let last_j = origin.j + shape.rows as i32 - 1;

    let mut first_row = 0;
    let mut last_row = 0;
    let mut first_col = 0;
    let mut last_col = 0;
    for c in assignment.cells.keys() {
        if !inside(*c, origin, shape) {
            continue;
        }
        if c.j == origin.j {
            first_row += 1;
        }
        if c.j == last_j {
            last_row += 1;
        }
        if c.i == origin.i {
            first_col += 1;
        }
        if c.i == last_i {
            last_col += 1;
        }
    }
    if [first_row, last_row, first_col, last_col]
        .iter()
        .any(|&n| n < 2)
    {
        return -1;
    }

    directional
        .iter()
        .filter(|(a, b)| match (coord_of.get(a), coord_of.get(b)) {
            (Some(ca), Some(cb)) => inside(*ca, origin, shape) && inside(*cb, origin, shape),
            _ => false,
        })
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    /// Row-major labelling of a full `cols x rows` block; position = j * cols + i.
    fn block(cols: usize, rows: usize) -> (Assignment, DirectionalEdges) {
        let mut cells = BTreeMap::new();
        let mut right = Vec::new();
        let mut up = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let pos = j * cols + i;
                cells.insert(GridCoords::new(i as i32, j as i32), pos);
                if i + 1 < cols {
                    right.push((pos, pos + 1));
                }
                if j + 1 < rows {
                    up.push((pos, pos + cols));
                }
            }
        }
        let dirs = DirectionalEdges {
            right,
            up,
            right_step: Vector2::new(1.0, 0.0),
            up_step: Vector2::new(0.0, 1.0),
            attempts: 1,
        };
        (
            Assignment {
                cells,
                conflicts: 0,
            },
            dirs,
        )
    }

    #[test]
    fn exact_fit_is_returned_unchanged() {
        let (a, d) = block(3, 3);
        let r = resolve_grid(&a, GridShape::new(3, 3), &d).unwrap();
        assert_eq!(r.cells, a.cells);
        assert!(r.window.is_none());
    }

    #[test]
    fn too_small_on_either_axis_fails() {
        let (a, d) = block(3, 2);
        assert_eq!(
            resolve_grid(&a, GridShape::new(3, 3), &d),
            Err(GridNotFoundError::BoundingBoxTooSmall {
                rows: 2,
                cols: 3,
                expected_rows: 3,
                expected_cols: 3
            })
        );
    }

    #[test]
    fn picks_best_connected_window() {
        // 3x3 block plus two cells in a fourth row under columns 0 and 1.
        let (mut a, mut d) = block(3, 3);
        a.cells.insert(GridCoords::new(0, 3), 9);
        a.cells.insert(GridCoords::new(1, 3), 10);
        d.right.push((9, 10));
        d.up.push((6, 9));
        d.up.push((7, 10));

        let r = resolve_grid(&a, GridShape::new(3, 3), &d).unwrap();
        let w = r.window.unwrap();
        assert_eq!(w.offset, GridCoords::new(0, 0));
        assert_eq!(w.score, 12);
        assert_eq!(r.cells.len(), 9);
        assert!(!r.cells.values().any(|&p| p == 9 || p == 10));
    }

    #[test]
    fn lower_window_wins_after_shift() {
        // Sparse first row: only two cells, weakly connected.
        let (mut a, mut d) = block(3, 4);
        a.cells.remove(&GridCoords::new(2, 0));
        d.right.retain(|&(x, y)| x != 2 && y != 2);
        d.up.retain(|&(x, y)| x != 2 && y != 2);

        let r = resolve_grid(&a, GridShape::new(3, 3), &d).unwrap();
        let w = r.window.unwrap();
        assert_eq!(w.offset, GridCoords::new(0, 1));
        assert_eq!(r.cells[&GridCoords::new(0, 0)], 3);
        assert_eq!(r.cells[&GridCoords::new(2, 2)], 11);
    }

    #[test]
    fn tied_windows_are_ambiguous() {
        let (a, d) = block(3, 4);
        assert_eq!(
            resolve_grid(&a, GridShape::new(3, 3), &d),
            Err(GridNotFoundError::AmbiguousSubgrid {
                score: 12,
                candidates: 2
            })
        );
    }

    #[test]
    fn sparse_borders_leave_no_valid_window() {
        // A plus shape: every 3x3 window has a border with a single cell.
        let mut cells = BTreeMap::new();
        for (pos, (i, j)) in [(1, 0), (0, 1), (1, 1), (2, 1), (1, 2), (1, 3)]
            .into_iter()
            .enumerate()
        {
            cells.insert(GridCoords::new(i, j), pos);
        }
        let a = Assignment {
            cells,
            conflicts: 0,
        };
        let (_, d) = block(1, 1);
        assert_eq!(
            resolve_grid(&a, GridShape::new(3, 3), &d),
            Err(GridNotFoundError::NoValidSubgrid)
        );
    }
}
