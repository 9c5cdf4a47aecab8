use std::collections::BTreeMap;

use holegrid_core::{GrayImage, GridCoords};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::noise::PassStats;
use crate::reference::ReferenceHomography;
use crate::resolve::SubgridWindow;
use crate::GridShape;

/// One detected hole.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// `Keypoint::index` of the hole center.
    pub keypoint: usize,
    /// Scene pixel position.
    pub position: Point2<f32>,
}

/// Grid coordinate to detected hole, ordered by `(i, j)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridMapping {
    cells: BTreeMap<GridCoords, GridCell>,
}

impl GridMapping {
    pub fn from_cells(cells: impl IntoIterator<Item = (GridCoords, GridCell)>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, coords: &GridCoords) -> Option<&GridCell> {
        self.cells.get(coords)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridCoords, &GridCell)> {
        self.cells.iter()
    }

    /// Coordinate to scene pixel, the form consumed by board readers and pose
    /// estimation.
    pub fn positions(&self) -> BTreeMap<GridCoords, Point2<f32>> {
        self.cells.iter().map(|(c, cell)| (*c, cell.position)).collect()
    }

    /// Cells of `shape` without a detected hole.
    pub fn missing_cells(&self, shape: GridShape) -> Vec<GridCoords> {
        let mut missing = Vec::new();
        for i in 0..shape.cols as i32 {
            for j in 0..shape.rows as i32 {
                let c = GridCoords::new(i, j);
                if !self.cells.contains_key(&c) {
                    missing.push(c);
                }
            }
        }
        missing
    }

    /// Flat list form for JSON output.
    pub fn entries(&self) -> Vec<GridCellEntry> {
        self.cells
            .iter()
            .map(|(c, cell)| GridCellEntry {
                i: c.i,
                j: c.j,
                keypoint: cell.keypoint,
                x: cell.position.x,
                y: cell.position.y,
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridCellEntry {
    pub i: i32,
    pub j: i32,
    pub keypoint: usize,
    pub x: f32,
    pub y: f32,
}

/// Per-stage counters of one detection run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub input_points: usize,
    pub noisy_points: usize,
    pub first_pass: PassStats,
    pub second_pass: PassStats,
    pub right_edges: usize,
    pub up_edges: usize,
    pub kmeans_attempts: usize,
    pub coordinate_conflicts: usize,
    /// Cells labelled by BFS before fitting to the board shape.
    pub labelled_cells: usize,
    #[serde(default)]
    pub window: Option<SubgridWindow>,
}

/// Output of [`crate::GridDetector::detect`].
#[derive(Clone, Debug)]
pub struct GridDetection {
    pub grid: GridMapping,
    /// Present when the detector has a reference layout.
    pub homography: Option<ReferenceHomography>,
    /// Present when both a scene image and a reference image are available.
    pub rectified: Option<GrayImage>,
    pub stats: DetectionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cells_lists_gaps() {
        let m = GridMapping::from_cells([
            (
                GridCoords::new(0, 0),
                GridCell {
                    keypoint: 3,
                    position: Point2::new(1.0, 2.0),
                },
            ),
            (
                GridCoords::new(1, 1),
                GridCell {
                    keypoint: 7,
                    position: Point2::new(6.0, 10.0),
                },
            ),
        ]);
        assert_eq!(
            m.missing_cells(GridShape::new(2, 2)),
            vec![GridCoords::new(0, 1), GridCoords::new(1, 0)]
        );
        assert_eq!(m.positions()[&GridCoords::new(1, 1)], Point2::new(6.0, 10.0));
        assert_eq!(m.entries()[1].keypoint, 7);
    }
}
