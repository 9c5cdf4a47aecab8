use holegrid_core::RansacParams;
use serde::{Deserialize, Serialize};

use super::GridConfigError;

/// Expected board size in holes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl Default for GridShape {
    /// The 6-row, 7-column game board.
    fn default() -> Self {
        Self::new(6, 7)
    }
}

/// Image direction in which the row index grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowDirection {
    /// Rows grow with image `y` (downwards in the usual raster convention).
    #[default]
    PositiveY,
    /// Rows grow against image `y`.
    NegativeY,
}

/// k-means settings for the directional clusterer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringParams {
    /// Lloyd iterations per attempt.
    pub max_iters: usize,
    /// Attempts before giving up on empty clusters; attempt `n` uses `seed + n`.
    pub max_attempts: usize,
    pub seed: u64,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            max_iters: 50,
            max_attempts: 10,
            seed: 0,
        }
    }
}

/// Configuration for [`crate::GridDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridDetectorParams {
    pub shape: GridShape,
    /// Two displacement vectors closer than this (pixels) count as similar.
    pub pixel_error_margin: f32,
    /// Similar vectors (the edge itself included) needed to keep an edge.
    pub min_similar_vectors: usize,
    pub row_direction: RowDirection,
    pub clustering: ClusteringParams,
    pub ransac: RansacParams,
    /// Fail on BFS coordinate contradictions instead of keeping the first
    /// assignment.
    pub strict_consistency: bool,
}

impl Default for GridDetectorParams {
    fn default() -> Self {
        Self {
            shape: GridShape::default(),
            pixel_error_margin: 2.0,
            min_similar_vectors: 4,
            row_direction: RowDirection::default(),
            clustering: ClusteringParams::default(),
            ransac: RansacParams::default(),
            strict_consistency: false,
        }
    }
}

impl GridDetectorParams {
    /// Defaults for a board of the given shape.
    pub fn for_shape(rows: usize, cols: usize) -> Self {
        Self {
            shape: GridShape::new(rows, cols),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GridConfigError> {
        if self.shape.rows == 0 || self.shape.cols == 0 {
            return Err(GridConfigError::EmptyShape {
                rows: self.shape.rows,
                cols: self.shape.cols,
            });
        }
        if self.min_similar_vectors == 0 {
            return Err(GridConfigError::ZeroMinSimilar);
        }
        if !self.pixel_error_margin.is_finite() || self.pixel_error_margin < 0.0 {
            return Err(GridConfigError::InvalidMargin(self.pixel_error_margin));
        }
        if self.clustering.max_attempts == 0 {
            return Err(GridConfigError::ZeroClusteringAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_six_by_seven() {
        let p = GridDetectorParams::default();
        assert_eq!(p.shape, GridShape::new(6, 7));
        assert_eq!(p.shape.cell_count(), 42);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p: GridDetectorParams =
            serde_json::from_str(r#"{"shape":{"rows":3,"cols":3},"row_direction":"negative_y"}"#)
                .unwrap();
        assert_eq!(p.shape, GridShape::new(3, 3));
        assert_eq!(p.row_direction, RowDirection::NegativeY);
        assert_eq!(p.min_similar_vectors, 4);
        assert_eq!(p.clustering.max_attempts, 10);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut p = GridDetectorParams::for_shape(0, 7);
        assert!(matches!(
            p.validate(),
            Err(GridConfigError::EmptyShape { rows: 0, cols: 7 })
        ));
        p.shape = GridShape::new(6, 7);
        p.pixel_error_margin = f32::NAN;
        assert!(matches!(p.validate(), Err(GridConfigError::InvalidMargin(_))));
        p.pixel_error_margin = 1.0;
        p.min_similar_vectors = 0;
        assert_eq!(p.validate(), Err(GridConfigError::ZeroMinSimilar));
    }
}
