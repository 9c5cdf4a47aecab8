use holegrid_core::GridCoords;
use serde::{Deserialize, Serialize};

/// Reasons a detection run fails to produce a grid.
///
/// Every variant is terminal for the run; callers usually treat any of them as
/// "no board in this frame" and move on to the next one.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridNotFoundError {
    #[error("need {required} similar displacement vectors but only {available} edges exist")]
    InsufficientCorroboration { required: usize, available: usize },
    #[error("no directional edges survived noise filtering")]
    NoDirectionalSignal,
    #[error("k-means left an empty cluster in all {attempts} attempts")]
    DegenerateClustering { attempts: usize },
    #[error("coordinate assignment found {conflicts} contradicting transitions")]
    InconsistentCoordinates { conflicts: usize },
    #[error("reachable grid is {cols}x{rows} (cols x rows), expected at least {expected_cols}x{expected_rows}")]
    BoundingBoxTooSmall {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("{candidates} sub-grids tie for the best connection score {score}")]
    AmbiguousSubgrid { score: i64, candidates: usize },
    #[error("no sub-grid passes the edge occupancy check")]
    NoValidSubgrid,
    #[error("reference layout lacks {} detected cells", missing.len())]
    ReferenceMismatch { missing: Vec<GridCoords> },
    #[error("homography estimation failed")]
    HomographyFailed,
}

/// Flat reason code of a [`GridNotFoundError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridNotFoundKind {
    InsufficientCorroboration,
    NoDirectionalSignal,
    DegenerateClustering,
    InconsistentCoordinates,
    BoundingBoxTooSmall,
    AmbiguousSubgrid,
    NoValidSubgrid,
    ReferenceMismatch,
    HomographyFailed,
}

impl GridNotFoundError {
    pub fn kind(&self) -> GridNotFoundKind {
        match self {
            Self::InsufficientCorroboration { .. } => GridNotFoundKind::InsufficientCorroboration,
            Self::NoDirectionalSignal => GridNotFoundKind::NoDirectionalSignal,
            Self::DegenerateClustering { .. } => GridNotFoundKind::DegenerateClustering,
            Self::InconsistentCoordinates { .. } => GridNotFoundKind::InconsistentCoordinates,
            Self::BoundingBoxTooSmall { .. } => GridNotFoundKind::BoundingBoxTooSmall,
            Self::AmbiguousSubgrid { .. } => GridNotFoundKind::AmbiguousSubgrid,
            Self::NoValidSubgrid => GridNotFoundKind::NoValidSubgrid,
            Self::ReferenceMismatch { .. } => GridNotFoundKind::ReferenceMismatch,
            Self::HomographyFailed => GridNotFoundKind::HomographyFailed,
        }
    }
}

/// Rejected detector configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridConfigError {
    #[error("grid shape must have at least one row and one column (got {rows}x{cols})")]
    EmptyShape { rows: usize, cols: usize },
    #[error("min_similar_vectors must be positive")]
    ZeroMinSimilar,
    #[error("pixel_error_margin must be finite and non-negative (got {0})")]
    InvalidMargin(f32),
    #[error("clustering.max_attempts must be positive")]
    ZeroClusteringAttempts,
    #[error("reference layout is missing {} cells of the expected grid", missing.len())]
    IncompleteReference { missing: Vec<GridCoords> },
    #[error("reference image buffer has {actual} bytes, expected {expected}")]
    ReferenceImageSize { expected: usize, actual: usize },
}
