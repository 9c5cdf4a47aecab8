//! Hole-grid detection pipeline.
//!
//! This module wires the stages together: candidate graph, two-pass noise
//! filter, directional clustering, BFS labelling, fitting to the board shape
//! and, when a reference layout is configured, homography and rectification.

mod error;
mod params;
mod pipeline;
mod result;

pub use error::{GridConfigError, GridNotFoundError, GridNotFoundKind};
pub use params::{ClusteringParams, GridDetectorParams, GridShape, RowDirection};
pub use pipeline::GridDetector;
pub use result::{DetectionStats, GridCell, GridCellEntry, GridDetection, GridMapping};
