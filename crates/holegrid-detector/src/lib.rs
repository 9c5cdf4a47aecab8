//! Detection of a known rectangular grid of holes in a noisy point cloud.
//!
//! Input is an unordered set of candidate hole centers from any circle or blob
//! detector. Output is an integer `(column, row)` label for each hole of the
//! board and, given a reference layout, the homography to that layout.
//!
//! Stages, each usable on its own:
//! - [`graph`]: Delaunay candidate edges without cell diagonals,
//! - [`noise`]: vector-similarity filter run twice around outlier removal,
//! - [`clustering`]: k-means split of edge vectors into grid directions,
//! - [`coords`]: BFS coordinate labelling,
//! - [`resolve`]: fitting the labelling to the board shape,
//! - [`reference`]: homography to the reference layout and rectification.

pub mod clustering;
pub mod coords;
mod detector;
pub mod graph;
mod io;
pub mod noise;
pub mod reference;
pub mod resolve;

pub use clustering::DirectionalEdges;
pub use detector::{
    ClusteringParams, DetectionStats, GridCell, GridCellEntry, GridConfigError, GridDetection,
    GridDetector, GridDetectorParams, GridMapping, GridNotFoundError, GridNotFoundKind, GridShape,
    RowDirection,
};
pub use graph::Edge;
pub use io::{GridDetectConfig, GridDetectReport, GridIoError, ReferenceLayoutSpec};
pub use reference::{ReferenceBoard, ReferenceHomography};

pub use holegrid_core::{Bound, GridCoords, Keypoint, RansacParams};
