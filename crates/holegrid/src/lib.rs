//! High-level facade crate for the `holegrid-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core geometry and the detector crates,
//! - (feature-gated) helpers that run the detector on an `image::GrayImage`
//!   so the board extent and the rectified output come from real images.
//!
//! ## Quickstart
//!
//! ```no_run
//! use holegrid::detect;
//! use holegrid::{GridDetector, GridDetectorParams, GridShape, ReferenceBoard};
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("board.png")?.decode()?.to_luma8();
//! // Hole centers from any circle detector.
//! let centers: Vec<[f32; 2]> = Vec::new();
//! let keypoints = detect::keypoints_from_points(&centers);
//!
//! let reference = ReferenceBoard::uniform(GridShape::new(6, 7), [64.0, 58.0], [32.0, 29.0]);
//! let detector = GridDetector::new(GridDetectorParams::default(), Some(reference))?;
//! let result = detect::detect_grid(&img, &keypoints, &detector)?;
//! println!("cells: {}", result.grid.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `holegrid::core`: keypoints, grid coordinates, homographies, images.
//! - `holegrid::detector`: the detection pipeline and its stages.
//! - `holegrid::detect` (feature `image`): helpers from `image::GrayImage`.

pub use holegrid_core as core;
pub use holegrid_detector as detector;

pub use holegrid_core::{Bound, GrayImage, GrayImageView, GridCoords, Homography, Keypoint};
pub use holegrid_detector::{
    GridConfigError, GridDetection, GridDetector, GridDetectorParams, GridMapping,
    GridNotFoundError, GridNotFoundKind, GridShape, ReferenceBoard, ReferenceHomography,
    RowDirection,
};

#[cfg(feature = "tracing")]
pub use holegrid_core::init_tracing;
pub use holegrid_core::init_with_level;

#[cfg(feature = "image")]
pub mod detect;
