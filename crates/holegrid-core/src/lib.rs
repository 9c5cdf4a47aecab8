//! Core types and utilities for hole-grid board detection.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete circle detector or image type.

mod homography;
mod image;
mod logger;
mod types;

pub use homography::{
    estimate_homography_ransac, estimate_homography_rect_to_img, homography_from_4pt,
    warp_perspective_gray, Homography, RansacHomography, RansacParams,
};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use types::{Bound, GridCoords, Keypoint};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
