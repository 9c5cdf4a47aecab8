//! Reference layout of the board and the homography tying it to the scene.

use std::collections::BTreeMap;

use holegrid_core::{
    estimate_homography_ransac, warp_perspective_gray, GrayImage, GrayImageView, GridCoords,
    Homography, RansacParams,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::GridMapping;
use crate::{GridConfigError, GridNotFoundError, GridShape};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Canonical hole positions (reference pixels) and an optional rendering of
/// the board that fixes the size of the rectified output.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceBoard {
    pub points: BTreeMap<GridCoords, Point2<f32>>,
    pub image: Option<GrayImage>,
}

impl ReferenceBoard {
    pub fn new(points: BTreeMap<GridCoords, Point2<f32>>) -> Self {
        Self {
            points,
            image: None,
        }
    }

    /// Evenly spaced layout: cell `(i, j)` sits at `origin + (i * spacing[0], j * spacing[1])`.
    pub fn uniform(shape: GridShape, spacing: [f32; 2], origin: [f32; 2]) -> Self {
        let mut points = BTreeMap::new();
        for j in 0..shape.rows as i32 {
            for i in 0..shape.cols as i32 {
                points.insert(
                    GridCoords::new(i, j),
                    Point2::new(
                        origin[0] + i as f32 * spacing[0],
                        origin[1] + j as f32 * spacing[1],
                    ),
                );
            }
        }
        Self::new(points)
    }

    pub fn with_image(mut self, image: GrayImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Check that every cell of `shape` has a reference position and that the
    /// reference image buffer matches its declared size.
    pub fn validate(&self, shape: GridShape) -> Result<(), GridConfigError> {
        let missing: Vec<GridCoords> = (0..shape.rows as i32)
            .flat_map(|j| (0..shape.cols as i32).map(move |i| GridCoords::new(i, j)))
            .filter(|c| !self.points.contains_key(c))
            .collect();
        if !missing.is_empty() {
            return Err(GridConfigError::IncompleteReference { missing });
        }
        if let Some(img) = &self.image {
            let expected = img.width * img.height;
            if img.data.len() != expected {
                return Err(GridConfigError::ReferenceImageSize {
                    expected,
                    actual: img.data.len(),
                });
            }
        }
        Ok(())
    }
}

/// Homography from reference pixels to scene pixels with fit diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceHomography {
    /// Maps reference pixels to scene pixels.
    pub h_scene_from_ref: Homography,
    /// Maps scene pixels to reference pixels.
    pub h_ref_from_scene: Homography,
    pub inliers: usize,
    pub correspondences: usize,
    /// Reprojection RMS over all grid cells, in scene pixels.
    pub rms_px: f64,
}

/// Robustly fit the reference-to-scene homography over every detected cell.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(grid, reference, ransac), fields(cells = grid.len()))
)]
pub fn estimate_reference_homography(
    grid: &GridMapping,
    reference: &ReferenceBoard,
    ransac: &RansacParams,
) -> Result<ReferenceHomography, GridNotFoundError> {
    let mut missing = Vec::new();
    let mut ref_pts = Vec::with_capacity(grid.len());
    let mut scene_pts = Vec::with_capacity(grid.len());
    for (coords, cell) in grid.iter() {
        match reference.points.get(coords) {
            Some(p) => {
                ref_pts.push(*p);
                scene_pts.push(cell.position);
            }
            None => missing.push(*coords),
        }
    }
    if !missing.is_empty() {
        return Err(GridNotFoundError::ReferenceMismatch { missing });
    }

    let fit = estimate_homography_ransac(&ref_pts, &scene_pts, ransac)
        .ok_or(GridNotFoundError::HomographyFailed)?;
    let h_ref_from_scene = fit
        .homography
        .inverse()
        .ok_or(GridNotFoundError::HomographyFailed)?;

    let sse: f64 = ref_pts
        .iter()
        .zip(&scene_pts)
        .map(|(r, s)| ((fit.homography.apply(*r) - *s).norm() as f64).powi(2))
        .sum();
    let rms_px = (sse / ref_pts.len() as f64).sqrt();
    log::debug!(
        "homography: {}/{} inliers, rms {:.3}px",
        fit.inliers.len(),
        ref_pts.len(),
        rms_px
    );

    Ok(ReferenceHomography {
        h_scene_from_ref: fit.homography,
        h_ref_from_scene,
        inliers: fit.inliers.len(),
        correspondences: ref_pts.len(),
        rms_px,
    })
}

/// Warp the scene into the reference frame: output pixel `(x, y)` is sampled
/// bilinearly from `source` at `h_scene_from_ref * (x, y)`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(source, h))
)]
pub fn rectify(
    source: &GrayImageView<'_>,
    h: &ReferenceHomography,
    width: usize,
    height: usize,
) -> GrayImage {
    warp_perspective_gray(source, h.h_scene_from_ref, width, height)
}
