use holegrid_core::{Bound, GrayImageView, Keypoint};

use super::{
    DetectionStats, GridCell, GridConfigError, GridDetection, GridDetectorParams, GridMapping,
    GridNotFoundError,
};
use crate::clustering::cluster_directions;
use crate::coords::assign_coordinates;
use crate::noise::double_pass;
use crate::reference::{estimate_reference_homography, rectify, ReferenceBoard};
use crate::resolve::resolve_grid;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Hole-grid detector for a board of known shape.
///
/// Holds read-only configuration only, so one instance can serve frames on
/// several threads.
#[derive(Clone, Debug)]
pub struct GridDetector {
    params: GridDetectorParams,
    reference: Option<ReferenceBoard>,
}

impl GridDetector {
    /// Create a detector, validating parameters and the optional reference
    /// layout against the board shape.
    pub fn new(
        params: GridDetectorParams,
        reference: Option<ReferenceBoard>,
    ) -> Result<Self, GridConfigError> {
        params.validate()?;
        if let Some(reference) = &reference {
            reference.validate(params.shape)?;
        }
        Ok(Self { params, reference })
    }

    /// Detector parameters.
    #[inline]
    pub fn params(&self) -> &GridDetectorParams {
        &self.params
    }

    #[inline]
    pub fn reference(&self) -> Option<&ReferenceBoard> {
        self.reference.as_ref()
    }

    /// Locate the board among `keypoints`.
    ///
    /// Without an explicit `bound` the image extent is used when `image` is
    /// given, else the bounding box of the keypoints. A homography is fitted
    /// when the detector has a reference layout; the scene is rectified when
    /// the reference also carries an image and `image` is given.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, keypoints, image), fields(points = keypoints.len()))
    )]
    pub fn detect(
        &self,
        keypoints: &[Keypoint],
        bound: Option<Bound>,
        image: Option<&GrayImageView<'_>>,
    ) -> Result<GridDetection, GridNotFoundError> {
        let params = &self.params;
        let bound = bound
            .or_else(|| image.map(|img| Bound::from_image_size(img.width, img.height)))
            .or_else(|| Bound::from_keypoints(keypoints))
            .unwrap_or(Bound::new(0.0, 0.0, 0.0, 0.0));

        let filtered = double_pass(
            keypoints,
            &bound,
            params.pixel_error_margin,
            params.min_similar_vectors,
        )?;
        let directional =
            cluster_directions(&filtered.edges, &params.clustering, params.row_direction)?;
        let assignment = assign_coordinates(
            &directional,
            keypoints.len(),
            &filtered.noise,
            params.strict_consistency,
        )?;
        let resolved = resolve_grid(&assignment, params.shape, &directional)?;

        let grid = GridMapping::from_cells(resolved.cells.iter().map(|(c, &pos)| {
            (
                *c,
                GridCell {
                    keypoint: keypoints[pos].index,
                    position: keypoints[pos].position,
                },
            )
        }));

        let stats = DetectionStats {
            input_points: keypoints.len(),
            noisy_points: filtered.noisy_count(),
            first_pass: filtered.first_pass,
            second_pass: filtered.second_pass,
            right_edges: directional.right.len(),
            up_edges: directional.up.len(),
            kmeans_attempts: directional.attempts,
            coordinate_conflicts: assignment.conflicts,
            labelled_cells: assignment.cells.len(),
            window: resolved.window,
        };

        let mut homography = None;
        let mut rectified = None;
        if let Some(reference) = &self.reference {
            let h = estimate_reference_homography(&grid, reference, &params.ransac)?;
            if let (Some(src), Some(ref_img)) = (image, &reference.image) {
                rectified = Some(rectify(src, &h, ref_img.width, ref_img.height));
            }
            homography = Some(h);
        }

        let missing = grid.missing_cells(params.shape).len();
        log::info!(
            "grid {}x{} found: {} cells ({} missing), {} noisy points",
            params.shape.cols,
            params.shape.rows,
            grid.len(),
            missing,
            stats.noisy_points
        );

        Ok(GridDetection {
            grid,
            homography,
            rectified,
            stats,
        })
    }
}
