use holegrid_core::Keypoint;
use holegrid_detector::{GridConfigError, GridDetection, GridDetector, GridNotFoundError};

use crate::core;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Config(#[from] GridConfigError),

    #[error(transparent)]
    GridNotFound(#[from] GridNotFoundError),
}

/// Convert an `image::GrayImage` into the lightweight `holegrid-core` view type.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Convert an owned `holegrid-core` image (e.g. a rectified board) back into
/// an `image::GrayImage`.
pub fn to_image(img: &core::GrayImage) -> Result<::image::GrayImage, DetectError> {
    match (u32::try_from(img.width), u32::try_from(img.height)) {
        (Ok(width), Ok(height)) => gray_image_from_slice(width, height, &img.data),
        _ => Err(DetectError::InvalidGrayDimensions {
            width: img.width.min(u32::MAX as usize) as u32,
            height: img.height.min(u32::MAX as usize) as u32,
        }),
    }
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let Some(expected) = (width as usize).checked_mul(height as usize) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}

/// Wrap raw circle centers as keypoints; indices follow slice order.
pub fn keypoints_from_points(points: &[[f32; 2]]) -> Vec<Keypoint> {
    points
        .iter()
        .enumerate()
        .map(|(index, &[x, y])| Keypoint::new(index, x, y))
        .collect()
}

/// Run the detector with the image extent as bound. The scene is rectified
/// when the detector's reference layout carries an image.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, keypoints, detector),
        fields(width = img.width(), height = img.height(), points = keypoints.len())
    )
)]
pub fn detect_grid(
    img: &::image::GrayImage,
    keypoints: &[Keypoint],
    detector: &GridDetector,
) -> Result<GridDetection, DetectError> {
    Ok(detector.detect(keypoints, None, Some(&gray_view(img)))?)
}

pub fn detect_grid_from_gray_u8(
    width: u32,
    height: u32,
    pixels: &[u8],
    keypoints: &[Keypoint],
    detector: &GridDetector,
) -> Result<GridDetection, DetectError> {
    let img = gray_image_from_slice(width, height, pixels)?;
    detect_grid(&img, keypoints, detector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use holegrid_detector::{GridDetectorParams, GridNotFoundKind, GridShape, ReferenceBoard};

    fn board_centers() -> Vec<[f32; 2]> {
        let mut pts = Vec::new();
        for j in 0..6 {
            for i in 0..7 {
                pts.push([20.0 + i as f32 * 24.0, 16.0 + j as f32 * 20.0]);
            }
        }
        pts
    }

    /// Dark board with a bright dot on every hole center.
    fn render(centers: &[[f32; 2]], width: u32, height: u32) -> ::image::GrayImage {
        let mut img = ::image::GrayImage::new(width, height);
        for &[x, y] in centers {
            img.put_pixel(x as u32, y as u32, ::image::Luma([255]));
        }
        img
    }

    #[test]
    fn rejects_bad_buffer_length() {
        let err = gray_image_from_slice(4, 4, &[0; 15]).unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidGrayBuffer {
                expected: 16,
                got: 15
            }
        ));
    }

    #[test]
    fn detects_and_rectifies_rendered_board() {
        let centers = board_centers();
        let img = render(&centers, 200, 140);
        let keypoints = keypoints_from_points(&centers);

        // Reference spacing matches the scene, shifted by (-10, -8).
        let reference = ReferenceBoard::uniform(GridShape::new(6, 7), [24.0, 20.0], [10.0, 8.0])
            .with_image(core::GrayImage::new(170, 120));
        let detector = GridDetector::new(GridDetectorParams::default(), Some(reference)).unwrap();

        let res = detect_grid(&img, &keypoints, &detector).unwrap();
        assert_eq!(res.grid.len(), 42);

        let rectified = to_image(res.rectified.as_ref().unwrap()).unwrap();
        assert_eq!(rectified.dimensions(), (170, 120));
        // Hole (0, 0) lands on its reference position.
        assert_eq!(rectified.get_pixel(10, 8).0[0], 255);
    }

    #[test]
    fn missing_board_maps_to_typed_error() {
        let keypoints = keypoints_from_points(&[[1.0, 1.0], [50.0, 3.0], [7.0, 60.0]]);
        let img = ::image::GrayImage::new(64, 64);
        let detector = GridDetector::new(GridDetectorParams::default(), None).unwrap();
        match detect_grid(&img, &keypoints, &detector) {
            Err(DetectError::GridNotFound(e)) => {
                assert_eq!(e.kind(), GridNotFoundKind::InsufficientCorroboration)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
