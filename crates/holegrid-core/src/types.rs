use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A candidate hole center produced by an upstream circle detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Caller-assigned identifier, stable for one detection run.
    pub index: usize,
    /// Pixel position of the center.
    pub position: Point2<f32>,
}

impl Keypoint {
    pub fn new(index: usize, x: f32, y: f32) -> Self {
        Self {
            index,
            position: Point2::new(x, y),
        }
    }
}

/// Integer grid coordinates: `i` is the column, `j` is the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}

impl GridCoords {
    #[inline]
    pub fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    #[inline]
    pub fn offset(self, di: i32, dj: i32) -> Self {
        Self {
            i: self.i + di,
            j: self.j + dj,
        }
    }
}

/// Axis-aligned rectangle in pixel space, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bound {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bound covering every pixel of a `width × height` image.
    pub fn from_image_size(width: usize, height: usize) -> Self {
        Self::new(
            0.0,
            0.0,
            width.saturating_sub(1) as f32,
            height.saturating_sub(1) as f32,
        )
    }

    /// Tight bounding box of the given keypoints, `None` for an empty slice.
    pub fn from_keypoints(keypoints: &[Keypoint]) -> Option<Self> {
        let first = keypoints.first()?;
        let mut b = Self::new(
            first.position.x,
            first.position.y,
            first.position.x,
            first.position.y,
        );
        for kp in &keypoints[1..] {
            b.min_x = b.min_x.min(kp.position.x);
            b.min_y = b.min_y.min(kp.position.y);
            b.max_x = b.max_x.max(kp.position.x);
            b.max_y = b.max_y.max(kp.position.y);
        }
        Some(b)
    }

    #[inline]
    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_from_keypoints_is_tight() {
        let kps = [
            Keypoint::new(0, 3.0, 7.0),
            Keypoint::new(1, -2.0, 1.0),
            Keypoint::new(2, 10.0, 4.0),
        ];
        let b = Bound::from_keypoints(&kps).expect("non-empty");
        assert_eq!(b, Bound::new(-2.0, 1.0, 10.0, 7.0));
        for kp in &kps {
            assert!(b.contains(kp.position));
        }
        assert!(!b.contains(Point2::new(10.5, 4.0)));
    }

    #[test]
    fn bound_from_empty_keypoints_is_none() {
        assert!(Bound::from_keypoints(&[]).is_none());
    }

    #[test]
    fn image_bound_covers_last_pixel() {
        let b = Bound::from_image_size(640, 480);
        assert!(b.contains(Point2::new(639.0, 479.0)));
        assert!(!b.contains(Point2::new(640.0, 0.0)));
    }
}
