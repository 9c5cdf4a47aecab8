use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Translate to the centroid and scale so the mean distance is sqrt(2).
fn normalize_points(pts: &[Point2<f32>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let (sx, sy) = pts
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x as f64, ay + p.y as f64));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Estimate H such that:  p_img ~ H * p_rect
pub fn estimate_homography_rect_to_img(
    rect_pts: &[Point2<f32>],
    img_pts: &[Point2<f32>],
) -> Option<Homography> {
    if rect_pts.len() != img_pts.len() || rect_pts.len() < 4 {
        return None;
    }

    if rect_pts.len() == 4 {
        let src: &[Point2<f32>; 4] = rect_pts.try_into().ok()?;
        let dst: &[Point2<f32>; 4] = img_pts.try_into().ok()?;
        return homography_from_4pt(src, dst);
    }

    let (r, tr) = normalize_points(rect_pts);
    let (i, ti) = normalize_points(img_pts);

    // A is 2N x 9
    let n = rect_pts.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);

    for k in 0..n {
        let (x, y) = (r[k].x, r[k].y);
        let (u, v) = (i[k].x, i[k].y);

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // h is the right singular vector of the smallest singular value.
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let last = vt.nrows().checked_sub(1)?;
    let h = vt.row(last);

    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    let h_den = denormalize_homography(hn, tr, ti)?;
    let h_den = normalize_homography(h_den)?;

    Some(Homography::new(h_den))
}

/// Compute H such that: dst ~ H * src, from exactly 4 correspondences.
///
/// Returns `None` when the configuration is degenerate (e.g. three collinear points).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;

    let h = Homography::new(h_den);
    h.is_finite().then_some(h)
}

/// RANSAC settings for robust homography fitting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Number of minimal-sample hypotheses to evaluate.
    pub max_iters: usize,
    /// Max reprojection distance (pixels) for a correspondence to count as inlier.
    pub inlier_threshold_px: f32,
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iters: 500,
            inlier_threshold_px: 3.0,
            seed: 0x5eed,
        }
    }
}

/// Robust fit result.
#[derive(Clone, Debug)]
pub struct RansacHomography {
    pub homography: Homography,
    /// Indices of correspondences consistent with `homography`.
    pub inliers: Vec<usize>,
    /// RMS reprojection error over inliers, in destination pixels.
    pub rms_px: f64,
}

fn collect_inliers(
    h: &Homography,
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    threshold: f32,
) -> (Vec<usize>, f64) {
    let mut inliers = Vec::new();
    let mut sse = 0.0f64;
    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let err = (h.apply(*s) - *d).norm();
        if err <= threshold {
            inliers.push(k);
            sse += (err as f64).powi(2);
        }
    }
    (inliers, sse)
}

/// Estimate `dst ~ H * src` robustly: 4-point RANSAC followed by a DLT refit
/// on the consensus set.
pub fn estimate_homography_ransac(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> Option<RansacHomography> {
    let n = src.len();
    if n != dst.len() || n < 4 {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let all: Vec<usize> = (0..n).collect();
    let mut best: Option<(Homography, Vec<usize>, f64)> = None;

    for _ in 0..params.max_iters.max(1) {
        let mut sample = [0usize; 4];
        for (slot, &idx) in sample.iter_mut().zip(all.choose_multiple(&mut rng, 4)) {
            *slot = idx;
        }
        let s = sample.map(|k| src[k]);
        let d = sample.map(|k| dst[k]);
        let Some(h) = homography_from_4pt(&s, &d) else {
            continue;
        };

        let (inliers, sse) = collect_inliers(&h, src, dst, params.inlier_threshold_px);
        let better = match &best {
            None => true,
            Some((_, best_inliers, best_sse)) => {
                inliers.len() > best_inliers.len()
                    || (inliers.len() == best_inliers.len() && sse < *best_sse)
            }
        };
        if better {
            let done = inliers.len() == n;
            best = Some((h, inliers, sse));
            if done {
                break;
            }
        }
    }

    let (mut h, mut inliers, mut sse) = best?;
    if inliers.len() < 4 {
        return None;
    }

    let src_in: Vec<Point2<f32>> = inliers.iter().map(|&k| src[k]).collect();
    let dst_in: Vec<Point2<f32>> = inliers.iter().map(|&k| dst[k]).collect();
    if let Some(refit) = estimate_homography_rect_to_img(&src_in, &dst_in) {
        let (refit_inliers, refit_sse) =
            collect_inliers(&refit, src, dst, params.inlier_threshold_px);
        if refit_inliers.len() >= inliers.len() {
            h = refit;
            inliers = refit_inliers;
            sse = refit_sse;
        }
    }

    let rms_px = (sse / inliers.len() as f64).sqrt();
    Some(RansacHomography {
        homography: h,
        inliers,
        rms_px,
    })
}

/// Warp into the reference frame: each output pixel `(x, y)` is sampled from
/// `src` at `h_img_from_ref * (x, y)`.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_img_from_ref: Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut out = GrayImage::new(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            let pi = h_img_from_ref.apply(Point2::new(x as f32, y as f32));
            out.data[y * out_w + x] = sample_bilinear_u8(src, pi.x, pi.y);
        }
    }

    out
}
