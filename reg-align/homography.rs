//! Planar homography estimation: normalised DLT inside a seeded RANSAC loop.

use crate::config::RansacConfig;
use crate::error::{RegistrationError, RegistrationResult};
use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use tracing::debug;

/// 3x3 projective transform mapping moving coordinates to reference ones
pub type Homography = Matrix3<f64>;

/// Points needed for a minimal homography fit
pub const MIN_SAMPLE: usize = 4;

/// Relative size below which a second eigenvalue of AᵀA counts as zero
const RANK_TOLERANCE: f64 = 1e-10;

/// A fitted model and which correspondences agree with it
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub homography: Homography,
    pub inlier_mask: Vec<bool>,
}

impl Estimate {
    pub fn inlier_count(&self) -> usize {
        self.inlier_mask.iter().filter(|&&inlier| inlier).count()
    }
}

/// Strategy for turning point correspondences into a homography.
///
/// `moving[i]` corresponds to `reference[i]`; the returned mask is
/// index-aligned with both slices.
pub trait HomographyEstimator {
    fn estimate(&self, moving: &[[f64; 2]], reference: &[[f64; 2]]) -> RegistrationResult<Estimate>;
}

/// Map a point through `h`; `None` when it lands at infinity
pub fn project(h: &Homography, p: [f64; 2]) -> Option<[f64; 2]> {
    let q = h * Vector3::new(p[0], p[1], 1.0);
    if q[2].abs() < 1e-12 {
        return None;
    }
    Some([q[0] / q[2], q[1] / q[2]])
}

/// Euclidean distance between `project(h, src)` and `dst`
pub fn reprojection_error(h: &Homography, src: [f64; 2], dst: [f64; 2]) -> f64 {
    match project(h, src) {
        Some(p) => ((p[0] - dst[0]).powi(2) + (p[1] - dst[1]).powi(2)).sqrt(),
        None => f64::INFINITY,
    }
}

/// Translate the centroid to the origin and scale the mean distance to sqrt(2)
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-12 { std::f64::consts::SQRT_2 / mean_dist } else { 1.0 };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| [s * (p[0] - cx), s * (p[1] - cy)]).collect();

    (t, normalized)
}

/// Direct linear transform on at least four correspondences.
///
/// Returns `None` for degenerate input: fewer than four points, mismatched
/// lengths, a minimal sample with three collinear points, a system without
/// a unique solution, or a non-finite or singular result.
pub fn fit_homography_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Homography> {
    let n = src.len();
    if n < MIN_SAMPLE || dst.len() != n {
        return None;
    }
    if n == MIN_SAMPLE && (has_collinear_triple(src) || has_collinear_triple(dst)) {
        return None;
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let [sx, sy] = src_n[i];
        let [dx, dy] = dst_n[i];

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of AᵀA with the smallest eigenvalue
    let eig = SymmetricEigen::new(a.transpose() * &a);
    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[i].abs().total_cmp(&eig.eigenvalues[j].abs()));
    let (&min_idx, &largest) = (order.first()?, order.last()?);

    // A null space wider than one dimension leaves H undetermined
    let second = eig.eigenvalues[*order.get(1)?].abs();
    if second <= RANK_TOLERANCE * eig.eigenvalues[largest].abs() {
        return None;
    }
    let v = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]);

    let h = t_dst.try_inverse()? * h_norm * t_src;
    let h = if h[(2, 2)].abs() > 1e-12 { h / h[(2, 2)] } else { h };

    let usable = h.iter().all(|x| x.is_finite()) && h.determinant().abs() > 1e-12;
    usable.then_some(h)
}

/// True if any three of the points lie on (nearly) one line
fn has_collinear_triple(pts: &[[f64; 2]]) -> bool {
    let n = pts.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                let [ax, ay] = pts[i];
                let [bx, by] = pts[j];
                let [cx, cy] = pts[k];
                let cross = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);
                let scale = ((bx - ax).hypot(by - ay) * (cx - ax).hypot(cy - ay)).max(1e-12);
                if cross.abs() / scale < 1e-6 {
                    return true;
                }
            }
        }
    }
    false
}

/// Random sample consensus over minimal four-point DLT fits.
#[derive(Debug, Clone, Default)]
pub struct RansacEstimator {
    config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    fn inlier_mask(&self, h: &Homography, moving: &[[f64; 2]], reference: &[[f64; 2]]) -> Vec<bool> {
        moving
            .iter()
            .zip(reference)
            .map(|(&m, &r)| reprojection_error(h, m, r) < self.config.reprojection_threshold)
            .collect()
    }

    /// Iterations needed to draw one all-inlier sample with the configured
    /// confidence, given the current inlier ratio
    fn required_iterations(&self, inlier_ratio: f64) -> usize {
        let p_good = inlier_ratio.powi(MIN_SAMPLE as i32);
        if p_good >= 1.0 {
            return 1;
        }
        if p_good <= 0.0 {
            return self.config.max_iters;
        }
        let needed = (1.0 - self.config.confidence).ln() / (1.0 - p_good).ln();
        if needed.is_finite() {
            (needed.ceil() as usize).clamp(1, self.config.max_iters)
        } else {
            self.config.max_iters
        }
    }
}

impl HomographyEstimator for RansacEstimator {
    fn estimate(&self, moving: &[[f64; 2]], reference: &[[f64; 2]]) -> RegistrationResult<Estimate> {
        let n = moving.len();
        if reference.len() != n {
            return Err(RegistrationError::EstimationFailure(format!(
                "{} moving points but {} reference points",
                n,
                reference.len()
            )));
        }
        if n < MIN_SAMPLE {
            return Err(RegistrationError::EstimationFailure(format!(
                "{n} correspondences, at least {MIN_SAMPLE} required"
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Option<(Homography, Vec<bool>, usize)> = None;
        let mut iteration_limit = self.config.max_iters;
        let mut iterations = 0;
        let mut degenerate = 0;

        while iterations < iteration_limit {
            iterations += 1;

            let idx = sample(&mut rng, n, MIN_SAMPLE);
            let src: Vec<[f64; 2]> = idx.iter().map(|i| moving[i]).collect();
            let dst: Vec<[f64; 2]> = idx.iter().map(|i| reference[i]).collect();

            let Some(h) = fit_homography_dlt(&src, &dst) else {
                degenerate += 1;
                continue;
            };

            let mask = self.inlier_mask(&h, moving, reference);
            let count = mask.iter().filter(|&&inlier| inlier).count();
            if best.as_ref().map_or(true, |(_, _, best_count)| count > *best_count) {
                iteration_limit = self.required_iterations(count as f64 / n as f64);
                best = Some((h, mask, count));
            }
        }

        let Some((mut homography, mut inlier_mask, mut count)) = best else {
            return Err(RegistrationError::EstimationFailure(format!(
                "all {degenerate} sampled point sets were degenerate"
            )));
        };

        if self.config.refine && count > MIN_SAMPLE {
            let (src, dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = inlier_mask
                .iter()
                .zip(moving.iter().zip(reference))
                .filter(|(&inlier, _)| inlier)
                .map(|(_, (&m, &r))| (m, r))
                .unzip();
            if let Some(refined) = fit_homography_dlt(&src, &dst) {
                let refined_mask = self.inlier_mask(&refined, moving, reference);
                let refined_count = refined_mask.iter().filter(|&&inlier| inlier).count();
                if refined_count >= count {
                    homography = refined;
                    inlier_mask = refined_mask;
                    count = refined_count;
                }
            }
        }

        let ratio = count as f64 / n as f64;
        debug!(iterations, degenerate, inliers = count, total = n, "ransac finished");

        if count < MIN_SAMPLE {
            return Err(RegistrationError::EstimationFailure(format!(
                "best model has {count} inliers, at least {MIN_SAMPLE} required"
            )));
        }
        if ratio < self.config.min_inlier_ratio {
            return Err(RegistrationError::EstimationFailure(format!(
                "inlier ratio {:.3} below required {:.3}",
                ratio, self.config.min_inlier_ratio
            )));
        }

        Ok(Estimate { homography, inlier_mask })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn test_homography() -> Homography {
        Matrix3::new(0.95, -0.08, 12.0, 0.06, 1.02, -7.5, 1.5e-4, -8.0e-5, 1.0)
    }

    fn grid_points() -> Vec<[f64; 2]> {
        (0..8)
            .flat_map(|i| (0..6).map(move |j| [15.0 + i as f64 * 21.0, 10.0 + j as f64 * 17.0]))
            .collect()
    }

    #[test]
    fn test_dlt_exact_four_points() {
        let h = test_homography();
        let src = vec![[0.0, 0.0], [100.0, 0.0], [100.0, 80.0], [0.0, 80.0]];
        let dst: Vec<_> = src.iter().map(|&p| project(&h, p).unwrap()).collect();
        let fitted = fit_homography_dlt(&src, &dst).unwrap();
        for (a, b) in fitted.iter().zip(h.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_dlt_rejects_degenerate_input() {
        let line = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        assert!(fit_homography_dlt(&line, &line).is_none());
        assert!(fit_homography_dlt(&line[..3], &line[..3]).is_none());
    }

    #[test]
    fn test_dlt_rejects_many_collinear_points() {
        let src: Vec<_> = (0..8).map(|i| [i as f64 * 7.0, 3.0 + i as f64 * 2.0]).collect();
        let dst: Vec<_> = src.iter().map(|p| [p[0] + 5.0, p[1] - 1.0]).collect();
        assert!(fit_homography_dlt(&src, &dst).is_none());
    }

    #[test]
    fn test_dlt_rejects_collinear_destination() {
        let src = vec![[0.0, 0.0], [50.0, 0.0], [50.0, 40.0], [0.0, 40.0]];
        let dst = vec![[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [5.0, 30.0]];
        assert!(fit_homography_dlt(&src, &dst).is_none());
    }

    #[test]
    fn test_collinear_detection() {
        assert!(has_collinear_triple(&[[0.0, 0.0], [5.0, 5.0], [1.0, 7.0], [10.0, 10.0]]));
        assert!(!has_collinear_triple(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]));
    }

    #[test]
    fn test_ransac_rejects_outliers() {
        let h = test_homography();
        let moving = grid_points();
        let mut reference: Vec<_> = moving.iter().map(|&p| project(&h, p).unwrap()).collect();

        let mut rng = StdRng::seed_from_u64(99);
        let outliers = [3usize, 8, 11, 20, 27, 33, 41];
        for &i in &outliers {
            reference[i] = [rng.random_range(0.0..200.0), rng.random_range(0.0..150.0)];
        }

        let estimate = RansacEstimator::default().estimate(&moving, &reference).unwrap();
        for &i in &outliers {
            if reprojection_error(&h, moving[i], reference[i]) > 3.0 {
                assert!(!estimate.inlier_mask[i]);
            }
        }
        assert!(estimate.inlier_count() >= moving.len() - outliers.len());
        for p in &moving {
            let expected = project(&h, *p).unwrap();
            let got = project(&estimate.homography, *p).unwrap();
            assert_relative_eq!(got[0], expected[0], epsilon = 1e-6);
            assert_relative_eq!(got[1], expected[1], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ransac_is_deterministic_for_seed() {
        let moving = grid_points();
        let mut rng = StdRng::seed_from_u64(5);
        let reference: Vec<_> = moving
            .iter()
            .map(|p| [p[0] + 4.0 + rng.random_range(-1.0..1.0), p[1] - 2.0 + rng.random_range(-1.0..1.0)])
            .collect();
        let estimator = RansacEstimator::new(RansacConfig { seed: 17, ..RansacConfig::default() });
        assert_eq!(estimator.estimate(&moving, &reference).unwrap(), estimator.estimate(&moving, &reference).unwrap());
    }

    #[test]
    fn test_collinear_matches_fail() {
        let moving: Vec<_> = (0..6).map(|i| [i as f64 * 10.0, 5.0]).collect();
        let reference: Vec<_> = moving.iter().map(|p| [p[0] + 3.0, p[1] + 1.0]).collect();
        let result = RansacEstimator::default().estimate(&moving, &reference);
        assert!(matches!(result, Err(RegistrationError::EstimationFailure(_))));
    }

    #[test]
    fn test_too_few_points_fail() {
        let pts = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(matches!(
            RansacEstimator::default().estimate(&pts, &pts),
            Err(RegistrationError::EstimationFailure(_))
        ));
    }

    #[test]
    fn test_min_inlier_ratio_gate() {
        let moving = grid_points();
        let mut reference: Vec<_> = moving.iter().map(|p| [p[0] + 1.0, p[1] + 2.0]).collect();
        let mut rng = StdRng::seed_from_u64(3);
        for r in reference.iter_mut().skip(24) {
            *r = [rng.random_range(0.0..500.0), rng.random_range(0.0..500.0)];
        }

        let lenient = RansacEstimator::default();
        assert!(lenient.estimate(&moving, &reference).is_ok());

        let strict = RansacEstimator::new(RansacConfig { min_inlier_ratio: 0.9, ..RansacConfig::default() });
        assert!(matches!(
            strict.estimate(&moving, &reference),
            Err(RegistrationError::EstimationFailure(_))
        ));
    }

    #[test]
    fn test_required_iterations_shrink_with_ratio() {
        let estimator = RansacEstimator::default();
        assert_eq!(estimator.required_iterations(0.0), 2000);
        assert_eq!(estimator.required_iterations(1.0), 1);
        assert!(estimator.required_iterations(0.9) < estimator.required_iterations(0.5));
    }
}
