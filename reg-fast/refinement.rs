use reg_core::{Image, Keypoint};
use crate::types::{ScoredKeypoint, ScaleLevel};
use std::collections::HashMap;

/// Subpixel refinement, orientation and suppression of raw corners
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Refine a keypoint to subpixel accuracy by fitting a quadratic surface
    /// to `response` over its 3x3 neighbourhood.
    ///
    /// The keypoint is returned unchanged when the neighbourhood leaves the
    /// image or the fitted surface has no maximum.
    pub fn refine_keypoint_subpixel<F>(width: usize, height: usize, kp: Keypoint, response: F) -> Keypoint
    where
        F: Fn(usize, usize) -> f32,
    {
        let x = kp.x as usize;
        let y = kp.y as usize;

        if x < 1 || y < 1 || x + 1 >= width || y + 1 >= height {
            return kp;
        }

        let s = [
            [response(x - 1, y - 1), response(x, y - 1), response(x + 1, y - 1)],
            [response(x - 1, y), response(x, y), response(x + 1, y)],
            [response(x - 1, y + 1), response(x, y + 1), response(x + 1, y + 1)],
        ];

        let dx = (s[1][2] - s[1][0]) / 2.0;
        let dy = (s[2][1] - s[0][1]) / 2.0;
        let dxx = s[1][2] - 2.0 * s[1][1] + s[1][0];
        let dyy = s[2][1] - 2.0 * s[1][1] + s[0][1];
        let dxy = (s[2][2] - s[2][0] - s[0][2] + s[0][0]) / 4.0;

        let det = dxx * dyy - dxy * dxy;
        if det <= f32::EPSILON || dxx >= 0.0 {
            return kp;
        }

        // Newton step towards the peak of the fitted surface
        let offset_x = (-(dyy * dx - dxy * dy) / det).clamp(-0.5, 0.5);
        let offset_y = (-(dxx * dy - dxy * dx) / det).clamp(-0.5, 0.5);
        if !offset_x.is_finite() || !offset_y.is_finite() {
            return kp;
        }

        Keypoint {
            x: kp.x + offset_x,
            y: kp.y + offset_y,
            ..kp
        }
    }

    /// Orientation by the intensity centroid of a circular patch, in radians.
    ///
    /// Pixels of the patch falling outside the image are skipped, so points
    /// near the border still get an angle.
    pub fn compute_orientation(img: &Image, width: usize, height: usize, x: f32, y: f32, patch_size: usize) -> f32 {
        let half = (patch_size / 2) as i64;
        let cx = x.round() as i64;
        let cy = y.round() as i64;
        let radius_sq = half * half;

        let mut m10 = 0i64;
        let mut m01 = 0i64;

        for dy in -half..=half {
            let py = cy + dy;
            if py < 0 || py >= height as i64 {
                continue;
            }
            let row = py as usize * width;
            for dx in -half..=half {
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }
                let px = cx + dx;
                if px < 0 || px >= width as i64 {
                    continue;
                }
                let intensity = img[row + px as usize] as i64;
                m10 += dx * intensity;
                m01 += dy * intensity;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Orientation of a keypoint given in the level's own pixel frame
    pub fn compute_orientation_at_scale(img: &Image, x: f32, y: f32, scale_level: &ScaleLevel, patch_size: usize) -> f32 {
        Self::compute_orientation(img, scale_level.width, scale_level.height, x, y, patch_size)
    }

    /// Greedy non-maximum suppression: strongest first, dropping any point
    /// closer than `min_distance` to one already kept.
    pub fn non_maximum_suppression(keypoints: &[ScoredKeypoint], min_distance: f32) -> Vec<ScoredKeypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }
        if min_distance <= 0.0 {
            return keypoints.to_vec();
        }

        let mut sorted_keypoints = keypoints.to_vec();
        sorted_keypoints.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.keypoint.y.total_cmp(&b.keypoint.y))
                .then(a.keypoint.x.total_cmp(&b.keypoint.x))
        });

        // Kept points bucketed on a grid with cells of `min_distance`
        let cell = min_distance;
        let min_distance_sq = min_distance * min_distance;
        let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        let mut kept: Vec<ScoredKeypoint> = Vec::new();

        for candidate in sorted_keypoints {
            let gx = (candidate.keypoint.x / cell).floor() as i64;
            let gy = (candidate.keypoint.y / cell).floor() as i64;

            let suppressed = (gy - 1..=gy + 1).any(|ny| {
                (gx - 1..=gx + 1).any(|nx| {
                    grid.get(&(nx, ny)).is_some_and(|bucket| {
                        bucket.iter().any(|&i| {
                            let dx = candidate.keypoint.x - kept[i].keypoint.x;
                            let dy = candidate.keypoint.y - kept[i].keypoint.y;
                            dx * dx + dy * dy < min_distance_sq
                        })
                    })
                })
            });

            if !suppressed {
                grid.entry((gx, gy)).or_default().push(kept.len());
                kept.push(candidate);
            }
        }

        kept
    }
}
