use reg_core::{Image, Keypoint};
use crate::types::{CornerType, ScoredKeypoint, ScaleLevel};
use crate::utils::{circle_mask, has_contiguous_arc};
use rayon::prelude::*;

/// Pixels on the arc required for a FAST-9 corner
pub const FAST_ARC_LENGTH: usize = 9;

/// Distance kept free from the border by the segment test
pub const FAST_BORDER: usize = 3;

/// Harris detector free parameter
const HARRIS_K: f32 = 0.04;

/// Corner detection algorithms (FAST and Harris)
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection, clockwise from 12 o'clock
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Run the segment test over one pyramid level, rows in parallel.
    ///
    /// Returned keypoints are in the level's own pixel frame; `response`
    /// holds the FAST score used for non-maximum suppression.
    pub fn detect_keypoints_at_scale(img: &Image, scale_level: &ScaleLevel, threshold: u8) -> Vec<ScoredKeypoint> {
        let width = scale_level.width;
        let height = scale_level.height;
        if width <= 2 * FAST_BORDER || height <= 2 * FAST_BORDER {
            return Vec::new();
        }

        (FAST_BORDER..height - FAST_BORDER)
            .into_par_iter()
            .flat_map_iter(|y| {
                (FAST_BORDER..width - FAST_BORDER).filter_map(move |x| {
                    let corner_type = Self::segment_test(img, width, x, y, threshold);
                    if corner_type == CornerType::None {
                        return None;
                    }
                    Some(ScoredKeypoint {
                        keypoint: Keypoint {
                            octave: scale_level.level as u8,
                            ..Keypoint::new(x as f32, y as f32)
                        },
                        response: Self::fast_score(img, width, x, y, threshold, corner_type),
                    })
                })
            })
            .collect()
    }

    /// Classify a pixel with the FAST-9 segment test
    pub(crate) fn segment_test(img: &Image, width: usize, x: usize, y: usize, threshold: u8) -> CornerType {
        let center = img[y * width + x] as i32;
        let threshold = threshold as i32;

        // Cardinal pixels first: a 9-arc always covers at least two of them
        let mut bright_cardinal = 0;
        let mut dark_cardinal = 0;
        for &i in &[0usize, 4, 8, 12] {
            let pixel = Self::circle_pixel(img, width, x, y, i);
            if pixel > center + threshold {
                bright_cardinal += 1;
            } else if pixel < center - threshold {
                dark_cardinal += 1;
            }
        }
        if bright_cardinal < 2 && dark_cardinal < 2 {
            return CornerType::None;
        }

        let mut brighter = [false; 16];
        let mut darker = [false; 16];
        for i in 0..16 {
            let pixel = Self::circle_pixel(img, width, x, y, i);
            brighter[i] = pixel > center + threshold;
            darker[i] = pixel < center - threshold;
        }

        if has_contiguous_arc(circle_mask(&brighter), FAST_ARC_LENGTH) {
            CornerType::Bright
        } else if has_contiguous_arc(circle_mask(&darker), FAST_ARC_LENGTH) {
            CornerType::Dark
        } else {
            CornerType::None
        }
    }

    #[inline]
    fn circle_pixel(img: &Image, width: usize, x: usize, y: usize, i: usize) -> i32 {
        let (dx, dy) = Self::FAST_OFFSETS[i];
        let px = (x as i32 + dx) as usize;
        let py = (y as i32 + dy) as usize;
        img[py * width + px] as i32
    }

    /// FAST score: summed contrast beyond the threshold on the corner's side
    fn fast_score(img: &Image, width: usize, x: usize, y: usize, threshold: u8, corner_type: CornerType) -> f32 {
        let center = img[y * width + x] as i32;
        let threshold = threshold as i32;

        (0..16)
            .map(|i| {
                let pixel = Self::circle_pixel(img, width, x, y, i);
                match corner_type {
                    CornerType::Bright => (pixel - center - threshold).max(0),
                    CornerType::Dark => (center - pixel - threshold).max(0),
                    CornerType::None => 0,
                }
            })
            .sum::<i32>() as f32
    }

    /// Harris corner response over a 5x5 window centred on (x, y).
    ///
    /// Returns 0 where the window does not fit inside the image.
    pub fn compute_harris_response(img: &Image, width: usize, height: usize, x: usize, y: usize) -> f32 {
        if x < 3 || y < 3 || x + 3 >= width || y + 3 >= height {
            return 0.0;
        }

        let mut ixx = 0.0f32;
        let mut ixy = 0.0f32;
        let mut iyy = 0.0f32;

        for ny in y - 2..=y + 2 {
            for nx in x - 2..=x + 2 {
                let (gx, gy) = Self::compute_gradients(img, width, nx, ny);
                ixx += gx * gx;
                ixy += gx * gy;
                iyy += gy * gy;
            }
        }

        // det(M) - k * trace(M)^2
        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        det - HARRIS_K * trace * trace
    }

    /// Sobel gradients at an interior pixel, scaled to intensity units
    fn compute_gradients(img: &Image, width: usize, x: usize, y: usize) -> (f32, f32) {
        let at = |xx: usize, yy: usize| img[yy * width + xx] as f32;

        // Sobel X kernel: [-1, 0, 1; -2, 0, 2; -1, 0, 1]
        let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x - 1, y) - at(x - 1, y + 1);

        // Sobel Y kernel: [-1, -2, -1; 0, 0, 0; 1, 2, 1]
        let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1);

        (gx / 8.0, gy / 8.0)
    }
}
