use reg_core::Image;
use crate::error::{FastError, FastResult};
use crate::types::ScaleLevel;
use rayon::prelude::*;

/// Smallest side a level above the base may have
const MIN_LEVEL_SIDE: usize = 32;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate scale levels for the image pyramid.
    ///
    /// Level 0 is the full-resolution image and is always present; further
    /// levels shrink by `scale_factor` until `n_levels` is reached or a side
    /// drops below 32 pixels.
    pub fn generate_scale_levels(
        width: usize,
        height: usize,
        n_levels: usize,
        scale_factor: f32,
    ) -> FastResult<Vec<ScaleLevel>> {
        if n_levels == 0 || !(scale_factor > 1.0) {
            return Err(FastError::InvalidPyramid { n_levels, scale_factor });
        }

        let mut levels = vec![ScaleLevel { level: 0, scale: 1.0, width, height }];
        let mut current_scale = 1.0f32;

        for level in 1..n_levels {
            current_scale *= scale_factor;
            let scaled_width = ((width as f32) / current_scale) as usize;
            let scaled_height = ((height as f32) / current_scale) as usize;

            if scaled_width < MIN_LEVEL_SIDE || scaled_height < MIN_LEVEL_SIDE {
                break;
            }

            levels.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width,
                height: scaled_height,
            });
        }

        Ok(levels)
    }

    /// Build image pyramid from base image
    pub fn build_image_pyramid(img: &Image, width: usize, height: usize, scale_levels: &[ScaleLevel]) -> FastResult<Vec<Image>> {
        let expected_len = width * height;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData { expected_len, actual_len: img.len() });
        }

        Ok(scale_levels
            .iter()
            .map(|scale_level| {
                if scale_level.level == 0 {
                    img.clone()
                } else {
                    Self::downsample_image(img, width, height, scale_level.width, scale_level.height)
                }
            })
            .collect())
    }

    /// Downsample image using bilinear interpolation
    fn downsample_image(img: &Image, src_width: usize, src_height: usize, target_width: usize, target_height: usize) -> Image {
        let x_ratio = src_width as f32 / target_width as f32;
        let y_ratio = src_height as f32 / target_height as f32;

        let mut downsampled = vec![0u8; target_width * target_height];
        downsampled
            .par_chunks_mut(target_width)
            .enumerate()
            .for_each(|(y, row)| {
                let src_y = y as f32 * y_ratio;
                for (x, out) in row.iter_mut().enumerate() {
                    let src_x = x as f32 * x_ratio;
                    let value = Self::bilinear_sample(img, src_width, src_height, src_x, src_y);
                    *out = value.round().clamp(0.0, 255.0) as u8;
                }
            });

        downsampled
    }

    /// Sample image at fractional coordinates using bilinear interpolation
    fn bilinear_sample(img: &Image, width: usize, height: usize, x: f32, y: f32) -> f32 {
        let x1 = (x.floor() as usize).min(width - 1);
        let y1 = (y.floor() as usize).min(height - 1);
        let x2 = (x1 + 1).min(width - 1);
        let y2 = (y1 + 1).min(height - 1);

        let fx = x - x1 as f32;
        let fy = y - y1 as f32;

        let p11 = img[y1 * width + x1] as f32;
        let p12 = img[y1 * width + x2] as f32;
        let p21 = img[y2 * width + x1] as f32;
        let p22 = img[y2 * width + x2] as f32;

        let interpolated_top = p11 * (1.0 - fx) + p12 * fx;
        let interpolated_bottom = p21 * (1.0 - fx) + p22 * fx;

        interpolated_top * (1.0 - fy) + interpolated_bottom * fy
    }
}
