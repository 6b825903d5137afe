use reg_core::{Image, Keypoint, OrbConfig};
use crate::config::DetectorConfig;
use crate::error::{FastError, FastResult};
use crate::types::{ScoredKeypoint, ScaleLevel};
use crate::pyramid::ImagePyramid;
use crate::corner_detection::CornerDetector;
use crate::refinement::KeypointRefinement;
use rayon::prelude::*;

/// FAST requires at least 7x7 image (3-pixel border on each side)
pub const MIN_IMAGE_SIZE: usize = 7;

/// Multi-scale FAST detector with Harris ranking
#[derive(Debug, Clone)]
pub struct FastDetector {
    cfg: OrbConfig,
    nms_distance: f32,
    subpixel_refinement: bool,
    w: usize,
    h: usize,
    scale_levels: Vec<ScaleLevel>,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(cfg: OrbConfig, width: usize, height: usize) -> FastResult<Self> {
        let config = DetectorConfig { core: cfg, ..DetectorConfig::default() };
        Self::with_config(&config, width, height)
    }

    /// Creates a detector from a complete configuration
    pub fn with_config(config: &DetectorConfig, width: usize, height: usize) -> FastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }
        if width < MIN_IMAGE_SIZE || height < MIN_IMAGE_SIZE {
            return Err(FastError::ImageTooSmall { width, height, min_size: MIN_IMAGE_SIZE });
        }
        config.validate()?;

        let scale_levels = ImagePyramid::generate_scale_levels(
            width,
            height,
            config.core.n_levels,
            config.core.scale_factor,
        )?;

        Ok(Self {
            cfg: config.core.clone(),
            nms_distance: config.nms_distance,
            subpixel_refinement: config.subpixel_refinement,
            w: width,
            h: height,
            scale_levels,
        })
    }

    /// Validates image data before processing
    fn validate_image(&self, img: &Image) -> FastResult<()> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }
        Ok(())
    }

    /// Detect oriented keypoints over the whole pyramid.
    ///
    /// Keypoints are returned in level-0 coordinates, strongest Harris
    /// response first, at most `max_features` of them.
    pub fn detect_keypoints(&self, img: &Image) -> FastResult<Vec<Keypoint>> {
        let mut keypoints: Vec<Keypoint> = self
            .detect_keypoints_with_response(img)?
            .into_iter()
            .map(|sk| sk.keypoint)
            .collect();

        keypoints.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.octave.cmp(&b.octave))
                .then(a.y.total_cmp(&b.y))
                .then(a.x.total_cmp(&b.x))
        });
        keypoints.truncate(self.cfg.max_features);

        Ok(keypoints)
    }

    /// Detect keypoints across all scales; `response` is the Harris score
    pub fn detect_keypoints_with_response(&self, img: &Image) -> FastResult<Vec<ScoredKeypoint>> {
        self.validate_image(img)?;

        let pyramid = ImagePyramid::build_image_pyramid(img, self.w, self.h, &self.scale_levels)?;

        let per_level: Vec<Vec<ScoredKeypoint>> = self
            .scale_levels
            .par_iter()
            .zip(pyramid.par_iter())
            .map(|(scale_level, scaled_img)| self.detect_keypoints_at_scale(scaled_img, scale_level))
            .collect();

        Ok(per_level.into_iter().flatten().collect())
    }

    /// Detect, suppress, refine and orient keypoints on one pyramid level,
    /// then map them to level-0 coordinates.
    pub fn detect_keypoints_at_scale(&self, img: &Image, scale_level: &ScaleLevel) -> Vec<ScoredKeypoint> {
        let (width, height) = (scale_level.width, scale_level.height);

        let corners = CornerDetector::detect_keypoints_at_scale(img, scale_level, self.cfg.threshold);
        let suppressed = KeypointRefinement::non_maximum_suppression(&corners, self.nms_distance);

        suppressed
            .into_iter()
            .map(|sk| {
                let px = sk.keypoint.x as usize;
                let py = sk.keypoint.y as usize;
                let harris = CornerDetector::compute_harris_response(img, width, height, px, py);

                let kp = if self.subpixel_refinement {
                    KeypointRefinement::refine_keypoint_subpixel(width, height, sk.keypoint, |x, y| {
                        CornerDetector::compute_harris_response(img, width, height, x, y)
                    })
                } else {
                    sk.keypoint
                };

                let angle = KeypointRefinement::compute_orientation_at_scale(
                    img,
                    kp.x,
                    kp.y,
                    scale_level,
                    self.cfg.patch_size,
                );

                ScoredKeypoint {
                    keypoint: Keypoint {
                        x: kp.x * scale_level.scale,
                        y: kp.y * scale_level.scale,
                        angle,
                        response: harris,
                        octave: scale_level.level as u8,
                        size: self.cfg.patch_size as f32 * scale_level.scale,
                    },
                    response: harris,
                }
            })
            .collect()
    }

    /// Get scale levels for this detector
    pub fn get_scale_levels(&self) -> &[ScaleLevel] {
        &self.scale_levels
    }
}
