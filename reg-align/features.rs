use crate::error::RegistrationResult;
use image::GrayImage;
use reg_brief::BriefGenerator;
use reg_core::{Descriptor, Image, Keypoint};
use reg_fast::{DetectorConfig, FastDetector, MIN_IMAGE_SIZE};
use tracing::debug;

/// Keypoints and their descriptors, index-aligned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// ORB feature extractor: FAST keypoints plus rotated BRIEF descriptors.
///
/// Detector and descriptor generator are sized per image, so one extractor
/// serves inputs of any dimensions.
#[derive(Debug, Clone)]
pub struct OrbExtractor {
    config: DetectorConfig,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self { config: DetectorConfig::default() }
    }
}

impl OrbExtractor {
    pub fn new(config: DetectorConfig) -> RegistrationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect keypoints and describe them, strongest first, at most
    /// `max_features`. Images too small for the segment test yield an empty
    /// set.
    pub fn extract(&self, gray: &GrayImage) -> RegistrationResult<FeatureSet> {
        let (width, height) = (gray.width() as usize, gray.height() as usize);
        if width < MIN_IMAGE_SIZE || height < MIN_IMAGE_SIZE {
            debug!(width, height, "image below detector minimum, no features");
            return Ok(FeatureSet::default());
        }

        let img: &Image = gray.as_raw();
        let detector = FastDetector::with_config(&self.config, width, height)?;
        let keypoints = detector.detect_keypoints(img)?;

        let brief = BriefGenerator::new(width, height, self.config.core.patch_size)?;
        let descriptors = brief.generate_descriptors(img, &keypoints)?;

        debug!(
            width,
            height,
            levels = detector.get_scale_levels().len(),
            keypoints = keypoints.len(),
            "extracted features"
        );
        Ok(FeatureSet { keypoints, descriptors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blocky(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let cell = (x / 7) * 13 + (y / 7) * 29;
            Luma([(cell.wrapping_mul(2654435761) >> 11) as u8])
        })
    }

    #[test]
    fn test_descriptors_align_with_keypoints() {
        let features = OrbExtractor::default().extract(&blocky(120, 100)).unwrap();
        assert!(!features.is_empty());
        assert_eq!(features.keypoints.len(), features.descriptors.len());
    }

    #[test]
    fn test_feature_cap_keeps_strongest() {
        let img = blocky(160, 120);
        let all = OrbExtractor::default().extract(&img).unwrap();

        let mut config = DetectorConfig::default();
        config.core.max_features = 10;
        let capped = OrbExtractor::new(config).unwrap().extract(&img).unwrap();

        assert_eq!(capped.len(), 10.min(all.len()));
        assert_eq!(&all.keypoints[..capped.len()], &capped.keypoints[..]);
        assert_eq!(&all.descriptors[..capped.len()], &capped.descriptors[..]);
    }

    #[test]
    fn test_tiny_and_flat_images_have_no_features() {
        let extractor = OrbExtractor::default();
        assert!(extractor.extract(&GrayImage::new(5, 40)).unwrap().is_empty());
        assert!(extractor.extract(&GrayImage::from_pixel(64, 64, Luma([128]))).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DetectorConfig::default();
        config.core.patch_size = 8;
        assert!(OrbExtractor::new(config).is_err());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let img = blocky(100, 90);
        let extractor = OrbExtractor::default();
        assert_eq!(extractor.extract(&img).unwrap(), extractor.extract(&img).unwrap());
    }
}
