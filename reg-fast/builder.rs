use reg_core::OrbConfig;
use crate::error::FastResult;
use crate::config::DetectorConfig;

/// Fluent builder for `DetectorConfig`, starting from an existing one.
///
/// Presets replace the detection settings but keep the thread count.
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
    config: OrbConfig,
    nms_distance: f32,
    subpixel_refinement: bool,
    name: Option<String>,
}

impl DetectorBuilder {
    /// Create builder from existing configuration
    pub fn from_config(config: DetectorConfig) -> Self {
        Self {
            config: config.core,
            nms_distance: config.nms_distance,
            subpixel_refinement: config.subpixel_refinement,
            name: config.name,
        }
    }

    /// Set the FAST threshold (1-127)
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the number of threads for parallel processing
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Cap on keypoints kept per image
    pub fn max_features(mut self, max_features: usize) -> Self {
        self.config.max_features = max_features;
        self
    }

    /// Set minimum distance for non-maximum suppression
    pub fn nms_distance(mut self, distance: f32) -> Self {
        self.nms_distance = distance;
        self
    }

    /// Enable/disable subpixel refinement
    pub fn subpixel_refinement(mut self, enable: bool) -> Self {
        self.subpixel_refinement = enable;
        self
    }

    /// Apply fast preset (optimized for speed)
    pub fn preset_fast(self) -> Self {
        let n_threads = self.config.n_threads;
        Self::from_config(DetectorConfig::fast_preset()).threads(n_threads)
    }

    /// Apply quality preset (more features, lower contrast)
    pub fn preset_quality(self) -> Self {
        let n_threads = self.config.n_threads;
        Self::from_config(DetectorConfig::quality_preset()).threads(n_threads)
    }

    /// Finish into a validated configuration
    pub fn build_config(self) -> FastResult<DetectorConfig> {
        let config = DetectorConfig {
            core: self.config,
            nms_distance: self.nms_distance,
            subpixel_refinement: self.subpixel_refinement,
            name: self.name,
        };
        config.validate()?;
        Ok(config)
    }

    /// Generate summary of current configuration
    pub fn summary(&self) -> String {
        format!(
            "DetectorBuilder: threshold={}, patch_size={}, threads={}, max_features={}, levels={}x{:.2}, NMS:{:.1}, Subpixel:{}",
            self.config.threshold, self.config.patch_size, self.config.n_threads, self.config.max_features,
            self.config.n_levels, self.config.scale_factor, self.nms_distance, self.subpixel_refinement
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FastError;

    fn builder() -> DetectorBuilder {
        DetectorBuilder::from_config(DetectorConfig::default())
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = builder()
            .threshold(35)
            .max_features(500)
            .threads(2)
            .nms_distance(4.0)
            .subpixel_refinement(false)
            .build_config()
            .unwrap();
        assert_eq!(config.core.threshold, 35);
        assert_eq!(config.core.max_features, 500);
        assert_eq!(config.core.n_threads, 2);
        assert_eq!(config.nms_distance, 4.0);
        assert!(!config.subpixel_refinement);
        assert_eq!(config.core.patch_size, 31);
    }

    #[test]
    fn test_builder_rejects_invalid_threshold() {
        let result = builder().threshold(200).build_config();
        assert!(matches!(result, Err(FastError::InvalidThreshold(200))));
    }

    #[test]
    fn test_preset_keeps_thread_count() {
        let config = builder().threads(3).preset_fast().build_config().unwrap();
        assert_eq!(config.core.n_threads, 3);
        assert_eq!(config.core.threshold, DetectorConfig::fast_preset().core.threshold);
        assert_eq!(config.name.as_deref(), Some("Fast"));

        let config = builder().threads(3).preset_quality().max_features(100).build_config().unwrap();
        assert_eq!(config.core.n_threads, 3);
        assert_eq!(config.core.max_features, 100);
        assert_eq!(config.nms_distance, DetectorConfig::quality_preset().nms_distance);
    }

    #[test]
    fn test_config_roundtrip_through_builder() {
        let config = DetectorConfig::quality_preset();
        assert_eq!(config.clone().to_builder().build_config().unwrap(), config);
    }

    #[test]
    fn test_summary() {
        let summary = builder().threshold(25).summary();
        assert!(summary.contains("threshold=25"));
    }
}
