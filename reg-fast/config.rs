use reg_core::{OrbConfig, MIN_PATCH_SIZE};
use crate::error::{FastError, FastResult};
use crate::builder::DetectorBuilder;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// Deepest pyramid a keypoint's `octave` can record
pub const MAX_LEVELS: usize = u8::MAX as usize + 1;

/// Complete detector configuration, independent of image size
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorConfig {
    /// Core ORB configuration
    pub core: OrbConfig,
    /// Minimum distance between kept corners on one level
    pub nms_distance: f32,
    pub subpixel_refinement: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            core: OrbConfig::default(),
            nms_distance: 3.0,
            subpixel_refinement: true,
            name: None,
        }
    }
}

impl DetectorConfig {
    /// Fewer, stronger features on a shallower pyramid
    pub fn fast_preset() -> Self {
        Self {
            core: OrbConfig {
                threshold: 30,
                max_features: 1000,
                n_levels: 4,
                ..OrbConfig::default()
            },
            nms_distance: 5.0,
            subpixel_refinement: false,
            name: Some("Fast".to_string()),
        }
    }

    /// Lower threshold and tighter suppression for low-contrast scenes
    pub fn quality_preset() -> Self {
        Self {
            core: OrbConfig {
                threshold: 12,
                max_features: 8000,
                ..OrbConfig::default()
            },
            nms_distance: 2.0,
            subpixel_refinement: true,
            name: Some("Quality".to_string()),
        }
    }

    /// Convert to DetectorBuilder for further customization
    pub fn to_builder(self) -> DetectorBuilder {
        DetectorBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "DetectorConfig: threshold={}, patch_size={}, max_features={}, levels={}x{:.2}, NMS:{:.1}, Subpixel:{}",
            self.core.threshold, self.core.patch_size, self.core.max_features,
            self.core.n_levels, self.core.scale_factor, self.nms_distance, self.subpixel_refinement
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> FastResult<()> {
        if self.core.threshold == 0 || self.core.threshold > 127 {
            return Err(FastError::InvalidThreshold(self.core.threshold));
        }
        if self.core.patch_size < MIN_PATCH_SIZE || self.core.patch_size % 2 == 0 {
            return Err(FastError::InvalidPatchSize(self.core.patch_size));
        }
        if self.core.n_levels == 0 || self.core.n_levels > MAX_LEVELS || !(self.core.scale_factor > 1.0) {
            return Err(FastError::InvalidPyramid {
                n_levels: self.core.n_levels,
                scale_factor: self.core.scale_factor,
            });
        }
        Ok(())
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.nms_distance, 3.0);
        assert!(config.subpixel_refinement);
    }

    #[test]
    fn test_presets_are_valid() {
        for config in [DetectorConfig::fast_preset(), DetectorConfig::quality_preset()] {
            assert!(config.validate().is_ok(), "{}", config.summary());
            assert!(config.name.is_some());
        }
    }

    #[test]
    fn test_validation_errors() {
        let mut config = DetectorConfig::default();
        config.core.threshold = 0;
        assert_eq!(config.validate(), Err(FastError::InvalidThreshold(0)));

        let mut config = DetectorConfig::default();
        config.core.patch_size = 30;
        assert_eq!(config.validate(), Err(FastError::InvalidPatchSize(30)));

        let mut config = DetectorConfig::default();
        config.core.scale_factor = 0.5;
        assert!(matches!(config.validate(), Err(FastError::InvalidPyramid { .. })));
    }

    #[test]
    fn test_patch_must_fit_descriptor_pattern() {
        let mut config = DetectorConfig::default();
        config.core.patch_size = 3;
        assert_eq!(config.validate(), Err(FastError::InvalidPatchSize(3)));
        config.core.patch_size = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_level_count_fits_octave() {
        let mut config = DetectorConfig::default();
        config.core.n_levels = MAX_LEVELS;
        assert!(config.validate().is_ok());
        config.core.n_levels = MAX_LEVELS + 1;
        assert!(matches!(config.validate(), Err(FastError::InvalidPyramid { n_levels, .. }) if n_levels == MAX_LEVELS + 1));
    }

    #[test]
    fn test_summary_mentions_threshold() {
        let summary = DetectorConfig::default().summary();
        assert!(summary.contains("threshold=20"));
        assert!(summary.contains("max_features=4000"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_and_toml_roundtrip() {
        let config = DetectorConfig::quality_preset();
        let json = config.to_json().unwrap();
        assert_eq!(DetectorConfig::from_json(&json).unwrap(), config);
        let toml = config.to_toml().unwrap();
        assert_eq!(DetectorConfig::from_toml(&toml).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_invalid_json_rejected_on_load() {
        let mut config = DetectorConfig::default();
        config.core.threshold = 0;
        let json = config.to_json().unwrap();
        assert!(DetectorConfig::from_json(&json).is_err());
    }
}
