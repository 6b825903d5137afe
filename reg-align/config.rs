use crate::error::{RegistrationError, RegistrationResult};
use reg_fast::DetectorConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum raw correspondences before any filtering
pub const DEFAULT_MIN_MATCHES: usize = 50;

/// Hamming distance a correspondence must stay strictly below
pub const DEFAULT_MAX_DISTANCE: f32 = 25.0;

/// Robust homography estimation settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    /// Inlier threshold on reprojection error, in reference pixels
    pub reprojection_threshold: f64,
    /// Probability of having drawn at least one all-inlier sample
    pub confidence: f64,
    pub max_iters: usize,
    pub seed: u64,
    /// Re-fit on all inliers of the best model
    pub refine: bool,
    /// Reject models whose inlier ratio is below this; 0 disables the check
    pub min_inlier_ratio: f64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reprojection_threshold: 3.0,
            confidence: 0.995,
            max_iters: 2000,
            seed: 0,
            refine: true,
            min_inlier_ratio: 0.0,
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> RegistrationResult<()> {
        if !(self.reprojection_threshold > 0.0) || !self.reprojection_threshold.is_finite() {
            return Err(RegistrationError::InvalidConfig(format!(
                "reprojection threshold must be positive, got {}",
                self.reprojection_threshold
            )));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(RegistrationError::InvalidConfig(format!(
                "confidence must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        if self.max_iters == 0 {
            return Err(RegistrationError::InvalidConfig("max_iters must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_inlier_ratio) {
            return Err(RegistrationError::InvalidConfig(format!(
                "min_inlier_ratio must lie in [0, 1], got {}",
                self.min_inlier_ratio
            )));
        }
        Ok(())
    }
}

/// Every tunable of the registration pipeline
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistrationConfig {
    pub detector: DetectorConfig,
    pub min_matches: usize,
    pub max_distance: f32,
    pub ransac: RansacConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            min_matches: DEFAULT_MIN_MATCHES,
            max_distance: DEFAULT_MAX_DISTANCE,
            ransac: RansacConfig::default(),
        }
    }
}

impl RegistrationConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> RegistrationResult<()> {
        self.detector.validate()?;
        self.ransac.validate()?;
        if !(self.max_distance > 0.0) {
            return Err(RegistrationError::InvalidConfig(format!(
                "max_distance must be positive, got {}",
                self.max_distance
            )));
        }
        Ok(())
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "RegistrationConfig: [{}], min_matches={}, max_distance={:.1}, ransac(threshold={:.1}, confidence={}, max_iters={}, seed={})",
            self.detector.summary(),
            self.min_matches,
            self.max_distance,
            self.ransac.reprojection_threshold,
            self.ransac.confidence,
            self.ransac.max_iters,
            self.ransac.seed
        )
    }

    /// Load from a `.json` or `.toml` file, chosen by extension
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Save as JSON or TOML, chosen by extension
    #[cfg(feature = "serde")]
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => self.to_toml()?,
            _ => self.to_json()?,
        };
        std::fs::write(path, content)?;
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
