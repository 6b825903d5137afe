#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
pub type Image = Vec<u8>;

/// Key-point ≙ FAST corner + orientation (radians) with subpixel precision.
///
/// Coordinates are always expressed in the level-0 (full resolution) frame,
/// whatever pyramid level the corner was found on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,      // Subpixel x coordinate
    pub y: f32,      // Subpixel y coordinate
    pub angle: f32,
    /// Ranking strength (Harris score at the detection level)
    pub response: f32,
    /// Pyramid level the keypoint was detected on
    pub octave: u8,
    /// Diameter of the described patch, in level-0 pixels
    pub size: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            angle: 0.0,
            response: 0.0,
            octave: 0,
            size: 0.0,
        }
    }

    /// Scale of the detection level relative to level 0
    pub fn scale(&self, patch_size: usize) -> f32 {
        if self.size > 0.0 && patch_size > 0 {
            self.size / patch_size as f32
        } else {
            1.0
        }
    }
}

/// Smallest odd patch that still leaves room for a descriptor pattern
pub const MIN_PATCH_SIZE: usize = 5;

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// A moving-image keypoint paired with its nearest reference keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the moving image's keypoints
    pub query_idx: usize,
    /// Index into the reference image's keypoints
    pub train_idx: usize,
    /// Descriptor distance (Hamming, as float)
    pub distance: f32,
}

/// Matched coordinates, one point per image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    pub moving: [f64; 2],
    pub reference: [f64; 2],
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OrbConfig {
    pub threshold: u8,
    pub patch_size: usize,
    pub n_threads: usize,
    /// Upper bound on keypoints kept per image, strongest first
    pub max_features: usize,
    /// Maximum number of pyramid levels
    pub n_levels: usize,
    /// Downscale factor between consecutive pyramid levels
    pub scale_factor: f32,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            patch_size: 31,
            n_threads: num_cpus::get().max(1),
            max_features: 4000,
            n_levels: 8,
            scale_factor: 1.2,
        }
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_registration_defaults() {
        let cfg = OrbConfig::default();
        assert_eq!(cfg.max_features, 4000);
        assert_eq!(cfg.threshold, 20);
        assert_eq!(cfg.patch_size % 2, 1);
        assert!(cfg.n_threads >= 1);
    }

    #[test]
    fn keypoint_scale_from_size() {
        let mut kp = Keypoint::new(10.0, 12.0);
        assert_eq!(kp.scale(31), 1.0);
        kp.size = 31.0 * 1.44;
        assert!((kp.scale(31) - 1.44).abs() < 1e-5);
    }
}
