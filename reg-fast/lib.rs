//! Multi-scale FAST-9 corner detection for ORB features.
//!
//! Corners are found with the segment test on every level of a scale
//! pyramid, thinned by non-maximum suppression, optionally refined to
//! subpixel precision, oriented by intensity centroid and ranked by their
//! Harris response. Keypoints come back in full-resolution coordinates.

pub mod builder;
pub mod config;
pub mod corner_detection;
pub mod detector;
pub mod error;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

pub use builder::DetectorBuilder;
pub use config::DetectorConfig;
pub use corner_detection::CornerDetector;
pub use detector::{FastDetector, MIN_IMAGE_SIZE};
pub use error::{FastError, FastResult};
pub use pyramid::ImagePyramid;
pub use refinement::KeypointRefinement;
pub use types::{ScaleLevel, ScoredKeypoint};
