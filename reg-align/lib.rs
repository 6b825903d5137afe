//! Feature-based registration of one image onto another.
//!
//! ORB features are extracted from both images, matched by Hamming
//! distance, filtered by quality, and fed to a robust homography
//! estimator. The moving image is then resampled into the reference grid.

pub mod config;
pub mod error;
pub mod features;
pub mod filter;
pub mod homography;
pub mod matcher;
pub mod pipeline;
pub mod roi;
pub mod visualize;
pub mod warp;

pub use config::{RansacConfig, RegistrationConfig, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_MATCHES};
pub use error::{RegistrationError, RegistrationResult};
pub use features::{FeatureSet, OrbExtractor};
pub use filter::{filter_matches, rank_matches, to_point_pairs, MatchFilter, MIN_QUALITY_MATCHES};
pub use homography::{fit_homography_dlt, project, Estimate, Homography, HomographyEstimator, RansacEstimator};
pub use matcher::match_descriptors;
pub use pipeline::{register_image, Alignment, Registrar, Registration};
pub use roi::{PointerEvent, Roi, RoiSelector, SelectionState};
pub use visualize::{draw_matches, MATCH_VISUALIZATION_FILE};
pub use warp::warp_perspective;

pub use reg_fast::{DetectorBuilder, DetectorConfig};
