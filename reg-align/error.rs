use crate::roi::Roi;
use reg_brief::BriefError;
use reg_fast::FastError;
use thiserror::Error;

/// Every way a registration call can fail. All kinds are terminal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("Incorrect input: {0}")]
    InvalidArguments(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Loading of image '{path}' failed: {reason}")]
    ImageLoad { path: String, reason: String },
    #[error("Saving image '{path}' failed: {reason}")]
    ImageSave { path: String, reason: String },
    #[error("No region of interest was selected")]
    NoRegionSelected,
    #[error("Region {roi} does not overlap the {width}x{height} image")]
    InvalidRegion { roi: Roi, width: u32, height: u32 },
    #[error("Image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("{found} matches were found, which is insufficient. The minimum number is {required}.")]
    InsufficientMatches { found: usize, required: usize },
    #[error("Only {retained} matches are closer than distance {max_distance}, too few to estimate a homography")]
    InsufficientQualityMatches { retained: usize, max_distance: f32 },
    #[error("Homography estimation failed: {0}")]
    EstimationFailure(String),
    #[error("Feature detection failed: {0}")]
    Detector(#[from] FastError),
    #[error("Descriptor generation failed: {0}")]
    Descriptor(#[from] BriefError),
}

pub type RegistrationResult<T> = Result<T, RegistrationError>;
