//! Front-end helpers for the `image-registration` binary: loading and
//! saving images, literal crops, output naming and user-facing messages.

use image::{DynamicImage, ImageReader};
use clap::ValueEnum;
use reg_align::{
    DetectorConfig, Registrar, Registration, RegistrationConfig, RegistrationError, RegistrationResult, Roi,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use reg_align::{self, MATCH_VISUALIZATION_FILE};

/// Everything one run of the front end needs
#[derive(Debug, Clone)]
pub struct Invocation {
    pub moving_path: PathBuf,
    pub reference_path: PathBuf,
    pub moving_crop: Option<Roi>,
    pub reference_crop: Option<Roi>,
    pub config: RegistrationConfig,
    pub visualization_path: PathBuf,
}

impl Invocation {
    pub fn new(moving_path: impl Into<PathBuf>, reference_path: impl Into<PathBuf>) -> Self {
        Self {
            moving_path: moving_path.into(),
            reference_path: reference_path.into(),
            moving_crop: None,
            reference_crop: None,
            config: RegistrationConfig::default(),
            visualization_path: PathBuf::from(MATCH_VISUALIZATION_FILE),
        }
    }
}

/// Named detector settings selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Fewer, stronger features on a shallower pyramid
    Fast,
    /// More features, tolerant of low contrast
    Quality,
}

/// Command-line overrides applied on top of the loaded detector settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorTuning {
    pub preset: Option<Preset>,
    pub threshold: Option<u8>,
    pub max_features: Option<usize>,
    pub threads: Option<usize>,
    pub nms_distance: Option<f32>,
    pub no_subpixel: bool,
}

/// Apply `tuning` to `detector`: the preset first, then each explicit override.
pub fn tune_detector(detector: DetectorConfig, tuning: &DetectorTuning) -> RegistrationResult<DetectorConfig> {
    let mut builder = detector.to_builder();
    builder = match tuning.preset {
        Some(Preset::Fast) => builder.preset_fast(),
        Some(Preset::Quality) => builder.preset_quality(),
        None => builder,
    };
    if let Some(threshold) = tuning.threshold {
        builder = builder.threshold(threshold);
    }
    if let Some(max_features) = tuning.max_features {
        builder = builder.max_features(max_features);
    }
    if let Some(n_threads) = tuning.threads {
        builder = builder.threads(n_threads);
    }
    if let Some(distance) = tuning.nms_distance {
        builder = builder.nms_distance(distance);
    }
    if tuning.no_subpixel {
        builder = builder.subpixel_refinement(false);
    }
    debug!(detector = %builder.summary(), "tuned detector");
    builder.build_config().map_err(|e| RegistrationError::InvalidConfig(e.to_string()))
}

/// Where the outputs of a successful run were written
#[derive(Debug)]
pub struct Outcome {
    pub aligned_path: PathBuf,
    pub visualization_path: PathBuf,
    pub registration: Registration,
}

/// Load, crop, register and save.
///
/// The match visualization is written before the registered image; either
/// write failing aborts the run.
pub fn run(invocation: &Invocation) -> RegistrationResult<Outcome> {
    let registrar = Registrar::new(invocation.config.clone())?;

    let moving = load_cropped(&invocation.moving_path, invocation.moving_crop)?;
    let reference = load_cropped(&invocation.reference_path, invocation.reference_crop)?;

    info!("initiating image registration");
    let registration = registrar.register(&moving, &reference)?;

    let visualization_path = invocation.visualization_path.clone();
    save_image(&DynamicImage::ImageRgb8(registration.matches_visualization.clone()), &visualization_path)?;

    let aligned_path = aligned_output_path(&invocation.moving_path);
    save_image(&registration.registered, &aligned_path)?;

    Ok(Outcome { aligned_path, visualization_path, registration })
}

fn load_cropped(path: &Path, crop: Option<Roi>) -> RegistrationResult<DynamicImage> {
    let image = load_image(path)?;
    match crop {
        Some(roi) => {
            info!(path = %path.display(), %roi, "cropping");
            roi.crop(&image)
        }
        None => Ok(image),
    }
}

/// Decode an image file, format guessed from its contents
pub fn load_image(path: &Path) -> RegistrationResult<DynamicImage> {
    let load_error = |reason: String| RegistrationError::ImageLoad { path: path.display().to_string(), reason };
    ImageReader::open(path)
        .map_err(|e| load_error(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| load_error(e.to_string()))?
        .decode()
        .map_err(|e| load_error(e.to_string()))
}

/// Encode an image, format chosen by extension
pub fn save_image(image: &DynamicImage, path: &Path) -> RegistrationResult<()> {
    image.save(path).map_err(|e| RegistrationError::ImageSave {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Build a literal crop from `X Y W H`
pub fn roi_from_args(values: &[u32]) -> RegistrationResult<Roi> {
    match *values {
        [x, y, width, height] if width > 0 && height > 0 => Ok(Roi::new(x, y, width, height)),
        [_, _, _, _] => Err(RegistrationError::InvalidArguments(
            "crop width and height must be positive".into(),
        )),
        _ => Err(RegistrationError::InvalidArguments(format!(
            "a crop takes 4 values, got {}",
            values.len()
        ))),
    }
}

/// `<moving path without extension>-aligned.png`.
///
/// Only a dot inside the file name starts an extension; a name without one
/// gets the suffix appended.
pub fn aligned_output_path(moving_path: &Path) -> PathBuf {
    let name = moving_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.rfind('.').map_or(name.as_str(), |dot| &name[..dot]);
    moving_path.with_file_name(format!("{stem}-aligned.png"))
}

/// Message shown to the user when a run fails
pub fn failure_message(error: &RegistrationError) -> String {
    match error {
        RegistrationError::InvalidArguments(_) => "Incorrect input. Please review the documentation or run \
             the command 'image-registration -h' for more information."
            .to_string(),
        RegistrationError::InvalidConfig(reason) => format!("The configuration is invalid: {reason}."),
        RegistrationError::ImageLoad { path, .. } => {
            format!("Loading of image '{path}' failed. Please ensure that the name of the file is valid.")
        }
        RegistrationError::ImageSave { path, reason } => format!("Saving of image '{path}' failed: {reason}."),
        RegistrationError::NoRegionSelected => {
            "No registration can be performed because the ROI was not selected. Terminating.".to_string()
        }
        RegistrationError::InvalidRegion { roi, width, height } => {
            format!("The crop region {roi} lies outside the {width}x{height} image. Terminating.")
        }
        RegistrationError::EmptyImage { .. } => {
            "An input image is empty, so no registration can be performed.".to_string()
        }
        RegistrationError::InsufficientMatches { .. } => error.to_string(),
        RegistrationError::InsufficientQualityMatches { .. } => {
            "Matches were found, but too few were of sufficient quality to perform image registration.".to_string()
        }
        RegistrationError::EstimationFailure(reason) => {
            format!("No consistent transformation between the images was found: {reason}.")
        }
        RegistrationError::Detector(e) => format!("Feature detection failed: {e}."),
        RegistrationError::Descriptor(e) => format!("Descriptor generation failed: {e}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_aligned_path_replaces_extension() {
        assert_eq!(
            aligned_output_path(Path::new("data/scan.v2.jpg")),
            PathBuf::from("data/scan.v2-aligned.png")
        );
        assert_eq!(aligned_output_path(Path::new("photo")), PathBuf::from("photo-aligned.png"));
    }

    #[test]
    fn test_aligned_path_ignores_dots_in_directories() {
        assert_eq!(
            aligned_output_path(Path::new("./out.d/photo")),
            PathBuf::from("./out.d/photo-aligned.png")
        );
    }

    #[test]
    fn test_roi_from_args() {
        assert_eq!(roi_from_args(&[5, 6, 20, 30]), Ok(Roi::new(5, 6, 20, 30)));
        assert!(matches!(roi_from_args(&[5, 6, 0, 30]), Err(RegistrationError::InvalidArguments(_))));
        assert!(matches!(roi_from_args(&[5, 6, 20]), Err(RegistrationError::InvalidArguments(_))));
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let errors = [
            RegistrationError::InvalidArguments("x".into()),
            RegistrationError::InvalidConfig("x".into()),
            RegistrationError::ImageLoad { path: "a.png".into(), reason: "x".into() },
            RegistrationError::ImageSave { path: "a.png".into(), reason: "x".into() },
            RegistrationError::NoRegionSelected,
            RegistrationError::InvalidRegion { roi: Roi::new(50, 50, 5, 5), width: 10, height: 10 },
            RegistrationError::EmptyImage { width: 0, height: 0 },
            RegistrationError::InsufficientMatches { found: 3, required: 50 },
            RegistrationError::InsufficientQualityMatches { retained: 2, max_distance: 25.0 },
            RegistrationError::EstimationFailure("x".into()),
        ];
        let messages: Vec<String> = errors.iter().map(failure_message).collect();
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(
            messages[7],
            "3 matches were found, which is insufficient. The minimum number is 50."
        );
        assert_eq!(
            messages[2],
            "Loading of image 'a.png' failed. Please ensure that the name of the file is valid."
        );
    }

    #[test]
    fn test_tuning_without_overrides_keeps_config() {
        let detector = DetectorConfig::default();
        assert_eq!(tune_detector(detector.clone(), &DetectorTuning::default()), Ok(detector));
    }

    #[test]
    fn test_preset_then_overrides() {
        let mut detector = DetectorConfig::default();
        detector.core.n_threads = 3;
        let tuning = DetectorTuning {
            preset: Some(Preset::Fast),
            max_features: Some(250),
            no_subpixel: true,
            ..DetectorTuning::default()
        };
        let tuned = tune_detector(detector, &tuning).unwrap();
        let fast = DetectorConfig::fast_preset();
        assert_eq!(tuned.core.threshold, fast.core.threshold);
        assert_eq!(tuned.core.n_levels, fast.core.n_levels);
        assert_eq!(tuned.core.max_features, 250);
        assert_eq!(tuned.core.n_threads, 3);
        assert!(!tuned.subpixel_refinement);

        let quality = tune_detector(DetectorConfig::default(), &DetectorTuning {
            preset: Some(Preset::Quality),
            threshold: Some(40),
            ..DetectorTuning::default()
        })
        .unwrap();
        assert_eq!(quality.core.max_features, DetectorConfig::quality_preset().core.max_features);
        assert_eq!(quality.core.threshold, 40);
    }

    #[test]
    fn test_invalid_override_is_a_config_error() {
        let tuning = DetectorTuning { threshold: Some(0), ..DetectorTuning::default() };
        assert!(matches!(
            tune_detector(DetectorConfig::default(), &tuning),
            Err(RegistrationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_image_is_a_load_failure() {
        let err = load_image(Path::new("definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, RegistrationError::ImageLoad { ref path, .. } if path.contains("here.png")));
    }

    #[test]
    fn test_run_reports_load_failure_before_registering() {
        let dir = std::env::temp_dir().join("reg-cli-run-load-failure");
        std::fs::create_dir_all(&dir).unwrap();
        let reference = dir.join("reference.png");
        GrayImage::from_pixel(16, 16, Luma([9])).save(&reference).unwrap();

        let invocation = Invocation::new(dir.join("missing.png"), &reference);
        assert!(matches!(run(&invocation), Err(RegistrationError::ImageLoad { .. })));
    }
}
