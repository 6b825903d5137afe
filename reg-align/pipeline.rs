use crate::config::RegistrationConfig;
use crate::error::{RegistrationError, RegistrationResult};
use crate::features::{FeatureSet, OrbExtractor};
use crate::filter::{to_point_pairs, MatchFilter};
use crate::homography::{Homography, HomographyEstimator, RansacEstimator};
use crate::matcher::match_descriptors;
use crate::visualize::draw_matches;
use crate::warp::warp_perspective;
use image::{DynamicImage, RgbImage};
use reg_core::Correspondence;
use tracing::{debug, info, info_span, warn};

/// Geometric outcome of matching two feature sets
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Maps moving-image coordinates onto the reference image
    pub homography: Homography,
    /// Index-aligned with `matches`
    pub inliers: Vec<bool>,
    /// Retained correspondences, closest first
    pub matches: Vec<Correspondence>,
    pub raw_match_count: usize,
}

impl Alignment {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&inlier| inlier).count()
    }
}

/// Everything a successful registration produces
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Moving image resampled into the reference grid
    pub registered: DynamicImage,
    pub matches_visualization: RgbImage,
    pub alignment: Alignment,
}

/// Feature-based registration pipeline with a pluggable estimator.
///
/// `Detect(both) -> Match -> Filter -> Estimate -> Resample`; the two
/// extractions run in parallel, everything else is sequential.
#[derive(Debug, Clone)]
pub struct Registrar<E = RansacEstimator> {
    config: RegistrationConfig,
    extractor: OrbExtractor,
    estimator: E,
}

impl Registrar<RansacEstimator> {
    pub fn new(config: RegistrationConfig) -> RegistrationResult<Self> {
        let estimator = RansacEstimator::new(config.ransac.clone());
        Self::with_estimator(config, estimator)
    }
}

impl<E: HomographyEstimator> Registrar<E> {
    pub fn with_estimator(config: RegistrationConfig, estimator: E) -> RegistrationResult<Self> {
        config.validate()?;
        debug!(config = %config.summary(), "registrar configured");
        let extractor = OrbExtractor::new(config.detector.clone())?;
        Ok(Self { config, extractor, estimator })
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Grayscale-convert and extract features from one image
    pub fn extract(&self, image: &DynamicImage) -> RegistrationResult<FeatureSet> {
        self.extractor.extract(&image.to_luma8())
    }

    /// Match, filter and estimate on precomputed features.
    ///
    /// Each set must pair every keypoint with one descriptor. The estimator is
    /// only consulted once both match-count policies pass.
    pub fn align_features(&self, moving: &FeatureSet, reference: &FeatureSet) -> RegistrationResult<Alignment> {
        for (name, set) in [("moving", moving), ("reference", reference)] {
            if set.keypoints.len() != set.descriptors.len() {
                return Err(RegistrationError::InvalidArguments(format!(
                    "{name} features have {} keypoints but {} descriptors",
                    set.keypoints.len(),
                    set.descriptors.len()
                )));
            }
        }

        let raw = match_descriptors(&moving.descriptors, &reference.descriptors);
        let raw_match_count = raw.len();
        debug!(raw_match_count, "matched descriptors");

        let filter = MatchFilter::new(self.config.min_matches, self.config.max_distance);
        let matches = filter.apply(raw).inspect_err(|e| warn!(error = %e, "match filtering failed"))?;
        debug!(retained = matches.len(), max_distance = self.config.max_distance, "filtered matches");

        let pairs = to_point_pairs(&matches, &moving.keypoints, &reference.keypoints);
        let (moving_pts, reference_pts): (Vec<[f64; 2]>, Vec<[f64; 2]>) =
            pairs.iter().map(|p| (p.moving, p.reference)).unzip();

        let estimate = self
            .estimator
            .estimate(&moving_pts, &reference_pts)
            .inspect_err(|e| warn!(error = %e, "homography estimation failed"))?;

        Ok(Alignment {
            homography: estimate.homography,
            inliers: estimate.inlier_mask,
            matches,
            raw_match_count,
        })
    }

    /// Register `moving` onto `reference`.
    ///
    /// The result has the reference's dimensions and the moving image's
    /// channel layout. Inputs are expected to be cropped already.
    pub fn register(&self, moving: &DynamicImage, reference: &DynamicImage) -> RegistrationResult<Registration> {
        let _span = info_span!(
            "register_image",
            moving = ?(moving.width(), moving.height()),
            reference = ?(reference.width(), reference.height())
        )
        .entered();

        for image in [moving, reference] {
            if image.width() == 0 || image.height() == 0 {
                return Err(RegistrationError::EmptyImage { width: image.width(), height: image.height() });
            }
        }

        let extractor = &self.extractor;
        let (moving_features, reference_features) = rayon::join(
            || extractor.extract(&moving.to_luma8()),
            || extractor.extract(&reference.to_luma8()),
        );
        let (moving_features, reference_features) = (moving_features?, reference_features?);
        debug!(
            moving = moving_features.len(),
            reference = reference_features.len(),
            "extracted features"
        );

        let alignment = self.align_features(&moving_features, &reference_features)?;
        let registered = warp_perspective(moving, &alignment.homography, reference.width(), reference.height())?;
        let matches_visualization = draw_matches(
            moving,
            &moving_features.keypoints,
            reference,
            &reference_features.keypoints,
            &alignment.matches,
        );

        info!(
            matches = alignment.matches.len(),
            inliers = alignment.inlier_count(),
            "registration complete"
        );
        Ok(Registration { registered, matches_visualization, alignment })
    }
}

/// Register with the default configuration and RANSAC estimator
pub fn register_image(moving: &DynamicImage, reference: &DynamicImage) -> RegistrationResult<Registration> {
    Registrar::new(RegistrationConfig::default())?.register(moving, reference)
}
