use crate::error::{RegistrationError, RegistrationResult};
use reg_core::{Correspondence, Keypoint, PointPair};

/// Fewest retained correspondences that still allow estimation
pub const MIN_QUALITY_MATCHES: usize = 5;

/// Stable ascending sort by distance; equal distances keep their order
pub fn rank_matches(matches: &mut [Correspondence]) {
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// Rank and keep only matches strictly closer than `max_distance`
pub fn filter_matches(mut matches: Vec<Correspondence>, max_distance: f32) -> Vec<Correspondence> {
    rank_matches(&mut matches);
    let keep = matches.partition_point(|m| m.distance < max_distance);
    matches.truncate(keep);
    matches
}

/// Quality policy applied between matching and estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchFilter {
    pub min_matches: usize,
    pub max_distance: f32,
}

impl MatchFilter {
    pub fn new(min_matches: usize, max_distance: f32) -> Self {
        Self { min_matches, max_distance }
    }

    /// Apply the policy to raw matches.
    ///
    /// Too few raw matches fail before any ranking; too few survivors of
    /// the distance threshold fail after it.
    pub fn apply(&self, raw: Vec<Correspondence>) -> RegistrationResult<Vec<Correspondence>> {
        if raw.len() < self.min_matches {
            return Err(RegistrationError::InsufficientMatches {
                found: raw.len(),
                required: self.min_matches,
            });
        }

        let retained = filter_matches(raw, self.max_distance);
        if retained.len() < MIN_QUALITY_MATCHES {
            return Err(RegistrationError::InsufficientQualityMatches {
                retained: retained.len(),
                max_distance: self.max_distance,
            });
        }
        Ok(retained)
    }
}

/// Resolve correspondences to coordinate pairs
pub fn to_point_pairs(matches: &[Correspondence], moving: &[Keypoint], reference: &[Keypoint]) -> Vec<PointPair> {
    matches
        .iter()
        .map(|m| {
            let a = &moving[m.query_idx];
            let b = &reference[m.train_idx];
            PointPair {
                moving: [a.x as f64, a.y as f64],
                reference: [b.x as f64, b.y as f64],
            }
        })
        .collect()
}
