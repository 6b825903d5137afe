use rayon::prelude::*;
use reg_brief::hamming_distance;
use reg_core::{Correspondence, Descriptor};

/// Brute-force nearest neighbour under Hamming distance.
///
/// Produces exactly one correspondence per moving descriptor, in moving
/// order; ties go to the lowest reference index. Not cross-checked, so
/// several moving descriptors may share a reference descriptor.
pub fn match_descriptors(moving: &[Descriptor], reference: &[Descriptor]) -> Vec<Correspondence> {
    if moving.is_empty() || reference.is_empty() {
        return Vec::new();
    }

    moving
        .par_iter()
        .enumerate()
        .map(|(query_idx, query)| {
            let (train_idx, distance) = reference
                .iter()
                .enumerate()
                .map(|(i, candidate)| (i, hamming_distance(query, candidate)))
                .min_by_key(|&(i, distance)| (distance, i))
                .unwrap_or((0, u32::MAX));
            Correspondence { query_idx, train_idx, distance: distance as f32 }
        })
        .collect()
}
