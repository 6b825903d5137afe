//! Rotated BRIEF descriptors: 256 intensity comparisons per keypoint,
//! steered by the keypoint angle and scaled with its pyramid level.

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use reg_core::{Descriptor, Image, Keypoint, MIN_PATCH_SIZE};
use thiserror::Error;

pub const DESCRIPTOR_SIZE: usize = 32;

/// Number of point-pair tests, one bit each
pub const DESCRIPTOR_BITS: usize = DESCRIPTOR_SIZE * 8;

/// Smoothing applied before the intensity tests
const SMOOTHING_SIGMA: f32 = 2.0;

/// Fixed seed so every generator shares one sampling pattern
const PATTERN_SEED: u64 = 0x0b51_ef5e_ed00_0256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BriefError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: usize, height: usize },
    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },
    #[error("Invalid patch size {0} (must be at least 5)")]
    InvalidPatchSize(usize),
}

pub type BriefResult<T> = Result<T, BriefError>;

/// One test: compare intensity at `a` against intensity at `b`
#[derive(Debug, Clone, Copy, PartialEq)]
struct PointPair {
    a: (f32, f32),
    b: (f32, f32),
}

pub struct BriefGenerator {
    w: usize,
    h: usize,
    patch_size: usize,
    pattern: Vec<PointPair>,
}

impl BriefGenerator {
    pub fn new(width: usize, height: usize, patch_size: usize) -> BriefResult<Self> {
        if width == 0 || height == 0 {
            return Err(BriefError::InvalidImageSize { width, height });
        }
        if patch_size < MIN_PATCH_SIZE {
            return Err(BriefError::InvalidPatchSize(patch_size));
        }
        Ok(Self {
            w: width,
            h: height,
            patch_size,
            pattern: Self::sampling_pattern(patch_size),
        })
    }

    /// Deterministic test pattern: point pairs drawn uniformly from a disk
    /// that keeps a two pixel margin inside the patch.
    fn sampling_pattern(patch_size: usize) -> Vec<PointPair> {
        let radius = (patch_size / 2).saturating_sub(2).max(1) as f32;
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);

        let sample_point = |rng: &mut StdRng| loop {
            let x: f32 = rng.random_range(-radius..=radius);
            let y: f32 = rng.random_range(-radius..=radius);
            if x * x + y * y <= radius * radius {
                break (x.round(), y.round());
            }
        };

        let mut pattern = Vec::with_capacity(DESCRIPTOR_BITS);
        while pattern.len() < DESCRIPTOR_BITS {
            let a = sample_point(&mut rng);
            let b = sample_point(&mut rng);
            if a != b {
                pattern.push(PointPair { a, b });
            }
        }
        pattern
    }

    /// One descriptor per keypoint, in keypoint order.
    pub fn generate_descriptors(&self, img: &Image, kps: &[Keypoint]) -> BriefResult<Vec<Descriptor>> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(BriefError::InvalidImageData { expected_len, actual_len: img.len() });
        }
        if kps.is_empty() {
            return Ok(Vec::new());
        }

        let gray = GrayImage::from_raw(self.w as u32, self.h as u32, img.clone())
            .ok_or(BriefError::InvalidImageData { expected_len, actual_len: img.len() })?;
        let smoothed = gaussian_blur_f32(&gray, SMOOTHING_SIGMA).into_raw();

        Ok(kps
            .par_iter()
            .map(|kp| self.describe(&smoothed, kp))
            .collect())
    }

    fn describe(&self, smoothed: &[u8], kp: &Keypoint) -> Descriptor {
        let scale = kp.scale(self.patch_size);
        let (s, c) = kp.angle.sin_cos();
        let (s, c) = (s * scale, c * scale);
        let (cx, cy) = (kp.x, kp.y);

        let steer = |(dx, dy): (f32, f32)| (cx + c * dx - s * dy, cy + s * dx + c * dy);

        let mut d = [0u8; DESCRIPTOR_SIZE];
        for (i, pair) in self.pattern.iter().enumerate() {
            let (ax, ay) = steer(pair.a);
            let (bx, by) = steer(pair.b);
            let val1 = self.bilinear_sample(smoothed, ax, ay);
            let val2 = self.bilinear_sample(smoothed, bx, by);

            let bit = (val1 < val2) as u8;
            d[i / 8] |= bit << (i % 8);
        }
        d
    }

    /// Bilinear interpolation; coordinates outside the image are clamped
    fn bilinear_sample(&self, img: &[u8], x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (self.w - 1) as f32);
        let y = y.clamp(0.0, (self.h - 1) as f32);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.w - 1);
        let y1 = (y0 + 1).min(self.h - 1);

        let dx = x - x0 as f32;
        let dy = y - y0 as f32;

        let p00 = img[y0 * self.w + x0] as f32;
        let p10 = img[y0 * self.w + x1] as f32;
        let p01 = img[y1 * self.w + x0] as f32;
        let p11 = img[y1 * self.w + x1] as f32;

        let top = p00 * (1.0 - dx) + p10 * dx;
        let bottom = p01 * (1.0 - dx) + p11 * dx;

        top * (1.0 - dy) + bottom * dy
    }
}

/// Number of differing bits between two descriptors
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_image(size: usize) -> Image {
        (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                let cell = (x / 4) * 7 + (y / 4) * 11;
                (cell.wrapping_mul(2654435761) >> 9) as u8
            })
            .collect()
    }

    /// Quarter turn about the centre of a square image
    fn rotate_quarter(img: &Image, size: usize) -> Image {
        let mut out = vec![0u8; size * size];
        for y in 0..size {
            for x in 0..size {
                out[y * size + x] = img[(size - 1 - x) * size + y];
            }
        }
        out
    }

    #[test]
    fn test_hamming_distance() {
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        assert_eq!(hamming_distance(&a, &b), 0);
        b[0] = 0b1011;
        b[31] = 0xFF;
        assert_eq!(hamming_distance(&a, &b), 11);
        assert_eq!(hamming_distance(&[0xFF; 32], &[0x00; 32]), 256);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(matches!(BriefGenerator::new(0, 10, 31), Err(BriefError::InvalidImageSize { .. })));
        assert!(matches!(BriefGenerator::new(10, 10, 3), Err(BriefError::InvalidPatchSize(3))));
    }

    #[test]
    fn test_invalid_image_data() {
        let generator = BriefGenerator::new(16, 16, 31).unwrap();
        let result = generator.generate_descriptors(&vec![0; 10], &[Keypoint::new(8.0, 8.0)]);
        assert!(matches!(result, Err(BriefError::InvalidImageData { .. })));
    }

    #[test]
    fn test_pattern_is_deterministic_and_full() {
        let a = BriefGenerator::new(64, 64, 31).unwrap();
        let b = BriefGenerator::new(32, 32, 31).unwrap();
        assert_eq!(a.pattern.len(), DESCRIPTOR_BITS);
        assert_eq!(a.pattern, b.pattern);
        for pair in &a.pattern {
            for (x, y) in [pair.a, pair.b] {
                assert!(x * x + y * y <= 14.0 * 14.0);
            }
        }
    }

    #[test]
    fn test_one_descriptor_per_keypoint() {
        let img = textured_image(64);
        let generator = BriefGenerator::new(64, 64, 31).unwrap();
        let kps = vec![Keypoint::new(10.0, 10.0), Keypoint::new(32.5, 31.25), Keypoint::new(0.0, 63.0)];
        let descriptors = generator.generate_descriptors(&img, &kps).unwrap();
        assert_eq!(descriptors.len(), kps.len());
        assert!(generator.generate_descriptors(&img, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_uniform_image_gives_zero_descriptor() {
        let generator = BriefGenerator::new(40, 40, 31).unwrap();
        let descriptors = generator.generate_descriptors(&vec![90; 1600], &[Keypoint::new(20.0, 20.0)]).unwrap();
        assert_eq!(descriptors[0], [0u8; 32]);
    }

    #[test]
    fn test_descriptor_follows_rotation() {
        let size = 65;
        let img = textured_image(size);
        let rotated = rotate_quarter(&img, size);
        let generator = BriefGenerator::new(size, size, 31).unwrap();

        let mut kp = Keypoint::new(32.0, 32.0);
        kp.angle = 0.3;
        let original = generator.generate_descriptors(&img, &[kp]).unwrap()[0];

        kp.angle = 0.3 + std::f32::consts::FRAC_PI_2;
        let steered = generator.generate_descriptors(&rotated, &[kp]).unwrap()[0];
        kp.angle = 0.3;
        let unsteered = generator.generate_descriptors(&rotated, &[kp]).unwrap()[0];

        assert!(hamming_distance(&original, &steered) <= 24);
        assert!(hamming_distance(&original, &unsteered) > hamming_distance(&original, &steered));
    }
}
