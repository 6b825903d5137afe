use crate::error::{RegistrationError, RegistrationResult};
use crate::homography::Homography;
use image::{DynamicImage, ImageBuffer, Pixel};
use nalgebra::Vector3;
use rayon::prelude::*;

/// Resample `moving` into a `width` x `height` grid through `h`.
///
/// Every output pixel is mapped back through `h⁻¹` and sampled bilinearly;
/// pixels whose source falls outside the moving image stay zero. 8-bit
/// Luma, LumaA, Rgb and Rgba layouts are kept, anything else is converted
/// to Rgba8 first.
pub fn warp_perspective(
    moving: &DynamicImage,
    h: &Homography,
    width: u32,
    height: u32,
) -> RegistrationResult<DynamicImage> {
    let inverse = h
        .try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
        .ok_or_else(|| RegistrationError::EstimationFailure("homography is not invertible".into()))?;

    Ok(match moving {
        DynamicImage::ImageLuma8(img) => DynamicImage::ImageLuma8(warp_buffer(img, &inverse, width, height)?),
        DynamicImage::ImageLumaA8(img) => DynamicImage::ImageLumaA8(warp_buffer(img, &inverse, width, height)?),
        DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(warp_buffer(img, &inverse, width, height)?),
        DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(warp_buffer(img, &inverse, width, height)?),
        other => DynamicImage::ImageRgba8(warp_buffer(&other.to_rgba8(), &inverse, width, height)?),
    })
}

fn warp_buffer<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    inverse: &Homography,
    width: u32,
    height: u32,
) -> RegistrationResult<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let channels = P::CHANNEL_COUNT as usize;
    let (src_w, src_h) = (src.width() as usize, src.height() as usize);
    let row_len = width as usize * channels;
    let mut out = vec![0u8; row_len * height as usize];

    if src_w > 0 && src_h > 0 && row_len > 0 {
        let raw = src.as_raw();
        out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(channels).enumerate() {
                let q = inverse * Vector3::new(x as f64, y as f64, 1.0);
                if q[2].abs() < 1e-12 {
                    continue;
                }
                let (sx, sy) = (q[0] / q[2], q[1] / q[2]);
                if !(sx >= 0.0 && sy >= 0.0 && sx <= (src_w - 1) as f64 && sy <= (src_h - 1) as f64) {
                    continue;
                }
                bilinear_into(raw, src_w, src_h, channels, sx, sy, px);
            }
        });
    }

    ImageBuffer::from_raw(width, height, out).ok_or(RegistrationError::EmptyImage { width, height })
}

/// Bilinear sample of every channel at an in-bounds position
fn bilinear_into(raw: &[u8], w: usize, h: usize, channels: usize, x: f64, y: f64, out: &mut [u8]) {
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let at = |xx: usize, yy: usize, c: usize| raw[(yy * w + xx) * channels + c] as f64;
    for (c, value) in out.iter_mut().enumerate() {
        let top = at(x0, y0, c) * (1.0 - fx) + at(x1, y0, c) * fx;
        let bottom = at(x0, y1, c) * (1.0 - fx) + at(x1, y1, c) * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
}
