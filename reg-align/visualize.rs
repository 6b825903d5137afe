use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use reg_core::{Correspondence, Keypoint};

/// File the front end writes the match visualization to
pub const MATCH_VISUALIZATION_FILE: &str = "matching-keypoints.jpg";

const PALETTE: [[u8; 3]; 8] = [
    [255, 64, 64],
    [64, 255, 64],
    [64, 128, 255],
    [255, 220, 0],
    [255, 0, 255],
    [0, 230, 230],
    [255, 140, 0],
    [160, 90, 255],
];

/// Side-by-side rendering of matched keypoints: moving image on the left,
/// reference on the right, a circle on each matched keypoint and a line
/// joining every pair.
pub fn draw_matches(
    moving: &DynamicImage,
    moving_keypoints: &[Keypoint],
    reference: &DynamicImage,
    reference_keypoints: &[Keypoint],
    matches: &[Correspondence],
) -> RgbImage {
    let (mw, mh) = (moving.width(), moving.height());
    let (rw, rh) = (reference.width(), reference.height());

    let mut canvas = RgbImage::new(mw + rw, mh.max(rh));
    imageops::replace(&mut canvas, &moving.to_rgb8(), 0, 0);
    imageops::replace(&mut canvas, &reference.to_rgb8(), mw as i64, 0);

    for (i, m) in matches.iter().enumerate() {
        let (Some(a), Some(b)) = (moving_keypoints.get(m.query_idx), reference_keypoints.get(m.train_idx)) else {
            continue;
        };
        let color = Rgb(PALETTE[i % PALETTE.len()]);
        let start = (a.x, a.y);
        let end = (b.x + mw as f32, b.y);

        draw_hollow_circle_mut(&mut canvas, (start.0.round() as i32, start.1.round() as i32), 4, color);
        draw_hollow_circle_mut(&mut canvas, (end.0.round() as i32, end.1.round() as i32), 4, color);
        draw_line_segment_mut(&mut canvas, start, end, color);
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_canvas_layout() {
        let moving = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 20, Luma([10])));
        let reference = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 25, Luma([200])));
        let canvas = draw_matches(&moving, &[], &reference, &[], &[]);

        assert_eq!(canvas.dimensions(), (70, 25));
        assert_eq!(canvas.get_pixel(5, 5).0, [10, 10, 10]);
        assert_eq!(canvas.get_pixel(35, 5).0, [200, 200, 200]);
        assert_eq!(canvas.get_pixel(5, 22).0, [0, 0, 0]);
    }

    #[test]
    fn test_matches_are_drawn() {
        let moving = DynamicImage::ImageLuma8(GrayImage::new(30, 30));
        let reference = DynamicImage::ImageLuma8(GrayImage::new(30, 30));
        let kps = vec![Keypoint::new(10.0, 15.0)];
        let matches = vec![Correspondence { query_idx: 0, train_idx: 0, distance: 1.0 }];
        let canvas = draw_matches(&moving, &kps, &reference, &kps, &matches);

        // Line from (10, 15) to (40, 15) crosses the seam
        assert_eq!(canvas.get_pixel(30, 15).0, PALETTE[0]);
        assert_eq!(canvas.get_pixel(14, 15).0, PALETTE[0]);
    }

    #[test]
    fn test_out_of_range_indices_are_skipped() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        let matches = vec![Correspondence { query_idx: 3, train_idx: 0, distance: 1.0 }];
        let canvas = draw_matches(&img, &[], &img, &[Keypoint::new(1.0, 1.0)], &matches);
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0]));
    }
}
