//! Bit helpers for the FAST segment test

/// Pack the 16 circle comparisons into a mask, bit `i` ≙ circle pixel `i`
pub fn circle_mask(pixels: &[bool; 16]) -> u16 {
    pixels
        .iter()
        .enumerate()
        .fold(0u16, |mask, (i, &set)| if set { mask | (1 << i) } else { mask })
}

/// True if `mask` holds a run of at least `min_count` set bits,
/// wrapping around the circle.
pub fn has_contiguous_arc(mask: u16, min_count: usize) -> bool {
    if min_count == 0 || min_count > 16 {
        return false;
    }
    if mask == u16::MAX {
        return true;
    }

    // AND the mask with rotated copies of itself; a surviving bit starts a run
    let mut run = mask;
    for i in 1..min_count as u32 {
        run &= mask.rotate_right(i);
        if run == 0 {
            return false;
        }
    }
    run != 0
}

/// Reference implementation walking the circle twice
pub fn has_contiguous_arc_scan(pixels: &[bool; 16], min_count: usize) -> bool {
    if min_count == 0 || min_count > 16 {
        return false;
    }

    let mut current = 0;
    for i in 0..32 {
        if pixels[i % 16] {
            current += 1;
            if current >= min_count {
                return true;
            }
        } else {
            current = 0;
        }
    }
    false
}
