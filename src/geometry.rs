use crate::types::BBox;

/// Box encoded in a square frame of a given long side, as
/// `[center_x, center_y, width, height]`.
pub type EncodedBox = [i32; 4];

/// Rescale a box from original image coordinates into a `long_side` square
/// frame and convert it to center form.
///
/// Original coordinates are 1-indexed. Positions are floored, extents ceiled,
/// and the box is clamped so it starts at most at `long_side - 2` and ends at
/// most at `long_side`.
pub fn encode_box(bbox: &BBox, org_h: u32, org_w: u32, long_side: u32) -> EncodedBox {
    // No scale exists for an image without extent; the empty box is rejected
    // by `is_valid`
    if org_h.max(org_w) == 0 {
        return [0; 4];
    }
    let scale = long_side as f64 / org_h.max(org_w) as f64;
    let size = long_side as i64;

    let mut x = (scale * (bbox.x as f64 - 1.0)).floor() as i64;
    let mut y = (scale * (bbox.y as f64 - 1.0)).floor() as i64;
    let mut w = (scale * bbox.w as f64).ceil() as i64;
    let mut h = (scale * bbox.h as f64).ceil() as i64;

    // Clamp to image, leaving room for at least a 2x2 box
    x = x.max(0).min(size - 2);
    y = y.max(0).min(size - 2);
    if x + w >= size {
        w = size - x;
    }
    if y + h >= size {
        h = size - y;
    }

    [
        (x + w / 2) as i32,
        (y + h / 2) as i32,
        w as i32,
        h as i32,
    ]
}

/// Whether an encoded box has a strictly positive width and height.
pub fn is_valid(encoded: &EncodedBox) -> bool {
    encoded[2] > 0 && encoded[3] > 0
}
