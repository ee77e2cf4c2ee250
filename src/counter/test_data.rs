use crate::utils::BBox;

pub const FRAME_WIDTH: u32 = 1000;
pub const FRAME_HEIGHT: u32 = 720;

/// Person-sized box (60x200) whose head point sits at `x`
pub fn person_at(x: f32) -> BBox {
    BBox::new(x - 30.0, 100.0, x + 30.0, 300.0)
}

/// Three tracks over 13 frames with the counting line at x=500:
/// the first walks left to right, the second right to left,
/// the third wanders near the line without ever leaving the tolerance band.
pub fn get_walking_data() -> (Vec<BBox>, Vec<BBox>, Vec<BBox>) {
    let walk_right = (0..13).map(|i| person_at(380.0 + 20.0 * i as f32)).collect();
    let walk_left = (0..13).map(|i| person_at(620.0 - 20.0 * i as f32)).collect();
    let jitter = [495.0, 502.0, 510.0, 497.0, 488.0, 505.0, 499.0, 512.0, 494.0, 500.0, 503.0, 491.0, 508.0]
        .iter()
        .map(|x| person_at(*x))
        .collect();
    (walk_right, walk_left, jitter)
}
