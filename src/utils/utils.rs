use std::fmt;

use serde::{Deserialize, Serialize};

use crate::counter::CounterError;

/// Share of the box height (from the top edge) where the head is assumed to be
pub const HEAD_RATIO: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(_x: f32, _y: f32) -> Self {
        Point { x: _x, y: _y }
    }
}

/// Axis-aligned box in frame pixels, corners as (x1, y1) top-left and (x2, y2) bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(_x1: f32, _y1: f32, _x2: f32, _y2: f32) -> Self {
        BBox {
            x1: _x1,
            y1: _y1,
            x2: _x2,
            y2: _y2,
        }
    }
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
    /// Point near the top of the box. Works better than the center for cameras mounted high.
    pub fn head_point(&self) -> Point {
        Point::new(
            (self.x1 + self.x2) / 2.0,
            self.y1 + HEAD_RATIO * self.height(),
        )
    }
    /// Inclusive on every edge
    pub fn contains(&self, p: &Point) -> bool {
        self.x1 <= p.x && p.x <= self.x2 && self.y1 <= p.y && p.y <= self.y2
    }
    /// Zero or negative extent, or coordinates that are not finite
    pub fn is_degenerate(&self) -> bool {
        let finite = self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite();
        !finite || self.x2 <= self.x1 || self.y2 <= self.y1
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}, {:.1}, {:.1})",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}

/// Clockwise rotation applied to the camera picture before counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl TryFrom<i32> for Rotation {
    type Error = CounterError;
    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(CounterError::Config(format!(
                "rotate_deg must be one of: 0, 90, 180, 270. Got: {}",
                other
            ))),
        }
    }
}

impl Rotation {
    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
    /// Size of the rotated picture for an original picture of `width` x `height`
    pub fn rotated_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Rotation::Deg0 | Rotation::Deg180 => (width, height),
            Rotation::Deg90 | Rotation::Deg270 => (height, width),
        }
    }
    /// Maps a point of the original `width` x `height` picture into the rotated one
    pub fn transform_point(&self, p: &Point, width: u32, height: u32) -> Point {
        let w = width as f32;
        let h = height as f32;
        match self {
            Rotation::Deg0 => *p,
            Rotation::Deg90 => Point::new(h - 1.0 - p.y, p.x),
            Rotation::Deg180 => Point::new(w - 1.0 - p.x, h - 1.0 - p.y),
            Rotation::Deg270 => Point::new(p.y, w - 1.0 - p.x),
        }
    }
    /// Maps a box by rotating its four corners and taking their envelope
    pub fn transform_bbox(&self, bbox: &BBox, width: u32, height: u32) -> BBox {
        if *self == Rotation::Deg0 {
            return *bbox;
        }
        let corners = [
            Point::new(bbox.x1, bbox.y1),
            Point::new(bbox.x2, bbox.y1),
            Point::new(bbox.x2, bbox.y2),
            Point::new(bbox.x1, bbox.y2),
        ];
        let mut out = BBox::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for corner in corners.iter() {
            let t = self.transform_point(corner, width, height);
            out.x1 = out.x1.min(t.x);
            out.y1 = out.y1.min(t.y);
            out.x2 = out.x2.max(t.x);
            out.y2 = out.y2.max(t.y);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_point() {
        let bbox = BBox::new(100.0, 200.0, 140.0, 400.0);
        let head = bbox.head_point();
        assert_eq!(head.x, 120.0);
        assert_eq!(head.y, 230.0);
    }

    #[test]
    fn test_degenerate() {
        assert!(!BBox::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
        assert!(BBox::new(5.0, 0.0, 5.0, 10.0).is_degenerate());
        assert!(BBox::new(0.0, 10.0, 5.0, 2.0).is_degenerate());
        assert!(BBox::new(0.0, 0.0, f32::NAN, 10.0).is_degenerate());
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::try_from(270).unwrap(), Rotation::Deg270);
        assert!(Rotation::try_from(45).is_err());
    }

    #[test]
    fn test_rotate_bbox() {
        // 640x480 picture, rotated 90 degrees clockwise becomes 480x640
        let rot = Rotation::Deg90;
        assert_eq!(rot.rotated_size(640, 480), (480, 640));
        let bbox = BBox::new(10.0, 20.0, 110.0, 220.0);
        let rotated = rot.transform_bbox(&bbox, 640, 480);
        assert_eq!(rotated, BBox::new(259.0, 10.0, 459.0, 110.0));

        let back = Rotation::Deg180.transform_bbox(&bbox, 640, 480);
        assert_eq!(back, BBox::new(529.0, 259.0, 629.0, 459.0));
        assert_eq!(Rotation::Deg0.transform_bbox(&bbox, 640, 480), bbox);
    }
}
