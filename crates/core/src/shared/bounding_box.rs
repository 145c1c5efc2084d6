use serde::{Deserialize, Serialize};

/// Axis-aligned face box in frame pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from `(top, right, bottom, left)` edges, the order
    /// most face locators report.
    pub fn from_edges(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    /// Maps a box found on a downscaled frame back to full resolution.
    pub fn scaled(&self, factor: i32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges() {
        let b = BoundingBox::from_edges(10, 60, 80, 20);
        assert_eq!(b, BoundingBox::new(20, 10, 40, 70));
    }

    #[test]
    fn test_scaled_quarter_frame_detection() {
        let b = BoundingBox::new(5, 6, 10, 12).scaled(4);
        assert_eq!(b, BoundingBox::new(20, 24, 40, 48));
    }

    #[test]
    fn test_area_of_degenerate_box_is_zero() {
        assert_eq!(BoundingBox::new(0, 0, -5, 10).area(), 0);
        assert_eq!(BoundingBox::new(0, 0, 5, 10).area(), 50);
    }

    #[test]
    fn test_serializes_with_named_fields() {
        let json = serde_json::to_value(BoundingBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json["x"], 1);
        assert_eq!(json["width"], 3);
        assert_eq!(json["height"], 4);
    }
}
