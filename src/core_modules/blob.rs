// THEORY:
// A `Blob` is a candidate light source seen in a single binary frame: the convex hull
// of one external contour together with the geometry the validity test needs. Like
// the ROI blocks it later becomes, it is a "dumb" data container. It has no memory of
// earlier frames and is thrown away once the frame has been analysed.
//
// The validity predicate encodes what one LED transmitter looks like through the
// camera after differencing and morphology: a compact, roughly square or upright
// region of moderate size. Anything smaller is sensor noise; anything larger or wider
// is scene motion.

use crate::core_modules::geometry::{Point, Rect};

pub const MIN_AREA: i64 = 60;
pub const MAX_AREA: i64 = 2000;
pub const MIN_ASPECT_RATIO: f64 = 0.2;
pub const MAX_ASPECT_RATIO: f64 = 1.25;
pub const MIN_SIDE: i32 = 15;
pub const MIN_DIAGONAL: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Convex hull of the detected region.
    pub contour: Vec<Point>,
    pub bounding_rect: Rect,
    /// Integer center of the bounding rectangle.
    pub center: Point,
    /// Width over height of the bounding rectangle.
    pub aspect_ratio: f64,
    /// Length of the bounding rectangle's diagonal.
    pub diagonal: f64,
}

impl Blob {
    pub fn from_contour(contour: Vec<Point>) -> Self {
        let bounding_rect = Rect::bounding(&contour);
        let center = Point::new(
            (2 * bounding_rect.x + bounding_rect.width) / 2,
            (2 * bounding_rect.y + bounding_rect.height) / 2,
        );
        let (w, h) = (bounding_rect.width as f64, bounding_rect.height as f64);
        let aspect_ratio = if h > 0.0 { w / h } else { 0.0 };
        Self {
            contour,
            bounding_rect,
            center,
            aspect_ratio,
            diagonal: (w * w + h * h).sqrt(),
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_geometry(&self.bounding_rect, self.aspect_ratio, self.diagonal)
    }
}

/// The validity predicate on its own, for callers holding raw measurements.
pub fn is_valid_geometry(rect: &Rect, aspect_ratio: f64, diagonal: f64) -> bool {
    let area = rect.area();
    (MIN_AREA..=MAX_AREA).contains(&area)
        && (MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&aspect_ratio)
        && rect.width >= MIN_SIDE
        && rect.height >= MIN_SIDE
        && diagonal >= MIN_DIAGONAL
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_blob(x: i32, y: i32, w: i32, h: i32) -> Blob {
        Blob::from_contour(vec![
            Point::new(x, y),
            Point::new(x + w - 1, y),
            Point::new(x + w - 1, y + h - 1),
            Point::new(x, y + h - 1),
        ])
    }

    #[test]
    fn test_geometry() {
        let blob = rect_blob(10, 20, 20, 25);
        assert_eq!(blob.bounding_rect, Rect::new(10, 20, 20, 25));
        assert_eq!(blob.center, Point::new(20, 32));
        assert!((blob.aspect_ratio - 0.8).abs() < 1e-9);
        assert!((blob.diagonal - (20f64 * 20.0 + 25.0 * 25.0).sqrt()).abs() < 1e-9);
        assert!(blob.is_valid());
    }

    #[test]
    fn test_validity_bounds() {
        // Too small on a side.
        assert!(!rect_blob(0, 0, 14, 20).is_valid());
        // Too wide.
        assert!(!rect_blob(0, 0, 30, 20).is_valid());
        // Largest accepted aspect ratio.
        assert!(rect_blob(0, 0, 25, 20).is_valid());
        // Area above the maximum.
        assert!(!rect_blob(0, 0, 40, 51).is_valid());
        // Tall and thin but inside every bound.
        assert!(rect_blob(0, 0, 15, 70).is_valid());
        assert!(!rect_blob(0, 0, 15, 76).is_valid());
    }
}
