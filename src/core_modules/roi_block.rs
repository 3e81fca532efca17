use crate::core_modules::geometry::{Point, Rect};

/// A confirmed region of interest: the spatial footprint of one optical
/// transmitter, fixed for the whole data phase.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiBlock {
    contour: Vec<Point>,
    bounding_rect: Rect,
}

impl RoiBlock {
    pub fn new(contour: Vec<Point>) -> Self {
        Self {
            bounding_rect: Rect::bounding(&contour),
            contour,
        }
    }

    pub fn bounding_rect(&self) -> Rect {
        self.bounding_rect
    }

    pub fn contour(&self) -> &[Point] {
        &self.contour
    }

    /// True when the two bounding rectangles share at least one pixel.
    pub fn is_overlap(&self, other: &RoiBlock) -> bool {
        self.bounding_rect.intersection(&other.bounding_rect).area() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(x: i32, y: i32, w: i32, h: i32) -> RoiBlock {
        RoiBlock::new(vec![Point::new(x, y), Point::new(x + w - 1, y + h - 1)])
    }

    #[test]
    fn test_bounding_rect_from_contour() {
        let roi = block(3, 4, 10, 12);
        assert_eq!(roi.bounding_rect(), Rect::new(3, 4, 10, 12));
        assert_eq!(roi.contour().len(), 2);
    }

    #[test]
    fn test_overlap() {
        let a = block(0, 0, 10, 10);
        assert!(a.is_overlap(&block(9, 9, 5, 5)));
        assert!(!a.is_overlap(&block(10, 0, 5, 5)));
        assert!(!a.is_overlap(&block(20, 20, 5, 5)));
        assert!(a.is_overlap(&a.clone()));
    }
}
