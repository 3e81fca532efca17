// THEORY:
// The `BlobDetector` is the spatial stage of the VLC receiver. It turns a binary
// difference mask into a list of candidate transmitters.
//
// Key architectural principles & algorithm steps:
// 1.  **Contour Extraction**: external contours only; holes and anything nested in
//     them are ignored, since a lit LED shows up as one solid region.
// 2.  **Convex Hull**: each contour is replaced by its convex hull, which closes the
//     notches morphology leaves behind and gives a polygon that can be rasterised
//     back into a solid sync image.
// 3.  **Validation**: every hull becomes a `Blob` and only blobs that pass the size
//     and shape predicate survive.
// 4.  **Stateless Utility**: a pure function of a single frame. Persistence across
//     frames is the VLC decoder's job.

use crate::core_modules::blob::Blob;
use crate::core_modules::contour::find_external_contours;
use crate::core_modules::geometry::convex_hull;

pub mod blob_detector {
    use super::*;
    use crate::error::Result;
    use image::GrayImage;

    /// Detects valid blobs in a binary image (non-zero = foreground), in contour
    /// discovery order.
    pub fn find_blobs(binary: &GrayImage) -> Result<Vec<Blob>> {
        let contours = find_external_contours(binary)?;
        Ok(contours
            .iter()
            .map(|contour| Blob::from_contour(convex_hull(contour)))
            .filter(Blob::is_valid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::blob_detector::find_blobs;
    use crate::core_modules::geometry::Rect;
    use crate::error::DecodeError;
    use image::{GrayImage, Luma};

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn test_only_valid_blobs_survive() {
        let mut img = GrayImage::new(200, 100);
        fill(&mut img, 10, 10, 20, 20); // valid
        fill(&mut img, 50, 10, 3, 3); // speck
        fill(&mut img, 80, 10, 60, 20); // too wide
        fill(&mut img, 150, 40, 18, 22); // valid, upright

        let blobs = find_blobs(&img).unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].bounding_rect, Rect::new(10, 10, 20, 20));
        assert_eq!(blobs[1].bounding_rect, Rect::new(150, 40, 18, 22));
        assert_eq!(blobs[0].contour.len(), 4);
    }

    #[test]
    fn test_blank_image_has_no_blobs() {
        let img = GrayImage::new(32, 32);
        assert!(find_blobs(&img).unwrap().is_empty());
    }

    #[test]
    fn test_empty_image_is_invalid_argument() {
        let err = find_blobs(&GrayImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArgument(_)));
    }
}
