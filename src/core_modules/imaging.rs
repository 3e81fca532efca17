// THEORY:
// The `imaging` module holds the small set of raster operations the VLC decoder
// chains together to turn two consecutive frames into a clean binary motion mask:
//
//     blur(prev), blur(curr) -> |prev - curr| -> threshold -> dilate, dilate, erode
//
// plus the helpers the sync phase needs to rasterise candidate blobs, accumulate
// frames in floating point and measure the mean brightness of a region.
//
// Every function is pure: it reads its inputs and returns a fresh buffer, except the
// explicitly named in-place helpers (`accumulate`, `scale`, `draw_rect_outline`).
// Empty images and mismatched dimensions are rejected up front so that a bad frame
// never corrupts decoder state.

use crate::core_modules::geometry::{Point, Rect, convex_contains};
use crate::error::{DecodeError, Result};
use image::{GrayImage, ImageBuffer, Luma};

/// A single-channel floating point image, used for running sums across frames.
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Binomial approximation of a 5-tap Gaussian (sums to 16).
const GAUSS_5: [u32; 5] = [1, 4, 6, 4, 1];

pub fn ensure_not_empty(image: &GrayImage, what: &str) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::invalid(format!("{what} is empty")));
    }
    Ok(())
}

fn ensure_same_size(a: &GrayImage, b: &GrayImage) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(DecodeError::invalid(format!(
            "frame size mismatch: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }
    Ok(())
}

/// Reflect-101 border handling: `dcb|abcd|cba`.
fn reflect_101(mut i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// 5x5 Gaussian blur, applied as two separable 5-tap passes.
pub fn gaussian_blur_5x5(image: &GrayImage) -> Result<GrayImage> {
    ensure_not_empty(image, "blur input")?;
    let (w, h) = image.dimensions();
    let (wi, hi) = (w as i64, h as i64);
    let src = image.as_raw();

    let mut horizontal = vec![0u32; (w * h) as usize];
    for y in 0..h as usize {
        let row = &src[y * w as usize..(y + 1) * w as usize];
        for x in 0..w as i64 {
            let mut acc = 0u32;
            for (k, weight) in GAUSS_5.iter().enumerate() {
                let sx = reflect_101(x + k as i64 - 2, wi);
                acc += weight * row[sx] as u32;
            }
            horizontal[y * w as usize + x as usize] = acc;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h as i64 {
        for x in 0..w as usize {
            let mut acc = 0u32;
            for (k, weight) in GAUSS_5.iter().enumerate() {
                let sy = reflect_101(y + k as i64 - 2, hi);
                acc += weight * horizontal[sy * w as usize + x];
            }
            out.put_pixel(x as u32, y as u32, Luma([((acc + 128) >> 8) as u8]));
        }
    }
    Ok(out)
}

pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    ensure_not_empty(a, "diff input")?;
    ensure_same_size(a, b)?;
    let data = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&p, &q)| p.abs_diff(q))
        .collect();
    GrayImage::from_raw(a.width(), a.height(), data)
        .ok_or_else(|| DecodeError::invalid("diff buffer size"))
}

/// Binary threshold: pixels strictly above `threshold` become 255, the rest 0.
pub fn threshold_binary(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > threshold { 255 } else { 0 };
    }
    out
}

#[derive(Clone, Copy)]
enum MorphOp {
    Dilate,
    Erode,
}

/// Square-element morphology as two separable 1D passes. Pixels outside the
/// image never take part, which is the neutral border for both operations.
fn morph(image: &GrayImage, size: u32, op: MorphOp) -> Result<GrayImage> {
    ensure_not_empty(image, "morphology input")?;
    if size == 0 {
        return Err(DecodeError::invalid("filter size must be positive"));
    }
    let (w, h) = image.dimensions();
    let before = (size / 2) as i64;
    let after = (size - 1 - size / 2) as i64;
    let pick = |acc: u8, v: u8| match op {
        MorphOp::Dilate => acc.max(v),
        MorphOp::Erode => acc.min(v),
    };
    let seed = match op {
        MorphOp::Dilate => u8::MIN,
        MorphOp::Erode => u8::MAX,
    };

    let mut pass = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w as i64 {
            let lo = (x - before).max(0);
            let hi = (x + after).min(w as i64 - 1);
            let mut acc = seed;
            for sx in lo..=hi {
                acc = pick(acc, image.get_pixel(sx as u32, y).0[0]);
            }
            pass.put_pixel(x as u32, y, Luma([acc]));
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h as i64 {
        let lo = (y - before).max(0);
        let hi = (y + after).min(h as i64 - 1);
        for x in 0..w {
            let mut acc = seed;
            for sy in lo..=hi {
                acc = pick(acc, pass.get_pixel(x, sy as u32).0[0]);
            }
            out.put_pixel(x, y as u32, Luma([acc]));
        }
    }
    Ok(out)
}

pub fn dilate(image: &GrayImage, size: u32) -> Result<GrayImage> {
    morph(image, size, MorphOp::Dilate)
}

pub fn erode(image: &GrayImage, size: u32) -> Result<GrayImage> {
    morph(image, size, MorphOp::Erode)
}

/// Fills a convex polygon (boundary included) with `value`.
pub fn fill_convex(image: &mut GrayImage, polygon: &[Point], value: u8) {
    let bounds = Rect::bounding(polygon).clip(image.width(), image.height());
    for y in bounds.y..bounds.bottom() {
        for x in bounds.x..bounds.right() {
            if convex_contains(polygon, Point::new(x, y)) {
                image.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
    }
}

/// Draws a one pixel wide rectangle outline, clipped to the image.
pub fn draw_rect_outline(image: &mut GrayImage, rect: Rect, value: u8) {
    if rect.area() == 0 {
        return;
    }
    let (w, h) = (image.width() as i32, image.height() as i32);
    let mut plot = |x: i32, y: i32| {
        if x >= 0 && y >= 0 && x < w && y < h {
            image.put_pixel(x as u32, y as u32, Luma([value]));
        }
    };
    let (right, bottom) = (rect.right() - 1, rect.bottom() - 1);
    for x in rect.x..=right {
        plot(x, rect.y);
        plot(x, bottom);
    }
    for y in rect.y..=bottom {
        plot(rect.x, y);
        plot(right, y);
    }
}

pub fn accumulate(acc: &mut FloatImage, image: &GrayImage) -> Result<()> {
    ensure_not_empty(image, "accumulate input")?;
    if acc.dimensions() != image.dimensions() {
        return Err(DecodeError::invalid("accumulator size mismatch"));
    }
    for (a, p) in acc.pixels_mut().zip(image.pixels()) {
        a.0[0] += p.0[0] as f32;
    }
    Ok(())
}

pub fn scale(acc: &mut FloatImage, factor: f32) {
    for a in acc.pixels_mut() {
        a.0[0] *= factor;
    }
}

/// Converts a float image back to 8 bits, rounding and saturating.
pub fn saturate_to_gray(acc: &FloatImage) -> GrayImage {
    let data = acc
        .as_raw()
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_raw(acc.width(), acc.height(), data).unwrap_or_default()
}

fn mean_over<F>(width: u32, height: u32, rect: Rect, sample: F) -> f64
where
    F: Fn(u32, u32) -> f64,
{
    let clipped = rect.clip(width, height);
    let count = clipped.area();
    if count == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for y in clipped.y..clipped.bottom() {
        for x in clipped.x..clipped.right() {
            sum += sample(x as u32, y as u32);
        }
    }
    sum / count as f64
}

/// Mean brightness of the pixels under `rect` (clipped to the image).
pub fn mean_in_rect(image: &GrayImage, rect: Rect) -> f64 {
    mean_over(image.width(), image.height(), rect, |x, y| {
        image.get_pixel(x, y).0[0] as f64
    })
}

pub fn mean_in_rect_f32(image: &FloatImage, rect: Rect) -> f64 {
    mean_over(image.width(), image.height(), rect, |x, y| {
        image.get_pixel(x, y).0[0] as f64
    })
}
