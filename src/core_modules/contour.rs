// THEORY:
// The `contour` module extracts the outer border of every external foreground region
// of a binary image. It is the geometric front end of the blob detector.
//
// Algorithm:
// 1.  **Region labelling**: a raster scan seeds a flood fill at every unlabelled
//     foreground pixel and grows it over its 8-connected neighbours. Labels are
//     therefore issued in raster order of each region's first pixel.
// 2.  **Outer background**: a 4-connected flood fill over background pixels, seeded
//     from the image border, marks the background that is "outside" every region.
//     A region is external if it touches the border or this outer background;
//     regions sitting inside another region's hole are skipped.
// 3.  **Border following**: each external region is traced with the Moore-neighbour
//     rule, walking clockwise around the region from its first pixel until the walk
//     repeats its first step. The result is an ordered, closed sequence of border
//     pixels.

use crate::core_modules::geometry::Point;
use crate::core_modules::imaging::ensure_not_empty;
use crate::error::Result;
use image::GrayImage;

/// Clockwise neighbour offsets in image coordinates, starting east.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

fn direction_of(dx: i32, dy: i32) -> usize {
    DIRS.iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or(WEST)
}

struct LabelMap {
    width: i32,
    height: i32,
    labels: Vec<u32>,
}

impl LabelMap {
    fn label_at(&self, p: Point) -> u32 {
        if p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
            return 0;
        }
        self.labels[(p.y * self.width + p.x) as usize]
    }

    /// One Moore step: from `current`, whose background neighbour lies in
    /// direction `back`, find the next border pixel clockwise and the direction
    /// of its own background neighbour.
    fn step(&self, label: u32, current: Point, back: usize) -> Option<(Point, usize)> {
        for i in 1..=8 {
            let dir = (back + i) % 8;
            let candidate = Point::new(current.x + DIRS[dir].0, current.y + DIRS[dir].1);
            if self.label_at(candidate) == label {
                let prev = (back + i - 1) % 8;
                let bg = Point::new(current.x + DIRS[prev].0, current.y + DIRS[prev].1);
                return Some((candidate, direction_of(bg.x - candidate.x, bg.y - candidate.y)));
            }
        }
        None
    }

    fn trace(&self, label: u32, start: Point) -> Vec<Point> {
        let mut contour = vec![start];
        let Some((second, mut back)) = self.step(label, start, WEST) else {
            return contour;
        };

        let mut current = second;
        let limit = 8 * self.labels.len() + 8;
        for _ in 0..limit {
            let Some((next, next_back)) = self.step(label, current, back) else {
                break;
            };
            if current == start && next == second {
                break;
            }
            contour.push(current);
            current = next;
            back = next_back;
        }
        contour
    }
}

/// Returns the outer contour of every external 8-connected foreground region
/// (non-zero pixels), in raster order of the regions' first pixels.
pub fn find_external_contours(image: &GrayImage) -> Result<Vec<Vec<Point>>> {
    ensure_not_empty(image, "contour input")?;
    let (w, h) = (image.width() as i32, image.height() as i32);
    let raw = image.as_raw();
    let idx = |x: i32, y: i32| (y * w + x) as usize;
    let is_fg = |x: i32, y: i32| raw[idx(x, y)] != 0;

    // --- 1. Region labelling ---
    let mut labels = vec![0u32; raw.len()];
    let mut starts: Vec<Point> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if !is_fg(x, y) || labels[idx(x, y)] != 0 {
                continue;
            }
            let label = starts.len() as u32 + 1;
            starts.push(Point::new(x, y));
            labels[idx(x, y)] = label;
            let mut stack = vec![Point::new(x, y)];
            while let Some(p) = stack.pop() {
                for (dx, dy) in DIRS {
                    let (nx, ny) = (p.x + dx, p.y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    if is_fg(nx, ny) && labels[idx(nx, ny)] == 0 {
                        labels[idx(nx, ny)] = label;
                        stack.push(Point::new(nx, ny));
                    }
                }
            }
        }
    }

    // --- 2. Outer background ---
    let mut outside = vec![false; raw.len()];
    let mut stack: Vec<Point> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let on_border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
            if on_border && !is_fg(x, y) && !outside[idx(x, y)] {
                outside[idx(x, y)] = true;
                stack.push(Point::new(x, y));
            }
        }
    }
    while let Some(p) = stack.pop() {
        for (dx, dy) in [(0, 1), (0, -1), (1, 0), (-1, 0)] {
            let (nx, ny) = (p.x + dx, p.y + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            if !is_fg(nx, ny) && !outside[idx(nx, ny)] {
                outside[idx(nx, ny)] = true;
                stack.push(Point::new(nx, ny));
            }
        }
    }

    let mut external = vec![false; starts.len() + 1];
    for y in 0..h {
        for x in 0..w {
            let label = labels[idx(x, y)];
            if label == 0 || external[label as usize] {
                continue;
            }
            let on_border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
            let touches_outside = [(0, 1), (0, -1), (1, 0), (-1, 0)]
                .iter()
                .any(|&(dx, dy)| {
                    let (nx, ny) = (x + dx, y + dy);
                    nx >= 0 && ny >= 0 && nx < w && ny < h && outside[idx(nx, ny)]
                });
            if on_border || touches_outside {
                external[label as usize] = true;
            }
        }
    }

    // --- 3. Border following ---
    let map = LabelMap { width: w, height: h, labels };
    Ok(starts
        .iter()
        .enumerate()
        .filter(|(i, _)| external[i + 1])
        .map(|(i, &start)| map.trace(i as u32 + 1, start))
        .collect())
}
