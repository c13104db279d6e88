//! Border following on binary masks.
//!
//! Implements Suzuki-Abe topological border following: every outer border and
//! every hole border is traced once, in raster order of its start pixel, and
//! linked to its enclosing border. Traced chains are then reduced to their
//! direction-change vertices ("simple" approximation), which is all the
//! bounding-box and polygon-area computations need.
//!
//! The mask is padded with a one pixel background frame, so blobs touching the
//! image edge are traced like any other.

use image::GrayImage;

use crate::frame::{Rect, Region};

/// Neighbor offsets in counter-clockwise screen order (y grows downward),
/// starting at east.
const DIRS: [(i64, i64); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// One traced border.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    /// Vertices in image coordinates `(x, y)` after simple approximation.
    pub points: Vec<(u32, u32)>,
    /// Bounding rectangle of the full traced chain.
    pub bounds: Rect,
    /// `true` for the inner border of a hole.
    pub is_hole: bool,
    /// Index of the enclosing contour in the same result vector.
    pub parent: Option<usize>,
}

impl Contour {
    /// Absolute polygon area of the vertex chain (shoelace formula).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn to_region(&self) -> Region {
        Region {
            bounds: self.bounds,
            area: self.area(),
        }
    }
}

struct Border {
    is_hole: bool,
    parent: Option<usize>,
}

struct LabelGrid {
    cells: Vec<i32>,
    stride: i64,
}

impl LabelGrid {
    fn from_mask(mask: &GrayImage) -> Self {
        let (w, h) = (mask.width() as usize, mask.height() as usize);
        let stride = w + 2;
        let mut cells = vec![0i32; stride * (h + 2)];
        for (x, y, px) in mask.enumerate_pixels() {
            if px.0[0] != 0 {
                cells[(y as usize + 1) * stride + x as usize + 1] = 1;
            }
        }
        Self {
            cells,
            stride: stride as i64,
        }
    }

    fn get(&self, p: (i64, i64)) -> i32 {
        self.cells[(p.1 * self.stride + p.0) as usize]
    }

    fn set(&mut self, p: (i64, i64), value: i32) {
        self.cells[(p.1 * self.stride + p.0) as usize] = value;
    }
}

/// Trace every border of the mask. Output order is discovery order.
pub fn find_contours(mask: &GrayImage) -> Vec<Contour> {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut grid = LabelGrid::from_mask(mask);
    // Border numbers start at 2; number 1 is the implicit frame (a hole border).
    let mut borders: Vec<Border> = Vec::new();
    let mut contours = Vec::new();
    let mut nbd: i32 = 1;

    for y in 1..=h {
        let mut lnbd: i32 = 1;
        for x in 1..=w {
            let value = grid.get((x, y));
            if value == 0 {
                continue;
            }

            let start = if value == 1 && grid.get((x - 1, y)) == 0 {
                Some((false, (x - 1, y)))
            } else if value >= 1 && grid.get((x + 1, y)) == 0 {
                if value > 1 {
                    lnbd = value;
                }
                Some((true, (x + 1, y)))
            } else {
                None
            };

            if let Some((is_hole, from)) = start {
                nbd += 1;
                let parent = parent_of(is_hole, lnbd, &borders);
                let chain = follow_border(&mut grid, (x, y), from, nbd);
                borders.push(Border { is_hole, parent });
                contours.push(build_contour(&chain, is_hole, parent));
            }

            let value = grid.get((x, y));
            if value != 1 {
                lnbd = value.abs();
            }
        }
    }

    contours
}

/// Contours converted to regions, in discovery order.
pub fn find_regions(mask: &GrayImage) -> Vec<Region> {
    find_contours(mask).iter().map(Contour::to_region).collect()
}

fn parent_of(is_hole: bool, lnbd: i32, borders: &[Border]) -> Option<usize> {
    let (lnbd_is_hole, lnbd_parent, lnbd_index) = if lnbd <= 1 {
        (true, None, None)
    } else {
        let index = (lnbd - 2) as usize;
        let border = &borders[index];
        (border.is_hole, border.parent, Some(index))
    };
    if is_hole == lnbd_is_hole {
        lnbd_parent
    } else {
        lnbd_index
    }
}

fn direction(from: (i64, i64), to: (i64, i64)) -> usize {
    let delta = (to.0 - from.0, to.1 - from.1);
    DIRS.iter().position(|&d| d == delta).unwrap_or(0)
}

fn step(p: (i64, i64), dir: usize) -> (i64, i64) {
    (p.0 + DIRS[dir].0, p.1 + DIRS[dir].1)
}

fn follow_border(
    grid: &mut LabelGrid,
    start: (i64, i64),
    from: (i64, i64),
    nbd: i32,
) -> Vec<(i64, i64)> {
    let mut chain = Vec::new();

    // Clockwise search for the first non-zero neighbor.
    let d0 = direction(start, from);
    let first = (0..8)
        .map(|k| step(start, (d0 + 8 - k) % 8))
        .find(|&p| grid.get(p) != 0);
    let Some(p1) = first else {
        grid.set(start, -nbd);
        chain.push(start);
        return chain;
    };

    let (mut p2, mut p3) = (p1, start);
    loop {
        // Counter-clockwise search starting after the previous pixel.
        let d = direction(p3, p2);
        let mut p4 = p2;
        let mut east_is_background = false;
        for k in 1..=8 {
            let dir = (d + k) % 8;
            let q = step(p3, dir);
            if grid.get(q) != 0 {
                p4 = q;
                break;
            }
            if dir == 0 {
                east_is_background = true;
            }
        }

        if east_is_background {
            grid.set(p3, -nbd);
        } else if grid.get(p3) == 1 {
            grid.set(p3, nbd);
        }
        chain.push(p3);

        if p4 == start && p3 == p1 {
            break;
        }
        p2 = p3;
        p3 = p4;
    }
    chain
}

fn build_contour(chain: &[(i64, i64)], is_hole: bool, parent: Option<usize>) -> Contour {
    // Undo the padding offset.
    let points: Vec<(u32, u32)> = chain
        .iter()
        .map(|&(x, y)| ((x - 1) as u32, (y - 1) as u32))
        .collect();

    let min_x = points.iter().map(|p| p.0).min().unwrap_or(0);
    let max_x = points.iter().map(|p| p.0).max().unwrap_or(0);
    let min_y = points.iter().map(|p| p.1).min().unwrap_or(0);
    let max_y = points.iter().map(|p| p.1).max().unwrap_or(0);

    Contour {
        points: approximate_simple(&points),
        bounds: Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1),
        is_hole,
        parent,
    }
}

/// Keep only vertices where the chain changes direction.
fn approximate_simple(points: &[(u32, u32)]) -> Vec<(u32, u32)> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }
    let delta = |a: (u32, u32), b: (u32, u32)| {
        (b.0 as i64 - a.0 as i64, b.1 as i64 - a.1 as i64)
    };
    let kept: Vec<(u32, u32)> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            delta(prev, cur) != delta(cur, next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        vec![points[0]]
    } else {
        kept
    }
}

fn polygon_area(points: &[(u32, u32)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0f64;
    for (i, &(x0, y0)) in points.iter().enumerate() {
        let (x1, y1) = points[(i + 1) % points.len()];
        twice += x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64;
    }
    (twice / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with(width: u32, height: u32, rects: &[Rect]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if rects.iter().any(|r| r.contains(x, y)) {
                255
            } else {
                0
            }])
        })
    }

    #[test]
    fn empty_mask_has_no_contours() {
        assert!(find_contours(&GrayImage::new(16, 16)).is_empty());
    }

    #[test]
    fn single_pixel_is_a_degenerate_contour() {
        let mask = mask_with(8, 8, &[Rect::new(3, 4, 1, 1)]);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![(3, 4)]);
        assert_eq!(contours[0].bounds, Rect::new(3, 4, 1, 1));
        assert_eq!(contours[0].area(), 0.0);
    }

    #[test]
    fn filled_rectangle_reduces_to_corners() {
        let mask = mask_with(64, 64, &[Rect::new(10, 12, 40, 20)]);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);

        let contour = &contours[0];
        assert!(!contour.is_hole);
        assert_eq!(contour.parent, None);
        assert_eq!(contour.bounds, Rect::new(10, 12, 40, 20));
        assert_eq!(contour.points.len(), 4);
        for corner in [(10, 12), (49, 12), (49, 31), (10, 31)] {
            assert!(contour.points.contains(&corner), "missing {:?}", corner);
        }
        assert_eq!(contour.area(), 39.0 * 19.0);
    }

    #[test]
    fn blob_touching_the_edge_is_traced() {
        let mask = mask_with(20, 20, &[Rect::new(0, 0, 5, 5)]);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounds, Rect::new(0, 0, 5, 5));
        assert_eq!(contours[0].area(), 16.0);
    }

    #[test]
    fn ring_yields_outer_and_hole_with_parent_link() {
        let mut mask = mask_with(30, 30, &[Rect::new(5, 5, 12, 12)]);
        for y in 9..13 {
            for x in 9..13 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 2);
        assert!(!contours[0].is_hole);
        assert!(contours[1].is_hole);
        assert_eq!(contours[1].parent, Some(0));
        assert_eq!(contours[0].bounds, Rect::new(5, 5, 12, 12));
        assert_eq!(contours[1].bounds, Rect::new(8, 8, 6, 6));
    }

    #[test]
    fn blob_inside_a_hole_is_nested() {
        let mut mask = mask_with(40, 40, &[Rect::new(2, 2, 30, 30)]);
        for y in 6..28 {
            for x in 6..28 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 14..18 {
            for x in 14..18 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 3);
        assert_eq!(contours[1].parent, Some(0));
        assert!(!contours[2].is_hole);
        assert_eq!(contours[2].parent, Some(1));
    }

    #[test]
    fn separate_blobs_come_out_in_raster_order() {
        let mask = mask_with(
            50,
            50,
            &[
                Rect::new(30, 30, 5, 5),
                Rect::new(2, 2, 4, 4),
                Rect::new(20, 2, 3, 3),
            ],
        );
        let regions = find_regions(&mask);
        let origins: Vec<(u32, u32)> = regions.iter().map(|r| (r.bounds.x, r.bounds.y)).collect();
        assert_eq!(origins, vec![(2, 2), (20, 2), (30, 30)]);
    }

    #[test]
    fn horizontal_line_has_zero_area() {
        let mask = mask_with(10, 3, &[Rect::new(2, 1, 3, 1)]);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![(2, 1), (4, 1)]);
        assert_eq!(contours[0].bounds, Rect::new(2, 1, 3, 1));
        assert_eq!(contours[0].area(), 0.0);
    }
}
