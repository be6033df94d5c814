//! Anti-aliased Bresenham line walk (Zingl's variant)

/// One pixel of an anti-aliased line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinePixel {
    pub x: i64,
    pub y: i64,
    /// Distance-to-line error in `[0, 255]`; 0 means the line passes through the centre
    pub error: u8,
}

impl LinePixel {
    /// Soft blend weight: 1 on the line, falling to 0 at a full pixel away.
    pub fn coverage(&self) -> f32 {
        1.0 - self.error as f32 / 255.0
    }
}

/// Pixels of the anti-aliased line from `(x0, y0)` to `(x1, y1)`, endpoints included.
///
/// Besides the main Bresenham pixel each step may emit the neighbour on the
/// other side of the ideal line, carrying a larger error.
pub fn anti_aliased_line(mut x0: i64, mut y0: i64, x1: i64, y1: i64) -> Vec<LinePixel> {
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    let ed = if dx + dy == 0 {
        1.0
    } else {
        ((dx * dx + dy * dy) as f32).sqrt()
    };

    let intensity = |e: i64| -> u8 { (255.0 * e.abs() as f32 / ed).min(255.0) as u8 };

    let mut pixels = Vec::with_capacity((dx.max(dy) as usize + 1) * 2);
    loop {
        pixels.push(LinePixel { x: x0, y: y0, error: intensity(err - dx + dy) });

        let e2 = err;
        let x2 = x0;
        if 2 * e2 >= -dx {
            if x0 == x1 {
                break;
            }
            if ((e2 + dy) as f32) < ed {
                pixels.push(LinePixel { x: x0, y: y0 + sy, error: intensity(e2 + dy) });
            }
            err -= dy;
            x0 += sx;
        }
        if 2 * e2 <= dy {
            if y0 == y1 {
                break;
            }
            if ((dx - e2) as f32) < ed {
                pixels.push(LinePixel { x: x2 + sx, y: y0, error: intensity(dx - e2) });
            }
            err += dx;
            y0 += sy;
        }
    }
    pixels
}

/// Clip a pixel segment to the square `[-1, width]`, keeping a one-pixel
/// apron for the anti-aliased neighbours.
///
/// Returns `None` when the segment misses the square entirely. Endpoints
/// already inside are returned unchanged; clipped ones are rounded back onto
/// the pixel lattice.
pub fn clip_to_grid(from: (i64, i64), to: (i64, i64), width: usize) -> Option<((i64, i64), (i64, i64))> {
    let (lo, hi) = (-1.0f64, width as f64);
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = (to.0 as f64 - x0, to.1 as f64 - y0);

    // Liang-Barsky
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [(-dx, x0 - lo), (dx, hi - x0), (-dy, y0 - lo), (dy, hi - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64, end: (i64, i64)| {
        if t == 0.0 || t == 1.0 {
            end
        } else {
            ((x0 + dx * t).round() as i64, (y0 + dy * t).round() as i64)
        }
    };
    Some((at(t0, from), at(t1, to)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line_is_fully_covered() {
        let pixels = anti_aliased_line(2, 5, 9, 5);
        assert_eq!(pixels.len(), 8);
        for (i, p) in pixels.iter().enumerate() {
            assert_eq!((p.x, p.y), (2 + i as i64, 5));
            assert_eq!(p.error, 0);
            assert_eq!(p.coverage(), 1.0);
        }
    }

    #[test]
    fn test_single_point() {
        let pixels = anti_aliased_line(3, 3, 3, 3);
        assert_eq!(pixels, vec![LinePixel { x: 3, y: 3, error: 0 }]);
    }

    #[test]
    fn test_diagonal_reaches_both_ends() {
        let pixels = anti_aliased_line(0, 0, 6, 3);
        assert_eq!((pixels[0].x, pixels[0].y), (0, 0));
        assert!(pixels.iter().any(|p| p.x == 6 && p.y == 3));
        assert!(pixels.iter().any(|p| p.error > 0));
        assert!(pixels.iter().all(|p| (0..=7).contains(&p.x) && (0..=4).contains(&p.y)));
    }

    #[test]
    fn test_reversed_direction_covers_same_main_pixels() {
        let forward = anti_aliased_line(0, 0, 0, 4);
        let backward = anti_aliased_line(0, 4, 0, 0);
        assert_eq!(forward.len(), backward.len());
        assert!(forward.iter().all(|p| p.error == 0));
    }

    #[test]
    fn test_clip_keeps_inside_segments() {
        assert_eq!(clip_to_grid((2, 3), (7, 1), 9), Some(((2, 3), (7, 1))));
    }

    #[test]
    fn test_clip_far_segment_to_grid() {
        let ((ax, ay), (bx, by)) = clip_to_grid((-10_000_000_000_000, 4), (10_000_000_000_000, 4), 17).unwrap();
        assert_eq!((ax, ay), (-1, 4));
        assert_eq!((bx, by), (17, 4));
        assert_eq!(anti_aliased_line(ax, ay, bx, by).len(), 19);
    }

    #[test]
    fn test_clip_rejects_misses() {
        assert!(clip_to_grid((-50, -3), (50, -3), 17).is_none());
        assert!(clip_to_grid((40, 40), (90, 60), 17).is_none());
        assert!(clip_to_grid((-5, 30), (30, -5), 9).is_none());
    }
}
