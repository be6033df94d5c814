//! Barycentric triangle fill in raster space

use glam::Vec2;

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)
}

/// Visit every cell centre inside triangle `abc` with its barycentric weights.
///
/// Vertices are in raster coordinates (cell `i` centred on `i`). Either
/// winding is accepted, edges are inclusive, degenerate triangles visit nothing
/// and cells outside `[0, width) x [0, height)` are skipped.
pub fn rasterize_triangle<F>(width: usize, height: usize, a: Vec2, b: Vec2, c: Vec2, mut visit: F)
where
    F: FnMut(usize, usize, [f32; 3]),
{
    let area = edge(a, b, c);
    if area.abs() <= f32::EPSILON || !area.is_finite() {
        return;
    }

    let min = a.min(b).min(c);
    let max = a.max(b).max(c);
    let min_x = min.x.ceil().max(0.0) as i64;
    let min_y = min.y.ceil().max(0.0) as i64;
    let max_x = max.x.floor().min(width as f32 - 1.0) as i64;
    let max_y = max.y.floor().min(height as f32 - 1.0) as i64;

    const TOLERANCE: f32 = -1e-5;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = Vec2::new(x as f32, y as f32);
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 >= TOLERANCE && w1 >= TOLERANCE && w2 >= TOLERANCE {
                visit(x as usize, y as usize, [w0.max(0.0), w1.max(0.0), w2.max(0.0)]);
            }
        }
    }
}

/// Blend three per-vertex values with barycentric weights.
#[inline]
pub fn blend(weights: [f32; 3], values: [f32; 3]) -> f32 {
    weights[0] * values[0] + weights[1] * values[1] + weights[2] * values[2]
}
