//! Grid transfer operators and relaxation kernels
//!
//! All stencils read with clamp-to-edge addressing.

use crate::grid::{Cell, Grid, Texel};
use crate::params::RelaxKernel;
use crate::raster::{PINNED, SHOULDER, SHOULDER_TARGET};

use super::pass::{iterate, PassScheduler};

/// Side length of the next coarser level. `3 -> 2` collapses to 1.
pub fn half_width(width: usize) -> usize {
    match width {
        0..=3 => 1,
        w => w / 2 + 1,
    }
}

/// Full-weighting restriction: coarse `(i, j)` gathers fine `(2i, 2j)` with
/// the `[1 2 1] x [1 2 1] / 16` stencil.
pub fn restrict<S, T>(scheduler: &S, fine: &Grid<T>, coarse_width: usize) -> Grid<T>
where
    S: PassScheduler,
    T: Texel,
{
    let mut coarse = Grid::square(coarse_width);
    if coarse_width == 1 {
        coarse.set(0, 0, *fine.get(fine.width / 2, fine.height / 2));
        return coarse;
    }

    const WEIGHTS: [f32; 3] = [1.0, 2.0, 1.0];
    scheduler.dispatch(&mut coarse, |i, j| {
        let (fx, fy) = (2 * i as i64, 2 * j as i64);
        let mut acc = T::default();
        for (oy, wy) in WEIGHTS.iter().enumerate() {
            for (ox, wx) in WEIGHTS.iter().enumerate() {
                let v = *fine.get_clamped(fx + ox as i64 - 1, fy + oy as i64 - 1);
                acc = acc.add(v.scale(wx * wy / 16.0));
            }
        }
        acc
    });
    coarse
}

/// Checkerboard prolongation onto a `fine_width` grid.
///
/// Even/even cells copy their coarse parent, cells with one odd coordinate
/// average the two coarse neighbours along that axis, odd/odd cells average
/// the four diagonal coarse neighbours.
pub fn interpolate<S, T>(scheduler: &S, coarse: &Grid<T>, fine_width: usize) -> Grid<T>
where
    S: PassScheduler,
    T: Texel,
{
    let mut fine = Grid::square(fine_width);
    if coarse.width <= 1 {
        let v = coarse.as_slice().first().copied().unwrap_or_default();
        fine.fill(v);
        return fine;
    }

    scheduler.dispatch(&mut fine, |x, y| {
        let c = |cx: usize, cy: usize| *coarse.get_clamped(cx as i64, cy as i64);
        match (x % 2, y % 2) {
            (0, 0) => c(x / 2, y / 2),
            (1, 0) => c(x / 2, y / 2).add(c(x / 2 + 1, y / 2)).scale(0.5),
            (0, 1) => c(x / 2, y / 2).add(c(x / 2, y / 2 + 1)).scale(0.5),
            _ => c(x / 2, y / 2)
                .add(c(x / 2 + 1, y / 2))
                .add(c(x / 2, y / 2 + 1))
                .add(c(x / 2 + 1, y / 2 + 1))
                .scale(0.25),
        }
    });
    fine
}

/// Neighbour offset and normalized weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tap {
    pub dx: i64,
    pub dy: i64,
    pub weight: f32,
}

/// Weighted neighbour taps for a kernel, centre excluded, weights summing to 1.
pub fn kernel_taps(kernel: RelaxKernel) -> Vec<Tap> {
    let raw: Vec<(i64, i64, f32)> = match kernel {
        RelaxKernel::Laplacian3 => vec![(-1, 0, 1.0), (1, 0, 1.0), (0, -1, 1.0), (0, 1, 1.0)],
        RelaxKernel::Average3 => square(1, |_, _| 1.0),
        RelaxKernel::Gaussian3 => {
            const B: [f32; 3] = [1.0, 2.0, 1.0];
            square(1, |dx, dy| B[(dx + 1) as usize] * B[(dy + 1) as usize])
        }
        RelaxKernel::Laplacian5 => {
            let mut taps = Vec::with_capacity(8);
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                taps.push((dx, dy, 16.0));
                taps.push((2 * dx, 2 * dy, -1.0));
            }
            taps
        }
        RelaxKernel::Average5 => square(2, |_, _| 1.0),
        RelaxKernel::Gaussian5 => {
            const B: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
            square(2, |dx, dy| B[(dx + 2) as usize] * B[(dy + 2) as usize])
        }
    };

    let total: f32 = raw.iter().map(|t| t.2).sum();
    raw.into_iter()
        .map(|(dx, dy, w)| Tap { dx, dy, weight: w / total })
        .collect()
}

fn square(radius: i64, weight: impl Fn(i64, i64) -> f32) -> Vec<(i64, i64, f32)> {
    let mut taps = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx != 0 || dy != 0 {
                taps.push((dx, dy, weight(dx, dy)));
            }
        }
    }
    taps
}

#[inline]
fn kernel_average<T: Texel>(grid: &Grid<T>, taps: &[Tap], x: usize, y: usize) -> T {
    let (x, y) = (x as i64, y as i64);
    taps.iter().fold(T::default(), |acc, tap| {
        acc.add(grid.get_clamped(x + tap.dx, y + tap.dy).scale(tap.weight))
    })
}

/// Relax an auxiliary grid toward its rasterized seed: `lerp(avg, seed, seed.w)`.
///
/// Cells the curves never touched carry weight 0 and diffuse freely.
pub fn relax_aux<S: PassScheduler>(
    scheduler: &S,
    grid: &mut Grid<Cell>,
    seed: &Grid<Cell>,
    kernel: RelaxKernel,
    iterations: usize,
) {
    let taps = kernel_taps(kernel);
    iterate(scheduler, grid, iterations, |prev, x, y| {
        let s = *seed.get(x, y);
        kernel_average(prev, &taps, x, y).lerp(s, s[3])
    });
}

/// Inputs of the constrained height relaxation for one level.
pub struct TerrainConstraints<'a> {
    pub seed_height: &'a Grid<f32>,
    pub restrictions: &'a Grid<Cell>,
    /// Relaxed `[dir x, dir z, slope, weight]`
    pub normals: &'a Grid<Cell>,
    /// World units per cell
    pub cell_size: f32,
}

/// Constrained height relaxation: `h' = a*seed + b*target + (1-a-b)*avg`.
///
/// On shoulder cells (`b > 0`) every neighbour sample is first corrected by
/// the expected rise along the relaxed normal, so shoulders keep their slope.
pub fn relax_terrain<S: PassScheduler>(
    scheduler: &S,
    height: &mut Grid<f32>,
    constraints: &TerrainConstraints<'_>,
    kernel: RelaxKernel,
    iterations: usize,
) {
    let taps = kernel_taps(kernel);
    iterate(scheduler, height, iterations, |prev, x, y| {
        let r = *constraints.restrictions.get(x, y);
        let (a, b) = (r[PINNED], r[SHOULDER]);
        let avg = if b > 0.0 {
            sloped_average(prev, &taps, constraints, x, y)
        } else {
            kernel_average(prev, &taps, x, y)
        };
        a * constraints.seed_height.get(x, y) + b * r[SHOULDER_TARGET] + (1.0 - a - b) * avg
    });
}

fn sloped_average(prev: &Grid<f32>, taps: &[Tap], c: &TerrainConstraints<'_>, x: usize, y: usize) -> f32 {
    let n = *c.normals.get(x, y);
    let (mut nx, mut nz) = (n[0], n[1]);
    let len = (nx * nx + nz * nz).sqrt();
    if len > 1e-6 {
        nx /= len;
        nz /= len;
    }
    let rise = n[2] * c.cell_size;
    let (xi, yi) = (x as i64, y as i64);
    taps.iter().fold(0.0, |acc, tap| {
        let along = nx * tap.dx as f32 + nz * tap.dy as f32;
        acc + tap.weight * (prev.get_clamped(xi + tap.dx, yi + tap.dy) - rise * along)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multigrid::pass::{ParallelPasses, SerialPasses};

    #[test]
    fn test_half_width_sequence() {
        let mut w = 257;
        let mut seen = vec![w];
        while w > 1 {
            w = half_width(w);
            seen.push(w);
        }
        assert_eq!(seen, vec![257, 129, 65, 33, 17, 9, 5, 3, 1]);
        assert_eq!(half_width(2), 1);
    }

    #[test]
    fn test_kernel_weights_sum_to_one() {
        for &kernel in RelaxKernel::all() {
            let taps = kernel_taps(kernel);
            let sum: f32 = taps.iter().map(|t| t.weight).sum();
            assert!((sum - 1.0).abs() < 1e-5, "{kernel}: {sum}");
            assert!(taps.iter().all(|t| t.dx != 0 || t.dy != 0));
        }
        assert_eq!(kernel_taps(RelaxKernel::Average5).len(), 24);
        let lap5 = kernel_taps(RelaxKernel::Laplacian5);
        let far = lap5.iter().find(|t| t.dx == 2).unwrap();
        assert!((far.weight + 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_restrict_preserves_constant_and_picks_centre() {
        let fine: Grid<f32> = Grid::new_with(9, 9, 3.0);
        let coarse = restrict(&SerialPasses, &fine, 5);
        assert!(coarse.iter().all(|(_, _, v)| (*v - 3.0).abs() < 1e-6));

        let mut fine: Grid<f32> = Grid::square(3);
        fine.set(1, 1, 7.0);
        let one = restrict(&SerialPasses, &fine, 1);
        assert_eq!(*one.get(0, 0), 7.0);
    }

    #[test]
    fn test_interpolate_checkerboard() {
        let mut coarse: Grid<f32> = Grid::square(3);
        coarse.set(0, 0, 0.0);
        coarse.set(1, 0, 4.0);
        coarse.set(0, 1, 8.0);
        coarse.set(1, 1, 12.0);
        let fine = interpolate(&ParallelPasses, &coarse, 5);
        assert_eq!(*fine.get(0, 0), 0.0);
        assert_eq!(*fine.get(2, 0), 4.0);
        assert_eq!(*fine.get(1, 0), 2.0);
        assert_eq!(*fine.get(0, 1), 4.0);
        assert_eq!(*fine.get(1, 1), 6.0);

        let flat = interpolate(&ParallelPasses, &Grid::new_with(1, 1, [1.0f32, 2.0, 3.0, 4.0]), 3);
        assert!(flat.iter().all(|(_, _, c)| *c == [1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn test_pinned_cells_hold_seed() {
        let mut seed: Grid<f32> = Grid::square(9);
        let mut restrictions: Grid<Cell> = Grid::square(9);
        for x in 0..9 {
            seed.set(x, 4, 0.25);
            restrictions.set(x, 4, [1.0, 0.0, 0.0, 1.0]);
        }
        let normals: Grid<Cell> = Grid::square(9);
        let constraints = TerrainConstraints {
            seed_height: &seed,
            restrictions: &restrictions,
            normals: &normals,
            cell_size: 1.0,
        };
        let mut height: Grid<f32> = Grid::new_with(9, 9, 0.8);
        relax_terrain(&ParallelPasses, &mut height, &constraints, RelaxKernel::Gaussian5, 40);
        for x in 0..9 {
            assert_eq!(*height.get(x, 4), 0.25);
        }
        // free cells move toward the pinned row
        assert!(*height.get(4, 5) < 0.8);
        assert!(*height.get(4, 5) >= 0.25 - 1e-5);
    }

    #[test]
    fn test_shoulder_slope_is_reproduced() {
        // a ramp rising along +y at 0.1 per cell, pinned on row 0
        let width = 9;
        let mut seed: Grid<f32> = Grid::square(width);
        let mut restrictions: Grid<Cell> = Grid::square(width);
        let mut normals: Grid<Cell> = Grid::square(width);
        for y in 0..width {
            for x in 0..width {
                let target = 0.1 * y as f32;
                if y == 0 {
                    restrictions.set(x, y, [1.0, 0.0, 0.0, 1.0]);
                } else {
                    restrictions.set(x, y, [0.0, 0.2, target, 1.0]);
                }
                normals.set(x, y, [0.0, 1.0, 0.1, 1.0]);
            }
        }
        seed.fill(0.0);
        let constraints = TerrainConstraints {
            seed_height: &seed,
            restrictions: &restrictions,
            normals: &normals,
            cell_size: 1.0,
        };
        let mut height: Grid<f32> = Grid::square(width);
        relax_terrain(&SerialPasses, &mut height, &constraints, RelaxKernel::Laplacian3, 400);
        let mid = *height.get(4, 4);
        assert!((mid - 0.4).abs() < 0.05, "mid row {mid}");
    }

    #[test]
    fn test_aux_relaxation_keeps_weighted_seed() {
        let mut seed: Grid<Cell> = Grid::square(5);
        seed.set(2, 2, [3.0, 1.0, 0.0, 1.0]);
        let mut grid: Grid<Cell> = Grid::square(5);
        relax_aux(&SerialPasses, &mut grid, &seed, RelaxKernel::Average3, 20);
        assert_eq!(*grid.get(2, 2), [3.0, 1.0, 0.0, 1.0]);
        assert!(grid.get(0, 0)[0] > 0.0);
        assert!(grid.get(0, 0)[0] < 3.0);
    }
}
