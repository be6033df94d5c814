//! Rasterization of curves into per-level seed grids
//!
//! Every curve is tessellated once, then drawn into each multigrid level
//! (`2^n + 1` cells for `n = resolution_exp` down to `break_on_level + 1`):
//!
//! 1. Shoulder strips fill the restriction `b` weight, the shoulder target
//!    elevation and the seed normals. Overlapping shoulders average.
//! 2. Line strips pin their cells and average the seed height.
//! 3. An anti-aliased centerline pass pins the thin line the strips miss,
//!    blending into the restriction by coverage.
//!
//! Cells no curve touched stay fully free.

pub mod coords;
pub mod line;
pub mod mesh;
pub mod triangle;

pub use coords::{world_to_pixel, PixelMapper};
pub use mesh::{TessellatedSpline, SHOULDER_START_WEIGHT};

use std::collections::HashMap;
use std::time::Instant;

use glam::Vec2;
use rayon::prelude::*;

use crate::error::{Result, TerrainError};
use crate::grid::{Cell, Grid};
use crate::params::{CoverageMode, TerrainParams};
use crate::spline::{BezierSpline, MetaPoint, SplineConstraints};

use line::{anti_aliased_line, clip_to_grid};
use mesh::{MeshVertex, StripMesh};
use triangle::{blend, rasterize_triangle};

/// Restriction cell channels
pub const PINNED: usize = 0;
pub const SHOULDER: usize = 1;
pub const SHOULDER_TARGET: usize = 2;
pub const COVERAGE: usize = 3;

/// Seed grids for one resolution.
#[derive(Clone, Debug)]
pub struct RasterizedLevel {
    pub width: usize,
    /// Normalized target elevation on line cells
    pub seed_height: Grid<f32>,
    /// `[pinned a, shoulder b, shoulder target, hit count]`
    pub restrictions: Grid<Cell>,
    /// `[dir x, dir z, slope, weight]`
    pub seed_normals: Grid<Cell>,
    /// `[amplitude, roughness, 0, weight]`
    pub noise: Grid<Cell>,
    /// `[a, b, 0, weight]`
    pub warp: Grid<Cell>,
    /// `[rain, hardness, sediment capacity, weight]`
    pub erosion: Grid<Cell>,
}

impl RasterizedLevel {
    /// A level no curve touched: everything free, every seed clear.
    pub fn empty(width: usize) -> Self {
        Self {
            width,
            seed_height: Grid::square(width),
            restrictions: Grid::square(width),
            seed_normals: Grid::square(width),
            noise: Grid::square(width),
            warp: Grid::square(width),
            erosion: Grid::square(width),
        }
    }

    pub fn is_pinned(&self, x: usize, y: usize) -> bool {
        self.restrictions.get(x, y)[PINNED] >= 1.0
    }
}

/// Width -> seed grids for one solve. The solver removes each level as it consumes it.
#[derive(Debug, Default)]
pub struct RasterizedLevels {
    levels: HashMap<usize, RasterizedLevel>,
}

impl RasterizedLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, level: RasterizedLevel) {
        self.levels.insert(level.width, level);
    }

    pub fn contains(&self, width: usize) -> bool {
        self.levels.contains_key(&width)
    }

    pub fn get(&self, width: usize) -> Option<&RasterizedLevel> {
        self.levels.get(&width)
    }

    /// Remove and return the level for `width`; a missing level is fatal to the solve.
    pub fn take(&mut self, width: usize) -> Result<RasterizedLevel> {
        self.levels
            .remove(&width)
            .ok_or(TerrainError::MissingRasterizedLevel { width })
    }

    /// Stored widths, largest first.
    pub fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.levels.keys().copied().collect();
        widths.sort_unstable_by(|a, b| b.cmp(a));
        widths
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Draws tessellated curves onto grids of any level.
#[derive(Clone, Copy, Debug)]
pub struct Rasterizer {
    pub terrain_size: f32,
    pub max_height: f32,
    pub samplings: usize,
    pub coverage_mode: CoverageMode,
}

impl Rasterizer {
    pub fn from_params(params: &TerrainParams) -> Self {
        Self {
            terrain_size: params.terrain_size(),
            max_height: params.max_height(),
            samplings: params.spline_samplings,
            coverage_mode: params.coverage_mode,
        }
    }

    pub fn tessellate(&self, splines: &[BezierSpline]) -> Vec<TessellatedSpline> {
        splines
            .iter()
            .map(|s| TessellatedSpline::new(s, self.samplings, self.max_height))
            .collect()
    }

    /// Draw every curve onto one `width x width` level.
    pub fn rasterize_level(&self, curves: &[TessellatedSpline], width: usize) -> RasterizedLevel {
        let mapper = PixelMapper::new(self.terrain_size, width);
        let level_exp = mesh_level_exp(width);
        let mut acc = LevelAccumulator::new(width);

        for curve in curves {
            if !curve.constraints.draws_level(level_exp) {
                continue;
            }
            self.draw_shoulder(&mut acc, &mapper, &curve.left);
            self.draw_shoulder(&mut acc, &mapper, &curve.right);
            self.draw_line_strip(&mut acc, &mapper, curve);
            self.draw_centerline(&mut acc, &mapper, curve);
        }

        acc.finish()
    }

    fn draw_shoulder(&self, acc: &mut LevelAccumulator, mapper: &PixelMapper, strip: &StripMesh) {
        let width = acc.width;
        for [a, b, c] in strip.triangles() {
            let (pa, pb, pc) = project(mapper, a, b, c);
            rasterize_triangle(width, width, pa, pb, pc, |x, y, w| {
                let weight = blend(w, [a.weight, b.weight, c.weight]);
                let target = blend(w, [a.elevation, b.elevation, c.elevation]);
                let slope = blend(w, [a.slope, b.slope, c.slope]);
                let normal = a.normal * w[0] + b.normal * w[1] + c.normal * w[2];

                let s = acc.shoulder.get_mut(x, y);
                s[0] += weight;
                s[1] += target;
                s[2] += 1.0;

                let n = acc.normals.get_mut(x, y);
                n[0] += normal.x;
                n[1] += normal.y;
                n[2] += slope;
                n[3] += 1.0;
            });
        }
    }

    fn draw_line_strip(&self, acc: &mut LevelAccumulator, mapper: &PixelMapper, curve: &TessellatedSpline) {
        let constraints = curve.constraints;
        let width = acc.width;
        for [a, b, c] in curve.line.triangles() {
            let (pa, pb, pc) = project(mapper, a, b, c);
            let spline_t = [a.t, b.t, c.t];
            rasterize_triangle(width, width, pa, pb, pc, |x, y, w| {
                if constraints.elevation {
                    let h = acc.height.get_mut(x, y);
                    h[0] += blend(w, [a.elevation, b.elevation, c.elevation]);
                    h[1] += 1.0;
                    *acc.line.get_mut(x, y) += 1;
                }
                let t = blend(w, spline_t);
                acc.add_attributes(x, y, &curve_attribute(curve, t), constraints);
            });
        }
    }

    fn draw_centerline(&self, acc: &mut LevelAccumulator, mapper: &PixelMapper, curve: &TessellatedSpline) {
        let constraints = curve.constraints;
        for (i, pair) in curve.samples.windows(2).enumerate() {
            let from = mapper.ground_to_pixel(pair[0].ground());
            let to = mapper.ground_to_pixel(pair[1].ground());
            let e_from = curve.sample_elevation(i);
            let e_to = curve.sample_elevation(i + 1);

            let span = Vec2::new((to.0 - from.0) as f32, (to.1 - from.1) as f32).length();

            let Some((a, b)) = clip_to_grid(from, to, mapper.width()) else {
                continue;
            };
            for pixel in anti_aliased_line(a.0, a.1, b.0, b.1) {
                let Some((x, y)) = mapper.in_bounds(pixel.x, pixel.y) else {
                    continue;
                };
                let along = if span > 0.0 {
                    let d = Vec2::new((pixel.x - from.0) as f32, (pixel.y - from.1) as f32).length();
                    (d / span).min(1.0)
                } else {
                    0.0
                };

                if constraints.elevation {
                    let h = acc.height.get_mut(x, y);
                    h[0] += e_from + (e_to - e_from) * along;
                    h[1] += 1.0;
                    let free = acc.free_product.get_mut(x, y);
                    *free *= match self.coverage_mode {
                        CoverageMode::Weighted => 1.0 - pixel.coverage(),
                        CoverageMode::Overwrite => 0.0,
                    };
                    *acc.centerline.get_mut(x, y) += 1;
                }

                let t = pair[0].t + (pair[1].t - pair[0].t) * along;
                acc.add_attributes(x, y, &curve_attribute(curve, t), constraints);
            }
        }
    }
}

fn project(mapper: &PixelMapper, a: &MeshVertex, b: &MeshVertex, c: &MeshVertex) -> (Vec2, Vec2, Vec2) {
    (
        mapper.ground_to_raster(a.ground),
        mapper.ground_to_raster(b.ground),
        mapper.ground_to_raster(c.ground),
    )
}

/// Interpolate attributes between the two samples bracketing `t`.
fn curve_attribute(curve: &TessellatedSpline, t: f32) -> MetaPoint {
    let samples = &curve.samples;
    let idx = samples.partition_point(|s| s.t <= t).clamp(1, samples.len().max(1)) - 1;
    let a = &samples[idx];
    match samples.get(idx + 1) {
        Some(b) if b.t > a.t => {
            let f = ((t - a.t) / (b.t - a.t)).clamp(0.0, 1.0);
            MetaPoint::lerp(&a.attributes, &b.attributes, f)
        }
        _ => a.attributes,
    }
}

/// Exponent of a `2^k + 1` width; widths of 1 map to 0.
fn mesh_level_exp(width: usize) -> u32 {
    width.saturating_sub(1).max(1).ilog2()
}

/// Running sums for one level before averaging.
struct LevelAccumulator {
    width: usize,
    /// `[height sum, count]`
    height: Grid<[f32; 2]>,
    /// Line strip hits, each pinning its cell outright
    line: Grid<u32>,
    /// Anti-aliased centerline hits
    centerline: Grid<u32>,
    /// Product of `1 - coverage` over centerline pixels
    free_product: Grid<f32>,
    /// `[weight sum, target sum, count, _]`
    shoulder: Grid<Cell>,
    /// `[dir x sum, dir z sum, slope sum, count]`
    normals: Grid<Cell>,
    noise: Grid<Cell>,
    warp: Grid<Cell>,
    erosion: Grid<Cell>,
}

impl LevelAccumulator {
    fn new(width: usize) -> Self {
        Self {
            width,
            height: Grid::square(width),
            line: Grid::square(width),
            centerline: Grid::square(width),
            free_product: Grid::new_with(width, width, 1.0),
            shoulder: Grid::square(width),
            normals: Grid::square(width),
            noise: Grid::square(width),
            warp: Grid::square(width),
            erosion: Grid::square(width),
        }
    }

    fn add_attributes(&mut self, x: usize, y: usize, m: &MetaPoint, constraints: SplineConstraints) {
        if constraints.noise {
            let c = self.noise.get_mut(x, y);
            c[0] += m.noise_amplitude;
            c[1] += m.noise_roughness;
            c[3] += 1.0;
        }
        if constraints.warp {
            let c = self.warp.get_mut(x, y);
            c[0] += m.warp_a;
            c[1] += m.warp_b;
            c[3] += 1.0;
        }
        if constraints.erosion {
            let c = self.erosion.get_mut(x, y);
            c[0] += m.erosion_rain;
            c[1] += m.erosion_hardness;
            c[2] += m.erosion_sediment_capacity;
            c[3] += 1.0;
        }
    }

    fn finish(self) -> RasterizedLevel {
        let width = self.width;
        let mut level = RasterizedLevel::empty(width);

        for y in 0..width {
            for x in 0..width {
                let [h_sum, h_count] = *self.height.get(x, y);
                if h_count > 0.0 {
                    level.seed_height.set(x, y, h_sum / h_count);
                }

                let s = *self.shoulder.get(x, y);
                let mut cell: Cell = [0.0; 4];
                if s[2] > 0.0 {
                    cell[SHOULDER] = s[0] / s[2];
                    cell[SHOULDER_TARGET] = s[1] / s[2];
                }

                let strip_hits = *self.line.get(x, y);
                let centerline_hits = *self.centerline.get(x, y);
                if strip_hits > 0 {
                    cell[PINNED] = 1.0;
                    cell[SHOULDER] = 0.0;
                } else if centerline_hits > 0 {
                    let free = *self.free_product.get(x, y);
                    cell[PINNED] = 1.0 - (1.0 - cell[PINNED]) * free;
                    cell[SHOULDER] *= free;
                }
                let line_hits = strip_hits + centerline_hits;
                cell[COVERAGE] = s[2] + line_hits as f32;
                level.restrictions.set(x, y, cell);

                let n = *self.normals.get(x, y);
                if n[3] > 0.0 {
                    level.seed_normals.set(x, y, [n[0] / n[3], n[1] / n[3], n[2] / n[3], 1.0]);
                }

                level.noise.set(x, y, average(self.noise.get(x, y)));
                level.warp.set(x, y, average(self.warp.get(x, y)));
                level.erosion.set(x, y, average(self.erosion.get(x, y)));
            }
        }

        level
    }
}

/// Divide the first three channels by the count in the fourth; weight becomes 1.
fn average(sum: &Cell) -> Cell {
    if sum[3] > 0.0 {
        [sum[0] / sum[3], sum[1] / sum[3], sum[2] / sum[3], 1.0]
    } else {
        [0.0; 4]
    }
}

/// Rasterize every curve for every level the solver will visit.
///
/// Levels are built in parallel; each level accumulates its curves in order.
pub fn rasterize_levels(splines: &[BezierSpline], params: &TerrainParams) -> Result<RasterizedLevels> {
    params.validate()?;
    let start = Instant::now();

    let rasterizer = Rasterizer::from_params(params);
    let curves = rasterizer.tessellate(splines);

    let exps: Vec<u32> = ((params.break_on_level + 1)..=params.resolution_exp).rev().collect();
    let built: Vec<RasterizedLevel> = exps
        .par_iter()
        .map(|&n| rasterizer.rasterize_level(&curves, (1usize << n) + 1))
        .collect();

    let mut levels = RasterizedLevels::new();
    for level in built {
        log::debug!("rasterized level {}x{}", level.width, level.width);
        levels.insert(level);
    }

    log::info!(
        "rasterized {} curves into {} levels in {:.2?}",
        splines.len(),
        levels.len(),
        start.elapsed()
    );
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::SplineConstraints;
    use glam::Vec3;

    fn params() -> TerrainParams {
        TerrainParams {
            terrain_size_exp: 7,
            resolution_exp: 6,
            break_on_level: 3,
            ..Default::default()
        }
    }

    fn straight_road(height: f32) -> BezierSpline {
        BezierSpline::line(Vec3::new(-50.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0))
            .with_meta_point(MetaPoint::at(0.0).with_height(height))
    }

    #[test]
    fn test_levels_cover_expected_widths() {
        let levels = rasterize_levels(&[straight_road(10.0)], &params()).unwrap();
        assert_eq!(levels.widths(), vec![65, 33, 17]);
        assert!(!levels.contains(9));
    }

    #[test]
    fn test_centerline_is_pinned_to_elevation() {
        let p = params();
        let mut levels = rasterize_levels(&[straight_road(10.0)], &p).unwrap();
        let level = levels.take(65).unwrap();
        let (_, row) = world_to_pixel(p.terrain_size(), 65, 0.0, 0.0);
        let row = row as usize;
        let expected = 10.0 / p.max_height();

        let (x0, _) = world_to_pixel(p.terrain_size(), 65, -40.0, 0.0);
        let (x1, _) = world_to_pixel(p.terrain_size(), 65, 40.0, 0.0);
        for x in x0 as usize..=x1 as usize {
            assert!(level.is_pinned(x, row), "cell {x} not pinned");
            assert!((level.seed_height.get(x, row) - expected).abs() < 1e-5);
        }
        // far from the curve everything is free
        assert_eq!(*level.restrictions.get(5, 5), [0.0; 4]);
        assert!(levels.take(65).is_err());
    }

    #[test]
    fn test_shoulders_weight_and_normals() {
        let p = params();
        let road = BezierSpline::line(Vec3::new(-50.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0))
            .with_meta_point(MetaPoint::at(0.0).with_height(10.0).with_line_radius(2.0).with_gradient(12.0, 6.0));
        let rasterizer = Rasterizer::from_params(&p);
        let level = rasterizer.rasterize_level(&rasterizer.tessellate(&[road]), 65);

        let (x, row) = world_to_pixel(p.terrain_size(), 65, 0.0, 0.0);
        let (x, row) = (x as usize, row as usize);
        assert!(level.is_pinned(x, row));

        // a few cells to the left (+z) sit on the shoulder
        let shoulder = *level.restrictions.get(x, row + 3);
        assert_eq!(shoulder[PINNED], 0.0);
        assert!(shoulder[SHOULDER] > 0.0 && shoulder[SHOULDER] < SHOULDER_START_WEIGHT);
        assert!(shoulder[SHOULDER_TARGET] > 10.0 / p.max_height());

        let normal = *level.seed_normals.get(x, row + 3);
        assert!(normal[1] > 0.9);
        assert_eq!(normal[3], 1.0);
        let normal = *level.seed_normals.get(x, row - 3);
        assert!(normal[1] < -0.9);
    }

    #[test]
    fn test_overwrite_mode_pins_partial_pixels() {
        let p = TerrainParams {
            coverage_mode: CoverageMode::Overwrite,
            ..params()
        };
        let road = BezierSpline::line(Vec3::new(-50.0, 20.0, -30.0), Vec3::new(40.0, 20.0, 25.0))
            .with_meta_point(MetaPoint::at(0.0).with_line_radius(0.1));
        let rasterizer = Rasterizer::from_params(&p);
        let level = rasterizer.rasterize_level(&rasterizer.tessellate(&[road.clone()]), 65);
        let line_cells: Vec<_> = level.seed_height.iter().filter(|(_, _, h)| **h > 0.0).collect();
        assert!(!line_cells.is_empty());
        assert!(line_cells.iter().all(|(x, y, _)| level.is_pinned(*x, *y)));

        let weighted = Rasterizer {
            coverage_mode: CoverageMode::Weighted,
            ..rasterizer
        };
        let level = weighted.rasterize_level(&weighted.tessellate(&[road]), 65);
        assert!(level
            .restrictions
            .iter()
            .any(|(_, _, c)| c[PINNED] > 0.0 && c[PINNED] < 1.0));
    }

    #[test]
    fn test_auxiliary_grids_and_flags() {
        let p = params();
        let road = straight_road(0.0)
            .with_meta_point(MetaPoint::at(1.0).with_noise(2.0, 0.5).with_erosion(1.0, 3.0, 2.0))
            .with_constraints(SplineConstraints {
                warp: false,
                ..Default::default()
            });
        let rasterizer = Rasterizer::from_params(&p);
        let level = rasterizer.rasterize_level(&rasterizer.tessellate(&[road]), 65);

        let (x, row) = world_to_pixel(p.terrain_size(), 65, 45.0, 0.0);
        let noise = *level.noise.get(x as usize, row as usize);
        assert_eq!(noise[3], 1.0);
        assert!(noise[0] > 1.5);
        let erosion = *level.erosion.get(x as usize, row as usize);
        assert!(erosion[1] > 2.0);
        assert!(level.warp.iter().all(|(_, _, c)| c[3] == 0.0));
        assert_eq!(*level.noise.get(3, 3), [0.0; 4]);
    }

    #[test]
    fn test_level_range_skips_curve() {
        let p = params();
        let road = straight_road(10.0).with_constraints(SplineConstraints {
            max_grid_level: 5,
            ..Default::default()
        });
        let levels = rasterize_levels(&[road], &p).unwrap();
        let fine = levels.get(65).unwrap();
        assert!(fine.restrictions.iter().all(|(_, _, c)| c[COVERAGE] == 0.0));
        let coarse = levels.get(33).unwrap();
        assert!(coarse.restrictions.iter().any(|(_, _, c)| c[PINNED] == 1.0));
    }

    #[test]
    fn test_offgrid_curve_is_dropped() {
        let p = params();
        let road = BezierSpline::line(Vec3::new(500.0, 0.0, 500.0), Vec3::new(600.0, 0.0, 600.0));
        let levels = rasterize_levels(&[road], &p).unwrap();
        let level = levels.get(65).unwrap();
        assert!(level.restrictions.iter().all(|(_, _, c)| *c == [0.0; 4]));
    }

    #[test]
    fn test_far_curve_crossing_the_grid_is_clipped() {
        let p = params();
        let road = BezierSpline::line(Vec3::new(-1.0e13, 0.0, 3.0), Vec3::new(1.0e13, 0.0, 3.0))
            .with_meta_point(MetaPoint::at(0.0).with_height(5.0));
        let levels = rasterize_levels(&[road], &p).unwrap();
        let level = levels.get(65).unwrap();
        let (_, row) = world_to_pixel(p.terrain_size(), 65, 0.0, 3.0);
        for x in 0..65 {
            assert!(level.is_pinned(x, row as usize), "cell {x} not pinned");
        }
        assert!(level.seed_height.iter().all(|(_, _, h)| h.is_finite()));
    }
}
