//! Constrained multigrid diffusion
//!
//! A single V-cycle: the working grids are restricted down to the base level,
//! then on the way back up every level interpolates its parent's result and
//! relaxes it against that level's rasterized constraints. Coarse levels
//! spread the constraints cheaply over long distances; fine levels only
//! need a few passes to sharpen them.

pub mod pass;
pub mod stencil;

use std::time::Instant;

use crate::detail_noise::{add_noise, DetailNoise};
use crate::erosion::{ErosionStats, HydraulicErosion};
use crate::error::Result;
use crate::grid::{Cell, Grid};
use crate::params::TerrainParams;
use crate::raster::RasterizedLevels;
use crate::seeds::TerrainSeeds;

use pass::PassScheduler;
use stencil::{half_width, interpolate, relax_aux, relax_terrain, restrict, TerrainConstraints};

/// Idle erosion parameters: no extra rain, unit hardness and capacity.
pub const IDLE_EROSION: Cell = [0.0, 1.0, 1.0, 0.0];

/// The fields carried through the V-cycle, all the same width.
#[derive(Clone, Debug)]
pub struct LevelGrids {
    pub height: Grid<f32>,
    pub normals: Grid<Cell>,
    pub noise: Grid<Cell>,
    pub warp: Grid<Cell>,
    pub erosion: Grid<Cell>,
}

impl LevelGrids {
    pub fn new(width: usize) -> Self {
        Self {
            height: Grid::square(width),
            normals: Grid::square(width),
            noise: Grid::square(width),
            warp: Grid::square(width),
            erosion: Grid::square(width),
        }
    }

    pub fn width(&self) -> usize {
        self.height.width
    }

    fn restrict<S: PassScheduler>(&self, scheduler: &S, width: usize) -> Self {
        Self {
            height: restrict(scheduler, &self.height, width),
            normals: restrict(scheduler, &self.normals, width),
            noise: restrict(scheduler, &self.noise, width),
            warp: restrict(scheduler, &self.warp, width),
            erosion: restrict(scheduler, &self.erosion, width),
        }
    }
}

/// What a solve did, for logging and for the final assembly step.
#[derive(Clone, Debug, Default)]
pub struct SolveReport {
    /// Widths relaxed, coarsest first
    pub visited_widths: Vec<usize>,
    /// Base grid width the recursion bottomed out on
    pub base_width: usize,
    /// Detail noise was already summed onto the full-resolution height
    pub noise_applied: bool,
    /// Relaxation passes over all levels and fields
    pub relax_passes: usize,
    pub erosion: Option<ErosionStats>,
}

/// Mutable state threaded through the recursion.
struct SolveContext<S: PassScheduler> {
    erosion: Option<HydraulicErosion<S>>,
    report: SolveReport,
}

pub struct MultigridSolver<'a, S: PassScheduler + Clone> {
    params: &'a TerrainParams,
    seeds: &'a TerrainSeeds,
    scheduler: S,
    noise: DetailNoise,
}

impl<'a, S: PassScheduler + Clone> MultigridSolver<'a, S> {
    pub fn new(params: &'a TerrainParams, seeds: &'a TerrainSeeds, scheduler: S) -> Self {
        Self {
            noise: DetailNoise::new(seeds, params.noise_scale),
            params,
            seeds,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn detail_noise(&self) -> &DetailNoise {
        &self.noise
    }

    /// Solve at full resolution, consuming every rasterized level.
    pub fn solve(&self, levels: &mut RasterizedLevels) -> Result<(LevelGrids, SolveReport)> {
        self.params.validate()?;
        let start = Instant::now();

        let mut grids = LevelGrids::new(self.params.resolution());
        let mut ctx = SolveContext {
            erosion: None,
            report: SolveReport::default(),
        };
        self.poisson_step(&mut grids, levels, &mut ctx)?;

        ctx.report.erosion = ctx.erosion.map(|e| e.stats().clone());
        log::info!(
            "{} solve over {:?} finished in {:.2?}",
            self.scheduler.name(),
            ctx.report.visited_widths,
            start.elapsed()
        );
        Ok((grids, ctx.report))
    }

    /// One level of the V-cycle. Recurses before relaxing.
    fn poisson_step(&self, grids: &mut LevelGrids, levels: &mut RasterizedLevels, ctx: &mut SolveContext<S>) -> Result<()> {
        let width = grids.width();
        if width <= 1 || width == self.params.base_width() {
            return self.base_case(grids, ctx);
        }

        let mut coarse = grids.restrict(&self.scheduler, half_width(width));
        self.poisson_step(&mut coarse, levels, ctx)?;

        let level = levels.take(width)?;
        let level_exp = (width - 1).ilog2();
        let iterations = self.params.iterations_for_level(level_exp);
        let kernel = self.params.kernel;
        let s = &self.scheduler;
        log::debug!("relaxing {}x{} for {} iterations", width, width, iterations);

        grids.normals = interpolate(s, &coarse.normals, width);
        relax_aux(s, &mut grids.normals, &level.seed_normals, kernel, iterations);
        grids.noise = interpolate(s, &coarse.noise, width);
        relax_aux(s, &mut grids.noise, &level.noise, kernel, iterations);
        grids.warp = interpolate(s, &coarse.warp, width);
        relax_aux(s, &mut grids.warp, &level.warp, kernel, iterations);
        grids.erosion = interpolate(s, &coarse.erosion, width);
        relax_aux(s, &mut grids.erosion, &level.erosion, kernel, iterations);

        grids.height = interpolate(s, &coarse.height, width);
        let constraints = TerrainConstraints {
            seed_height: &level.seed_height,
            restrictions: &level.restrictions,
            normals: &grids.normals,
            cell_size: self.params.terrain_size() / width as f32,
        };
        relax_terrain(s, &mut grids.height, &constraints, kernel, iterations);

        ctx.report.relax_passes += iterations * 5;
        ctx.report.visited_widths.push(width);

        self.erode_level(grids, ctx)
    }

    fn base_case(&self, grids: &mut LevelGrids, ctx: &mut SolveContext<S>) -> Result<()> {
        let width = grids.width();
        log::debug!("base case at {}x{}", width, width);
        if self.params.start_height > 0.0 {
            grids.height.fill(self.params.start_height);
        }
        grids.erosion.fill(IDLE_EROSION);
        if self.params.erosion_enabled {
            ctx.erosion = Some(HydraulicErosion::new(
                &grids.height,
                self.params.erosion.clone(),
                self.seeds.erosion,
                self.scheduler.clone(),
            )?);
        }
        ctx.report.base_width = width;
        ctx.report.visited_widths.push(width);
        Ok(())
    }

    /// Noise, then the tier's erosion ticks, when this width has any.
    fn erode_level(&self, grids: &mut LevelGrids, ctx: &mut SolveContext<S>) -> Result<()> {
        let width = grids.width();
        let ticks = self.params.erosion.ticks_for_width(width);
        if !self.params.erosion_enabled || ticks == 0 {
            return Ok(());
        }
        let Some(erosion) = ctx.erosion.as_mut() else {
            return Ok(());
        };

        let noise = self.noise.generate(&self.scheduler, &grids.noise, &grids.warp);
        add_noise(&mut grids.height, &noise, self.params.noise_weight());
        if width == self.params.resolution() {
            ctx.report.noise_applied = true;
        }

        let start = Instant::now();
        erosion.interpolate(width)?;
        erosion.load_terrain(&grids.height)?;
        erosion.load_params(&grids.erosion)?;
        erosion.run(ticks, None);
        erosion.write_height(&mut grids.height)?;
        log::debug!("eroded {}x{} for {} ticks in {:.2?}", width, width, ticks, start.elapsed());
        Ok(())
    }
}
