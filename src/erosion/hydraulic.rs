//! Pipe-model hydraulic erosion (Mei et al. 2007)
//!
//! Water sits on top of the terrain and flows between 4-connected cells
//! through virtual pipes. Each tick:
//!
//! 1. Rain drops add water in a disc.
//! 2. Outflow flux is accelerated by the height difference and scaled so a
//!    cell never ships more water than it holds.
//! 3. Water depth and velocity are updated from the net flux.
//! 4. The local tilt and speed give a transport capacity; terrain dissolves
//!    into suspended sediment or sediment settles back.
//! 5. Sediment is advected backwards along the velocity field and water evaporates.
//!
//! The grid edges are closed walls. The state can be upsampled so one run
//! continues across multigrid levels.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, TerrainError};
use crate::erosion::params::ErosionParams;
use crate::erosion::ErosionStats;
use crate::grid::{Cell, Grid};
use crate::multigrid::pass::{iterate, PassScheduler};
use crate::multigrid::stencil::interpolate;

/// Pipe directions: left, right, up, down.
const OFFSETS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
/// Index of the pipe pointing back from the neighbour.
const OPPOSITE: [usize; 4] = [1, 0, 3, 2];

const RAIN: usize = 0;
const HARDNESS: usize = 1;
const CAPACITY: usize = 2;

/// Every grid the simulation owns, all `width x width`.
#[derive(Clone, Debug)]
pub struct ErosionState {
    pub width: usize,
    pub terrain: Grid<f32>,
    pub water: Grid<f32>,
    pub sediment: Grid<f32>,
    /// Outflow per pipe, ordered left, right, up, down
    pub flux: Grid<Cell>,
    pub velocity: Grid<[f32; 2]>,
    /// `[rain, hardness, sediment capacity, weight]` per cell
    pub params: Grid<Cell>,
}

impl ErosionState {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            terrain: Grid::square(width),
            water: Grid::square(width),
            sediment: Grid::square(width),
            flux: Grid::square(width),
            velocity: Grid::square(width),
            params: Grid::new_with(width, width, [0.0, 1.0, 1.0, 0.0]),
        }
    }

    pub fn total_water(&self) -> f64 {
        self.water.sum()
    }

    fn upsample<S: PassScheduler>(&self, scheduler: &S, width: usize) -> Self {
        Self {
            width,
            terrain: interpolate(scheduler, &self.terrain, width),
            water: interpolate(scheduler, &self.water, width),
            sediment: interpolate(scheduler, &self.sediment, width),
            flux: interpolate(scheduler, &self.flux, width),
            velocity: interpolate(scheduler, &self.velocity, width),
            params: interpolate(scheduler, &self.params, width),
        }
    }
}

/// A running erosion simulation.
pub struct HydraulicErosion<S: PassScheduler> {
    params: ErosionParams,
    state: ErosionState,
    scheduler: S,
    rng: ChaCha8Rng,
    /// Simulated time since the run started
    time: f32,
    /// Time accumulated toward the next rain drop
    rain_clock: f32,
    /// Start smoothing has been applied
    smoothed: bool,
    stats: ErosionStats,
}

impl<S: PassScheduler> HydraulicErosion<S> {
    /// Start a run on `terrain`.
    pub fn new(terrain: &Grid<f32>, params: ErosionParams, seed: u64, scheduler: S) -> Result<Self> {
        params.validate()?;
        let mut erosion = Self {
            state: ErosionState::new(terrain.width),
            params,
            scheduler,
            rng: ChaCha8Rng::seed_from_u64(seed),
            time: 0.0,
            rain_clock: 0.0,
            smoothed: false,
            stats: ErosionStats::default(),
        };
        erosion.load_terrain(terrain)?;
        Ok(erosion)
    }

    pub fn width(&self) -> usize {
        self.state.width
    }

    pub fn state(&self) -> &ErosionState {
        &self.state
    }

    pub fn stats(&self) -> &ErosionStats {
        &self.stats
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Replace the terrain.
    pub fn load_terrain(&mut self, terrain: &Grid<f32>) -> Result<()> {
        self.check_width("terrain", terrain.width)?;
        self.state.terrain = terrain.clone();
        Ok(())
    }

    /// Box-smooth the terrain before the first tick of the run.
    fn smooth_on_start(&mut self) {
        if self.smoothed {
            return;
        }
        self.smoothed = true;
        iterate(
            &self.scheduler,
            &mut self.state.terrain,
            self.params.smoothing_iterations_on_start,
            |prev, x, y| {
                let (x, y) = (x as i64, y as i64);
                let mut sum = 0.0f32;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        sum += *prev.get_clamped(x + dx, y + dy);
                    }
                }
                sum / 9.0
            },
        );
    }

    /// Replace the per-cell rain/hardness/capacity grid.
    pub fn load_params(&mut self, params: &Grid<Cell>) -> Result<()> {
        self.check_width("erosion parameter", params.width)?;
        self.state.params = params.clone();
        Ok(())
    }

    /// Drop all suspended sediment back onto the terrain, then copy the
    /// terrain into `height`. Terrain plus sediment is unchanged.
    pub fn write_height(&mut self, height: &mut Grid<f32>) -> Result<()> {
        self.check_width("height", height.width)?;
        self.deposit_suspended();
        height.as_mut_slice().copy_from_slice(self.state.terrain.as_slice());
        Ok(())
    }

    fn deposit_suspended(&mut self) {
        let state = &mut self.state;
        let mut deposited = 0.0f64;
        for (b, s) in state.terrain.as_mut_slice().iter_mut().zip(state.sediment.as_mut_slice()) {
            *b += *s;
            deposited += *s as f64;
            *s = 0.0;
        }
        self.stats.total_deposited += deposited;
    }

    /// Upsample every state grid until the simulation runs at `width`.
    pub fn interpolate(&mut self, width: usize) -> Result<()> {
        while self.state.width < width {
            let next = if self.state.width <= 1 {
                width
            } else {
                (self.state.width - 1) * 2 + 1
            };
            self.state = self.state.upsample(&self.scheduler, next);
        }
        if self.state.width != width {
            return Err(TerrainError::InvalidConfig(format!(
                "erosion state of width {} cannot be interpolated to {}",
                self.state.width, width
            )));
        }
        Ok(())
    }

    /// Advance `ticks` steps with rain, calling `observer` after each one.
    pub fn run(&mut self, ticks: usize, mut observer: Option<&mut dyn FnMut(usize, &ErosionState)>) {
        self.smooth_on_start();
        let evaporation = self.params.evaporation;
        for tick in 0..ticks {
            self.tick(true, evaporation);
            if let Some(observe) = observer.as_mut() {
                observe(tick, &self.state);
            }
        }
    }

    /// Dry out a finished run: no rain, strong evaporation.
    pub fn settle(&mut self, ticks: usize) {
        self.smooth_on_start();
        let evaporation = self.params.settle_evaporation;
        for _ in 0..ticks {
            self.tick(false, evaporation);
        }
    }

    fn check_width(&self, what: &str, width: usize) -> Result<()> {
        if width != self.state.width {
            return Err(TerrainError::InvalidConfig(format!(
                "{} grid is {} wide, erosion state is {}",
                what, width, self.state.width
            )));
        }
        Ok(())
    }

    fn tick(&mut self, rain: bool, evaporation: f32) {
        let dt = self.params.time_delta;
        if rain {
            self.rain(dt);
        }
        self.update_flux(dt);
        self.apply_flux(dt);
        self.erode_and_deposit(dt);
        self.advect_and_evaporate(dt, evaporation);
        self.time += dt;
        self.stats.iterations += 1;
    }

    fn rain(&mut self, dt: f32) {
        let p = &self.params;
        if !p.add_water || self.time >= p.stop_rain_after_time {
            return;
        }
        self.rain_clock += dt;
        if self.rain_clock < p.rain_interval {
            return;
        }
        self.rain_clock = 0.0;

        let width = self.state.width;
        let (cx, cy) = if p.randomized_rain {
            (self.rng.gen_range(0..width), self.rng.gen_range(0..width))
        } else {
            (width / 2, width / 2)
        };
        let radius = sample_range(&mut self.rng, p.min_rain_size, p.max_rain_size);
        let intensity = sample_range(&mut self.rng, p.min_rain_intensity, p.max_rain_intensity);
        if intensity <= 0.0 {
            return;
        }

        let r = radius.ceil() as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                if (dx * dx + dy * dy) as f32 > radius * radius {
                    continue;
                }
                let (x, y) = (cx as i64 + dx, cy as i64 + dy);
                if !self.state.water.contains(x, y) {
                    continue;
                }
                let (x, y) = (x as usize, y as usize);
                let scale = 1.0 + self.state.params.get(x, y)[RAIN];
                *self.state.water.get_mut(x, y) += intensity * dt * scale.max(0.0);
            }
        }
        self.stats.rain_drops += 1;
    }

    fn update_flux(&mut self, dt: f32) {
        let p = &self.params;
        let acceleration = dt * p.pipe_area * p.gravity / p.pipe_length;
        let cell_area = p.cell_size * p.cell_size;
        let state = &self.state;
        let mut flux = Grid::square(state.width);

        self.scheduler.dispatch(&mut flux, |x, y| {
            let d = *state.water.get(x, y);
            let level = state.terrain.get(x, y) + d;
            let previous = state.flux.get(x, y);
            let mut out: Cell = [0.0; 4];
            for (k, (dx, dy)) in OFFSETS.iter().enumerate() {
                let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                if !state.water.contains(nx, ny) {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                let neighbour = state.terrain.get(nx, ny) + state.water.get(nx, ny);
                out[k] = (previous[k] + acceleration * (level - neighbour)).max(0.0);
            }
            let total: f32 = out.iter().sum();
            if total > 0.0 {
                let k = (d * cell_area / (total * dt)).min(1.0);
                out = out.map(|f| f * k);
            }
            out
        });

        self.state.flux = flux;
    }

    fn apply_flux(&mut self, dt: f32) {
        let cell = self.params.cell_size;
        let cell_area = cell * cell;
        let state = &self.state;

        let inflow = |x: usize, y: usize, k: usize| -> f32 {
            let (dx, dy) = OFFSETS[k];
            state
                .flux
                .try_get(x as i64 + dx, y as i64 + dy)
                .map_or(0.0, |f| f[OPPOSITE[k]])
        };

        let mut water = Grid::square(state.width);
        self.scheduler.dispatch(&mut water, |x, y| {
            let out: f32 = state.flux.get(x, y).iter().sum();
            let inn: f32 = (0..4).map(|k| inflow(x, y, k)).sum();
            (state.water.get(x, y) + dt * (inn - out) / cell_area).max(0.0)
        });

        let new_water = &water;
        let mut velocity = Grid::square(state.width);
        self.scheduler.dispatch(&mut velocity, |x, y| {
            let f = state.flux.get(x, y);
            let mean_depth = 0.5 * (state.water.get(x, y) + new_water.get(x, y));
            if mean_depth <= 1e-5 {
                return [0.0, 0.0];
            }
            let through_x = 0.5 * (inflow(x, y, 0) - f[0] + f[1] - inflow(x, y, 1));
            let through_y = 0.5 * (inflow(x, y, 2) - f[2] + f[3] - inflow(x, y, 3));
            [through_x / (cell * mean_depth), through_y / (cell * mean_depth)]
        });

        self.state.water = water;
        self.state.velocity = velocity;
    }

    fn erode_and_deposit(&mut self, dt: f32) {
        let p = &self.params;
        let state = &self.state;
        let mut out: Grid<[f32; 2]> = Grid::square(state.width);

        self.scheduler.dispatch(&mut out, |x, y| {
            let (xi, yi) = (x as i64, y as i64);
            let gx = (state.terrain.get_clamped(xi + 1, yi) - state.terrain.get_clamped(xi - 1, yi)) / (2.0 * p.cell_size);
            let gy = (state.terrain.get_clamped(xi, yi + 1) - state.terrain.get_clamped(xi, yi - 1)) / (2.0 * p.cell_size);
            let slope_sq = gx * gx + gy * gy;
            let sin_tilt = (slope_sq.sqrt() / (1.0 + slope_sq).sqrt()).max(p.min_tilt);

            let [u, v] = *state.velocity.get(x, y);
            let cell_params = state.params.get(x, y);
            let capacity = p.sediment_capacity * cell_params[CAPACITY] * sin_tilt * (u * u + v * v).sqrt();

            let b = *state.terrain.get(x, y);
            let s = *state.sediment.get(x, y);
            if capacity > s {
                let hardness = cell_params[HARDNESS].max(1e-3);
                let amount = p.suspension_rate / hardness * (capacity - s) * dt;
                [b - amount, s + amount]
            } else {
                let amount = p.deposition_rate * (s - capacity) * dt;
                [b + amount, s - amount]
            }
        });

        let mut eroded = 0.0f64;
        let mut deposited = 0.0f64;
        for (old, new) in state.terrain.as_slice().iter().zip(out.as_slice()) {
            let delta = new[0] - old;
            if delta < 0.0 {
                eroded -= delta as f64;
                self.stats.max_erosion = self.stats.max_erosion.max(-delta);
            } else {
                deposited += delta as f64;
                self.stats.max_deposition = self.stats.max_deposition.max(delta);
            }
        }
        self.stats.total_eroded += eroded;
        self.stats.total_deposited += deposited;

        self.state.terrain = out.map(|c| c[0]);
        self.state.sediment = out.map(|c| c[1]);
    }

    fn advect_and_evaporate(&mut self, dt: f32, evaporation: f32) {
        let step = dt / self.params.cell_size;
        let state = &self.state;
        let mut sediment = Grid::square(state.width);
        self.scheduler.dispatch(&mut sediment, |x, y| {
            let [u, v] = *state.velocity.get(x, y);
            state.sediment.sample_bilinear(x as f32 - u * step, y as f32 - v * step)
        });
        self.state.sediment = sediment;

        let keep = (1.0 - evaporation * dt).clamp(0.0, 1.0);
        if keep < 1.0 {
            for d in self.state.water.as_mut_slice() {
                *d *= keep;
            }
        }
    }
}

/// Uniform sample in `[lo, hi]`, `lo` when the range is empty.
fn sample_range(rng: &mut ChaCha8Rng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}
