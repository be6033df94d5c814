//! Procedural detail noise summed onto the solved height
//!
//! Multi-octave value noise whose amplitude and roughness come from the
//! relaxed noise grid, sampled at coordinates displaced by the relaxed warp
//! grid.

use noise::{NoiseFn, Value};

use crate::grid::{Cell, Grid};
use crate::multigrid::pass::PassScheduler;
use crate::seeds::TerrainSeeds;

pub const OCTAVES: usize = 4;
pub const LACUNARITY: f64 = 2.0;

/// Offset of the second warp lookup so the two axes decorrelate.
const WARP_OFFSET: [f64; 2] = [5.2, 1.3];

pub struct DetailNoise {
    value: Value,
    warp: Value,
    /// Noise periods across the whole terrain
    scale: f64,
}

impl DetailNoise {
    pub fn new(seeds: &TerrainSeeds, scale: f32) -> Self {
        Self {
            value: Value::new(seeds.noise_u32()),
            warp: Value::new(seeds.warp_u32()),
            scale: scale as f64,
        }
    }

    /// Fractal value noise in `[-1, 1]`. Octave `k` is weighted by
    /// `2^(-k (1 - roughness))`, so roughness 1 keeps every octave at full strength.
    pub fn fbm(&self, x: f64, y: f64, roughness: f32) -> f32 {
        let falloff = 2f64.powf(-(1.0 - roughness.clamp(0.0, 1.0) as f64));
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut total = 0.0;
        let mut max_value = 0.0;
        for _ in 0..OCTAVES {
            total += amplitude * self.value.get([x * frequency, y * frequency]);
            max_value += amplitude;
            amplitude *= falloff;
            frequency *= LACUNARITY;
        }
        (total / max_value) as f32
    }

    /// Displace `(x, y)` by the warp noise scaled per axis.
    pub fn warp(&self, x: f64, y: f64, a: f32, b: f32) -> (f64, f64) {
        if a == 0.0 && b == 0.0 {
            return (x, y);
        }
        let wx = self.warp.get([x, y]);
        let wy = self.warp.get([x + WARP_OFFSET[0], y + WARP_OFFSET[1]]);
        (x + wx * a as f64, y + wy * b as f64)
    }

    /// Noise value of cell `(x, y)` on a `width`-wide grid.
    pub fn sample(&self, x: usize, y: usize, width: usize, noise: &Cell, warp: &Cell) -> f32 {
        let amplitude = noise[0];
        if amplitude == 0.0 {
            return 0.0;
        }
        let u = x as f64 / width as f64 * self.scale;
        let v = y as f64 / width as f64 * self.scale;
        let (u, v) = self.warp(u, v, warp[0], warp[1]);
        amplitude * self.fbm(u, v, noise[1])
    }

    /// Noise grid matching the relaxed noise and warp grids.
    pub fn generate<S: PassScheduler>(&self, scheduler: &S, noise: &Grid<Cell>, warp: &Grid<Cell>) -> Grid<f32> {
        let width = noise.width;
        let mut out = Grid::square(width);
        scheduler.dispatch(&mut out, |x, y| self.sample(x, y, width, noise.get(x, y), warp.get(x, y)));
        out
    }
}

/// `height += weight * noise`, cell by cell.
pub fn add_noise(height: &mut Grid<f32>, noise: &Grid<f32>, weight: f32) {
    for (h, n) in height.as_mut_slice().iter_mut().zip(noise.as_slice()) {
        *h += weight * n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multigrid::pass::{ParallelPasses, SerialPasses};

    #[test]
    fn test_fbm_is_bounded() {
        let noise = DetailNoise::new(&TerrainSeeds::from_master(7), 30.0);
        for i in 0..200 {
            let x = i as f64 * 0.37;
            for roughness in [0.0, 0.5, 1.0] {
                let v = noise.fbm(x, x * 0.5 + 1.0, roughness);
                assert!((-1.0..=1.0).contains(&v), "{v}");
            }
        }
    }

    #[test]
    fn test_zero_amplitude_is_silent() {
        let noise = DetailNoise::new(&TerrainSeeds::default(), 30.0);
        let amp: Grid<Cell> = Grid::square(9);
        let warp: Grid<Cell> = Grid::new_with(9, 9, [1.0, 1.0, 0.0, 1.0]);
        let out = noise.generate(&ParallelPasses, &amp, &warp);
        assert!(out.iter().all(|(_, _, v)| *v == 0.0));
    }

    #[test]
    fn test_generation_is_seeded() {
        let amp: Grid<Cell> = Grid::new_with(17, 17, [1.0, 0.5, 0.0, 1.0]);
        let warp: Grid<Cell> = Grid::new_with(17, 17, [0.3, 0.3, 0.0, 1.0]);
        let a = DetailNoise::new(&TerrainSeeds::from_master(3), 8.0).generate(&ParallelPasses, &amp, &warp);
        let b = DetailNoise::new(&TerrainSeeds::from_master(3), 8.0).generate(&SerialPasses, &amp, &warp);
        let c = DetailNoise::new(&TerrainSeeds::from_master(4), 8.0).generate(&SerialPasses, &amp, &warp);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().any(|(_, _, v)| *v != 0.0));
    }

    #[test]
    fn test_warp_moves_lookup() {
        let noise = DetailNoise::new(&TerrainSeeds::from_master(1), 10.0);
        assert_eq!(noise.warp(1.5, 2.5, 0.0, 0.0), (1.5, 2.5));
        let (x, y) = noise.warp(1.5, 2.5, 2.0, 0.0);
        assert_eq!(y, 2.5);
        assert!((x - 1.5).abs() <= 2.0);
    }

    #[test]
    fn test_add_noise_scales() {
        let mut height: Grid<f32> = Grid::new_with(3, 3, 1.0);
        let noise: Grid<f32> = Grid::new_with(3, 3, 0.5);
        add_noise(&mut height, &noise, 0.2);
        assert!(height.iter().all(|(_, _, v)| (*v - 1.1).abs() < 1e-6));
    }
}
