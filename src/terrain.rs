//! Terrain assembly
//!
//! Ties the stages together for one build: validate, rasterize every level,
//! run the V-cycle, then add the final detail noise unless the erosion pass
//! already did so at full resolution.

use std::fs;
use std::path::Path;
use std::time::Instant;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::detail_noise::add_noise;
use crate::error::Result;
use crate::grid::{Cell, Grid};
use crate::multigrid::pass::{ParallelPasses, PassScheduler};
use crate::multigrid::{MultigridSolver, SolveReport};
use crate::params::TerrainParams;
use crate::raster::rasterize_levels;
use crate::seeds::TerrainSeeds;
use crate::spline::{BezierSpline, MetaPoint, SplineConstraints};

/// Everything needed for one build, as stored on disk.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub seed: u64,
    pub params: TerrainParams,
    pub splines: Vec<BezierSpline>,
}

impl Scene {
    pub fn from_json(json: &str) -> Result<Self> {
        let scene: Scene = serde_json::from_str(json)?;
        scene.params.validate()?;
        Ok(scene)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn seeds(&self) -> TerrainSeeds {
        TerrainSeeds::from_master(self.seed)
    }

    /// A ridge crossed by a flat road, sized for the default 256-unit terrain.
    pub fn demo(seed: u64) -> Result<Self> {
        let ridge = BezierSpline::new(
            vec![
                Vec3::new(-110.0, 40.0, -80.0),
                Vec3::new(-40.0, 70.0, -100.0),
                Vec3::new(30.0, 90.0, 40.0),
                Vec3::new(110.0, 50.0, 90.0),
            ],
            vec![
                MetaPoint::at(0.0).with_line_radius(2.0).with_gradient(40.0, -35.0).with_noise(1.0, 0.6),
                MetaPoint::at(1.0).with_line_radius(4.0).with_gradient(60.0, -45.0).with_noise(0.5, 0.3),
            ],
        )?;
        let road = BezierSpline::line(Vec3::new(-120.0, 20.0, 60.0), Vec3::new(120.0, 20.0, -40.0))
            .with_meta_point(MetaPoint::at(0.0).with_line_radius(3.0).with_gradient(12.0, 0.0).with_erosion(0.0, 4.0, 0.5))
            .with_constraints(SplineConstraints {
                noise: false,
                ..Default::default()
            });
        Ok(Self {
            seed,
            params: TerrainParams::default(),
            splines: vec![ridge, road],
        })
    }
}

/// Result of a build at `2^resolution_exp + 1` cells per side.
#[derive(Clone, Debug)]
pub struct TerrainOutput {
    /// Heights normalized by `max_height`
    pub height: Grid<f32>,
    /// Relaxed `[dir x, dir z, slope, weight]` field
    pub normals: Grid<Cell>,
    /// Detail noise before weighting
    pub noise: Grid<f32>,
    pub max_height: f32,
    pub report: SolveReport,
}

impl TerrainOutput {
    pub fn width(&self) -> usize {
        self.height.width
    }

    /// Heights in world units.
    pub fn denormalized(&self) -> Grid<f32> {
        self.height.map(|h| h * self.max_height)
    }
}

/// Builds terrains for one parameter set.
pub struct SplineTerrain<S: PassScheduler + Clone = ParallelPasses> {
    params: TerrainParams,
    seeds: TerrainSeeds,
    scheduler: S,
}

impl SplineTerrain<ParallelPasses> {
    pub fn new(params: TerrainParams, seeds: TerrainSeeds) -> Self {
        Self::with_scheduler(params, seeds, ParallelPasses)
    }
}

impl<S: PassScheduler + Clone> SplineTerrain<S> {
    pub fn with_scheduler(params: TerrainParams, seeds: TerrainSeeds, scheduler: S) -> Self {
        Self {
            params,
            seeds,
            scheduler,
        }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    pub fn build(&self, splines: &[BezierSpline]) -> Result<TerrainOutput> {
        self.params.validate()?;
        let start = Instant::now();

        let mut levels = rasterize_levels(splines, &self.params)?;
        let solver = MultigridSolver::new(&self.params, &self.seeds, self.scheduler.clone());
        let (mut grids, report) = solver.solve(&mut levels)?;

        let noise = solver
            .detail_noise()
            .generate(&self.scheduler, &grids.noise, &grids.warp);
        if !report.noise_applied {
            add_noise(&mut grids.height, &noise, self.params.noise_weight());
        }

        log::info!(
            "built {}x{} terrain from {} curves in {:.2?}",
            grids.width(),
            grids.width(),
            splines.len(),
            start.elapsed()
        );

        Ok(TerrainOutput {
            height: grids.height,
            normals: grids.normals,
            noise,
            max_height: self.params.max_height(),
            report,
        })
    }
}

/// Build a scene with the parallel scheduler.
pub fn build_scene(scene: &Scene) -> Result<TerrainOutput> {
    SplineTerrain::new(scene.params.clone(), scene.seeds()).build(&scene.splines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multigrid::pass::SerialPasses;
    use crate::raster::world_to_pixel;

    fn params() -> TerrainParams {
        TerrainParams {
            terrain_size_exp: 7,
            resolution_exp: 6,
            break_on_level: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_straight_line_round_trip() {
        let road = BezierSpline::line(Vec3::new(-50.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0))
            .with_meta_point(MetaPoint::at(0.0).with_height(10.0));
        let terrain = SplineTerrain::new(params(), TerrainSeeds::from_master(1));
        let out = terrain.build(&[road]).unwrap();

        assert_eq!(out.width(), 65);
        let expected = 10.0 / out.max_height;
        let size = terrain.params().terrain_size();
        for x in [-40.0, -20.0, 0.0, 15.0, 40.0] {
            let (px, py) = world_to_pixel(size, 65, x, 0.0);
            let h = *out.height.get(px as usize, py as usize);
            assert!((h - expected).abs() < 1e-4, "x={x}: {h} vs {expected}");
        }
        let world = out.denormalized();
        let (px, py) = world_to_pixel(size, 65, 0.0, 0.0);
        assert!((world.get(px as usize, py as usize) - 10.0).abs() < 0.02);
    }

    #[test]
    fn test_no_curves_gives_flat_start_height() {
        let params = TerrainParams {
            start_height: 0.3,
            ..params()
        };
        let out = SplineTerrain::with_scheduler(params, TerrainSeeds::default(), SerialPasses)
            .build(&[])
            .unwrap();
        assert!(out.height.iter().all(|(_, _, h)| (*h - 0.3).abs() < 1e-5));
        assert!(out.noise.iter().all(|(_, _, n)| *n == 0.0));
        assert!(!out.report.noise_applied);
    }

    #[test]
    fn test_noise_follows_curve_attributes() {
        let road = BezierSpline::line(Vec3::new(-50.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0))
            .with_meta_point(MetaPoint::at(0.0).with_height(10.0).with_noise(1.0, 0.5));
        let out = SplineTerrain::new(params(), TerrainSeeds::from_master(2)).build(&[road]).unwrap();
        assert!(out.noise.iter().any(|(_, _, n)| *n != 0.0));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let params = TerrainParams {
            break_on_level: 9,
            ..params()
        };
        assert!(SplineTerrain::new(params, TerrainSeeds::default()).build(&[]).is_err());
    }

    #[test]
    fn test_scene_json() {
        let json = r#"{
            "seed": 4,
            "params": { "resolution_exp": 5, "terrain_size_exp": 7, "kernel": "gaussian3" },
            "splines": [
                { "points": [[-30, 5, 0], [30, 5, 0]],
                  "meta_points": [{ "position": 0.0, "height": 3.0, "line_radius": 1.5 }] }
            ]
        }"#;
        let scene = Scene::from_json(json).unwrap();
        assert_eq!(scene.params.resolution_exp, 5);
        assert_eq!(scene.splines.len(), 1);
        assert_eq!(scene.splines[0].points().len(), 4);

        let again = Scene::from_json(&scene.to_json().unwrap()).unwrap();
        assert_eq!(again.splines, scene.splines);

        let out = build_scene(&scene).unwrap();
        assert_eq!(out.width(), 33);
    }

    #[test]
    fn test_demo_scene_builds() {
        let mut scene = Scene::demo(3).unwrap();
        scene.params.resolution_exp = 6;
        let out = build_scene(&scene).unwrap();
        assert!(out.height.iter().all(|(_, _, h)| h.is_finite()));
        let (lo, hi) = out.height.min_max();
        assert!(hi > lo);
    }
}
