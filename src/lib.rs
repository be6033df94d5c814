//! Spline-constrained terrain generation library
//!
//! Curves pin elevations, a multigrid solver diffuses them into a smooth
//! heightmap, and an optional pipe-model erosion pass weathers the result.

pub mod detail_noise;
pub mod erosion;
pub mod error;
pub mod export;
pub mod grid;
pub mod multigrid;
pub mod params;
pub mod raster;
pub mod seeds;
pub mod spline;
pub mod terrain;

pub use error::{Result, TerrainError};
pub use grid::{Cell, Grid};
pub use params::{CoverageMode, RelaxKernel, TerrainParams};
pub use seeds::TerrainSeeds;
pub use spline::{BezierSpline, MetaPoint, SplineConstraints};
pub use terrain::{build_scene, Scene, SplineTerrain, TerrainOutput};
