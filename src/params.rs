//! Global terrain parameters and solver knobs

use serde::{Deserialize, Serialize};

use crate::erosion::ErosionParams;
use crate::error::{Result, TerrainError};

/// Largest supported resolution exponent (8193 x 8193 cells).
pub const MAX_RESOLUTION_EXP: u32 = 13;

/// Stencil used to average neighbours during relaxation.
///
/// The centre cell is always excluded so each pass is a Jacobi update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxKernel {
    /// 4-neighbour cross, the classic discrete Laplacian
    #[default]
    Laplacian3,
    /// Plain 8-neighbour box
    Average3,
    /// Binomial 3x3 weights
    Gaussian3,
    /// Fourth-order cross reaching two cells out
    Laplacian5,
    /// Plain 24-neighbour box
    Average5,
    /// Binomial 5x5 weights
    Gaussian5,
}

impl RelaxKernel {
    pub fn all() -> &'static [Self] {
        &[
            Self::Laplacian3,
            Self::Average3,
            Self::Gaussian3,
            Self::Laplacian5,
            Self::Average5,
            Self::Gaussian5,
        ]
    }
}

impl std::fmt::Display for RelaxKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Laplacian3 => write!(f, "laplacian3"),
            Self::Average3 => write!(f, "average3"),
            Self::Gaussian3 => write!(f, "gaussian3"),
            Self::Laplacian5 => write!(f, "laplacian5"),
            Self::Average5 => write!(f, "average5"),
            Self::Gaussian5 => write!(f, "gaussian5"),
        }
    }
}

/// How anti-aliased centerline pixels write into the restriction grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageMode {
    /// Blend toward pinned by the pixel's coverage
    #[default]
    Weighted,
    /// Every touched pixel becomes rigidly pinned
    Overwrite,
}

/// Parameters for one terrain build
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    // =========================================================================
    // Size
    // =========================================================================

    /// Half of the elevation range; heights are normalized by `2 * height`
    pub height: u32,

    /// World extent is `2^terrain_size_exp` units on each side
    pub terrain_size_exp: u32,

    /// Output grid is `2^resolution_exp + 1` cells on each side
    pub resolution_exp: u32,

    // =========================================================================
    // Rasterizing
    // =========================================================================

    /// Samples taken per Bézier segment when tessellating a curve
    pub spline_samplings: usize,

    pub coverage_mode: CoverageMode,

    // =========================================================================
    // Diffusion
    // =========================================================================

    /// Relaxation passes per remaining level
    pub diffusion_iteration_multiplier: usize,

    /// Recursion stops at a `2^break_on_level + 1` grid
    pub break_on_level: u32,

    /// Uniform fill at the base level, in normalized height units
    pub start_height: f32,

    pub kernel: RelaxKernel,

    // =========================================================================
    // Noise
    // =========================================================================

    /// Noise cycles across the whole grid
    pub noise_scale: f32,
    pub noise_amplitude: f32,

    // =========================================================================
    // Erosion
    // =========================================================================

    pub erosion_enabled: bool,
    pub erosion: ErosionParams,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            height: 100,
            terrain_size_exp: 8,
            resolution_exp: 8,
            spline_samplings: 50,
            coverage_mode: CoverageMode::Weighted,
            diffusion_iteration_multiplier: 10,
            break_on_level: 2,
            start_height: 0.0,
            kernel: RelaxKernel::Laplacian3,
            noise_scale: 30.0,
            noise_amplitude: 10.0,
            erosion_enabled: false,
            erosion: ErosionParams::default(),
        }
    }
}

impl TerrainParams {
    /// Elevation that maps to 1.0 in normalized units
    pub fn max_height(&self) -> f32 {
        (self.height * 2) as f32
    }

    pub fn terrain_size(&self) -> f32 {
        (1u64 << self.terrain_size_exp) as f32
    }

    /// Side length of the finest grid
    pub fn resolution(&self) -> usize {
        (1usize << self.resolution_exp) + 1
    }

    /// Side length of the grid the recursion bottoms out on
    pub fn base_width(&self) -> usize {
        (1usize << self.break_on_level) + 1
    }

    /// Relaxation passes for a level of the given exponent. Coarser levels get more.
    pub fn iterations_for_level(&self, level_exp: u32) -> usize {
        let remaining = self.resolution_exp.saturating_sub(level_exp) as usize + 1;
        self.diffusion_iteration_multiplier * remaining
    }

    /// Scale applied to centered value noise before it is summed onto height
    pub fn noise_weight(&self) -> f32 {
        self.noise_amplitude * 0.005 * (100.0 / self.height.max(1) as f32)
    }

    /// Check ranges. Library entry points call this before doing any work.
    pub fn validate(&self) -> Result<()> {
        if self.height == 0 {
            return Err(TerrainError::InvalidConfig("height must be positive".into()));
        }
        if self.break_on_level < 1 {
            return Err(TerrainError::InvalidConfig("break_on_level must be at least 1".into()));
        }
        if self.break_on_level > self.resolution_exp {
            return Err(TerrainError::InvalidConfig(format!(
                "break_on_level {} exceeds resolution_exp {}",
                self.break_on_level, self.resolution_exp
            )));
        }
        if self.resolution_exp > MAX_RESOLUTION_EXP {
            return Err(TerrainError::InvalidConfig(format!(
                "resolution_exp {} exceeds the maximum of {}",
                self.resolution_exp, MAX_RESOLUTION_EXP
            )));
        }
        if self.terrain_size_exp > 30 {
            return Err(TerrainError::InvalidConfig(format!(
                "terrain_size_exp {} is out of range",
                self.terrain_size_exp
            )));
        }
        if self.spline_samplings < 1 {
            return Err(TerrainError::InvalidConfig("spline_samplings must be at least 1".into()));
        }
        if !self.start_height.is_finite() {
            return Err(TerrainError::InvalidConfig("start_height must be finite".into()));
        }
        self.erosion.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let params = TerrainParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_height(), 200.0);
        assert_eq!(params.resolution(), 257);
        assert_eq!(params.base_width(), 5);
    }

    #[test]
    fn test_coarser_levels_get_more_iterations() {
        let params = TerrainParams::default();
        assert_eq!(params.iterations_for_level(8), 10);
        assert_eq!(params.iterations_for_level(3), 60);
        assert!(params.iterations_for_level(3) > params.iterations_for_level(7));
    }

    #[test]
    fn test_validate_rejects_bad_levels() {
        let params = TerrainParams {
            break_on_level: 9,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(TerrainError::InvalidConfig(_))));

        let params = TerrainParams {
            resolution_exp: 14,
            break_on_level: 2,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = TerrainParams {
            break_on_level: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let params: TerrainParams =
            serde_json::from_str(r#"{ "resolution_exp": 6, "kernel": "gaussian5" }"#).unwrap();
        assert_eq!(params.resolution_exp, 6);
        assert_eq!(params.kernel, RelaxKernel::Gaussian5);
        assert_eq!(params.height, 100);
    }
}
