//! Hydraulic erosion
//!
//! A virtual-pipe shallow water simulation that runs inside the multigrid
//! sweep: started on the coarsest grid, upsampled level by level and ticked
//! on the levels its tier table names.

pub mod hydraulic;
pub mod params;

pub use hydraulic::{ErosionState, HydraulicErosion};
pub use params::{level_exp, ErosionParams, ErosionPreset};

/// Statistics from erosion simulation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErosionStats {
    /// Total material eroded (in normalized height units)
    pub total_eroded: f64,
    /// Total material deposited
    pub total_deposited: f64,
    /// Ticks simulated, rain and settle alike
    pub iterations: usize,
    /// Rain drops that fell
    pub rain_drops: u64,
    /// Largest single-tick erosion at any cell
    pub max_erosion: f32,
    /// Largest single-tick deposition at any cell
    pub max_deposition: f32,
}

impl std::fmt::Display for ErosionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ticks, {} drops, eroded {:.4}, deposited {:.4}",
            self.iterations, self.rain_drops, self.total_eroded, self.total_deposited
        )
    }
}
