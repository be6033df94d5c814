//! Hydraulic erosion parameters and presets

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};

/// Erosion intensity preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErosionPreset {
    /// No erosion - raw solved terrain
    None,
    /// Light rain, strong smoothing before the first tick
    Gentle,
    /// Balanced pipe-model erosion
    #[default]
    Normal,
}

impl ErosionPreset {
    pub fn all() -> &'static [Self] {
        &[Self::None, Self::Gentle, Self::Normal]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::None => "No erosion (raw solved terrain)",
            Self::Gentle => "Light rain, pre-smoothed terrain",
            Self::Normal => "Balanced pipe-model erosion",
        }
    }

    /// Whether this preset runs any erosion ticks at all.
    pub fn enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for ErosionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gentle => write!(f, "gentle"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

impl std::str::FromStr for ErosionPreset {
    type Err = TerrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gentle" => Ok(Self::Gentle),
            "normal" => Ok(Self::Normal),
            other => Err(TerrainError::InvalidConfig(format!("unknown erosion preset '{}'", other))),
        }
    }
}

/// Pipe-model (virtual pipes shallow water) erosion parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionParams {
    // =========================================================================
    // Terrain
    // =========================================================================

    /// 3x3 box smoothing passes applied to the terrain when a run is initialised
    pub smoothing_iterations_on_start: usize,

    // =========================================================================
    // Flow
    // =========================================================================

    /// Cross-section area of the virtual pipe between two cells
    pub pipe_area: f32,

    pub gravity: f32,

    /// Length of the virtual pipe between two cell centres
    pub pipe_length: f32,

    /// Cell extent used for water volume (lx = ly)
    pub cell_size: f32,

    // =========================================================================
    // Erosion and deposition
    // =========================================================================

    /// Sediment transport capacity constant Kc
    pub sediment_capacity: f32,

    /// Dissolving constant Ks, divided by the local hardness
    pub suspension_rate: f32,

    /// Deposition constant Kd
    pub deposition_rate: f32,

    /// Lower clamp on sin(tilt) so flat ground still carries some sediment
    pub min_tilt: f32,

    // =========================================================================
    // Rain and evaporation
    // =========================================================================

    pub add_water: bool,

    /// Evaporation constant Ke
    pub evaporation: f32,

    /// Evaporation constant used while settling a converged result
    pub settle_evaporation: f32,

    pub max_rain_intensity: f32,
    pub min_rain_intensity: f32,

    /// Rain drop radius range, in cells
    pub max_rain_size: f32,
    pub min_rain_size: f32,

    /// Simulation time between two rain drops
    pub rain_interval: f32,

    /// No rain falls once simulation time passes this value
    pub stop_rain_after_time: f32,

    /// Random drop positions when true, otherwise every drop lands at the centre
    pub randomized_rain: bool,

    // =========================================================================
    // Time and step size
    // =========================================================================

    pub time_delta: f32,

    /// Ticks run at each grid level, keyed by the level exponent (257 -> 8)
    pub tier_iterations: BTreeMap<u32, usize>,
}

impl Default for ErosionParams {
    fn default() -> Self {
        Self {
            smoothing_iterations_on_start: 0,

            pipe_area: 1.0,
            gravity: 3.0,
            pipe_length: 1.0,
            cell_size: 1.0,

            sediment_capacity: 0.9,
            suspension_rate: 1.0,
            deposition_rate: 1.0,
            min_tilt: 0.05,

            add_water: true,
            evaporation: 0.1,
            settle_evaporation: 0.9,
            max_rain_intensity: 0.5,
            min_rain_intensity: 0.0,
            max_rain_size: 32.0,
            min_rain_size: 2.0,
            rain_interval: 0.01,
            stop_rain_after_time: 1000.0,
            randomized_rain: true,

            time_delta: 0.01,
            tier_iterations: BTreeMap::from([(8, 500), (9, 500), (10, 500), (11, 10)]),
        }
    }
}

impl ErosionParams {
    /// Create parameters from a preset
    pub fn from_preset(preset: ErosionPreset) -> Self {
        match preset {
            ErosionPreset::None => Self {
                add_water: false,
                tier_iterations: BTreeMap::new(),
                ..Default::default()
            },
            ErosionPreset::Gentle => Self {
                smoothing_iterations_on_start: 100,
                gravity: 9.81,
                sediment_capacity: 0.7,
                suspension_rate: 0.7,
                deposition_rate: 0.7,
                max_rain_intensity: 0.1,
                max_rain_size: 5.0,
                ..Default::default()
            },
            ErosionPreset::Normal => Self::default(),
        }
    }

    /// Few ticks on every tier from 17 up to 257 cells
    pub fn fast() -> Self {
        Self {
            tier_iterations: BTreeMap::from([(4, 20), (5, 20), (6, 20), (7, 20), (8, 20)]),
            ..Default::default()
        }
    }

    /// Ticks to run on a `2^exp + 1` grid, zero when the tier is absent.
    pub fn ticks_for_exp(&self, exp: u32) -> usize {
        self.tier_iterations.get(&exp).copied().unwrap_or(0)
    }

    /// Ticks to run on a grid of the given width.
    pub fn ticks_for_width(&self, width: usize) -> usize {
        match level_exp(width) {
            Some(exp) => self.ticks_for_exp(exp),
            None => 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("pipe_area", self.pipe_area),
            ("gravity", self.gravity),
            ("pipe_length", self.pipe_length),
            ("cell_size", self.cell_size),
            ("time_delta", self.time_delta),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(TerrainError::InvalidConfig(format!("erosion {} must be positive", name)));
            }
        }
        if self.min_rain_intensity > self.max_rain_intensity {
            return Err(TerrainError::InvalidConfig(
                "erosion min_rain_intensity exceeds max_rain_intensity".into(),
            ));
        }
        if self.min_rain_size > self.max_rain_size {
            return Err(TerrainError::InvalidConfig(
                "erosion min_rain_size exceeds max_rain_size".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_tilt) {
            return Err(TerrainError::InvalidConfig("erosion min_tilt must lie in [0, 1]".into()));
        }
        Ok(())
    }
}

/// Exponent `k` of a `2^k + 1` grid width.
pub fn level_exp(width: usize) -> Option<u32> {
    let inner = width.checked_sub(1)?;
    if inner.is_power_of_two() {
        Some(inner.trailing_zeros())
    } else {
        None
    }
}
